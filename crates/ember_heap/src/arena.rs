//! Generic arena for dense, ID-indexed storage of heap records.
//!
//! The [`Arena`] provides O(1) insertion and lookup by opaque [`ArenaId`] keys
//! and efficient iteration in allocation order.

use std::marker::PhantomData;

/// Trait for opaque ID types used as arena keys.
///
/// Implementors must provide a bijection between `u32` indices and the ID type.
pub trait ArenaId: Copy {
    /// Creates an ID from a raw `u32` index.
    fn from_raw(index: u32) -> Self;

    /// Returns the raw `u32` index.
    fn as_raw(self) -> u32;
}

/// A dense, ID-indexed container.
///
/// Items are always appended (never reordered or removed), making IDs stable
/// for the lifetime of the arena.
#[derive(Debug, Clone)]
pub struct Arena<I: ArenaId, T> {
    items: Vec<T>,
    _marker: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Allocates a new item in the arena and returns its ID.
    pub fn alloc(&mut self, item: T) -> I {
        let id = I::from_raw(self.items.len() as u32);
        self.items.push(item);
        id
    }

    /// Returns a reference to the item with the given ID, if it exists.
    pub fn get(&self, id: I) -> Option<&T> {
        self.items.get(id.as_raw() as usize)
    }

    /// Returns a mutable reference to the item with the given ID, if it exists.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.items.get_mut(id.as_raw() as usize)
    }

    /// Returns the number of items in the arena.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the arena contains no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over `(ID, &T)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (I::from_raw(i as u32), item))
    }

    /// Consumes the arena, yielding items in allocation order.
    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RecordId;

    #[test]
    fn alloc_and_get() {
        let mut arena: Arena<RecordId, String> = Arena::new();
        let id = arena.alloc("hello".to_string());
        assert_eq!(arena.get(id).map(String::as_str), Some("hello"));
    }

    #[test]
    fn sequential_ids() {
        let mut arena: Arena<RecordId, u32> = Arena::new();
        let a = arena.alloc(10);
        let b = arena.alloc(20);
        assert_eq!(a.as_raw(), 0);
        assert_eq!(b.as_raw(), 1);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn out_of_range_is_none() {
        let arena: Arena<RecordId, u32> = Arena::new();
        assert!(arena.get(RecordId::from_raw(3)).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn iter_in_allocation_order() {
        let mut arena: Arena<RecordId, &str> = Arena::new();
        arena.alloc("a");
        arena.alloc("b");
        let items: Vec<_> = arena.iter().map(|(id, v)| (id.as_raw(), *v)).collect();
        assert_eq!(items, vec![(0, "a"), (1, "b")]);
    }

    #[test]
    fn into_values_preserves_order() {
        let mut arena: Arena<RecordId, u32> = Arena::default();
        arena.alloc(1);
        arena.alloc(2);
        assert_eq!(arena.into_values().collect::<Vec<_>>(), vec![1, 2]);
    }
}
