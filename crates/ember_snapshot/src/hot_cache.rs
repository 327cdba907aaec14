//! Small most-recently-used cache of object references.

/// Number of slots in the hot object cache.
pub const HOT_OBJECT_CACHE_SIZE: usize = 8;

/// Fixed-capacity list of recently referenced objects, most recent first.
///
/// The encoder and decoder apply the same sequence of inserts and touches,
/// so a slot index written by one side names the same object on the other.
#[derive(Debug, Clone)]
pub struct HotObjectCache<T> {
    entries: Vec<T>,
}

impl<T: Copy + Eq> HotObjectCache<T> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(HOT_OBJECT_CACHE_SIZE),
        }
    }

    /// Returns the slot holding `item`.
    pub fn find(&self, item: &T) -> Option<usize> {
        self.entries.iter().position(|entry| entry == item)
    }

    /// Returns the item in slot `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.entries.get(index).copied()
    }

    /// Moves the item in slot `index` to the front.
    pub fn touch(&mut self, index: usize) {
        if index < self.entries.len() {
            let item = self.entries.remove(index);
            self.entries.insert(0, item);
        }
    }

    /// Inserts `item` at the front, evicting the least recently used item
    /// when full.
    pub fn insert(&mut self, item: T) {
        if let Some(index) = self.find(&item) {
            self.touch(index);
            return;
        }
        if self.entries.len() == HOT_OBJECT_CACHE_SIZE {
            self.entries.pop();
        }
        self.entries.insert(0, item);
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Copy + Eq> Default for HotObjectCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_puts_item_first() {
        let mut cache = HotObjectCache::new();
        cache.insert(1);
        cache.insert(2);
        assert_eq!(cache.get(0), Some(2));
        assert_eq!(cache.find(&1), Some(1));
    }

    #[test]
    fn touch_moves_to_front() {
        let mut cache = HotObjectCache::new();
        for i in 0..4 {
            cache.insert(i);
        }
        cache.touch(3);
        assert_eq!(cache.get(0), Some(0));
        assert_eq!(cache.get(1), Some(3));
    }

    #[test]
    fn evicts_least_recent() {
        let mut cache = HotObjectCache::new();
        for i in 0..HOT_OBJECT_CACHE_SIZE as u32 + 1 {
            cache.insert(i);
        }
        assert_eq!(cache.len(), HOT_OBJECT_CACHE_SIZE);
        assert_eq!(cache.find(&0), None);
        assert_eq!(cache.get(0), Some(HOT_OBJECT_CACHE_SIZE as u32));
    }

    #[test]
    fn reinsert_does_not_duplicate() {
        let mut cache = HotObjectCache::new();
        cache.insert(7);
        cache.insert(8);
        cache.insert(7);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(0), Some(7));
    }
}
