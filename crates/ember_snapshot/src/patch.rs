//! Scoped field replacement with guaranteed restore.

use std::ops::{Deref, DerefMut};

use ember_heap::{Heap, RecordId, Value};

/// Something that owns a heap a patch can be applied to.
pub(crate) trait PatchTarget {
    fn heap_mut(&mut self) -> &mut Heap;
}

impl PatchTarget for Heap {
    fn heap_mut(&mut self) -> &mut Heap {
        self
    }
}

/// Replaces fields of one record until dropped.
///
/// Dereferences to the patched target so work can continue through the
/// guard. Dropping it, including during unwinding, writes the original
/// values back in reverse order.
pub(crate) struct FieldPatch<'a, T: PatchTarget> {
    target: &'a mut T,
    record: RecordId,
    saved: Vec<(&'static str, Value)>,
}

impl<'a, T: PatchTarget> FieldPatch<'a, T> {
    /// Applies `replacements` to `record`. Fields the record does not have
    /// are skipped.
    pub(crate) fn apply(
        target: &'a mut T,
        record: RecordId,
        replacements: Vec<(&'static str, Value)>,
    ) -> Self {
        let mut saved = Vec::with_capacity(replacements.len());
        if let Some(patched) = target.heap_mut().get_mut(record) {
            for (name, value) in replacements {
                if patched.field(name).is_some() {
                    if let Some(old) = patched.set_field(name, value) {
                        saved.push((name, old));
                    }
                }
            }
        }
        Self {
            target,
            record,
            saved,
        }
    }
}

impl<T: PatchTarget> Deref for FieldPatch<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: PatchTarget> DerefMut for FieldPatch<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T: PatchTarget> Drop for FieldPatch<'_, T> {
    fn drop(&mut self) {
        let record = self.record;
        if let Some(patched) = self.target.heap_mut().get_mut(record) {
            while let Some((name, value)) = self.saved.pop() {
                patched.set_field(name, value);
            }
        }
    }
}
