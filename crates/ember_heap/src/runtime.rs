//! Shared state of one runtime instance.

use std::sync::Arc;

use crate::error::AllocationError;
use crate::fields;
use crate::heap::Heap;
use crate::read_only::ReadOnlySpace;
use crate::record::{ObjRef, Record, RecordKind};
use crate::script_registry::ScriptRegistry;

/// The heap, read-only region and script registry of one runtime instance.
///
/// Only the controlling thread holds a `Runtime`; background work sees the
/// read-only region through its `Arc` and never touches the heap or the
/// registry.
pub struct Runtime {
    /// The shared mutable heap.
    pub heap: Heap,
    /// The read-only region shared with every instance of this build.
    pub read_only: Arc<ReadOnlySpace>,
    /// Scripts known to this runtime.
    pub scripts: ScriptRegistry,
}

impl Runtime {
    /// Creates a runtime with an unlimited heap.
    pub fn new(read_only: Arc<ReadOnlySpace>) -> Self {
        Self::with_heap(read_only, Heap::new())
    }

    /// Creates a runtime around an existing heap.
    pub fn with_heap(read_only: Arc<ReadOnlySpace>, heap: Heap) -> Self {
        Self {
            heap,
            read_only,
            scripts: ScriptRegistry::new(),
        }
    }

    /// Returns a read-only view over the heap and the region.
    pub fn view(&self) -> HeapView<'_> {
        HeapView::new(&self.heap, &self.read_only)
    }

    /// Returns the record behind `obj`.
    pub fn record(&self, obj: ObjRef) -> Option<&Record> {
        self.view().record(obj)
    }

    /// Allocates a record in the heap.
    pub fn allocate(&mut self, record: Record) -> Result<ObjRef, AllocationError> {
        self.heap.allocate(record).map(ObjRef::Heap)
    }
}

/// Borrowed view resolving references against a heap and a read-only region.
#[derive(Clone, Copy)]
pub struct HeapView<'a> {
    /// The heap that `ObjRef::Heap` references resolve against.
    pub heap: &'a Heap,
    /// The region that `ObjRef::ReadOnly` references resolve against.
    pub read_only: &'a ReadOnlySpace,
}

impl<'a> HeapView<'a> {
    /// Creates a view.
    pub fn new(heap: &'a Heap, read_only: &'a ReadOnlySpace) -> Self {
        Self { heap, read_only }
    }

    /// Returns the record behind `obj`.
    pub fn record(&self, obj: ObjRef) -> Option<&'a Record> {
        match obj {
            ObjRef::Heap(id) => self.heap.get(id),
            ObjRef::ReadOnly(address) => self.read_only.record(address),
        }
    }

    /// Returns the text of a string record.
    pub fn string(&self, obj: ObjRef) -> Option<&'a str> {
        self.record(obj)?.as_str()
    }

    /// Returns the script of a function, looking through attached debug info.
    pub fn function_script(&self, function: ObjRef) -> Option<ObjRef> {
        let record = self.record(function)?;
        if record.kind != RecordKind::FunctionInfo {
            return None;
        }
        let owner = record.edge(fields::SCRIPT_OR_DEBUG_INFO)?;
        let owner_record = self.record(owner)?;
        match owner_record.kind {
            RecordKind::Script => Some(owner),
            RecordKind::DebugInfo => owner_record
                .edge(fields::SCRIPT)
                .filter(|script| self.record(*script).is_some_and(|r| r.kind == RecordKind::Script)),
            _ => None,
        }
    }
}
