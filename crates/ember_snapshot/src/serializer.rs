//! Graph encoder.
//!
//! Each reference is encoded as the first match of: a hot object slot, a
//! root table index, a back-reference or attached reference, a read-only
//! region address, or a full record. Script and function records are
//! encoded under a [`FieldPatch`] that hides runtime-specific state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use ember_heap::{fields, Heap, ObjRef, ReadOnlySpace, Record, RecordId, RecordKind, RootIndex, Value};

use crate::bytecode;
use crate::error::SerializeError;
use crate::hot_cache::HotObjectCache;
use crate::patch::{FieldPatch, PatchTarget};
use crate::sink::SnapshotSink;

/// Deepest record nesting the encoder and decoder accept.
pub const MAX_GRAPH_DEPTH: usize = 256;

/// Decides which records are replaced by `undefined` instead of encoded.
pub struct ElisionPolicy {
    predicate: Box<dyn Fn(&Record) -> bool + Send + Sync>,
}

impl ElisionPolicy {
    /// Elides every record for which `predicate` returns `true`.
    pub fn new(predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    /// Elides nothing.
    pub fn none() -> Self {
        Self::new(|_| false)
    }

    /// Returns `true` if `record` should be elided.
    pub fn should_elide(&self, record: &Record) -> bool {
        (self.predicate)(record)
    }
}

impl Default for ElisionPolicy {
    /// Elides debugger dictionaries.
    fn default() -> Self {
        Self::new(|record| record.kind == RecordKind::DebugDictionary)
    }
}

impl fmt::Debug for ElisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElisionPolicy").finish_non_exhaustive()
    }
}

/// Token counts of one encoding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeStats {
    /// References encoded as hot object slots.
    pub hot_hits: usize,
    /// References encoded as root indices.
    pub root_refs: usize,
    /// References encoded as back-references.
    pub back_refs: usize,
    /// References encoded as attached references.
    pub attached_refs: usize,
    /// References encoded as read-only region addresses.
    pub read_only_refs: usize,
    /// Records encoded in full.
    pub new_objects: usize,
    /// Records replaced by `undefined`.
    pub elided: usize,
    /// Length of the token stream.
    pub payload_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
enum Reference {
    BackRef(u32),
    Attached(u32),
}

/// Encodes one object graph into a token stream.
pub struct CodeSerializer<'r> {
    heap: &'r mut Heap,
    read_only: &'r ReadOnlySpace,
    elision: &'r ElisionPolicy,
    sink: SnapshotSink,
    references: HashMap<ObjRef, Reference>,
    next_back_ref: u32,
    next_attached: u32,
    hot_objects: HotObjectCache<ObjRef>,
    stats: SerializeStats,
    depth: usize,
}

impl PatchTarget for CodeSerializer<'_> {
    fn heap_mut(&mut self) -> &mut Heap {
        self.heap
    }
}

impl<'r> CodeSerializer<'r> {
    /// Creates an encoder over `heap`.
    ///
    /// The heap is borrowed mutably only so that script and function
    /// records can be patched for the duration of their encoding; every
    /// patch is undone before the encoder returns.
    pub fn new(heap: &'r mut Heap, read_only: &'r ReadOnlySpace, elision: &'r ElisionPolicy) -> Self {
        Self {
            heap,
            read_only,
            elision,
            sink: SnapshotSink::new(),
            references: HashMap::new(),
            next_back_ref: 0,
            next_attached: 0,
            hot_objects: HotObjectCache::new(),
            stats: SerializeStats::default(),
            depth: 0,
        }
    }

    /// Registers `obj` as supplied by the caller on both sides. It is
    /// written as an index and never encoded.
    pub fn add_attached(&mut self, obj: ObjRef) -> u32 {
        let index = self.next_attached;
        self.next_attached += 1;
        self.references.insert(obj, Reference::Attached(index));
        index
    }

    /// Encodes the graph reachable from `root`.
    pub fn serialize(&mut self, root: ObjRef) -> Result<(), SerializeError> {
        self.serialize_object(root)
    }

    /// Returns the token stream and statistics.
    pub fn finish(self) -> (Vec<u8>, SerializeStats) {
        let mut stats = self.stats;
        stats.payload_bytes = self.sink.position();
        (self.sink.into_inner(), stats)
    }

    fn record(&self, obj: ObjRef) -> Option<&Record> {
        match obj {
            ObjRef::Heap(id) => self.heap.get(id),
            ObjRef::ReadOnly(address) => self.read_only.record(address),
        }
    }

    fn serialize_object(&mut self, obj: ObjRef) -> Result<(), SerializeError> {
        if let Some(index) = self.hot_objects.find(&obj) {
            self.hot_objects.touch(index);
            self.sink.put_u8(bytecode::hot_object(index));
            self.stats.hot_hits += 1;
            return Ok(());
        }

        if let Some(root) = self.read_only.roots().lookup(obj) {
            self.sink.put_u8(bytecode::ROOT);
            self.sink.put_uint(u64::from(root.as_u32()));
            self.stats.root_refs += 1;
            return Ok(());
        }

        if let Some(reference) = self.references.get(&obj).copied() {
            match reference {
                Reference::Attached(index) => {
                    self.sink.put_u8(bytecode::ATTACHED);
                    self.sink.put_uint(u64::from(index));
                    self.stats.attached_refs += 1;
                }
                Reference::BackRef(index) => {
                    self.sink.put_u8(bytecode::BACKREF);
                    self.sink.put_uint(u64::from(index));
                    self.hot_objects.insert(obj);
                    self.stats.back_refs += 1;
                }
            }
            return Ok(());
        }

        let id = match obj {
            ObjRef::ReadOnly(address) => {
                let location = self
                    .read_only
                    .record(address)
                    .and_then(|_| self.read_only.locate(address));
                let Some((chunk_index, chunk_offset)) = location else {
                    return Err(SerializeError::DanglingReference { obj });
                };
                self.sink.put_u8(bytecode::READ_ONLY);
                self.sink.put_uint(u64::from(chunk_index));
                self.sink.put_uint(u64::from(chunk_offset));
                self.stats.read_only_refs += 1;
                return Ok(());
            }
            ObjRef::Heap(id) => id,
        };

        let record = self
            .heap
            .get(id)
            .ok_or(SerializeError::DanglingReference { obj })?;
        let kind = record.kind;
        assert!(
            kind.is_serializable(),
            "{} records must be pruned before encoding",
            kind.name()
        );

        if self.elision.should_elide(record) {
            self.sink.put_u8(bytecode::UNDEFINED);
            self.stats.elided += 1;
            return Ok(());
        }

        if self.depth >= MAX_GRAPH_DEPTH {
            return Err(SerializeError::GraphTooDeep {
                limit: MAX_GRAPH_DEPTH,
            });
        }

        let replacements = match kind {
            RecordKind::Script => self.script_replacements(record),
            RecordKind::FunctionInfo => self.function_replacements(record),
            _ => Vec::new(),
        };

        self.references
            .insert(obj, Reference::BackRef(self.next_back_ref));
        self.next_back_ref += 1;
        self.hot_objects.insert(obj);
        self.stats.new_objects += 1;

        self.depth += 1;
        let result = if replacements.is_empty() {
            self.serialize_record(id)
        } else {
            let mut patched = FieldPatch::apply(self, id, replacements);
            patched.serialize_record(id)
        };
        self.depth -= 1;
        result
    }

    fn serialize_record(&mut self, id: RecordId) -> Result<(), SerializeError> {
        let Some(record) = self.heap.get(id) else {
            return Err(SerializeError::DanglingReference {
                obj: ObjRef::Heap(id),
            });
        };
        let kind = record.kind;
        let fields = record.fields.clone();

        self.sink.put_u8(bytecode::NEW_OBJECT);
        self.sink.put_u8(kind.as_u8());
        self.sink.put_uint(fields.len() as u64);
        for (name, value) in &fields {
            self.sink.put_uint(name.len() as u64);
            self.sink.put_raw(name.as_bytes());
            self.serialize_value(value)?;
        }
        Ok(())
    }

    fn serialize_value(&mut self, value: &Value) -> Result<(), SerializeError> {
        match value {
            Value::Undefined => self.sink.put_u8(bytecode::UNDEFINED),
            Value::Bool(true) => self.sink.put_u8(bytecode::TRUE),
            Value::Bool(false) => self.sink.put_u8(bytecode::FALSE),
            Value::Int(v) => {
                self.sink.put_u8(bytecode::INT);
                self.sink.put_sint(*v);
            }
            Value::Bytes(bytes) => {
                self.sink.put_u8(bytecode::BYTES);
                self.sink.put_uint(bytes.len() as u64);
                self.sink.put_raw(bytes);
            }
            Value::Ref(obj) => self.serialize_object(*obj)?,
        }
        Ok(())
    }

    /// Context data is cleared unless it is already unset; host-defined
    /// options always become the empty literal table.
    fn script_replacements(&self, script: &Record) -> Vec<(&'static str, Value)> {
        let mut replacements = Vec::new();
        let uninitialized = Value::Ref(self.read_only.root(RootIndex::UninitializedSymbol));
        match script.field(fields::CONTEXT_DATA) {
            None | Some(Value::Undefined) => {}
            Some(value) if *value == uninitialized => {}
            Some(_) => replacements.push((fields::CONTEXT_DATA, Value::Undefined)),
        }
        replacements.push((
            fields::HOST_DEFINED_OPTIONS,
            Value::Ref(self.read_only.root(RootIndex::EmptyLiteralTable)),
        ));
        replacements
    }

    /// Detaches debug info from a function, restoring its script link and
    /// its uninstrumented bytecode.
    fn function_replacements(&self, function: &Record) -> Vec<(&'static str, Value)> {
        let Some(debug_info) = function
            .edge(fields::SCRIPT_OR_DEBUG_INFO)
            .and_then(|obj| self.record(obj))
            .filter(|record| record.kind == RecordKind::DebugInfo)
        else {
            return Vec::new();
        };

        let script = debug_info
            .field(fields::SCRIPT)
            .cloned()
            .unwrap_or(Value::Undefined);
        let mut replacements = vec![(fields::SCRIPT_OR_DEBUG_INFO, script)];
        let instrumented = debug_info
            .field(fields::DEBUG_BYTECODE)
            .is_some_and(|value| !value.is_undefined());
        if instrumented {
            if let Some(original) = debug_info.field(fields::ORIGINAL_BYTECODE) {
                replacements.push((fields::FUNCTION_DATA, original.clone()));
            }
        }
        replacements
    }
}

/// Returns the kind of the first record reachable from `root` that can be
/// encoded but must not be cached.
pub(crate) fn find_uncacheable(heap: &Heap, root: ObjRef) -> Option<RecordKind> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root]);
    while let Some(obj) = queue.pop_front() {
        let ObjRef::Heap(id) = obj else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let Some(record) = heap.get(id) else {
            continue;
        };
        if record.kind.is_serializable() && !record.kind.is_cacheable() {
            return Some(record.kind);
        }
        queue.extend(record.edges());
    }
    None
}
