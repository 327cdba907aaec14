//! Records, values and record identity.

use crate::ids::RecordId;

/// Bookkeeping bytes charged for every record, independent of its fields.
pub const RECORD_HEADER_SIZE: usize = 16;

/// Bytes charged per field slot.
pub const FIELD_SIZE: usize = 16;

/// The closed set of record kinds a compiled-program graph may contain.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RecordKind {
    /// Function metadata: name, positions, bytecode, owning script.
    FunctionInfo = 1,
    /// A script: source, origin options, host-specific data.
    Script = 2,
    /// An interpreter bytecode blob.
    Bytecode = 3,
    /// A literal or constant table.
    LiteralTable = 4,
    /// A string; its UTF-8 bytes live in the `chars` field.
    String = 5,
    /// Lexical scope description.
    ScopeInfo = 6,
    /// Debugger attachment for a function.
    DebugInfo = 7,
    /// Feedback vector layout metadata.
    FeedbackMetadata = 8,
    /// Raw byte table, e.g. source positions.
    ByteArray = 9,
    /// A unique symbol.
    Symbol = 10,
    /// Debugger-only dictionary; meaningless once restored.
    DebugDictionary = 11,
    /// Embedded sub-module artifact that makes a graph uncacheable.
    EmbeddedModule = 12,
    /// Executable machine code.
    MachineCode = 13,
    /// A live function closure.
    Closure = 14,
    /// An execution context.
    Context = 15,
    /// Runtime-internal layout map.
    Map = 16,
}

impl RecordKind {
    /// Every kind, in tag order.
    pub const ALL: [RecordKind; 16] = [
        RecordKind::FunctionInfo,
        RecordKind::Script,
        RecordKind::Bytecode,
        RecordKind::LiteralTable,
        RecordKind::String,
        RecordKind::ScopeInfo,
        RecordKind::DebugInfo,
        RecordKind::FeedbackMetadata,
        RecordKind::ByteArray,
        RecordKind::Symbol,
        RecordKind::DebugDictionary,
        RecordKind::EmbeddedModule,
        RecordKind::MachineCode,
        RecordKind::Closure,
        RecordKind::Context,
        RecordKind::Map,
    ];

    /// Returns the wire tag of this kind.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_u8() == tag)
    }

    /// Returns `false` for kinds that must have been pruned before a graph
    /// reaches the encoder: machine code, closures, contexts and maps.
    pub fn is_serializable(self) -> bool {
        !matches!(
            self,
            RecordKind::MachineCode | RecordKind::Closure | RecordKind::Context | RecordKind::Map
        )
    }

    /// Returns `true` if a record of this kind may appear in a cache payload.
    pub fn is_cacheable(self) -> bool {
        self.is_serializable() && self != RecordKind::EmbeddedModule
    }

    /// Human-readable kind name.
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::FunctionInfo => "function-info",
            RecordKind::Script => "script",
            RecordKind::Bytecode => "bytecode",
            RecordKind::LiteralTable => "literal-table",
            RecordKind::String => "string",
            RecordKind::ScopeInfo => "scope-info",
            RecordKind::DebugInfo => "debug-info",
            RecordKind::FeedbackMetadata => "feedback-metadata",
            RecordKind::ByteArray => "byte-array",
            RecordKind::Symbol => "symbol",
            RecordKind::DebugDictionary => "debug-dictionary",
            RecordKind::EmbeddedModule => "embedded-module",
            RecordKind::MachineCode => "machine-code",
            RecordKind::Closure => "closure",
            RecordKind::Context => "context",
            RecordKind::Map => "map",
        }
    }
}

/// Flat address of a record inside the [`ReadOnlySpace`](crate::ReadOnlySpace).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ReadOnlyAddress(u32);

impl ReadOnlyAddress {
    /// Creates an address from a raw region offset.
    pub fn from_raw(offset: u32) -> Self {
        Self(offset)
    }

    /// Returns the raw region offset.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Identity of a record: where it lives, not what it contains.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ObjRef {
    /// A record in a mutable heap.
    Heap(RecordId),
    /// A record in the shared read-only region.
    ReadOnly(ReadOnlyAddress),
}

impl ObjRef {
    /// Returns the heap record ID, if this reference points into a heap.
    pub fn heap_id(self) -> Option<RecordId> {
        match self {
            ObjRef::Heap(id) => Some(id),
            ObjRef::ReadOnly(_) => None,
        }
    }
}

/// The value held by a record field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// The absent value.
    Undefined,
    /// A boolean scalar.
    Bool(bool),
    /// An integer scalar.
    Int(i64),
    /// An opaque byte blob.
    Bytes(Vec<u8>),
    /// An ownership edge to another record.
    Ref(ObjRef),
}

impl Value {
    /// Returns the referenced record, if this value is an edge.
    pub fn as_obj(&self) -> Option<ObjRef> {
        match self {
            Value::Ref(obj) => Some(*obj),
            _ => None,
        }
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the byte blob payload, if any.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::Undefined`].
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    fn size_in_bytes(&self) -> usize {
        match self {
            Value::Bytes(bytes) => bytes.len(),
            _ => 0,
        }
    }
}

/// A heap-resident record: a kind tag plus ordered named fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// The kind of this record.
    pub kind: RecordKind,
    /// Field name to value, in layout order.
    pub fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates a record with no fields.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    /// Builder-style field append.
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.set_field(name, value);
        self
    }

    /// Creates a string record holding `text`.
    pub fn string(text: &str) -> Self {
        Self::new(RecordKind::String).with_field(crate::fields::CHARS, Value::Bytes(text.into()))
    }

    /// Returns the value of the named field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Sets the named field, returning the previous value if it existed.
    ///
    /// New fields are appended, so layout order is insertion order.
    pub fn set_field(&mut self, name: &str, value: Value) -> Option<Value> {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name.to_string(), value));
                None
            }
        }
    }

    /// Returns the record referenced by the named field, if it is an edge.
    pub fn edge(&self, name: &str) -> Option<ObjRef> {
        self.field(name).and_then(Value::as_obj)
    }

    /// Iterates over every outgoing edge.
    pub fn edges(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.fields.iter().filter_map(|(_, value)| value.as_obj())
    }

    /// Returns the UTF-8 text of a string record.
    pub fn as_str(&self) -> Option<&str> {
        if self.kind != RecordKind::String {
            return None;
        }
        let bytes = self.field(crate::fields::CHARS)?.as_bytes()?;
        std::str::from_utf8(bytes).ok()
    }

    /// Bytes this record is charged against a heap limit.
    pub fn size_in_bytes(&self) -> usize {
        RECORD_HEADER_SIZE
            + self
                .fields
                .iter()
                .map(|(_, value)| FIELD_SIZE + value.size_in_bytes())
                .sum::<usize>()
    }
}
