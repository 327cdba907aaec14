//! Graph decoder.
//!
//! Replays the encoder's token stream against a staging heap. A record's
//! back-reference slot is registered before its fields are read, so edges
//! back to it from inside its own subgraph resolve.

use ember_heap::{
    Heap, HeapView, ObjRef, ReadOnlySpace, RecordId, RecordKind, Relocation, RootIndex, Value,
};

use crate::bytecode;
use crate::error::DeserializeError;
use crate::hot_cache::HotObjectCache;
use crate::serializer::MAX_GRAPH_DEPTH;
use crate::source::SnapshotSource;

/// The records of interest in a decoded graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGraph {
    /// The decoded root function.
    pub root: ObjRef,
    /// The script the root function belongs to.
    pub script: RecordId,
    /// Every function record allocated while decoding, innermost first.
    pub functions: Vec<RecordId>,
}

impl DecodedGraph {
    /// Rewrites the graph's IDs after its heap was absorbed elsewhere.
    pub fn relocate(self, relocation: Relocation) -> Self {
        Self {
            root: relocation.apply(self.root),
            script: relocation.apply_id(self.script),
            functions: self
                .functions
                .into_iter()
                .map(|id| relocation.apply_id(id))
                .collect(),
        }
    }
}

/// Decodes one token stream into a heap.
pub struct ObjectDeserializer<'a> {
    source: SnapshotSource<'a>,
    heap: &'a mut Heap,
    read_only: &'a ReadOnlySpace,
    attached: Vec<ObjRef>,
    back_refs: Vec<ObjRef>,
    hot_objects: HotObjectCache<ObjRef>,
    scripts: Vec<RecordId>,
    functions: Vec<RecordId>,
    depth: usize,
}

impl<'a> ObjectDeserializer<'a> {
    /// Creates a decoder. `attached` binds the stream's attached references
    /// by index.
    pub fn new(
        payload: &'a [u8],
        heap: &'a mut Heap,
        read_only: &'a ReadOnlySpace,
        attached: Vec<ObjRef>,
    ) -> Self {
        Self {
            source: SnapshotSource::new(payload),
            heap,
            read_only,
            attached,
            back_refs: Vec::new(),
            hot_objects: HotObjectCache::new(),
            scripts: Vec::new(),
            functions: Vec::new(),
            depth: 0,
        }
    }

    /// Decodes the whole stream.
    ///
    /// The stream must hold exactly one root function whose graph contains
    /// exactly one script, the function's own.
    pub fn deserialize(mut self) -> Result<DecodedGraph, DeserializeError> {
        let root = match self.read_value()? {
            Value::Ref(obj) => obj,
            _ => return Err(DeserializeError::malformed("root is not an object")),
        };
        if !self.source.at_end() {
            return Err(DeserializeError::malformed(format!(
                "{} trailing bytes after root",
                self.source.remaining()
            )));
        }

        let view = HeapView::new(self.heap, self.read_only);
        let is_function = root.heap_id().is_some()
            && view
                .record(root)
                .is_some_and(|record| record.kind == RecordKind::FunctionInfo);
        if !is_function {
            return Err(DeserializeError::malformed("root is not a function"));
        }
        let script = view.function_script(root).and_then(ObjRef::heap_id);
        match (script, self.scripts.as_slice()) {
            (Some(script), [only]) if script == *only => Ok(DecodedGraph {
                root,
                script,
                functions: self.functions,
            }),
            _ => Err(DeserializeError::malformed(format!(
                "expected the root function's script as the only script, found {}",
                self.scripts.len()
            ))),
        }
    }

    fn next_byte(&mut self) -> Result<u8, DeserializeError> {
        self.source.get_u8().ok_or_else(truncated)
    }

    fn read_u32(&mut self) -> Result<u32, DeserializeError> {
        let value = self.source.get_uint().ok_or_else(truncated)?;
        u32::try_from(value)
            .map_err(|_| DeserializeError::malformed(format!("operand {value} out of range")))
    }

    fn read_len(&mut self) -> Result<usize, DeserializeError> {
        let value = self.source.get_uint().ok_or_else(truncated)?;
        usize::try_from(value)
            .ok()
            .filter(|len| *len <= self.source.remaining())
            .ok_or_else(|| DeserializeError::malformed(format!("length {value} exceeds payload")))
    }

    fn read_value(&mut self) -> Result<Value, DeserializeError> {
        let byte = self.next_byte()?;
        let value = match byte {
            bytecode::UNDEFINED => Value::Undefined,
            bytecode::FALSE => Value::Bool(false),
            bytecode::TRUE => Value::Bool(true),
            bytecode::INT => Value::Int(self.source.get_sint().ok_or_else(truncated)?),
            bytecode::BYTES => {
                let len = self.read_len()?;
                let bytes = self.source.get_raw(len).ok_or_else(truncated)?;
                Value::Bytes(bytes.to_vec())
            }
            _ => Value::Ref(self.read_object(byte)?),
        };
        Ok(value)
    }

    fn read_object(&mut self, byte: u8) -> Result<ObjRef, DeserializeError> {
        if bytecode::is_hot_object(byte) {
            let index = usize::from(byte & bytecode::HOT_OBJECT_MASK);
            let obj = self
                .hot_objects
                .get(index)
                .ok_or_else(|| DeserializeError::malformed(format!("empty hot object slot {index}")))?;
            self.hot_objects.touch(index);
            return Ok(obj);
        }

        match byte {
            bytecode::ROOT => {
                let index = self.read_u32()?;
                let root = RootIndex::from_u32(index)
                    .ok_or_else(|| DeserializeError::malformed(format!("unknown root {index}")))?;
                Ok(self.read_only.root(root))
            }
            bytecode::BACKREF => {
                let index = self.read_u32()?;
                let obj = self
                    .back_refs
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| DeserializeError::malformed(format!("back-reference {index} out of range")))?;
                self.hot_objects.insert(obj);
                Ok(obj)
            }
            bytecode::ATTACHED => {
                let index = self.read_u32()?;
                self.attached
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| DeserializeError::malformed(format!("attached reference {index} out of range")))
            }
            bytecode::READ_ONLY => {
                let chunk_index = self.read_u32()?;
                let chunk_offset = self.read_u32()?;
                self.read_only
                    .resolve(chunk_index, chunk_offset)
                    .map(ObjRef::ReadOnly)
                    .ok_or_else(|| {
                        DeserializeError::malformed(format!(
                            "no read-only record at chunk {chunk_index} offset {chunk_offset}"
                        ))
                    })
            }
            bytecode::NEW_OBJECT => self.read_new_object(),
            _ => Err(DeserializeError::malformed(format!(
                "unexpected bytecode {byte:#04x}"
            ))),
        }
    }

    fn read_new_object(&mut self) -> Result<ObjRef, DeserializeError> {
        if self.depth >= MAX_GRAPH_DEPTH {
            return Err(DeserializeError::malformed(format!(
                "graph nesting exceeds {MAX_GRAPH_DEPTH} levels"
            )));
        }
        let tag = self.next_byte()?;
        let kind = RecordKind::from_u8(tag)
            .filter(|kind| kind.is_serializable() && kind.is_cacheable())
            .ok_or_else(|| DeserializeError::malformed(format!("invalid record kind {tag}")))?;
        let field_count = self.read_len()?;

        let id = self.heap.allocate_shell(kind, field_count)?;
        let obj = ObjRef::Heap(id);
        self.back_refs.push(obj);
        self.hot_objects.insert(obj);

        self.depth += 1;
        let fields = self.read_fields(field_count);
        self.depth -= 1;
        self.heap.fill_shell(id, fields?)?;

        match kind {
            RecordKind::Script => self.scripts.push(id),
            RecordKind::FunctionInfo => self.functions.push(id),
            _ => {}
        }
        Ok(obj)
    }

    fn read_fields(&mut self, field_count: usize) -> Result<Vec<(String, Value)>, DeserializeError> {
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let name_len = self.read_len()?;
            let name = self.source.get_raw(name_len).ok_or_else(truncated)?;
            let name = std::str::from_utf8(name)
                .map_err(|_| DeserializeError::malformed("field name is not UTF-8"))?
                .to_string();
            let value = self.read_value()?;
            fields.push((name, value));
        }
        Ok(fields)
    }
}

fn truncated() -> DeserializeError {
    DeserializeError::malformed("truncated payload")
}
