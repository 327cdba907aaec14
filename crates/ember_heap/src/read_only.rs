//! The shared read-only region and the root table.
//!
//! The region is laid out once, in fixed-size chunks, and never mutated
//! afterwards. Every runtime instance built from the same configuration
//! produces a byte-identical layout, so a record in the region can be named
//! by `(chunk_index, chunk_offset)` instead of being copied into a cache
//! payload.

use std::collections::HashMap;

use ember_common::align_up;

use crate::error::ReadOnlyError;
use crate::record::{ObjRef, ReadOnlyAddress, Record, RecordKind, Value};

/// Number of entries in the root table.
pub const ROOT_COUNT: usize = 6;

/// Strings placed in the region by [`ReadOnlySpace::bootstrap`] that are
/// not roots.
const BUILTIN_STRINGS: &[&str] = &[
    "length",
    "name",
    "prototype",
    "constructor",
    "arguments",
    "caller",
    "default",
    "use strict",
    "toString",
];

/// Well-known singleton records, referenced by index.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RootIndex {
    /// The empty string.
    EmptyString = 0,
    /// The empty literal table.
    EmptyLiteralTable = 1,
    /// The empty byte array.
    EmptyByteArray = 2,
    /// The empty scope info.
    EmptyScopeInfo = 3,
    /// The empty feedback metadata.
    EmptyFeedbackMetadata = 4,
    /// Marker for context data that was never initialized.
    UninitializedSymbol = 5,
}

impl RootIndex {
    /// Every root, in index order.
    pub const ALL: [RootIndex; ROOT_COUNT] = [
        RootIndex::EmptyString,
        RootIndex::EmptyLiteralTable,
        RootIndex::EmptyByteArray,
        RootIndex::EmptyScopeInfo,
        RootIndex::EmptyFeedbackMetadata,
        RootIndex::UninitializedSymbol,
    ];

    /// Returns the numeric index.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Parses a numeric index.
    pub fn from_u32(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    fn default_record(self) -> Record {
        match self {
            RootIndex::EmptyString => Record::string(""),
            RootIndex::EmptyLiteralTable => Record::new(RecordKind::LiteralTable),
            RootIndex::EmptyByteArray => Record::new(RecordKind::ByteArray),
            RootIndex::EmptyScopeInfo => Record::new(RecordKind::ScopeInfo),
            RootIndex::EmptyFeedbackMetadata => Record::new(RecordKind::FeedbackMetadata),
            RootIndex::UninitializedSymbol => Record::new(RecordKind::Symbol)
                .with_field("description", Value::Bytes(b"uninitialized".to_vec())),
        }
    }
}

/// One fixed-size chunk of the read-only region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    start: u32,
    size: u32,
    used: u32,
}

impl Chunk {
    /// Region address of the first byte of this chunk.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Chunk capacity in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Bytes occupied by records.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Returns `true` if `address` falls inside this chunk.
    pub fn contains(&self, address: ReadOnlyAddress) -> bool {
        let raw = address.as_raw();
        raw >= self.start && raw < self.start + self.size
    }
}

/// Ordered table of root records with reverse lookup by identity.
#[derive(Debug, Clone)]
pub struct RootTable {
    slots: Vec<ReadOnlyAddress>,
    by_address: HashMap<ReadOnlyAddress, RootIndex>,
}

impl RootTable {
    /// Returns the record for a root.
    pub fn get(&self, index: RootIndex) -> ObjRef {
        ObjRef::ReadOnly(self.slots[index as usize])
    }

    /// Returns the root index of `obj`, if it is a root.
    pub fn lookup(&self, obj: ObjRef) -> Option<RootIndex> {
        match obj {
            ObjRef::ReadOnly(address) => self.by_address.get(&address).copied(),
            ObjRef::Heap(_) => None,
        }
    }

    /// Returns the number of roots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The immutable read-only region.
#[derive(Debug, Clone)]
pub struct ReadOnlySpace {
    chunk_size: u32,
    chunks: Vec<Chunk>,
    records: HashMap<ReadOnlyAddress, Record>,
    roots: RootTable,
    internalized: HashMap<String, ReadOnlyAddress>,
}

impl ReadOnlySpace {
    /// Lays out the standard region: every root followed by the builtin
    /// strings.
    pub fn bootstrap(chunk_size: u32) -> Result<Self, ReadOnlyError> {
        let mut builder = ReadOnlySpaceBuilder::new(chunk_size)?;
        for index in RootIndex::ALL {
            builder.add_root(index, index.default_record())?;
        }
        for text in BUILTIN_STRINGS {
            builder.add_string(text)?;
        }
        builder.build()
    }

    /// Returns the chunk size the region was laid out with.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Returns the chunks in layout order.
    pub fn ordered_chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Returns the root table.
    pub fn roots(&self) -> &RootTable {
        &self.roots
    }

    /// Returns the record for a root.
    pub fn root(&self, index: RootIndex) -> ObjRef {
        self.roots.get(index)
    }

    /// Returns the record at `address`.
    pub fn record(&self, address: ReadOnlyAddress) -> Option<&Record> {
        self.records.get(&address)
    }

    /// Returns `true` if `obj` names a record of this region.
    pub fn contains(&self, obj: ObjRef) -> bool {
        match obj {
            ObjRef::ReadOnly(address) => self.records.contains_key(&address),
            ObjRef::Heap(_) => false,
        }
    }

    /// Splits `address` into `(chunk_index, chunk_offset)`.
    ///
    /// The chunk index is the position of the containing chunk in
    /// [`ReadOnlySpace::ordered_chunks`].
    pub fn locate(&self, address: ReadOnlyAddress) -> Option<(u32, u32)> {
        let mut chunk_index = 0u32;
        for chunk in &self.chunks {
            if chunk.contains(address) {
                return Some((chunk_index, address.as_raw() - chunk.start));
            }
            chunk_index += 1;
        }
        None
    }

    /// Resolves `(chunk_index, chunk_offset)` to the record placed there.
    pub fn resolve(&self, chunk_index: u32, chunk_offset: u32) -> Option<ReadOnlyAddress> {
        let chunk = self.chunks.get(chunk_index as usize)?;
        if chunk_offset >= chunk.size {
            return None;
        }
        let address = ReadOnlyAddress::from_raw(chunk.start + chunk_offset);
        self.records.contains_key(&address).then_some(address)
    }

    /// Returns the internalized string record for `text`, if the region has one.
    pub fn builtin_string(&self, text: &str) -> Option<ObjRef> {
        self.internalized.get(text).copied().map(ObjRef::ReadOnly)
    }
}

/// Incremental layout of a [`ReadOnlySpace`].
pub struct ReadOnlySpaceBuilder {
    chunk_size: u32,
    chunks: Vec<Chunk>,
    records: HashMap<ReadOnlyAddress, Record>,
    roots: [Option<ReadOnlyAddress>; ROOT_COUNT],
    internalized: HashMap<String, ReadOnlyAddress>,
}

impl ReadOnlySpaceBuilder {
    /// Starts an empty region with the given chunk size.
    pub fn new(chunk_size: u32) -> Result<Self, ReadOnlyError> {
        if chunk_size == 0 {
            return Err(ReadOnlyError::ZeroChunkSize);
        }
        Ok(Self {
            chunk_size,
            chunks: Vec::new(),
            records: HashMap::new(),
            roots: [None; ROOT_COUNT],
            internalized: HashMap::new(),
        })
    }

    /// Places a record, opening a new chunk when the current one is full.
    pub fn add(&mut self, record: Record) -> Result<ReadOnlyAddress, ReadOnlyError> {
        let size = align_up(record.size_in_bytes());
        if size > self.chunk_size as usize {
            return Err(ReadOnlyError::RecordTooLarge {
                size,
                chunk_size: self.chunk_size,
            });
        }
        let size = size as u32;
        let fits = self
            .chunks
            .last()
            .is_some_and(|chunk| chunk.used + size <= chunk.size);
        if !fits {
            let start = self.chunks.len() as u32 * self.chunk_size;
            self.chunks.push(Chunk {
                start,
                size: self.chunk_size,
                used: 0,
            });
        }
        let last = self.chunks.len() - 1;
        let chunk = &mut self.chunks[last];
        let address = ReadOnlyAddress::from_raw(chunk.start + chunk.used);
        chunk.used += size;
        self.records.insert(address, record);
        Ok(address)
    }

    /// Places a record and binds it to a root slot.
    pub fn add_root(
        &mut self,
        index: RootIndex,
        record: Record,
    ) -> Result<ReadOnlyAddress, ReadOnlyError> {
        let address = self.add(record)?;
        self.roots[index as usize] = Some(address);
        Ok(address)
    }

    /// Places an internalized string.
    pub fn add_string(&mut self, text: &str) -> Result<ReadOnlyAddress, ReadOnlyError> {
        if let Some(address) = self.internalized.get(text) {
            return Ok(*address);
        }
        let address = self.add(Record::string(text))?;
        self.internalized.insert(text.to_string(), address);
        Ok(address)
    }

    /// Freezes the layout. Every root slot must be populated.
    pub fn build(self) -> Result<ReadOnlySpace, ReadOnlyError> {
        let mut slots = Vec::with_capacity(ROOT_COUNT);
        let mut by_address = HashMap::with_capacity(ROOT_COUNT);
        for index in RootIndex::ALL {
            let address = self.roots[index as usize].ok_or(ReadOnlyError::MissingRoot(index))?;
            slots.push(address);
            by_address.insert(address, index);
        }
        Ok(ReadOnlySpace {
            chunk_size: self.chunk_size,
            chunks: self.chunks,
            records: self.records,
            roots: RootTable { slots, by_address },
            internalized: self.internalized,
        })
    }
}
