//! Mutable record heap with an optional byte limit.

use crate::arena::Arena;
use crate::error::AllocationError;
use crate::ids::RecordId;
use crate::record::{ObjRef, Record, RecordKind, Value};

/// Arena of mutable records, charged against an optional byte limit.
///
/// A `Heap` is the allocator capability the codec works through. The shared
/// heap of a [`Runtime`](crate::Runtime) and the private staging heap of a
/// decode pass are both plain `Heap`s; [`Heap::absorb`] moves a staging heap
/// into a shared one.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    records: Arena<RecordId, Record>,
    used_bytes: usize,
    limit: Option<usize>,
}

/// Maps record IDs of an absorbed heap to their IDs in the absorbing heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    base: u32,
}

impl Relocation {
    /// Rewrites a reference from the absorbed heap's ID space.
    pub fn apply(self, obj: ObjRef) -> ObjRef {
        match obj {
            ObjRef::Heap(id) => ObjRef::Heap(self.apply_id(id)),
            ObjRef::ReadOnly(_) => obj,
        }
    }

    /// Rewrites a record ID from the absorbed heap's ID space.
    pub fn apply_id(self, id: RecordId) -> RecordId {
        RecordId::from_raw(id.as_raw() + self.base)
    }
}

impl Heap {
    /// Creates an unlimited heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a heap that refuses allocations beyond `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Returns the configured byte limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the bytes charged so far.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Returns the bytes still available under the limit.
    pub fn remaining(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.used_bytes),
            None => usize::MAX,
        }
    }

    /// Checks that `bytes` more can be charged without exceeding the limit.
    pub fn reserve(&self, bytes: usize) -> Result<(), AllocationError> {
        let remaining = self.remaining();
        if bytes > remaining {
            return Err(AllocationError::ReservationFailed {
                requested: bytes,
                remaining,
            });
        }
        Ok(())
    }

    fn charge(&mut self, bytes: usize) -> Result<(), AllocationError> {
        self.reserve(bytes)?;
        self.used_bytes += bytes;
        Ok(())
    }

    /// Allocates a record, charging its full size.
    pub fn allocate(&mut self, record: Record) -> Result<RecordId, AllocationError> {
        self.charge(record.size_in_bytes())?;
        Ok(self.records.alloc(record))
    }

    /// Allocates a string record holding `text`.
    pub fn allocate_string(&mut self, text: &str) -> Result<RecordId, AllocationError> {
        self.allocate(Record::string(text))
    }

    /// Allocates a field-less record of `kind`, charging slots for
    /// `field_count` fields up front.
    pub fn allocate_shell(
        &mut self,
        kind: RecordKind,
        field_count: usize,
    ) -> Result<RecordId, AllocationError> {
        let record = Record {
            kind,
            fields: Vec::with_capacity(field_count),
        };
        let slots = crate::record::FIELD_SIZE * field_count;
        self.charge(record.size_in_bytes() + slots)?;
        Ok(self.records.alloc(record))
    }

    /// Installs the fields of a record created by [`Heap::allocate_shell`],
    /// charging any blob bytes they carry.
    pub fn fill_shell(
        &mut self,
        id: RecordId,
        fields: Vec<(String, Value)>,
    ) -> Result<(), AllocationError> {
        let blob_bytes = fields
            .iter()
            .map(|(_, value)| value.as_bytes().map_or(0, <[u8]>::len))
            .sum();
        self.charge(blob_bytes)?;
        if let Some(record) = self.records.get_mut(id) {
            record.fields = fields;
        }
        Ok(())
    }

    /// Returns the record with the given ID.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    /// Returns the record with the given ID mutably.
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record has been allocated.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over records in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.records.iter()
    }

    /// Moves every record of `other` into this heap.
    ///
    /// Edges between records of `other` are rewritten into this heap's ID
    /// space; read-only edges are left untouched. Fails without modifying
    /// `self` if the limit cannot accommodate `other`.
    pub fn absorb(&mut self, other: Heap) -> Result<Relocation, AllocationError> {
        self.charge(other.used_bytes)?;
        let relocation = Relocation {
            base: self.records.len() as u32,
        };
        for mut record in other.records.into_values() {
            for (_, value) in &mut record.fields {
                if let Value::Ref(obj) = value {
                    *obj = relocation.apply(*obj);
                }
            }
            self.records.alloc(record);
        }
        Ok(relocation)
    }
}
