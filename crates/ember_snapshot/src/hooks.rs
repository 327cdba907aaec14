//! Completion hooks fired after a cache entry is produced or consumed.

use std::time::Duration;

use ember_heap::{ObjRef, ScriptId};

use crate::serializer::SerializeStats;

/// Which path restored a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeserializeMode {
    /// Decoded on the controlling thread.
    Sync,
    /// Decoded on a worker thread and merged by the controlling thread.
    OffThread,
}

/// Source location of a restored function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionPosition {
    /// The function record.
    pub function: ObjRef,
    /// 1-based line of the function's start position.
    pub line: u32,
    /// 1-based column of the function's start position.
    pub column: u32,
}

/// Metadata of a restored cache entry.
#[derive(Debug, Clone)]
pub struct DeserializeEvent {
    /// The path that restored the entry.
    pub mode: DeserializeMode,
    /// Id assigned to the restored script.
    pub script_id: ScriptId,
    /// Size of the cache buffer.
    pub bytes: usize,
    /// Time spent checking, decoding and merging.
    pub elapsed: Duration,
    /// Start locations of every restored function.
    pub functions: Vec<FunctionPosition>,
}

/// Metadata of a produced cache entry.
#[derive(Debug, Clone)]
pub struct SerializeEvent {
    /// Size of the cache buffer.
    pub bytes: usize,
    /// Time spent encoding.
    pub elapsed: Duration,
    /// Token counts of the encoding pass.
    pub stats: SerializeStats,
}

/// Observer of code cache activity. Hooks run on the controlling thread.
pub trait CompletionHook: Send + Sync {
    /// Called after an entry has been restored and finalized.
    fn on_deserialized(&self, event: &DeserializeEvent);

    /// Called after an entry has been produced.
    fn on_serialized(&self, _event: &SerializeEvent) {}
}
