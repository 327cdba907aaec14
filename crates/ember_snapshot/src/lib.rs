//! Code cache codec for compiled-program object graphs.
//!
//! A cache entry is a pointer-aligned byte buffer: a fixed header binding the
//! entry to a runtime build, its flags and the source text it was produced
//! from, followed by a token stream describing the object graph.
//!
//! - [`CodeCache::serialize`] walks a function graph and produces an entry.
//! - [`CodeCache::deserialize`] checks an entry and rebuilds the graph.
//! - [`CodeCache::start_background_deserialize`] and
//!   [`CodeCache::finish_background_deserialize`] split decoding between a
//!   worker thread and the controlling thread.
//!
//! Every failure other than an illegal record kind reaching the encoder is
//! returned as a value; callers discard the entry and recompile.

#![warn(missing_docs)]

pub mod bytecode;
pub mod cached_data;
pub mod code_cache;
pub mod deserializer;
pub mod error;
pub mod header;
pub mod hooks;
pub mod hot_cache;
pub mod off_thread;
mod patch;
pub mod sanity;
pub mod serializer;
pub mod sink;
pub mod source;

pub use cached_data::CachedData;
pub use code_cache::{bootstrap_runtime, CodeCache};
pub use error::{DeserializeError, SanityCheckResult, SerializeError};
pub use header::{SerializedCodeData, SerializedCodeHeader, HEADER_SIZE, MAGIC_NUMBER};
pub use hooks::{CompletionHook, DeserializeEvent, DeserializeMode, FunctionPosition, SerializeEvent};
pub use off_thread::{
    start_deserialize_off_thread, BackgroundDeserializeTask, OffThreadDeserializeData,
    PendingDeserialize, PersistentHandles,
};
pub use sanity::{source_hash, OriginOptions, RuntimeTags};
pub use serializer::{ElisionPolicy, SerializeStats, MAX_GRAPH_DEPTH};
