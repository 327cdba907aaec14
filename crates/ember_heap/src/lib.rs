//! Object-graph model for compiled-program metadata.
//!
//! Records (function descriptors, bytecode blobs, literal tables, scripts,
//! strings) live either in a mutable [`Heap`] arena or in the immutable,
//! chunked [`ReadOnlySpace`] shared by every runtime instance of a build.
//! A [`Runtime`] ties one heap to a read-only space and a [`ScriptRegistry`].

#![warn(missing_docs)]

pub mod arena;
pub mod equality;
pub mod error;
pub mod fields;
pub mod heap;
pub mod ids;
pub mod read_only;
pub mod record;
pub mod runtime;
pub mod script_registry;

pub use equality::{structurally_equal, structurally_equal_ignoring};
pub use error::{AllocationError, ReadOnlyError};
pub use heap::{Heap, Relocation};
pub use ids::{RecordId, ScriptId};
pub use read_only::{Chunk, ReadOnlySpace, ReadOnlySpaceBuilder, RootIndex, RootTable, ROOT_COUNT};
pub use record::{ObjRef, ReadOnlyAddress, Record, RecordKind, Value};
pub use runtime::{HeapView, Runtime};
pub use script_registry::{ScriptEntry, ScriptRegistry};
