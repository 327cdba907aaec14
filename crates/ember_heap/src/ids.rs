//! Opaque ID newtypes for heap entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy` and `Hash`. Record IDs are
//! created by [`Arena::alloc`](crate::arena::Arena::alloc) and are only
//! meaningful relative to the heap that allocated them.

use crate::arena::ArenaId;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a record in a [`Heap`](crate::Heap).
    RecordId
);

define_id!(
    /// Runtime-unique identifier handed out by the [`ScriptRegistry`](crate::ScriptRegistry).
    ScriptId
);
