//! Shared foundational helpers used across the ember code-cache crates.
//!
//! This crate provides 32-bit identity hashing for build tags and buffer
//! checksums, pointer-alignment arithmetic, and line-start indexing for
//! resolving source offsets into line/column pairs.

#![warn(missing_docs)]

pub mod align;
pub mod hash;
pub mod line_index;

pub use align::{align_up, is_aligned, POINTER_ALIGNMENT};
pub use hash::{hash32, hash_strings, Checksum};
pub use line_index::LineIndex;
