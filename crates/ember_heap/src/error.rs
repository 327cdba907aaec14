//! Error types for heap and read-only region operations.

use crate::read_only::RootIndex;

/// Errors raised by the allocator capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// The heap limit cannot accommodate the request.
    #[error("reservation of {requested} bytes failed: {remaining} bytes remaining")]
    ReservationFailed {
        /// Bytes requested.
        requested: usize,
        /// Bytes still available under the limit.
        remaining: usize,
    },
}

/// Errors raised while laying out a read-only region.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadOnlyError {
    /// A record does not fit into a single chunk.
    #[error("record of {size} bytes exceeds the {chunk_size}-byte chunk size")]
    RecordTooLarge {
        /// Size of the record.
        size: usize,
        /// Configured chunk size.
        chunk_size: u32,
    },

    /// The chunk size is zero.
    #[error("chunk size must be non-zero")]
    ZeroChunkSize,

    /// A root slot was never populated.
    #[error("root {0:?} was not defined")]
    MissingRoot(RootIndex),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_failed_display() {
        let err = AllocationError::ReservationFailed {
            requested: 64,
            remaining: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("64 bytes"));
        assert!(msg.contains("8 bytes remaining"));
    }

    #[test]
    fn missing_root_display() {
        let err = ReadOnlyError::MissingRoot(RootIndex::EmptyString);
        assert!(err.to_string().contains("EmptyString"));
    }
}
