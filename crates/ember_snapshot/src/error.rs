//! Error types for encoding and decoding cache entries.

use std::fmt;

use ember_heap::{AllocationError, ObjRef};
use serde::Serialize;

/// Outcome of checking a cache entry against the running build.
///
/// The numeric codes are stable and may be reported to metrics.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SanityCheckResult {
    /// The entry is usable.
    Success = 0,
    /// The buffer is shorter than the header.
    TooSmall = 1,
    /// The magic number does not match.
    BadMagic = 2,
    /// The entry was produced by a different build version.
    VersionMismatch = 3,
    /// The entry was produced under different runtime flags.
    ConfigMismatch = 4,
    /// The declared payload length exceeds the buffer.
    LengthMismatch = 5,
    /// The stored checksum does not match the buffer contents.
    ChecksumMismatch = 6,
    /// The entry was produced from different source text.
    SourceMismatch = 7,
}

impl SanityCheckResult {
    /// Returns the stable numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Returns `true` for [`SanityCheckResult::Success`].
    pub fn is_success(self) -> bool {
        self == SanityCheckResult::Success
    }

    /// Returns a short human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            SanityCheckResult::Success => "success",
            SanityCheckResult::TooSmall => "buffer too small",
            SanityCheckResult::BadMagic => "bad magic number",
            SanityCheckResult::VersionMismatch => "version mismatch",
            SanityCheckResult::ConfigMismatch => "runtime flags mismatch",
            SanityCheckResult::LengthMismatch => "payload length mismatch",
            SanityCheckResult::ChecksumMismatch => "checksum mismatch",
            SanityCheckResult::SourceMismatch => "source mismatch",
        }
    }
}

impl fmt::Display for SanityCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description(), self.code())
    }
}

/// Errors returned when an entry cannot be turned back into a graph.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    /// The entry failed its sanity check.
    #[error("cached data rejected: {0}")]
    Rejected(SanityCheckResult),

    /// The heap could not hold the decoded graph.
    #[error("heap reservation failed: {0}")]
    ReservationFailed(#[from] AllocationError),

    /// The payload passed the header check but its token stream is invalid.
    #[error("malformed payload: {reason}")]
    Malformed {
        /// Description of the problem.
        reason: String,
    },
}

impl DeserializeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DeserializeError::Malformed {
            reason: reason.into(),
        }
    }

    /// Returns the sanity check result behind a rejection, if this is one.
    pub fn sanity_check_result(&self) -> Option<SanityCheckResult> {
        match self {
            DeserializeError::Rejected(result) => Some(*result),
            _ => None,
        }
    }
}

/// Errors returned when a graph cannot be encoded.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The graph contains a record kind that cache entries cannot represent.
    #[error("graph is not cacheable: found a record of kind {kind}")]
    NotCacheable {
        /// Name of the offending record kind.
        kind: &'static str,
    },

    /// The root is not a function with a script and a string source.
    #[error("root function has no script with a source string")]
    MissingScript,

    /// An edge points at a record that does not exist.
    #[error("dangling reference to {obj:?}")]
    DanglingReference {
        /// The unresolvable reference.
        obj: ObjRef,
    },

    /// The graph nests deeper than the encoder supports.
    #[error("graph nesting exceeds {limit} levels")]
    GraphTooDeep {
        /// The nesting limit.
        limit: usize,
    },

    /// The payload does not fit the header's 32-bit length field.
    #[error("payload of {bytes} bytes is too large")]
    PayloadTooLarge {
        /// Payload size in bytes.
        bytes: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_heap::RecordId;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SanityCheckResult::Success.code(), 0);
        assert_eq!(SanityCheckResult::BadMagic.code(), 2);
        assert_eq!(SanityCheckResult::SourceMismatch.code(), 7);
    }

    #[test]
    fn display_rejected() {
        let err = DeserializeError::Rejected(SanityCheckResult::LengthMismatch);
        assert_eq!(
            format!("{err}"),
            "cached data rejected: payload length mismatch (code 5)"
        );
        assert_eq!(
            err.sanity_check_result(),
            Some(SanityCheckResult::LengthMismatch)
        );
    }

    #[test]
    fn display_malformed() {
        let err = DeserializeError::malformed("unknown bytecode 0x7f");
        assert_eq!(format!("{err}"), "malformed payload: unknown bytecode 0x7f");
        assert_eq!(err.sanity_check_result(), None);
    }

    #[test]
    fn display_not_cacheable() {
        let err = SerializeError::NotCacheable {
            kind: "embedded-module",
        };
        assert_eq!(
            format!("{err}"),
            "graph is not cacheable: found a record of kind embedded-module"
        );
    }

    #[test]
    fn display_dangling() {
        let err = SerializeError::DanglingReference {
            obj: ObjRef::Heap(RecordId::from_raw(9)),
        };
        assert!(format!("{err}").starts_with("dangling reference to"));
    }
}
