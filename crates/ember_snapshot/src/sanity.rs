//! Two-phase sanity checking of cache entries.
//!
//! Phase A needs only the buffer and the running build's tags. Phase B
//! additionally needs the source text the entry claims to represent, which
//! may not exist yet when Phase A runs on a worker thread. The combined
//! check runs B only if A succeeded. Any failure marks the buffer rejected.

use ember_common::{hash32, hash_strings};
use ember_config::EmberConfig;
use ember_heap::fields::ORIGIN_MODULE_BIT;

use crate::cached_data::CachedData;
use crate::error::SanityCheckResult;
use crate::header::{compute_checksum, SerializedCodeData, SerializedCodeHeader, HEADER_SIZE, MAGIC_NUMBER};

/// Flag folded into the flags tag when checksums are enabled.
const VERIFY_CHECKSUM_FLAG: &str = "--verify-snapshot-checksum";

/// Prefix of the flag carrying the read-only chunk size.
const READ_ONLY_CHUNK_SIZE_FLAG: &str = "--read-only-chunk-size=";

/// Identity of the running build, compared against every entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeTags {
    /// Expected magic number.
    pub magic: u32,
    /// Hash of the build version.
    pub version_tag: u32,
    /// Hash of the active runtime flags.
    pub flags_tag: u32,
    /// Whether entries carry a checksum that must be verified.
    pub verify_checksum: bool,
}

impl RuntimeTags {
    /// Derives tags from a version string and a flag list.
    ///
    /// Flag order and duplicates do not affect the tag. The checksum policy
    /// is folded in as a flag.
    pub fn new(version: &str, flags: &[String], verify_checksum: bool) -> Self {
        let mut flags: Vec<&str> = flags.iter().map(String::as_str).collect();
        if verify_checksum {
            flags.push(VERIFY_CHECKSUM_FLAG);
        }
        flags.sort_unstable();
        flags.dedup();
        Self {
            magic: MAGIC_NUMBER,
            version_tag: hash32(version.as_bytes()),
            flags_tag: hash_strings(flags),
            verify_checksum,
        }
    }

    /// Derives tags from a loaded configuration.
    ///
    /// The read-only chunk size decides every read-only address, so it is
    /// folded into the flags tag alongside the runtime flags.
    pub fn from_config(config: &EmberConfig) -> Self {
        let mut flags = config.runtime.flags.clone();
        flags.push(format!(
            "{READ_ONLY_CHUNK_SIZE_FLAG}{}",
            config.read_only.chunk_size
        ));
        Self::new(&config.runtime.version, &flags, config.codec.verify_checksum)
    }
}

/// Origin flags of a script that participate in the source hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OriginOptions {
    /// Whether the script is a module.
    pub is_module: bool,
}

impl OriginOptions {
    /// Options of a classic script.
    pub fn script() -> Self {
        Self { is_module: false }
    }

    /// Options of a module.
    pub fn module() -> Self {
        Self { is_module: true }
    }

    /// Decodes the packed `origin_options` field of a script record.
    pub fn from_flags(flags: i64) -> Self {
        Self {
            is_module: flags & ORIGIN_MODULE_BIT != 0,
        }
    }

    /// Packs these options into an `origin_options` field value.
    pub fn to_flags(self) -> i64 {
        if self.is_module {
            ORIGIN_MODULE_BIT
        } else {
            0
        }
    }
}

/// Computes the source hash binding an entry to its source text.
///
/// The hash is the source length in characters with bit 31 set for modules.
pub fn source_hash(source: &str, origin: OriginOptions) -> u32 {
    let length = source.chars().count() as u32;
    debug_assert_eq!(length >> 31, 0, "source length overflows the hash");
    length | (u32::from(origin.is_module) << 31)
}

/// Phase A: checks the header against the running build.
pub fn check_without_source(buffer: &[u8], tags: &RuntimeTags) -> SanityCheckResult {
    if buffer.len() < HEADER_SIZE {
        return SanityCheckResult::TooSmall;
    }
    let Some(header) = SerializedCodeHeader::read(buffer) else {
        return SanityCheckResult::TooSmall;
    };
    if header.magic != tags.magic {
        return SanityCheckResult::BadMagic;
    }
    if header.version_tag != tags.version_tag {
        return SanityCheckResult::VersionMismatch;
    }
    if header.flags_tag != tags.flags_tag {
        return SanityCheckResult::ConfigMismatch;
    }
    let max_payload_length = buffer.len() - HEADER_SIZE;
    if header.payload_length as usize > max_payload_length {
        return SanityCheckResult::LengthMismatch;
    }
    if tags.verify_checksum && compute_checksum(buffer) != header.checksum {
        return SanityCheckResult::ChecksumMismatch;
    }
    SanityCheckResult::Success
}

/// Phase B: checks the stored source hash.
pub fn check_just_source(buffer: &[u8], expected_source_hash: u32) -> SanityCheckResult {
    match SerializedCodeHeader::read(buffer) {
        Some(header) if header.source_hash == expected_source_hash => SanityCheckResult::Success,
        Some(_) => SanityCheckResult::SourceMismatch,
        None => SanityCheckResult::TooSmall,
    }
}

/// Runs both phases, rejecting the buffer on failure.
pub fn from_cached_data<'c>(
    cached: &'c CachedData<'_>,
    tags: &RuntimeTags,
    expected_source_hash: u32,
) -> Result<SerializedCodeData<'c>, SanityCheckResult> {
    let phase_a = check_without_source(cached.data(), tags);
    from_partially_checked(cached, phase_a, expected_source_hash)
}

/// Runs Phase A only, rejecting the buffer on failure.
pub fn from_cached_data_without_source<'c>(
    cached: &'c CachedData<'_>,
    tags: &RuntimeTags,
) -> Result<SerializedCodeData<'c>, SanityCheckResult> {
    let result = check_without_source(cached.data(), tags);
    finish_check(cached, result)
}

/// Runs Phase B on top of a Phase A result computed earlier.
///
/// A Phase A failure is returned unchanged; Phase B can only add
/// [`SanityCheckResult::SourceMismatch`].
pub fn from_partially_checked<'c>(
    cached: &'c CachedData<'_>,
    phase_a: SanityCheckResult,
    expected_source_hash: u32,
) -> Result<SerializedCodeData<'c>, SanityCheckResult> {
    let result = if phase_a.is_success() {
        check_just_source(cached.data(), expected_source_hash)
    } else {
        phase_a
    };
    finish_check(cached, result)
}

fn finish_check<'c>(
    cached: &'c CachedData<'_>,
    result: SanityCheckResult,
) -> Result<SerializedCodeData<'c>, SanityCheckResult> {
    if result.is_success() {
        if let Some(data) = SerializedCodeData::from_checked(cached.data()) {
            return Ok(data);
        }
    }
    cached.reject();
    Err(if result.is_success() {
        SanityCheckResult::LengthMismatch
    } else {
        result
    })
}
