//! Fixed-size preamble of a cache entry.
//!
//! ```text
//! offset  field
//!      0  magic number
//!      4  version tag
//!      8  flags tag
//!     12  source hash
//!     16  payload length
//!     20  checksum (0 when disabled)
//!     24  zero padding up to HEADER_SIZE
//! ```
//!
//! All fields are little-endian `u32`. The whole buffer is zero-padded to
//! pointer alignment, so `payload_length` may be smaller than the space
//! following the header.

use ember_common::{align_up, Checksum};
use ember_heap::ROOT_COUNT;
use serde::Serialize;

use crate::error::SerializeError;
use crate::sanity::RuntimeTags;

/// Offset of the magic number.
pub const MAGIC_NUMBER_OFFSET: usize = 0;
/// Offset of the version tag.
pub const VERSION_TAG_OFFSET: usize = 4;
/// Offset of the flags tag.
pub const FLAGS_TAG_OFFSET: usize = 8;
/// Offset of the source hash.
pub const SOURCE_HASH_OFFSET: usize = 12;
/// Offset of the payload length.
pub const PAYLOAD_LENGTH_OFFSET: usize = 16;
/// Offset of the checksum.
pub const CHECKSUM_OFFSET: usize = 20;
/// Size of the header fields before alignment padding.
pub const UNALIGNED_HEADER_SIZE: usize = 24;
/// Size of the header including alignment padding.
pub const HEADER_SIZE: usize = align_up(UNALIGNED_HEADER_SIZE);

/// Magic number of entries produced by this codec.
///
/// Folds in the root table size, so a build with a different root table
/// never accepts the entry.
pub const MAGIC_NUMBER: u32 = 0xC0DE_0000 ^ ROOT_COUNT as u32;

/// Decoded header fields. Reading performs no interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SerializedCodeHeader {
    /// Magic number.
    pub magic: u32,
    /// Hash of the producing build's version.
    pub version_tag: u32,
    /// Hash of the producing build's runtime flags.
    pub flags_tag: u32,
    /// Length and origin of the source the entry was produced from.
    pub source_hash: u32,
    /// Exact length of the token stream.
    pub payload_length: u32,
    /// Checksum of the buffer, 0 when checksums are disabled.
    pub checksum: u32,
}

impl SerializedCodeHeader {
    /// Extracts the header fields from the start of `buffer`.
    ///
    /// Returns `None` if the buffer cannot hold the fields.
    pub fn read(buffer: &[u8]) -> Option<Self> {
        Some(Self {
            magic: read_u32(buffer, MAGIC_NUMBER_OFFSET)?,
            version_tag: read_u32(buffer, VERSION_TAG_OFFSET)?,
            flags_tag: read_u32(buffer, FLAGS_TAG_OFFSET)?,
            source_hash: read_u32(buffer, SOURCE_HASH_OFFSET)?,
            payload_length: read_u32(buffer, PAYLOAD_LENGTH_OFFSET)?,
            checksum: read_u32(buffer, CHECKSUM_OFFSET)?,
        })
    }

    fn write(&self, buffer: &mut [u8]) {
        write_u32(buffer, MAGIC_NUMBER_OFFSET, self.magic);
        write_u32(buffer, VERSION_TAG_OFFSET, self.version_tag);
        write_u32(buffer, FLAGS_TAG_OFFSET, self.flags_tag);
        write_u32(buffer, SOURCE_HASH_OFFSET, self.source_hash);
        write_u32(buffer, PAYLOAD_LENGTH_OFFSET, self.payload_length);
        write_u32(buffer, CHECKSUM_OFFSET, self.checksum);
    }
}

/// A header plus the payload it frames, borrowed from a checked buffer.
#[derive(Debug, Clone, Copy)]
pub struct SerializedCodeData<'c> {
    header: SerializedCodeHeader,
    payload: &'c [u8],
}

impl<'c> SerializedCodeData<'c> {
    /// Splits a buffer whose declared length has already been checked.
    pub(crate) fn from_checked(buffer: &'c [u8]) -> Option<Self> {
        let header = SerializedCodeHeader::read(buffer)?;
        let end = HEADER_SIZE.checked_add(header.payload_length as usize)?;
        let payload = buffer.get(HEADER_SIZE..end)?;
        Some(Self { header, payload })
    }

    /// Returns the header.
    pub fn header(&self) -> &SerializedCodeHeader {
        &self.header
    }

    /// Returns the token stream.
    pub fn payload(&self) -> &'c [u8] {
        self.payload
    }
}

/// Computes the checksum of a framed buffer.
///
/// Covers the header fields before the checksum and everything after the
/// header fields, padding included.
pub fn compute_checksum(buffer: &[u8]) -> u32 {
    let mut checksum = Checksum::new();
    checksum.update(&buffer[..CHECKSUM_OFFSET.min(buffer.len())]);
    if let Some(rest) = buffer.get(UNALIGNED_HEADER_SIZE..) {
        checksum.update(rest);
    }
    checksum.finish()
}

/// Frames `payload` into a zero-padded, pointer-aligned buffer.
pub fn frame(tags: &RuntimeTags, source_hash: u32, payload: &[u8]) -> Result<Vec<u8>, SerializeError> {
    let payload_length = u32::try_from(payload.len()).map_err(|_| SerializeError::PayloadTooLarge {
        bytes: payload.len(),
    })?;
    let total = align_up(HEADER_SIZE + payload.len());
    let mut buffer = vec![0u8; total];
    buffer[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);

    let mut header = SerializedCodeHeader {
        magic: tags.magic,
        version_tag: tags.version_tag,
        flags_tag: tags.flags_tag,
        source_hash,
        payload_length,
        checksum: 0,
    };
    header.write(&mut buffer);
    if tags.verify_checksum {
        header.checksum = compute_checksum(&buffer);
        write_u32(&mut buffer, CHECKSUM_OFFSET, header.checksum);
    }
    Ok(buffer)
}

fn read_u32(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = buffer.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn write_u32(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
