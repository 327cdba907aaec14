//! Integration tests for entry validation: build tags, source binding,
//! corrupted payloads and heap exhaustion.

mod common;

use std::sync::Arc;

use common::{build_program, runtime, SOURCE};
use ember_config::EmberConfig;
use ember_heap::{Heap, Runtime};
use ember_snapshot::header::{PAYLOAD_LENGTH_OFFSET, SOURCE_HASH_OFFSET};
use ember_snapshot::sanity::check_without_source;
use ember_snapshot::{
    source_hash, start_deserialize_off_thread, CachedData, CodeCache, DeserializeError,
    OriginOptions, RuntimeTags, SanityCheckResult, SerializedCodeHeader, HEADER_SIZE,
};

fn entry_for(config: &EmberConfig, source: &str) -> Vec<u8> {
    let mut producer = runtime();
    let program = build_program(&mut producer, source, OriginOptions::script());
    CodeCache::from_config(config)
        .serialize(&mut producer, program.root)
        .unwrap()
        .to_vec()
}

fn entry() -> Vec<u8> {
    entry_for(&common::config(), SOURCE)
}

fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Decodes `bytes` into a fresh runtime and returns the rejection reason.
fn rejection(cache: &CodeCache, bytes: &[u8], source: &str, origin: OriginOptions) -> SanityCheckResult {
    let cached = CachedData::new(bytes);
    let mut consumer = runtime();
    let err = cache
        .deserialize(&mut consumer, &cached, source, origin)
        .unwrap_err();
    assert!(cached.is_rejected());
    assert!(consumer.heap.is_empty());
    assert!(consumer.scripts.is_empty());
    err.sanity_check_result().unwrap()
}

// ---------------------------------------------------------------------------
// Header checks
// ---------------------------------------------------------------------------

#[test]
fn entry_header_describes_build_and_source() {
    let bytes = entry();
    let tags = RuntimeTags::from_config(&common::config());
    let header = SerializedCodeHeader::read(&bytes).unwrap();
    assert_eq!(header.magic, tags.magic);
    assert_eq!(header.version_tag, tags.version_tag);
    assert_eq!(header.flags_tag, tags.flags_tag);
    assert_eq!(header.source_hash, source_hash(SOURCE, OriginOptions::script()));
    assert!(header.payload_length as usize <= bytes.len() - HEADER_SIZE);
    assert_ne!(header.checksum, 0);
}

#[test]
fn truncated_buffer_is_too_small() {
    let cache = CodeCache::from_config(&common::config());
    let bytes = entry();
    let result = rejection(&cache, &bytes[..HEADER_SIZE - 1], SOURCE, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::TooSmall);
}

#[test]
fn every_magic_bit_flip_is_rejected() {
    let cache = CodeCache::from_config(&common::config());
    let pristine = entry();
    for byte in 0..4 {
        for bit in 0..8 {
            let mut bytes = pristine.clone();
            bytes[byte] ^= 1 << bit;
            let result = rejection(&cache, &bytes, SOURCE, OriginOptions::script());
            assert_eq!(result, SanityCheckResult::BadMagic, "byte {byte} bit {bit}");
        }
    }
}

#[test]
fn different_version_is_rejected() {
    let bytes = entry();
    let mut newer = common::config();
    newer.runtime.version = "12.2.0".to_string();
    let cache = CodeCache::from_config(&newer);
    let result = rejection(&cache, &bytes, SOURCE, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::VersionMismatch);
}

#[test]
fn different_flags_are_rejected() {
    let bytes = entry();
    let mut other = common::config();
    other.runtime.flags.push("--trace-gc".to_string());
    let cache = CodeCache::from_config(&other);
    let result = rejection(&cache, &bytes, SOURCE, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::ConfigMismatch);
}

#[test]
fn different_read_only_layout_is_rejected() {
    let bytes = entry();
    for chunk_size in [2048, 4088, 4104, 8192] {
        let mut other = common::config();
        other.read_only.chunk_size = chunk_size;
        let cache = CodeCache::from_config(&other);
        assert_ne!(cache.tags(), CodeCache::from_config(&common::config()).tags());
        let result = rejection(&cache, &bytes, SOURCE, OriginOptions::script());
        assert_eq!(result, SanityCheckResult::ConfigMismatch, "chunk size {chunk_size}");

        let cached = CachedData::new(&bytes);
        let consumer = runtime();
        let data = start_deserialize_off_thread(cache.tags(), &consumer.read_only, &cached, usize::MAX);
        assert_eq!(data.sanity_check_result(), SanityCheckResult::ConfigMismatch);
        assert!(cached.is_rejected());
    }
}

#[test]
fn flag_order_does_not_matter() {
    let bytes = entry();
    let mut reordered = common::config();
    reordered.runtime.flags.reverse();
    let cache = CodeCache::from_config(&reordered);
    let cached = CachedData::new(&bytes);
    let mut consumer = runtime();
    cache
        .deserialize(&mut consumer, &cached, SOURCE, OriginOptions::script())
        .unwrap();
}

#[test]
fn checksum_policy_is_part_of_the_build_identity() {
    let bytes = entry();
    let mut unchecked = common::config();
    unchecked.codec.verify_checksum = false;
    let cache = CodeCache::from_config(&unchecked);
    let result = rejection(&cache, &bytes, SOURCE, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::ConfigMismatch);
}

#[test]
fn overlong_payload_length_is_rejected() {
    let cache = CodeCache::from_config(&common::config());
    let mut bytes = entry();
    let claimed = (bytes.len() - HEADER_SIZE + 1) as u32;
    write_u32(&mut bytes, PAYLOAD_LENGTH_OFFSET, claimed);
    let result = rejection(&cache, &bytes, SOURCE, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::LengthMismatch);
}

#[test]
fn corrupted_payload_fails_checksum() {
    let cache = CodeCache::from_config(&common::config());
    let mut bytes = entry();
    bytes[HEADER_SIZE + 3] ^= 0x40;
    let result = rejection(&cache, &bytes, SOURCE, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::ChecksumMismatch);
}

// ---------------------------------------------------------------------------
// Source binding
// ---------------------------------------------------------------------------

#[test]
fn source_of_different_length_is_rejected() {
    let cache = CodeCache::from_config(&common::config());
    let bytes = entry();
    let longer = format!("{SOURCE} ");
    let result = rejection(&cache, &bytes, &longer, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::SourceMismatch);
}

#[test]
fn module_flag_is_part_of_the_source_hash() {
    let cache = CodeCache::from_config(&common::config());
    let bytes = entry();
    let result = rejection(&cache, &bytes, SOURCE, OriginOptions::module());
    assert_eq!(result, SanityCheckResult::SourceMismatch);
}

#[test]
fn same_length_source_is_accepted() {
    let cache = CodeCache::from_config(&common::config());
    let bytes = entry();
    let edited = SOURCE.replace("inner", "other");
    assert_eq!(edited.len(), SOURCE.len());
    let cached = CachedData::new(&bytes);
    let mut consumer = runtime();
    assert!(cache
        .deserialize(&mut consumer, &cached, &edited, OriginOptions::script())
        .is_ok());
}

#[test]
fn hand_built_tags_bind_magic_and_source() {
    const PROGRAM: &str = "function f() { return \"forty-two chars\"; }";
    assert_eq!(PROGRAM.chars().count(), 42);

    let tags = RuntimeTags {
        magic: 0xC0DE,
        version_tag: 7,
        flags_tag: 3,
        verify_checksum: false,
    };
    let cache = CodeCache::new(tags);
    let mut producer = runtime();
    let program = build_program(&mut producer, PROGRAM, OriginOptions::script());
    let pristine = cache.serialize(&mut producer, program.root).unwrap().to_vec();

    let header = SerializedCodeHeader::read(&pristine).unwrap();
    assert_eq!(header.magic, 0xC0DE);
    assert_eq!(header.version_tag, 7);
    assert_eq!(header.flags_tag, 3);
    assert_eq!(header.source_hash, 42);
    assert_eq!(header.checksum, 0);

    let mut bytes = pristine.clone();
    bytes[0] ^= 0xFF;
    let result = rejection(&cache, &bytes, PROGRAM, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::BadMagic);

    let mut bytes = pristine.clone();
    bytes[SOURCE_HASH_OFFSET] ^= 0xFF;
    assert_eq!(check_without_source(&bytes, &tags), SanityCheckResult::Success);
    let result = rejection(&cache, &bytes, PROGRAM, OriginOptions::script());
    assert_eq!(result, SanityCheckResult::SourceMismatch);

    let cached = CachedData::new(&pristine);
    let mut consumer = runtime();
    assert!(cache
        .deserialize(&mut consumer, &cached, PROGRAM, OriginOptions::script())
        .is_ok());
}

// ---------------------------------------------------------------------------
// Payload damage
// ---------------------------------------------------------------------------

#[test]
fn short_payload_is_malformed_without_checksum() {
    let mut config = common::config();
    config.codec.verify_checksum = false;
    let cache = CodeCache::from_config(&config);
    let mut bytes = entry_for(&config, SOURCE);
    let header = SerializedCodeHeader::read(&bytes).unwrap();
    write_u32(&mut bytes, PAYLOAD_LENGTH_OFFSET, header.payload_length - 5);

    let cached = CachedData::new(&bytes);
    let mut consumer = runtime();
    let err = cache
        .deserialize(&mut consumer, &cached, SOURCE, OriginOptions::script())
        .unwrap_err();
    assert!(matches!(err, DeserializeError::Malformed { .. }), "{err}");
    assert!(consumer.heap.is_empty());
    assert!(consumer.scripts.is_empty());
}

// ---------------------------------------------------------------------------
// Heap exhaustion
// ---------------------------------------------------------------------------

fn limited_runtime(limit: usize) -> Runtime {
    let shared = runtime();
    Runtime::with_heap(Arc::clone(&shared.read_only), Heap::with_limit(limit))
}

#[test]
fn exhausted_heap_fails_sync_decode() {
    let cache = CodeCache::from_config(&common::config());
    let bytes = entry();
    let cached = CachedData::new(&bytes);
    let mut consumer = limited_runtime(64);

    let err = cache
        .deserialize(&mut consumer, &cached, SOURCE, OriginOptions::script())
        .unwrap_err();
    assert!(matches!(err, DeserializeError::ReservationFailed(_)), "{err}");
    assert!(!cached.is_rejected());
    assert!(consumer.heap.is_empty());
    assert_eq!(consumer.heap.used_bytes(), 0);
    assert!(consumer.scripts.is_empty());
}

#[test]
fn exhausted_heap_fails_background_finish() {
    let cache = CodeCache::from_config(&common::config());
    let bytes = entry();
    let cached = CachedData::new(&bytes);
    let mut consumer = limited_runtime(64);

    let data = start_deserialize_off_thread(cache.tags(), &consumer.read_only, &cached, usize::MAX);
    assert!(data.handles().is_some());
    let err = cache
        .finish_off_thread_deserialize(&mut consumer, data, &cached, SOURCE, OriginOptions::script())
        .unwrap_err();
    assert!(matches!(err, DeserializeError::ReservationFailed(_)), "{err}");
    assert!(consumer.heap.is_empty());
    assert!(consumer.scripts.is_empty());
}

#[test]
fn worker_heap_is_bounded_by_runtime_capacity() {
    let cache = CodeCache::from_config(&common::config());
    let bytes = entry();
    let cached = CachedData::new(&bytes);
    let consumer = limited_runtime(64);

    let data = start_deserialize_off_thread(
        cache.tags(),
        &consumer.read_only,
        &cached,
        consumer.heap.remaining(),
    );
    assert_eq!(data.sanity_check_result(), SanityCheckResult::Success);
    assert!(data.handles().is_none());
}
