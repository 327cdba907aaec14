//! 32-bit hashing for build identity tags and buffer checksums.

use xxhash_rust::xxh32::{xxh32, Xxh32};

/// Seed shared by every hash computed in this module.
const SEED: u32 = 0;

/// Hashes a byte slice into a 32-bit tag using XXH32.
pub fn hash32(data: &[u8]) -> u32 {
    xxh32(data, SEED)
}

/// Hashes an ordered sequence of strings into a single 32-bit tag.
///
/// Each item is length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
/// produce different tags.
pub fn hash_strings<I, S>(items: I) -> u32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = Xxh32::new(SEED);
    for item in items {
        let bytes = item.as_ref().as_bytes();
        state.update(&(bytes.len() as u32).to_le_bytes());
        state.update(bytes);
    }
    state.digest()
}

/// Incremental checksum over several non-contiguous byte ranges.
pub struct Checksum {
    state: Xxh32,
}

impl Checksum {
    /// Creates an empty checksum accumulator.
    pub fn new() -> Self {
        Self {
            state: Xxh32::new(SEED),
        }
    }

    /// Feeds another byte range into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Returns the checksum of everything fed so far.
    pub fn finish(&self) -> u32 {
        self.state.digest()
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}
