//! Caller-facing wrapper around a cache buffer.

use std::sync::atomic::{AtomicBool, Ordering};

use ember_common::{align_up, is_aligned, POINTER_ALIGNMENT};

enum Storage<'a> {
    Borrowed(&'a [u8]),
    Owned {
        buffer: Vec<u8>,
        offset: usize,
        len: usize,
    },
}

/// A cache buffer with a sticky rejection flag.
///
/// Buffers that are not pointer-aligned are copied into an aligned private
/// allocation that this wrapper owns; aligned buffers are borrowed as-is.
pub struct CachedData<'a> {
    storage: Storage<'a>,
    rejected: AtomicBool,
}

impl<'a> CachedData<'a> {
    /// Wraps `data`, copying it if its address is not pointer-aligned.
    pub fn new(data: &'a [u8]) -> Self {
        let storage = if is_aligned(data.as_ptr() as usize) {
            Storage::Borrowed(data)
        } else {
            aligned_copy(data)
        };
        Self {
            storage,
            rejected: AtomicBool::new(false),
        }
    }

    /// Returns the bytes.
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Borrowed(data) => data,
            Storage::Owned {
                buffer,
                offset,
                len,
            } => &buffer[*offset..*offset + *len],
        }
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Returns `true` if the bytes live in an allocation owned by this wrapper.
    pub fn owns_data(&self) -> bool {
        matches!(self.storage, Storage::Owned { .. })
    }

    /// Marks the buffer as rejected. The flag never clears.
    pub fn reject(&self) {
        self.rejected.store(true, Ordering::Release);
    }

    /// Returns `true` once the buffer has been rejected.
    pub fn is_rejected(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }

    /// Copies the bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data().to_vec()
    }
}

impl CachedData<'static> {
    /// Takes ownership of `bytes`, realigning them if needed.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let storage = if is_aligned(bytes.as_ptr() as usize) {
            let len = bytes.len();
            Storage::Owned {
                buffer: bytes,
                offset: 0,
                len,
            }
        } else {
            aligned_copy(&bytes)
        };
        Self {
            storage,
            rejected: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for CachedData<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedData")
            .field("len", &self.len())
            .field("owns_data", &self.owns_data())
            .field("rejected", &self.is_rejected())
            .finish()
    }
}

fn aligned_copy(data: &[u8]) -> Storage<'static> {
    let mut buffer = vec![0u8; data.len() + POINTER_ALIGNMENT];
    let base = buffer.as_ptr() as usize;
    let offset = align_up(base) - base;
    buffer[offset..offset + data.len()].copy_from_slice(data);
    Storage::Owned {
        buffer,
        offset,
        len: data.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unaligned_slice(backing: &[u8]) -> &[u8] {
        let skip = (1..POINTER_ALIGNMENT)
            .find(|i| !is_aligned(backing.as_ptr() as usize + i))
            .unwrap();
        &backing[skip..skip + 16]
    }

    #[test]
    fn unaligned_input_is_copied() {
        let backing: Vec<u8> = (0..64).collect();
        let slice = unaligned_slice(&backing);
        let cached = CachedData::new(slice);
        assert!(cached.owns_data());
        assert_eq!(cached.data(), slice);
        assert!(is_aligned(cached.data().as_ptr() as usize));
    }

    #[test]
    fn aligned_input_is_borrowed() {
        let words = [0u64; 4];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let cached = CachedData::from_vec(bytes.clone());
        assert!(cached.owns_data());
        let borrowed = CachedData::new(cached.data());
        assert!(!borrowed.owns_data());
        assert_eq!(borrowed.data(), &bytes[..]);
    }

    #[test]
    fn rejection_is_sticky() {
        let cached = CachedData::from_vec(vec![1, 2, 3]);
        assert!(!cached.is_rejected());
        cached.reject();
        cached.reject();
        assert!(cached.is_rejected());
    }
}
