//! Cursor over the payload stream.

/// Read cursor with LEB128 helpers. Every read returns `None` past the end.
#[derive(Debug)]
pub struct SnapshotSource<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SnapshotSource<'a> {
    /// Creates a cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Reads one byte.
    pub fn get_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.position)?;
        self.position += 1;
        Some(byte)
    }

    /// Reads an unsigned LEB128 integer. Encodings longer than 64 bits fail.
    pub fn get_uint(&mut self) -> Option<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.get_u8()?;
            if shift >= 64 {
                return None;
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Some(result);
            }
            shift += 7;
        }
    }

    /// Reads a zig-zag encoded signed integer.
    pub fn get_sint(&mut self) -> Option<i64> {
        let raw = self.get_uint()?;
        Some((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }

    /// Reads `len` raw bytes.
    pub fn get_raw(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        let bytes = self.data.get(self.position..end)?;
        self.position = end;
        Some(bytes)
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Returns `true` once every byte has been read.
    pub fn at_end(&self) -> bool {
        self.position == self.data.len()
    }

    /// Returns the read position.
    pub fn position(&self) -> usize {
        self.position
    }
}
