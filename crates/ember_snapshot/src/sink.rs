//! Append-only byte sink for the payload stream.

/// Growable output buffer with LEB128 helpers.
#[derive(Debug, Default)]
pub struct SnapshotSink {
    data: Vec<u8>,
}

impl SnapshotSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one byte.
    pub fn put_u8(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Appends an unsigned LEB128 integer.
    pub fn put_uint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.data.push(byte);
                return;
            }
            self.data.push(byte | 0x80);
        }
    }

    /// Appends a zig-zag encoded signed integer.
    pub fn put_sint(&mut self, value: i64) {
        self.put_uint(((value << 1) ^ (value >> 63)) as u64);
    }

    /// Appends raw bytes.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Returns the number of bytes written.
    pub fn position(&self) -> usize {
        self.data.len()
    }

    /// Consumes the sink, returning its bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_uint_is_one_byte() {
        let mut sink = SnapshotSink::new();
        sink.put_uint(127);
        assert_eq!(sink.into_inner(), vec![0x7f]);
    }

    #[test]
    fn multi_byte_uint() {
        let mut sink = SnapshotSink::new();
        sink.put_uint(300);
        assert_eq!(sink.into_inner(), vec![0xac, 0x02]);
    }

    #[test]
    fn zigzag_sint() {
        let mut sink = SnapshotSink::new();
        sink.put_sint(-1);
        sink.put_sint(1);
        sink.put_sint(-2);
        assert_eq!(sink.into_inner(), vec![1, 2, 3]);
    }
}
