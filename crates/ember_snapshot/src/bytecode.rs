//! Token bytes of the payload stream.
//!
//! Every token starts with one of these bytes. Integer operands are
//! LEB128; signed operands are zig-zag encoded first.

/// `ROOT index`: a root table entry.
pub const ROOT: u8 = 0x01;
/// `BACKREF index`: a record encoded earlier in this stream.
pub const BACKREF: u8 = 0x02;
/// `READ_ONLY chunk offset`: a record of the read-only region.
pub const READ_ONLY: u8 = 0x03;
/// `NEW_OBJECT kind field_count (name_len name value)*`: a full record.
pub const NEW_OBJECT: u8 = 0x04;
/// The undefined value, also written for elided records.
pub const UNDEFINED: u8 = 0x05;
/// Boolean false.
pub const FALSE: u8 = 0x06;
/// Boolean true.
pub const TRUE: u8 = 0x07;
/// `INT zigzag`: a signed integer.
pub const INT: u8 = 0x08;
/// `BYTES len data`: a byte blob.
pub const BYTES: u8 = 0x09;
/// `ATTACHED index`: a record supplied by the caller on both sides.
pub const ATTACHED: u8 = 0x0A;

/// Base of the one-byte hot object tokens.
pub const HOT_OBJECT: u8 = 0x80;
/// Mask extracting the hot object index.
pub const HOT_OBJECT_MASK: u8 = 0x07;

/// Returns `true` if `byte` is a hot object token.
pub fn is_hot_object(byte: u8) -> bool {
    byte & !HOT_OBJECT_MASK == HOT_OBJECT
}

/// Returns the hot object token for cache slot `index`.
pub fn hot_object(index: usize) -> u8 {
    debug_assert!(index <= HOT_OBJECT_MASK as usize);
    HOT_OBJECT | index as u8
}

/// Returns a printable name for a token byte.
pub fn name(byte: u8) -> &'static str {
    match byte {
        ROOT => "root",
        BACKREF => "backref",
        READ_ONLY => "read_only",
        NEW_OBJECT => "new_object",
        UNDEFINED => "undefined",
        FALSE => "false",
        TRUE => "true",
        INT => "int",
        BYTES => "bytes",
        ATTACHED => "attached",
        b if is_hot_object(b) => "hot_object",
        _ => "unknown",
    }
}
