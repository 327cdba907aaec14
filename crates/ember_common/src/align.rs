//! Pointer-alignment arithmetic for cache buffers.

/// Alignment every cache buffer and header size is rounded to.
pub const POINTER_ALIGNMENT: usize = std::mem::size_of::<usize>();

/// Rounds `value` up to the next multiple of [`POINTER_ALIGNMENT`].
pub const fn align_up(value: usize) -> usize {
    (value + POINTER_ALIGNMENT - 1) & !(POINTER_ALIGNMENT - 1)
}

/// Returns `true` if `value` is a multiple of [`POINTER_ALIGNMENT`].
pub const fn is_aligned(value: usize) -> bool {
    value & (POINTER_ALIGNMENT - 1) == 0
}
