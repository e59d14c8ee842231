//! Bounds-checked integer readers for the SxGeo file layout
//!
//! The file mixes two byte orders:
//!
//! - **Big-endian**: the fixed header, both index arrays, row range-starts
//!   and row ids. Row ids have a variable width (`idLength`, 1..=4 bytes).
//! - **Little-endian**: numeric fields inside city/region/country records,
//!   as written by the packer that produced the descriptor strings.
//!
//! Every reader returns `None` instead of panicking when the requested
//! bytes are not fully inside the buffer, so callers can turn a short read
//! into a format error at the exact place it happened.

/// Read one byte
#[inline]
pub fn read_u8(buffer: &[u8], offset: usize) -> Option<u8> {
    buffer.get(offset).copied()
}

/// Read a big-endian u16
#[inline]
pub fn read_u16_be(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes = buffer.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big-endian u32
#[inline]
pub fn read_u32_be(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = buffer.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a big-endian unsigned integer of `width` bytes (1..=4)
///
/// Used for row range-starts (3 bytes) and row ids (`idLength` bytes).
#[inline]
pub fn read_uint_be(buffer: &[u8], offset: usize, width: usize) -> Option<u32> {
    debug_assert!((1..=4).contains(&width));
    let bytes = buffer.get(offset..offset.checked_add(width)?)?;
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

/// Read a little-endian unsigned integer of `width` bytes (1..=8)
#[inline]
pub fn read_uint_le(buffer: &[u8], offset: usize, width: usize) -> Option<u64> {
    debug_assert!((1..=8).contains(&width));
    let bytes = buffer.get(offset..offset.checked_add(width)?)?;
    Some(
        bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64),
    )
}

/// Read a little-endian two's-complement integer of `width` bytes (1..=8)
///
/// The top bit of the last byte is sign-extended, which is what makes the
/// 3-byte `m` fields come out right.
#[inline]
pub fn read_int_le(buffer: &[u8], offset: usize, width: usize) -> Option<i64> {
    let raw = read_uint_le(buffer, offset, width)?;
    let shift = 64 - (width as u32 * 8);
    Some(((raw << shift) as i64) >> shift)
}

/// Append the low `width` bytes of `value` in little-endian order
#[inline]
pub fn write_uint_le(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}
