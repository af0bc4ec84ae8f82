// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
bit packing.

Source regions are cached under a single integer key built from their quantized
rectangle.
*/

/// Packs four 16-bit fields into one key, `x` in the high bits.
pub fn pack_region(x: u16, y: u16, width: u16, height: u16) -> u64 {
    ((x as u64) << 48) | ((y as u64) << 32) | ((width as u64) << 16) | (height as u64)
}

#[cfg(test)]
pub fn unpack_region(packed: u64) -> (u16, u16, u16, u16) {
    (
        (packed >> 48) as u16,
        (packed >> 32) as u16,
        (packed >> 16) as u16,
        packed as u16,
    )
}

/// Smallest `level` such that `1 << level >= value`. `value` must be nonzero.
pub fn ceil_log2(value: u32) -> u32 {
    debug_assert!(value > 0);
    u32::BITS - (value - 1).leading_zeros()
}
