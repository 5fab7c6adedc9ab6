//! SIMD lane layout.
//!
//! A vector is eight 32-bit lanes (one 256-bit register). Kernels are written
//! as fixed-width array loops over `[u32; LANES]` so the compiler lowers them
//! to packed instructions on any target without intrinsics.

/// Lanes per vector.
pub const LANES: usize = 8;

/// One limb of `LANES` values.
pub type LimbVector = [u32; LANES];

/// Double-width accumulators for partial products.
pub type WideVector = [u64; LANES];

/// Number of vectors needed for `value_count` values.
pub fn vector_count(value_count: usize) -> usize {
    value_count.div_ceil(LANES)
}

/// `value_count` rounded up to a whole number of vectors.
pub fn padded_len(value_count: usize) -> usize {
    vector_count(value_count) * LANES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_up_to_whole_vectors() {
        assert_eq!(vector_count(0), 0);
        assert_eq!(vector_count(8), 1);
        assert_eq!(vector_count(100), 13);
        assert_eq!(padded_len(100), 104);
        assert_eq!(padded_len(128), 128);
    }
}
