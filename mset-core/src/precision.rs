//! Precision calculation for fixed-point block computation.
//!
//! Determines how many fractional bits, and so how many limbs, are needed
//! to tell adjacent sample points apart and survive the truncation error
//! that accumulates over many iterations.

use crate::error::FpError;
use crate::format::{FixedPointFormat, EFFECTIVE_BITS_PER_LIMB};
use crate::rvalue::RValue;

/// Safety margin for truncation errors in arithmetic operations.
const SAFETY_BITS: usize = 16;

/// Fractional bits required for sample points spaced `delta` apart.
///
/// `ceil(-log2 |delta|) + ceil(log2 target_iterations) + SAFETY_BITS`.
pub fn fractional_bits_for(delta: &RValue, target_iterations: u32) -> usize {
    let bits_from_delta = match delta.log2_floor() {
        Some(log2) if log2 < 0 => (-log2) as usize,
        _ => 0,
    };

    let iter_bits = if target_iterations > 1 {
        (32 - (target_iterations - 1).leading_zeros()) as usize
    } else {
        0
    };

    bits_from_delta + iter_bits + SAFETY_BITS
}

/// Smallest format able to compute a block with the given sample spacing.
pub fn format_for_delta(
    delta: &RValue,
    target_iterations: u32,
    bits_before_binary_point: u8,
) -> Result<FixedPointFormat, FpError> {
    FixedPointFormat::for_fractional_bits(
        bits_before_binary_point,
        fractional_bits_for(delta, target_iterations),
    )
}

/// Limbs needed to carry `precision` significant bits after the integer part.
pub fn limb_count_for_precision(precision: u32, bits_before_binary_point: u8) -> usize {
    (bits_before_binary_point as usize + precision as usize)
        .div_ceil(EFFECTIVE_BITS_PER_LIMB)
        .max(1)
}
