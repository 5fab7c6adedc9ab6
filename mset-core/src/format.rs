//! Fixed-point format: how many limbs a value has and where the binary point sits.

use crate::error::FpError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Effective bits per limb. Bit 31 of every word is reserved for carry detection.
pub const EFFECTIVE_BITS_PER_LIMB: usize = 31;

/// Mask selecting the 31 effective bits of a limb.
pub const LOW31_BITS_SET: u32 = 0x7FFF_FFFF;

/// Sign bit of the most significant limb.
pub const TEST_BIT_30: u32 = 0x4000_0000;

/// Reserved carry/borrow detection bit.
pub const RESERVED_BIT: u32 = 0x8000_0000;

/// Layout of a fixed-point number.
///
/// A value with this format is `mantissa * 2^target_exponent()` where the
/// mantissa is `limb_count * 31` bits wide in two's complement. The top
/// `bits_before_binary_point` bits (including the sign) hold the integer part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FormatSerde")]
pub struct FixedPointFormat {
    bits_before_binary_point: u8,
    limb_count: usize,
}

#[derive(Deserialize)]
struct FormatSerde {
    bits_before_binary_point: u8,
    limb_count: usize,
}

impl TryFrom<FormatSerde> for FixedPointFormat {
    type Error = FpError;

    fn try_from(raw: FormatSerde) -> Result<Self, Self::Error> {
        Self::new(raw.bits_before_binary_point, raw.limb_count)
    }
}

impl FixedPointFormat {
    pub fn new(bits_before_binary_point: u8, limb_count: usize) -> Result<Self, FpError> {
        if bits_before_binary_point == 0 || bits_before_binary_point > 30 {
            return Err(FpError::InvalidFormat(format!(
                "bits before the binary point must be in 1..=30, got {bits_before_binary_point}"
            )));
        }
        if limb_count == 0 {
            return Err(FpError::InvalidFormat(
                "limb count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            bits_before_binary_point,
            limb_count,
        })
    }

    /// Smallest format with at least `min_fractional_bits` bits after the binary point.
    pub fn for_fractional_bits(
        bits_before_binary_point: u8,
        min_fractional_bits: usize,
    ) -> Result<Self, FpError> {
        let total = bits_before_binary_point as usize + min_fractional_bits;
        let limb_count = total.div_ceil(EFFECTIVE_BITS_PER_LIMB).max(1);
        Self::new(bits_before_binary_point, limb_count)
    }

    pub fn bits_before_binary_point(&self) -> u8 {
        self.bits_before_binary_point
    }

    pub fn limb_count(&self) -> usize {
        self.limb_count
    }

    pub fn total_bits(&self) -> usize {
        self.limb_count * EFFECTIVE_BITS_PER_LIMB
    }

    pub fn fractional_bits(&self) -> usize {
        self.total_bits() - self.bits_before_binary_point as usize
    }

    /// Exponent of the least significant mantissa bit.
    pub fn target_exponent(&self) -> i32 {
        -(self.fractional_bits() as i32)
    }

    /// Largest magnitude bit count a mantissa may use (the sign bit excluded).
    pub fn max_magnitude_bits(&self) -> usize {
        self.total_bits() - 1
    }

    /// Largest integer that can be stored, e.g. 127 with 8 bits before the point.
    pub fn max_integer_value(&self) -> u32 {
        (1u32 << (self.bits_before_binary_point - 1)) - 1
    }
}

impl fmt::Display for FixedPointFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bits_before_binary_point, self.fractional_bits())
    }
}
