//! Two's complement encoding over 31-bit limbs.
//!
//! Limbs are little endian. Every limb below the most significant limb (MSL)
//! keeps its reserved bit 31 clear. The MSL is sign-extended into the
//! reserved bit, so `msl as i32` is its signed digit and `bit 31 != bit 30`
//! after an addition means the top limb overflowed.

use crate::error::{limbs_to_hex, FpError};
use crate::format::{LOW31_BITS_SET, RESERVED_BIT, TEST_BIT_30};
use dashu_base::Sign;

/// Reserved bit mirrors bit 30 on the MSL; clear on every other limb.
pub fn check_reserved_bits(limbs: &[u32], operation: &'static str) -> Result<(), FpError> {
    let Some((msl, lower)) = limbs.split_last() else {
        return Err(FpError::DimensionMismatch(
            "a value needs at least one limb".to_string(),
        ));
    };

    let lower_ok = lower.iter().all(|l| l & RESERVED_BIT == 0);
    let msl_ok = (msl >> 31) == ((msl >> 30) & 1);
    if lower_ok && msl_ok {
        Ok(())
    } else {
        Err(FpError::ReservedBit {
            operation,
            limbs: limbs_to_hex(limbs),
        })
    }
}

/// Sign of an encoded value, read from bit 30 of the MSL.
pub fn sign_of(limbs: &[u32]) -> Sign {
    match limbs.last() {
        Some(msl) if msl & TEST_BIT_30 != 0 => Sign::Negative,
        _ => Sign::Positive,
    }
}

/// Copy bit 30 of the MSL into the reserved bit.
pub fn sign_extend_msl(limbs: &mut [u32]) {
    if let Some(msl) = limbs.last_mut() {
        if *msl & TEST_BIT_30 != 0 {
            *msl |= RESERVED_BIT;
        } else {
            *msl &= LOW31_BITS_SET;
        }
    }
}

/// Two's complement negation over the 31 effective bits of each limb.
///
/// Zero limbs below the lowest set bit are copied, the lowest set bit is
/// kept, and every bit above it is flipped. The result's reserved bits are clear.
pub fn flip_bits_and_add_1(limbs: &[u32]) -> Vec<u32> {
    let mut result = Vec::with_capacity(limbs.len());
    let mut seen_set_bit = false;

    for &limb in limbs {
        let limb = limb & LOW31_BITS_SET;
        if seen_set_bit {
            result.push(limb ^ LOW31_BITS_SET);
        } else if limb == 0 {
            result.push(0);
        } else {
            let keep = limb.trailing_zeros() + 1;
            let flip_mask = if keep >= 31 {
                0
            } else {
                (LOW31_BITS_SET >> keep) << keep
            };
            result.push(limb ^ flip_mask);
            seen_set_bit = true;
        }
    }

    result
}

/// Encode a magnitude (31-bit limbs, sign bit clear) with the given sign.
pub fn convert_to_2c(magnitude: &[u32], sign: Sign) -> Result<Vec<u32>, FpError> {
    if magnitude.iter().any(|l| l & RESERVED_BIT != 0) {
        return Err(FpError::ReservedBit {
            operation: "converting to two's complement",
            limbs: limbs_to_hex(magnitude),
        });
    }
    match magnitude.last() {
        None => {
            return Err(FpError::DimensionMismatch(
                "a value needs at least one limb".to_string(),
            ))
        }
        Some(msl) if msl & TEST_BIT_30 != 0 => {
            return Err(FpError::TwosComplement(format!(
                "magnitude {} already uses the sign bit",
                limbs_to_hex(magnitude)
            )))
        }
        Some(_) => {}
    }

    let mut result = match sign {
        Sign::Positive => magnitude.to_vec(),
        Sign::Negative => flip_bits_and_add_1(magnitude),
    };
    sign_extend_msl(&mut result);
    Ok(result)
}

/// Decode to `(sign, magnitude)`. The magnitude's limbs are all 31-bit.
pub fn convert_from_2c(limbs: &[u32]) -> Result<(Sign, Vec<u32>), FpError> {
    check_reserved_bits(limbs, "converting from two's complement")?;

    let sign = sign_of(limbs);
    let magnitude = match sign {
        Sign::Positive => limbs.iter().map(|l| l & LOW31_BITS_SET).collect(),
        Sign::Negative => flip_bits_and_add_1(limbs),
    };
    Ok((sign, magnitude))
}

pub fn is_zero(limbs: &[u32]) -> bool {
    limbs.iter().all(|&l| l == 0)
}

/// The one value whose negation is not representable.
pub fn is_most_negative(limbs: &[u32]) -> bool {
    match limbs.split_last() {
        Some((msl, lower)) => {
            msl & LOW31_BITS_SET == TEST_BIT_30 && lower.iter().all(|&l| l == 0)
        }
        None => false,
    }
}

/// Negate an encoded value, failing on the most negative value.
pub fn negate(limbs: &[u32]) -> Result<Vec<u32>, FpError> {
    check_reserved_bits(limbs, "negating")?;
    if is_most_negative(limbs) {
        return Err(FpError::Overflow {
            operation: "negating the most negative value",
            index: 0,
        });
    }
    let mut result = flip_bits_and_add_1(limbs);
    sign_extend_msl(&mut result);
    Ok(result)
}
