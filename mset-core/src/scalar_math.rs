//! Arithmetic on single fixed-point values.
//!
//! All operations work on the two's complement limbs directly. Add and
//! subtract ripple a carry through the reserved bit of each lower limb and
//! detect overflow by comparing the MSL's reserved bit with its sign bit.
//! Multiplication converts to magnitudes, accumulates 62-bit partial products
//! split into 31-bit halves, then shifts the double-width product back to the
//! format's binary point.

use crate::error::FpError;
use crate::format::{FixedPointFormat, LOW31_BITS_SET, TEST_BIT_30};
use crate::fp_value::FPValue;
use crate::op_counts::MathOpCounts;
use crate::rvalue::RValue;
use crate::twos_complement;
use dashu_base::Sign;
use std::cmp::Ordering;

/// Split a partial product into `(hi, lo)` 31-bit halves.
#[inline]
pub fn split(x: u64) -> (u64, u64) {
    (x >> 31, x & LOW31_BITS_SET as u64)
}

/// Result of a limb-wise add or subtract.
pub(crate) struct LimbSum {
    pub limbs: Vec<u32>,
    pub carries: u64,
    pub overflow: bool,
}

/// `a + b`, or `a - b` computed as `a + !b + 1`.
pub(crate) fn add_limbs(a: &[u32], b: &[u32], subtract: bool) -> LimbSum {
    let n = a.len();
    let mut limbs = Vec::with_capacity(n);
    let mut carry = u32::from(subtract);
    let mut carries = 0;

    for i in 0..n.saturating_sub(1) {
        let rhs = if subtract { !b[i] & LOW31_BITS_SET } else { b[i] };
        let sum = a[i].wrapping_add(rhs).wrapping_add(carry);
        limbs.push(sum & LOW31_BITS_SET);
        carry = sum >> 31;
        carries += u64::from(carry);
    }

    let rhs = if subtract { !b[n - 1] } else { b[n - 1] };
    let msl = a[n - 1].wrapping_add(rhs).wrapping_add(carry);
    limbs.push(msl);

    LimbSum {
        limbs,
        carries,
        overflow: (msl >> 31) != ((msl >> 30) & 1),
    }
}

/// Partial products of two magnitudes, one bin per result limb position.
///
/// The low half of `a[j] * b[i]` lands in bin `i + j`, the high half in
/// bin `i + j + 1`. Returns the bins and the number of splits performed.
pub fn multiply_partials(a: &[u32], b: &[u32]) -> (Vec<u64>, u64) {
    let mut bins = vec![0u64; a.len() + b.len()];
    let mut splits = 0;
    for (j, &aj) in a.iter().enumerate() {
        for (i, &bi) in b.iter().enumerate() {
            let (hi, lo) = split(aj as u64 * bi as u64);
            bins[i + j] += lo;
            bins[i + j + 1] += hi;
            splits += 1;
        }
    }
    (bins, splits)
}

/// Partial products of a magnitude with itself; cross terms are doubled.
pub fn square_partials(a: &[u32]) -> (Vec<u64>, u64) {
    let mut bins = vec![0u64; a.len() * 2];
    let mut splits = 0;
    for i in 0..a.len() {
        for j in 0..=i {
            let mut product = a[j] as u64 * a[i] as u64;
            if i > j {
                product <<= 1;
            }
            let (hi, lo) = split(product);
            bins[i + j] += lo;
            bins[i + j + 1] += hi;
            splits += 1;
        }
    }
    (bins, splits)
}

/// Carry-propagate partial-product bins into 31-bit limbs.
pub fn sum_the_partials(bins: &[u64]) -> (Vec<u32>, u64) {
    let mut limbs = Vec::with_capacity(bins.len());
    let mut carry = 0u64;
    let mut carries = 0;
    for &bin in bins {
        let (hi, lo) = split(bin + carry);
        limbs.push(lo as u32);
        carry = hi;
        if carry != 0 {
            carries += 1;
        }
    }
    (limbs, carries)
}

/// Reduce a double-width magnitude product to `format.limb_count()` limbs.
///
/// Drops `fractional_bits` from the low end and fails if any bit at or
/// above the result's sign bit is set.
pub fn shift_and_trim(
    product: &[u32],
    format: &FixedPointFormat,
    operation: &'static str,
) -> Result<Vec<u32>, FpError> {
    let n = format.limb_count();
    if product.len() != 2 * n {
        return Err(FpError::DimensionMismatch(format!(
            "product has {} limbs, expected {}",
            product.len(),
            2 * n
        )));
    }

    let bb = format.bits_before_binary_point() as u32;
    if product[2 * n - 1] >> (30 - bb) != 0 {
        return Err(FpError::Overflow {
            operation,
            index: 0,
        });
    }

    Ok((0..n)
        .map(|k| {
            let hi = product[k + n];
            let lo = product[k + n - 1];
            ((hi << bb) & LOW31_BITS_SET) | (lo >> (31 - bb))
        })
        .collect())
}

/// Signed comparison of two encoded values of the same width.
pub(crate) fn compare_limbs(a: &[u32], b: &[u32]) -> Ordering {
    let n = a.len();
    match (a[n - 1] as i32).cmp(&(b[n - 1] as i32)) {
        Ordering::Equal => {}
        other => return other,
    }
    for i in (0..n - 1).rev() {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Scalar arithmetic bound to one fixed-point format and escape threshold.
pub struct ScalarMath {
    format: FixedPointFormat,
    threshold: u32,
    threshold_value: FPValue,
    counts: MathOpCounts,
}

impl ScalarMath {
    pub fn new(format: FixedPointFormat, threshold: u32) -> Result<Self, FpError> {
        if threshold > format.max_integer_value() {
            return Err(FpError::FormatCapacity {
                needed_bits: (32 - threshold.leading_zeros()) as usize,
                max_bits: format.bits_before_binary_point() as usize - 1,
                format: format.to_string(),
            });
        }
        let threshold_value = FPValue::create(&RValue::from_integer(threshold as i64), &format)?;
        Ok(Self {
            format,
            threshold,
            threshold_value,
            counts: MathOpCounts::default(),
        })
    }

    pub fn format(&self) -> &FixedPointFormat {
        &self.format
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn threshold_value(&self) -> &FPValue {
        &self.threshold_value
    }

    pub fn counts(&self) -> &MathOpCounts {
        &self.counts
    }

    pub fn reset_counts(&mut self) {
        self.counts.reset();
    }

    pub fn create_fp_value(&mut self, rvalue: &RValue) -> Result<FPValue, FpError> {
        self.counts.conversions += 1;
        FPValue::create(rvalue, &self.format)
    }

    pub fn get_rvalue(&mut self, value: &FPValue) -> Result<RValue, FpError> {
        self.counts.conversions += 1;
        value.to_rvalue()
    }

    pub fn add(&mut self, a: &FPValue, b: &FPValue) -> Result<FPValue, FpError> {
        self.check_operands(a, b)?;
        self.counts.additions += 1;
        self.add_or_sub(a, b, false, "adding")
    }

    pub fn sub(&mut self, a: &FPValue, b: &FPValue) -> Result<FPValue, FpError> {
        self.check_operands(a, b)?;
        self.counts.subtractions += 1;
        self.add_or_sub(a, b, true, "subtracting")
    }

    pub fn negate(&mut self, a: &FPValue) -> Result<FPValue, FpError> {
        self.check_format(a)?;
        self.counts.negations += 1;
        a.negate()
    }

    pub fn multiply(&mut self, a: &FPValue, b: &FPValue) -> Result<FPValue, FpError> {
        self.check_operands(a, b)?;
        self.counts.multiplications += 1;

        let (sign_a, mag_a) = twos_complement::convert_from_2c(a.mantissa())?;
        let (sign_b, mag_b) = twos_complement::convert_from_2c(b.mantissa())?;

        let (bins, splits) = multiply_partials(&mag_a, &mag_b);
        self.counts.splits += splits;
        let magnitude = self.finish_product(&bins, "multiplying")?;

        let sign = if sign_a == sign_b {
            Sign::Positive
        } else {
            Sign::Negative
        };
        let mantissa = twos_complement::convert_to_2c(&magnitude, sign)?;
        FPValue::from_mantissa(mantissa, &self.format, a.precision().max(b.precision()))
    }

    pub fn square(&mut self, a: &FPValue) -> Result<FPValue, FpError> {
        self.check_format(a)?;
        self.counts.squarings += 1;

        let (_, magnitude) = twos_complement::convert_from_2c(a.mantissa())?;
        let (bins, splits) = square_partials(&magnitude);
        self.counts.splits += splits;
        let result = self.finish_product(&bins, "squaring")?;

        FPValue::from_mantissa(result, &self.format, a.precision())
    }

    /// `a * n` for a small non-negative integer, without converting `n`.
    pub fn multiply_by_integer(&mut self, a: &FPValue, n: u32) -> Result<FPValue, FpError> {
        self.check_format(a)?;
        self.counts.multiplications += 1;

        let (sign, magnitude) = twos_complement::convert_from_2c(a.mantissa())?;
        let mut result = Vec::with_capacity(magnitude.len());
        let mut carry = 0u64;
        for limb in magnitude {
            let (hi, lo) = split(limb as u64 * n as u64 + carry);
            result.push(lo as u32);
            carry = hi;
        }

        let overflow = carry != 0 || result.last().is_some_and(|msl| msl & TEST_BIT_30 != 0);
        if overflow {
            return Err(FpError::Overflow {
                operation: "multiplying by an integer",
                index: 0,
            });
        }

        let mantissa = twos_complement::convert_to_2c(&result, sign)?;
        FPValue::from_mantissa(mantissa, &self.format, a.precision())
    }

    /// True when `value >= threshold`. Only lower limbs are consulted when
    /// the most significant limbs are equal.
    pub fn is_greater_or_equal_than_threshold(&mut self, value: &FPValue) -> Result<bool, FpError> {
        self.check_format(value)?;
        self.counts.comparisons += 1;
        Ok(compare_limbs(value.mantissa(), self.threshold_value.mantissa()) != Ordering::Less)
    }

    /// `delta * i` for `i` in `0..extent`.
    pub fn build_sample_point_offsets(
        &mut self,
        delta: &FPValue,
        extent: usize,
    ) -> Result<Vec<FPValue>, FpError> {
        (0..extent)
            .map(|i| {
                let i = u32::try_from(i).map_err(|_| {
                    FpError::DimensionMismatch(format!("extent {extent} is too large"))
                })?;
                self.multiply_by_integer(delta, i)
            })
            .collect()
    }

    pub fn build_sample_points(
        &mut self,
        start: &FPValue,
        offsets: &[FPValue],
    ) -> Result<Vec<FPValue>, FpError> {
        offsets
            .iter()
            .map(|offset| self.add(start, offset))
            .collect()
    }

    fn add_or_sub(
        &mut self,
        a: &FPValue,
        b: &FPValue,
        subtract: bool,
        operation: &'static str,
    ) -> Result<FPValue, FpError> {
        let sum = add_limbs(a.mantissa(), b.mantissa(), subtract);
        self.counts.a_carries += sum.carries;
        if sum.overflow {
            return Err(FpError::Overflow {
                operation,
                index: 0,
            });
        }
        FPValue::from_mantissa(sum.limbs, &self.format, a.precision().max(b.precision()))
    }

    fn finish_product(&mut self, bins: &[u64], operation: &'static str) -> Result<Vec<u32>, FpError> {
        let (product, carries) = sum_the_partials(bins);
        self.counts.m_carries += carries;
        shift_and_trim(&product, &self.format, operation)
    }

    fn check_format(&self, a: &FPValue) -> Result<(), FpError> {
        if a.format() != &self.format {
            return Err(FpError::DimensionMismatch(format!(
                "value has format {} with {} limbs, expected {} with {} limbs",
                a.format(),
                a.limb_count(),
                self.format,
                self.format.limb_count()
            )));
        }
        Ok(())
    }

    fn check_operands(&self, a: &FPValue, b: &FPValue) -> Result<(), FpError> {
        self.check_format(a)?;
        self.check_format(b)
    }
}
