//! Exact dyadic rationals used to describe map coordinates.
//!
//! An [`RValue`] is `value * 2^exponent` with an arbitrary precision integer
//! `value`. The fixed-point engine converts to and from this form at the edges
//! of a block computation, so it has to be lossless.

use crate::error::FpError;
use crate::format::{EFFECTIVE_BITS_PER_LIMB, LOW31_BITS_SET};
use dashu::integer::{IBig, UBig};
use dashu_base::{Approximation, BitTest, Sign};
use dashu_float::{DBig, FBig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bits of significance carried when nothing else is requested (f64 mantissa width).
pub const DEFAULT_PRECISION: u32 = 53;

#[derive(Clone, Debug)]
pub struct RValue {
    value: IBig,
    exponent: i32,
    precision: u32,
}

impl RValue {
    pub fn new(value: IBig, exponent: i32) -> Self {
        Self {
            value,
            exponent,
            precision: DEFAULT_PRECISION,
        }
    }

    pub fn zero() -> Self {
        Self::new(IBig::ZERO, 0)
    }

    pub fn from_integer(value: i64) -> Self {
        Self::new(IBig::from(value), 0)
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn value(&self) -> &IBig {
        &self.value
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn is_zero(&self) -> bool {
        self.value == IBig::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.value < IBig::ZERO
    }

    /// Exact conversion of a finite double.
    pub fn from_f64(val: f64) -> Result<Self, FpError> {
        let float: FBig = FBig::try_from(val)
            .map_err(|e| FpError::Parse(format!("{val} is not a finite number: {e}")))?;
        let repr = float.repr();
        let exponent = i32::try_from(repr.exponent())
            .map_err(|_| FpError::Parse(format!("{val}: exponent out of range")))?;
        Ok(Self::new(repr.significand().clone(), exponent).reduce())
    }

    /// Parse a decimal string such as `"-0.743643887037158704752191506114774"`.
    ///
    /// The decimal is converted to base 2 keeping `precision_bits` significant bits.
    pub fn from_decimal_str(val: &str, precision_bits: u32) -> Result<Self, FpError> {
        let dbig = val
            .trim()
            .parse::<DBig>()
            .map_err(|e| FpError::Parse(format!("'{val}': {e}")))?;

        let binary = match dbig.with_base_and_precision::<2>(precision_bits as usize) {
            Approximation::Exact(v) => v,
            Approximation::Inexact(v, _) => v,
        };

        let repr = binary.repr();
        let exponent = i32::try_from(repr.exponent())
            .map_err(|_| FpError::Parse(format!("'{val}': exponent out of range")))?;

        Ok(Self::new(repr.significand().clone(), exponent)
            .with_precision(precision_bits)
            .reduce())
    }

    /// Nearest double, for display and logging only.
    pub fn to_f64(&self) -> f64 {
        let float: FBig = FBig::from_parts(self.value.clone(), self.exponent as isize);
        float.to_f64().value()
    }

    /// Canonical form: no trailing zero bits in `value`, zero has exponent 0.
    pub fn reduce(mut self) -> Self {
        match self.value.trailing_zeros() {
            Some(zeros) => {
                self.value >>= zeros;
                self.exponent += zeros as i32;
            }
            None => self.exponent = 0,
        }
        self
    }

    pub fn neg(&self) -> Self {
        Self {
            value: -self.value.clone(),
            exponent: self.exponent,
            precision: self.precision,
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        let (a, b, exponent) = self.aligned(other);
        Self {
            value: a + b,
            exponent,
            precision: self.precision.max(other.precision),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        let (a, b, exponent) = self.aligned(other);
        Self {
            value: a - b,
            exponent,
            precision: self.precision.max(other.precision),
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self {
            value: self.value.clone() * other.value.clone(),
            exponent: self.exponent + other.exponent,
            precision: self.precision.max(other.precision),
        }
    }

    /// Number of bits in `|value|`, zero for zero.
    pub fn magnitude_bits(&self) -> usize {
        self.value.clone().into_parts().1.bit_len()
    }

    /// `floor(log2 |self|)`, or `None` for zero.
    pub fn log2_floor(&self) -> Option<i64> {
        let bits = self.magnitude_bits();
        if bits == 0 {
            return None;
        }
        Some(bits as i64 - 1 + self.exponent as i64)
    }

    /// Split `|value|` into 31-bit limbs, least significant first.
    pub(crate) fn to_limbs(&self) -> Result<(Sign, Vec<u32>), FpError> {
        let (sign, mut magnitude) = self.value.clone().into_parts();
        let mask = UBig::from(LOW31_BITS_SET);

        let mut limbs = Vec::with_capacity(magnitude.bit_len().div_ceil(EFFECTIVE_BITS_PER_LIMB));
        while !magnitude.is_zero() {
            let digit = u32::try_from(&magnitude & &mask)
                .map_err(|e| FpError::TwosComplement(format!("limb split failed: {e}")))?;
            limbs.push(digit);
            magnitude >>= EFFECTIVE_BITS_PER_LIMB;
        }
        Ok((sign, limbs))
    }

    /// Inverse of [`Self::to_limbs`].
    pub(crate) fn from_limbs(sign: Sign, limbs: &[u32], exponent: i32, precision: u32) -> Self {
        let mut value = IBig::ZERO;
        for limb in limbs.iter().rev() {
            value = (value << EFFECTIVE_BITS_PER_LIMB) + IBig::from(*limb & LOW31_BITS_SET);
        }
        if sign == Sign::Negative {
            value = -value;
        }
        Self {
            value,
            exponent,
            precision,
        }
    }

    fn aligned(&self, other: &Self) -> (IBig, IBig, i32) {
        let exponent = self.exponent.min(other.exponent);
        let a = self.value.clone() << (self.exponent - exponent) as usize;
        let b = other.value.clone() << (other.exponent - exponent) as usize;
        (a, b, exponent)
    }
}

/// Bit length of a little-endian run of 31-bit limbs.
pub(crate) fn bit_length(limbs: &[u32]) -> usize {
    match limbs.iter().rposition(|&l| l != 0) {
        Some(top) => {
            top * EFFECTIVE_BITS_PER_LIMB + (32 - limbs[top].leading_zeros() as usize)
        }
        None => 0,
    }
}

impl PartialEq for RValue {
    /// Numeric equality; representation and precision are ignored.
    fn eq(&self, other: &Self) -> bool {
        let (a, b, _) = self.aligned(other);
        a == b
    }
}

impl Eq for RValue {}

impl fmt::Display for RValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

// Serialization helper: the integer travels as a decimal string so no precision is lost.
#[derive(Serialize, Deserialize)]
struct RValueSerde {
    value: String,
    exponent: i32,
    precision: u32,
}

impl Serialize for RValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let serde = RValueSerde {
            value: self.value.to_string(),
            exponent: self.exponent,
            precision: self.precision,
        };
        serde.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let serde = RValueSerde::deserialize(deserializer)?;
        let value = serde
            .value
            .parse::<IBig>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse IBig: {}", e)))?;
        Ok(Self {
            value,
            exponent: serde.exponent,
            precision: serde.precision,
        })
    }
}
