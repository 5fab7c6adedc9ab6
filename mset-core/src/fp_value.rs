use crate::error::{limbs_to_hex, FpError};
use crate::format::FixedPointFormat;
use crate::rvalue::{bit_length, RValue};
use crate::twos_complement;
use dashu_base::Sign;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed fixed-point number held as 31-bit two's complement limbs.
///
/// The value is `mantissa * 2^exponent`; the exponent always equals the
/// format's target exponent. Values are immutable once built; operations
/// return new values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FPValueSerde")]
pub struct FPValue {
    mantissa: Vec<u32>,
    exponent: i32,
    format: FixedPointFormat,
    precision: u32,
}

// Deserialization goes through `from_mantissa` so stored limbs are validated.
#[derive(Deserialize)]
struct FPValueSerde {
    mantissa: Vec<u32>,
    exponent: i32,
    format: FixedPointFormat,
    precision: u32,
}

impl TryFrom<FPValueSerde> for FPValue {
    type Error = FpError;

    fn try_from(raw: FPValueSerde) -> Result<Self, Self::Error> {
        if raw.exponent != raw.format.target_exponent() {
            return Err(FpError::InvalidFormat(format!(
                "exponent {} does not match format {}",
                raw.exponent, raw.format
            )));
        }
        Self::from_mantissa(raw.mantissa, &raw.format, raw.precision)
    }
}

impl FPValue {
    /// Convert a rational into `format`.
    ///
    /// Bits below the format's least significant bit are truncated toward
    /// zero. Fails if the magnitude needs more than `bits_before_binary_point - 1`
    /// integer bits.
    pub fn create(rvalue: &RValue, format: &FixedPointFormat) -> Result<Self, FpError> {
        let target_exponent = format.target_exponent();
        let shift = rvalue.exponent() as i64 - target_exponent as i64;

        let needed_bits = rvalue.magnitude_bits() as i64 + shift;
        if needed_bits > format.max_magnitude_bits() as i64 {
            return Err(FpError::FormatCapacity {
                needed_bits: needed_bits.max(0) as usize,
                max_bits: format.max_magnitude_bits(),
                format: format.to_string(),
            });
        }

        let negative = rvalue.is_negative();
        let magnitude = if negative {
            -rvalue.value().clone()
        } else {
            rvalue.value().clone()
        };
        let magnitude = if shift >= 0 {
            magnitude << shift as usize
        } else {
            magnitude >> (-shift) as usize
        };
        let aligned = RValue::new(if negative { -magnitude } else { magnitude }, target_exponent);

        let (sign, mut limbs) = aligned.to_limbs()?;
        limbs.resize(format.limb_count(), 0);
        let mantissa = twos_complement::convert_to_2c(&limbs, sign)?;

        Ok(Self {
            mantissa,
            exponent: target_exponent,
            format: *format,
            precision: rvalue.precision(),
        })
    }

    pub fn zero(format: &FixedPointFormat) -> Self {
        Self {
            mantissa: vec![0; format.limb_count()],
            exponent: format.target_exponent(),
            format: *format,
            precision: crate::rvalue::DEFAULT_PRECISION,
        }
    }

    /// Wrap limbs that are already encoded, checking the reserved bits.
    pub fn from_mantissa(
        mantissa: Vec<u32>,
        format: &FixedPointFormat,
        precision: u32,
    ) -> Result<Self, FpError> {
        if mantissa.len() != format.limb_count() {
            return Err(FpError::DimensionMismatch(format!(
                "expected {} limbs, got {}",
                format.limb_count(),
                mantissa.len()
            )));
        }
        twos_complement::check_reserved_bits(&mantissa, "building a value")?;
        Ok(Self {
            mantissa,
            exponent: format.target_exponent(),
            format: *format,
            precision,
        })
    }

    pub fn mantissa(&self) -> &[u32] {
        &self.mantissa
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn format(&self) -> &FixedPointFormat {
        &self.format
    }

    pub fn bits_before_binary_point(&self) -> u8 {
        self.format.bits_before_binary_point()
    }

    pub fn limb_count(&self) -> usize {
        self.mantissa.len()
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn sign(&self) -> Sign {
        twos_complement::sign_of(&self.mantissa)
    }

    pub fn is_negative(&self) -> bool {
        self.sign() == Sign::Negative
    }

    pub fn is_zero(&self) -> bool {
        twos_complement::is_zero(&self.mantissa)
    }

    /// Exact inverse of [`Self::create`] for representable values.
    pub fn to_rvalue(&self) -> Result<RValue, FpError> {
        let (sign, magnitude) = twos_complement::convert_from_2c(&self.mantissa)?;
        Ok(RValue::from_limbs(sign, &magnitude, self.exponent, self.precision))
    }

    pub fn negate(&self) -> Result<Self, FpError> {
        Ok(Self {
            mantissa: twos_complement::negate(&self.mantissa)?,
            ..self.clone()
        })
    }

    /// Significant bits in the magnitude.
    pub fn magnitude_bits(&self) -> Result<usize, FpError> {
        let (_, magnitude) = twos_complement::convert_from_2c(&self.mantissa)?;
        Ok(bit_length(&magnitude))
    }
}

impl fmt::Display for FPValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rvalue() {
            Ok(r) => write!(f, "{} [{}]", r.to_f64(), limbs_to_hex(&self.mantissa)),
            Err(_) => write!(f, "<invalid> [{}]", limbs_to_hex(&self.mantissa)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::LOW31_BITS_SET;
    use dashu::integer::IBig;

    fn format() -> FixedPointFormat {
        FixedPointFormat::new(8, 2).unwrap()
    }

    #[test]
    fn create_and_back_is_lossless() {
        for v in [0.0, 1.0, -1.0, 0.5, -0.75, 2.0, -2.0, 3.999, -127.5, 1.0 / 1024.0] {
            let r = RValue::from_f64(v).unwrap();
            let fp = FPValue::create(&r, &format()).unwrap();
            assert_eq!(fp.to_rvalue().unwrap(), r, "value {v}");
        }
    }

    #[test]
    fn small_doubles_need_enough_fraction_bits() {
        // 1e-15 carries bits down to about 2^-102
        let r = RValue::from_f64(1.0e-15).unwrap();
        let wide = FixedPointFormat::new(8, 4).unwrap();
        let fp = FPValue::create(&r, &wide).unwrap();
        assert_eq!(fp.to_rvalue().unwrap(), r);

        let narrow = FPValue::create(&r, &format()).unwrap();
        assert_ne!(narrow.to_rvalue().unwrap(), r);
    }

    #[test]
    fn deserialize_validates_limbs() {
        let fp = FPValue::create(&RValue::from_f64(-0.75).unwrap(), &format()).unwrap();
        let mut json: serde_json::Value = serde_json::to_value(&fp).unwrap();
        assert_eq!(serde_json::from_value::<FPValue>(json.clone()).unwrap(), fp);

        let limb = json["mantissa"][0].as_u64().unwrap();
        json["mantissa"][0] = serde_json::json!(limb | 0x8000_0000);
        assert!(serde_json::from_value::<FPValue>(json).is_err());
    }

    #[test]
    fn deserialize_validates_format_and_exponent() {
        let fp = FPValue::create(&RValue::from_f64(1.5).unwrap(), &format()).unwrap();
        let json: serde_json::Value = serde_json::to_value(&fp).unwrap();

        let mut bad_exponent = json.clone();
        bad_exponent["exponent"] = serde_json::json!(-3);
        assert!(serde_json::from_value::<FPValue>(bad_exponent).is_err());

        let mut bad_format = json;
        bad_format["format"]["bits_before_binary_point"] = serde_json::json!(31);
        assert!(serde_json::from_value::<FPValue>(bad_format).is_err());
    }

    #[test]
    fn create_rejects_values_beyond_integer_bits() {
        let err = FPValue::create(&RValue::from_integer(128), &format()).unwrap_err();
        assert!(matches!(err, FpError::FormatCapacity { .. }));
        assert!(FPValue::create(&RValue::from_integer(-128), &format()).is_err());
        assert!(FPValue::create(&RValue::from_integer(127), &format()).is_ok());
    }

    #[test]
    fn create_truncates_extra_fraction_bits_toward_zero() {
        let tiny = RValue::new(IBig::from(3), -56);
        let fp = FPValue::create(&tiny, &format()).unwrap();
        assert!(fp.is_zero());

        let negative = RValue::new(IBig::from(-5), -55);
        let fp = FPValue::create(&negative, &format()).unwrap();
        assert_eq!(fp.to_rvalue().unwrap(), RValue::new(IBig::from(-2), -54));
    }

    #[test]
    fn sign_is_read_from_bit_30() {
        let fp = FPValue::create(&RValue::from_f64(-0.5).unwrap(), &format()).unwrap();
        assert!(fp.is_negative());
        assert_eq!(fp.mantissa()[1] >> 31, 1);
        assert_eq!((fp.mantissa()[1] & LOW31_BITS_SET) >> 30, 1);
    }

    #[test]
    fn negation_round_trips() {
        let fp = FPValue::create(&RValue::from_f64(-1.25).unwrap(), &format()).unwrap();
        let neg = fp.negate().unwrap();
        assert_eq!(neg.to_rvalue().unwrap(), RValue::from_f64(1.25).unwrap());
        assert_eq!(neg.negate().unwrap(), fp);
    }

    #[test]
    fn from_mantissa_checks_limb_count() {
        assert!(FPValue::from_mantissa(vec![0; 3], &format(), 53).is_err());
        assert!(FPValue::from_mantissa(vec![0, 0x8000_0000], &format(), 53).is_err());
    }
}
