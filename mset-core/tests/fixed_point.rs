use dashu::integer::IBig;
use mset_core::twos_complement::{convert_from_2c, convert_to_2c, negate};
use mset_core::{FPValue, FixedPointFormat, FpError, RValue, ScalarMath};

fn format(limbs: usize) -> FixedPointFormat {
    FixedPointFormat::new(8, limbs).unwrap()
}

/// Dyadic values spread across the representable range of an 8-bit integer part.
fn samples() -> Vec<RValue> {
    vec![
        RValue::zero(),
        RValue::from_integer(1),
        RValue::from_integer(-1),
        RValue::from_integer(127).sub(&RValue::new(IBig::from(1), -40)),
        RValue::new(IBig::from(-3), -1),
        RValue::new(IBig::from(0x1234_5678_9abc_i64), -50),
        RValue::new(IBig::from(-0x0fed_cba9_8765_i64), -45),
        RValue::new(IBig::from(1), -80),
    ]
}

// ============================================================================
// Create / to_rvalue round trips
// ============================================================================

#[test]
fn representable_values_round_trip_exactly() {
    let format = format(3);
    for value in samples() {
        let fp = FPValue::create(&value, &format).unwrap();
        assert_eq!(fp.to_rvalue().unwrap(), value, "value {}", value.to_f64());
    }
}

#[test]
fn extra_fraction_bits_truncate_toward_zero() {
    let format = format(1);
    // 23 fractional bits; 2^-30 is below the last bit
    let tiny = RValue::new(IBig::from(1), -30);
    assert!(FPValue::create(&tiny, &format).unwrap().is_zero());
    assert!(FPValue::create(&tiny.neg(), &format).unwrap().is_zero());

    let value = RValue::from_integer(1).add(&tiny);
    let fp = FPValue::create(&value, &format).unwrap();
    assert_eq!(fp.to_rvalue().unwrap(), RValue::from_integer(1));
}

#[test]
fn magnitude_beyond_integer_bits_is_rejected() {
    let result = FPValue::create(&RValue::from_integer(128), &format(2));
    assert!(matches!(result, Err(FpError::FormatCapacity { .. })));
    assert!(FPValue::create(&RValue::from_integer(-128), &format(2)).is_err());
}

// ============================================================================
// Two's complement
// ============================================================================

#[test]
fn two_complement_conversion_is_an_involution() {
    let format = format(3);
    for value in samples() {
        let fp = FPValue::create(&value, &format).unwrap();
        let (sign, magnitude) = convert_from_2c(fp.mantissa()).unwrap();
        assert_eq!(convert_to_2c(&magnitude, sign).unwrap(), fp.mantissa());
    }
}

#[test]
fn negation_is_an_involution() {
    let format = format(2);
    for value in samples() {
        let Ok(fp) = FPValue::create(&value, &format) else {
            continue;
        };
        let twice = fp.negate().unwrap().negate().unwrap();
        assert_eq!(twice, fp);
        assert_eq!(fp.negate().unwrap().to_rvalue().unwrap(), fp.to_rvalue().unwrap().neg());
    }
}

#[test]
fn most_negative_value_cannot_be_negated() {
    let most_negative = [0u32, 0xC000_0000];
    assert!(matches!(negate(&most_negative), Err(FpError::Overflow { .. })));

    let fp = FPValue::from_mantissa(most_negative.to_vec(), &format(2), 53).unwrap();
    assert!(fp.is_negative());
    assert!(fp.negate().is_err());
}

#[test]
fn reserved_bit_mismatch_is_reported() {
    // lower limb with the reserved bit set
    assert!(matches!(
        convert_from_2c(&[0x8000_0000, 0]),
        Err(FpError::ReservedBit { .. })
    ));
    // MSL whose reserved bit disagrees with the sign bit
    assert!(convert_from_2c(&[0, 0x4000_0000]).is_err());
}

// ============================================================================
// Scalar arithmetic against exact rationals
// ============================================================================

#[test]
fn scalar_results_match_exact_arithmetic() {
    let mut math = ScalarMath::new(format(3), 4).unwrap();
    let a_r = RValue::new(IBig::from(-0x5_5555_5555_i64), -35);
    let b_r = RValue::new(IBig::from(0x3_3333_3333_i64), -34);
    let a = math.create_fp_value(&a_r).unwrap();
    let b = math.create_fp_value(&b_r).unwrap();

    let sum = math.add(&a, &b).unwrap();
    assert_eq!(math.get_rvalue(&sum).unwrap(), a_r.add(&b_r));

    let diff = math.sub(&a, &b).unwrap();
    assert_eq!(math.get_rvalue(&diff).unwrap(), a_r.sub(&b_r));

    // 69 fractional bits fit in 3 limbs with 8 integer bits
    let product = math.multiply(&a, &b).unwrap();
    assert_eq!(math.get_rvalue(&product).unwrap(), a_r.mul(&b_r));

    let square = math.square(&a).unwrap();
    assert_eq!(math.get_rvalue(&square).unwrap(), a_r.mul(&a_r));

    let counts = math.counts();
    assert_eq!(counts.conversions, 6);
    assert_eq!((counts.additions, counts.subtractions), (1, 1));
    assert_eq!((counts.multiplications, counts.squarings), (1, 1));
}

#[test]
fn threshold_compare_is_exact_at_the_boundary() {
    let mut math = ScalarMath::new(format(2), 4).unwrap();
    let just_below = RValue::from_integer(4).sub(&RValue::new(IBig::from(1), -54));
    let below = math.create_fp_value(&just_below).unwrap();
    let at = math.create_fp_value(&RValue::from_integer(4)).unwrap();
    let negative = math.create_fp_value(&RValue::from_integer(-100)).unwrap();

    assert!(!math.is_greater_or_equal_than_threshold(&below).unwrap());
    assert!(math.is_greater_or_equal_than_threshold(&at).unwrap());
    assert!(!math.is_greater_or_equal_than_threshold(&negative).unwrap());
}
