//! Single-point iteration with scalar math.
//!
//! Runs the same recurrence and the same operation order as the row driver,
//! so its counts and final z match the vector path bit for bit.

use mset_core::{FPValue, FpError, ScalarMath, ZValue};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointResult {
    pub count: u16,
    pub escaped: bool,
    pub z: ZValue,
}

/// Escape-time count for `c = cr + ci·i`.
pub fn iterate_point(
    math: &mut ScalarMath,
    cr: &FPValue,
    ci: &FPValue,
    target_iterations: u16,
) -> Result<PointResult, FpError> {
    let mut zr = cr.clone();
    let mut zi = ci.clone();
    let mut zr_sqr = math.square(&zr)?;
    let mut zi_sqr = math.square(&zi)?;
    let mut sum = math.add(&zr_sqr, &zi_sqr)?;

    let mut count: u16 = 1;
    let mut escaped = math.is_greater_or_equal_than_threshold(&sum)?;

    while !escaped && count < target_iterations {
        let zr_zi = math.add(&zr, &zi)?;
        let zr_zi_sqr = math.square(&zr_zi)?;
        let temp = math.sub(&zr_zi_sqr, &zr_sqr)?;
        let zr_zi_2 = math.sub(&temp, &zi_sqr)?;
        zi = math.add(&zr_zi_2, ci)?;

        let temp = math.sub(&zr_sqr, &zi_sqr)?;
        zr = math.add(&temp, cr)?;

        zr_sqr = math.square(&zr)?;
        zi_sqr = math.square(&zi)?;
        sum = math.add(&zr_sqr, &zi_sqr)?;

        count += 1;
        escaped = math.is_greater_or_equal_than_threshold(&sum)?;
    }

    Ok(PointResult {
        count,
        escaped,
        z: ZValue { re: zr, im: zi },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mset_core::{FixedPointFormat, RValue};

    fn math() -> ScalarMath {
        ScalarMath::new(FixedPointFormat::new(8, 2).unwrap(), 4).unwrap()
    }

    fn point(math: &mut ScalarMath, re: f64, im: f64, target: u16) -> PointResult {
        let cr = math.create_fp_value(&RValue::from_f64(re).unwrap()).unwrap();
        let ci = math.create_fp_value(&RValue::from_f64(im).unwrap()).unwrap();
        iterate_point(math, &cr, &ci, target).unwrap()
    }

    #[test]
    fn origin_never_escapes() {
        let mut m = math();
        let result = point(&mut m, 0.0, 0.0, 100);
        assert_eq!(result.count, 100);
        assert!(!result.escaped);
        assert!(result.z.re.is_zero());
    }

    #[test]
    fn far_point_escapes_on_first_iteration() {
        let mut m = math();
        let result = point(&mut m, 2.0, 2.0, 100);
        assert_eq!(result.count, 1);
        assert!(result.escaped);
    }

    #[test]
    fn known_escape_counts() {
        let mut m = math();
        // c = 1: z = 1, 2, 5 -> |z|² reaches 4 at the second iterate
        assert_eq!(point(&mut m, 1.0, 0.0, 100).count, 2);
        // |c|² = 4 already meets the threshold
        let tip = point(&mut m, -2.0, 0.0, 20);
        assert!(tip.escaped);
        assert_eq!(tip.count, 1);
        // c = 0.5: 0.5, 0.75, 1.0625, 1.62890625, 3.15... escapes at the fifth
        assert_eq!(point(&mut m, 0.5, 0.0, 100).count, 5);
    }

    #[test]
    fn cardioid_point_runs_to_target() {
        let mut m = math();
        let result = point(&mut m, -0.5, 0.5, 50);
        assert_eq!(result.count, 50);
        assert!(!result.escaped);
    }
}
