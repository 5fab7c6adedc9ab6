use crate::deck::FP31Deck;
use crate::scalar_iteration::{iterate_point, PointResult};
use mset_core::{FPValue, FixedPointFormat, RValue, ScalarMath};

pub const THRESHOLD: u32 = 4;

pub fn format() -> FixedPointFormat {
    FixedPointFormat::new(8, 2).unwrap()
}

pub fn fp(v: f64) -> FPValue {
    FPValue::create(&RValue::from_f64(v).unwrap(), &format()).unwrap()
}

/// cr and ci decks for a row of points given as (re, im).
pub fn row_decks(points: &[(f64, f64)]) -> (FP31Deck, FP31Deck) {
    let cr: Vec<FPValue> = points.iter().map(|&(re, _)| fp(re)).collect();
    let ci: Vec<FPValue> = points.iter().map(|&(_, im)| fp(im)).collect();
    (
        FP31Deck::from_values(&cr).unwrap(),
        FP31Deck::from_values(&ci).unwrap(),
    )
}

/// Reference results from the scalar path.
pub fn scalar_results(points: &[(f64, f64)], target: u16) -> Vec<PointResult> {
    let mut math = ScalarMath::new(format(), THRESHOLD).unwrap();
    points
        .iter()
        .map(|&(re, im)| iterate_point(&mut math, &fp(re), &fp(im), target).unwrap())
        .collect()
}

/// A row mixing quick escapes, slow escapes and interior points.
pub fn mixed_row() -> Vec<(f64, f64)> {
    vec![
        (0.0, 0.0),
        (2.0, 2.0),
        (-0.5, 0.5),
        (0.5, 0.0),
        (-2.0, 0.0),
        (-1.75, 0.0),
        (0.25, 0.5),
        (-0.75, 0.125),
        (0.375, -0.25),
        (-1.25, 0.25),
        (1.0, 0.0),
        (-0.125, 0.75),
        (0.28125, 0.0078125),
    ]
}
