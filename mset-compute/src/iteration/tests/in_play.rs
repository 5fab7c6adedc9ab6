use super::helpers::{format, mixed_row, row_decks, THRESHOLD};
use crate::iteration::{IterationState, RowIterator};
use crate::lanes::LANES;

#[test]
fn in_play_list_only_shrinks() {
    // three vectors: the first all interior, the others mostly escaping
    let mut points = vec![(0.0, 0.0); LANES];
    points.extend(mixed_row());
    let (cr, ci) = row_decks(&points);
    let mut rows = RowIterator::new(format(), points.len(), 200, THRESHOLD).unwrap();
    assert_eq!(rows.state(), IterationState::NotStarted);

    rows.begin(&cr, &ci).unwrap();
    assert_eq!(rows.state(), IterationState::Iterating);
    let mut previous = rows.in_play_list().to_vec();
    assert_eq!(previous, vec![0, 1, 2]);

    while rows.step().unwrap() {
        let current = rows.in_play_list().to_vec();
        assert!(current.windows(2).all(|w| w[0] < w[1]));
        assert!(current.iter().all(|i| previous.contains(i)));
        previous = current;
    }

    assert!(rows.in_play_list().is_empty());
    assert_eq!(rows.state(), IterationState::AllEscapedOrDone);
    assert!(!rows.step().unwrap());

    let result = rows.result(false).unwrap();
    assert!(result.counts[..LANES].iter().all(|&c| c == 200));
}

#[test]
fn padding_lanes_do_not_keep_a_vector_alive() {
    // ten points: the second vector holds two real lanes and six padding lanes
    let points = vec![(2.0, 2.0); 10];
    let (cr, ci) = row_decks(&points);
    let mut rows = RowIterator::new(format(), points.len(), 50, THRESHOLD).unwrap();
    assert_eq!(rows.value_count(), 2 * LANES);

    rows.begin(&cr, &ci).unwrap();
    assert_eq!(rows.state(), IterationState::AllEscapedOrDone);

    let result = rows.result(false).unwrap();
    assert_eq!(result.counts, vec![1; 10]);
    assert_eq!(result.escaped_flags, vec![true; 10]);
}

#[test]
fn op_counts_accumulate_per_lane_in_play() {
    let points = vec![(2.0, 2.0); LANES];
    let (cr, ci) = row_decks(&points);
    let mut rows = RowIterator::new(format(), points.len(), 50, THRESHOLD).unwrap();
    rows.iterate_row(&cr, &ci, false).unwrap();

    // the first iterate only: two squarings and one addition per lane
    let counts = rows.op_counts();
    assert_eq!(counts.squarings, 2 * LANES as u64);
    assert_eq!(counts.additions, LANES as u64);
    assert_eq!(counts.comparisons, LANES as u64);
}

#[test]
fn result_is_stable_between_calls() {
    let points = mixed_row();
    let (cr, ci) = row_decks(&points);
    let mut rows = RowIterator::new(format(), points.len(), 30, THRESHOLD).unwrap();
    rows.iterate_row(&cr, &ci, false).unwrap();
    assert_eq!(rows.result(true).unwrap(), rows.result(true).unwrap());
}

#[test]
fn target_out_of_range_is_rejected() {
    assert!(RowIterator::new(format(), 8, 0, THRESHOLD).is_err());
    assert!(RowIterator::new(format(), 8, 70_000, THRESHOLD).is_err());
    assert!(RowIterator::new(format(), 8, 1_000, 500).is_err());
}
