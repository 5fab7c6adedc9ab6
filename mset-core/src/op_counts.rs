use serde::{Deserialize, Serialize};

/// Operation and carry counters kept for performance telemetry.
///
/// Counts are per value for scalar math and per lane for vector math, so the
/// two produce identical totals for the same batch of inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathOpCounts {
    pub additions: u64,
    pub subtractions: u64,
    pub multiplications: u64,
    pub squarings: u64,
    pub negations: u64,
    pub conversions: u64,
    pub splits: u64,
    pub comparisons: u64,
    /// Limb-level carries out of additions and subtractions.
    pub a_carries: u64,
    /// Limb-level carries while summing partial products.
    pub m_carries: u64,
}

impl MathOpCounts {
    pub fn merge(&mut self, other: &MathOpCounts) {
        self.additions += other.additions;
        self.subtractions += other.subtractions;
        self.multiplications += other.multiplications;
        self.squarings += other.squarings;
        self.negations += other.negations;
        self.conversions += other.conversions;
        self.splits += other.splits;
        self.comparisons += other.comparisons;
        self.a_carries += other.a_carries;
        self.m_carries += other.m_carries;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_every_counter() {
        let mut a = MathOpCounts {
            additions: 1,
            a_carries: 2,
            ..Default::default()
        };
        let b = MathOpCounts {
            additions: 3,
            squarings: 4,
            m_carries: 5,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.additions, 4);
        assert_eq!(a.squarings, 4);
        assert_eq!(a.a_carries, 2);
        assert_eq!(a.m_carries, 5);

        a.reset();
        assert_eq!(a, MathOpCounts::default());
    }
}
