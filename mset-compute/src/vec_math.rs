//! Lane-parallel fixed-point arithmetic over decks.
//!
//! Every kernel uses the same limb algorithms as `mset_core::scalar_math`,
//! applied to `LANES` values at once, and only visits the vector positions in
//! the in-play list. Carries move from limb to limb inside a lane; lanes never
//! exchange carries.
//!
//! Lanes whose done flag is set are still computed (a vector position retires
//! only when all of its lanes are done) but an overflow in such a lane is
//! ignored.

use crate::deck::FP31Deck;
use crate::lanes::{vector_count, LimbVector, WideVector, LANES};
use mset_core::{
    FPValue, FixedPointFormat, FpError, MathOpCounts, RValue, LOW31_BITS_SET, TEST_BIT_30,
};
use std::cmp::Ordering;

const ZERO: LimbVector = [0; LANES];
const WIDE_ZERO: WideVector = [0; LANES];

pub struct FP31VecMath {
    format: FixedPointFormat,
    value_count: usize,
    threshold: Vec<u32>,
    in_play_list: Vec<usize>,
    done_flags: Vec<bool>,
    // Scratch for one vector position, reused by every multiply.
    magnitude_a: Vec<LimbVector>,
    magnitude_b: Vec<LimbVector>,
    bins: Vec<WideVector>,
    product: Vec<LimbVector>,
    counts: MathOpCounts,
}

impl FP31VecMath {
    pub fn new(format: FixedPointFormat, value_count: usize, threshold: u32) -> Result<Self, FpError> {
        if threshold > format.max_integer_value() {
            return Err(FpError::FormatCapacity {
                needed_bits: (32 - threshold.leading_zeros()) as usize,
                max_bits: format.bits_before_binary_point() as usize - 1,
                format: format.to_string(),
            });
        }
        let threshold = FPValue::create(&RValue::from_integer(threshold as i64), &format)?
            .mantissa()
            .to_vec();

        let n = format.limb_count();
        let value_count = vector_count(value_count) * LANES;
        let mut engine = Self {
            format,
            value_count,
            threshold,
            in_play_list: Vec::new(),
            done_flags: vec![false; value_count],
            magnitude_a: vec![ZERO; n],
            magnitude_b: vec![ZERO; n],
            bins: vec![WIDE_ZERO; 2 * n],
            product: vec![ZERO; 2 * n],
            counts: MathOpCounts::default(),
        };
        engine.reset();
        Ok(engine)
    }

    /// Put every vector back in play and clear all done flags.
    pub fn reset(&mut self) {
        self.in_play_list = (0..self.vector_count()).collect();
        self.done_flags.fill(false);
    }

    pub fn format(&self) -> &FixedPointFormat {
        &self.format
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn vector_count(&self) -> usize {
        self.value_count / LANES
    }

    pub fn counts(&self) -> &MathOpCounts {
        &self.counts
    }

    pub fn in_play_list(&self) -> &[usize] {
        &self.in_play_list
    }

    /// Replace the in-play list. The new list must be sorted, free of
    /// duplicates and a subset of the current one.
    pub fn set_in_play_list(&mut self, list: Vec<usize>) -> Result<(), FpError> {
        let ordered = list.windows(2).all(|w| w[0] < w[1]);
        let subset = list.iter().all(|i| self.in_play_list.binary_search(i).is_ok());
        if !ordered || !subset {
            return Err(FpError::DimensionMismatch(format!(
                "in-play list {list:?} is not an ordered subset of {:?}",
                self.in_play_list
            )));
        }
        self.in_play_list = list;
        Ok(())
    }

    /// Drop vector positions from the in-play list.
    pub fn retire_vectors(&mut self, retired: &[usize]) {
        if !retired.is_empty() {
            self.in_play_list.retain(|i| !retired.contains(i));
        }
    }

    /// Keep only vector positions with at least one lane not done.
    pub fn rebuild_in_play_list(&mut self) {
        let done = &self.done_flags;
        self.in_play_list
            .retain(|&idx| done[idx * LANES..(idx + 1) * LANES].iter().any(|d| !d));
    }

    pub fn done_flags(&self) -> &[bool] {
        &self.done_flags
    }

    pub fn mark_done(&mut self, index: usize) -> Result<(), FpError> {
        match self.done_flags.get_mut(index) {
            Some(flag) => {
                *flag = true;
                Ok(())
            }
            None => Err(FpError::DimensionMismatch(format!(
                "lane {index} is outside an engine of {} values",
                self.value_count
            ))),
        }
    }

    pub fn add(&mut self, a: &FP31Deck, b: &FP31Deck, c: &mut FP31Deck) -> Result<(), FpError> {
        self.check_decks(&[a, b, &*c])?;
        self.counts.additions += self.lanes_in_play();
        self.add_or_sub(a, b, c, false, "adding")
    }

    pub fn sub(&mut self, a: &FP31Deck, b: &FP31Deck, c: &mut FP31Deck) -> Result<(), FpError> {
        self.check_decks(&[a, b, &*c])?;
        self.counts.subtractions += self.lanes_in_play();
        self.add_or_sub(a, b, c, true, "subtracting")
    }

    pub fn square(&mut self, a: &FP31Deck, c: &mut FP31Deck) -> Result<(), FpError> {
        self.check_decks(&[a, &*c])?;
        self.counts.squarings += self.lanes_in_play();
        let n = self.format.limb_count();

        for pos in 0..self.in_play_list.len() {
            let idx = self.in_play_list[pos];
            load_magnitude(a, idx, &mut self.magnitude_a);

            self.bins.fill(WIDE_ZERO);
            for i in 0..n {
                for j in 0..=i {
                    let (x, y) = (&self.magnitude_a[j], &self.magnitude_a[i]);
                    let doubled = u32::from(i > j);
                    let (lo_bin, hi_bin) = (i + j, i + j + 1);
                    for l in 0..LANES {
                        let product = (x[l] as u64 * y[l] as u64) << doubled;
                        self.bins[lo_bin][l] += product & LOW31_BITS_SET as u64;
                        self.bins[hi_bin][l] += product >> 31;
                    }
                    self.counts.splits += LANES as u64;
                }
            }

            self.sum_the_partials();
            self.check_product_overflow(idx, "squaring")?;
            for k in 0..n {
                c.limb_vectors_mut(k)[idx] = self.shifted_limb(k);
            }
        }
        Ok(())
    }

    pub fn multiply(&mut self, a: &FP31Deck, b: &FP31Deck, c: &mut FP31Deck) -> Result<(), FpError> {
        self.check_decks(&[a, b, &*c])?;
        self.counts.multiplications += self.lanes_in_play();
        let n = self.format.limb_count();

        for pos in 0..self.in_play_list.len() {
            let idx = self.in_play_list[pos];
            let sign_a = load_magnitude(a, idx, &mut self.magnitude_a);
            let sign_b = load_magnitude(b, idx, &mut self.magnitude_b);

            self.bins.fill(WIDE_ZERO);
            for j in 0..n {
                for i in 0..n {
                    let (x, y) = (&self.magnitude_a[j], &self.magnitude_b[i]);
                    for l in 0..LANES {
                        let product = x[l] as u64 * y[l] as u64;
                        self.bins[i + j][l] += product & LOW31_BITS_SET as u64;
                        self.bins[i + j + 1][l] += product >> 31;
                    }
                    self.counts.splits += LANES as u64;
                }
            }

            self.sum_the_partials();
            self.check_product_overflow(idx, "multiplying")?;

            // Negate lanes whose operand signs differ.
            let mut flip = ZERO;
            let mut carry = ZERO;
            for l in 0..LANES {
                flip[l] = (sign_a[l] ^ sign_b[l]) * LOW31_BITS_SET;
                carry[l] = flip[l] & 1;
            }
            for k in 0..n {
                let shifted = self.shifted_limb(k);
                let mut r = ZERO;
                for l in 0..LANES {
                    let x = (shifted[l] ^ flip[l]) + carry[l];
                    r[l] = x & LOW31_BITS_SET;
                    carry[l] = x >> 31;
                }
                if k == n - 1 {
                    sign_extend(&mut r);
                }
                c.limb_vectors_mut(k)[idx] = r;
            }
        }
        Ok(())
    }

    /// Per lane `value >= threshold`, written into `flags` for every lane of
    /// every in-play vector.
    pub fn is_greater_or_equal_than_threshold(
        &mut self,
        a: &FP31Deck,
        flags: &mut [bool],
    ) -> Result<(), FpError> {
        self.check_decks(&[a])?;
        if flags.len() != self.value_count {
            return Err(FpError::DimensionMismatch(format!(
                "{} flags for {} values",
                flags.len(),
                self.value_count
            )));
        }
        self.counts.comparisons += self.lanes_in_play();
        let n = self.format.limb_count();
        let t_msl = self.threshold[n - 1] as i32;

        for &idx in &self.in_play_list {
            let msl = a.limb_vectors(n - 1)[idx];
            for l in 0..LANES {
                let index = idx * LANES + l;
                let mut ordering = (msl[l] as i32).cmp(&t_msl);
                let mut j = n - 1;
                while ordering == Ordering::Equal && j > 0 {
                    j -= 1;
                    ordering = a.limb_values(j)[index].cmp(&self.threshold[j]);
                }
                flags[index] = ordering != Ordering::Less;
            }
        }
        Ok(())
    }

    fn add_or_sub(
        &mut self,
        a: &FP31Deck,
        b: &FP31Deck,
        c: &mut FP31Deck,
        subtract: bool,
        operation: &'static str,
    ) -> Result<(), FpError> {
        let n = self.format.limb_count();
        // a - b is a + !b + 1: complement through the effective bits of lower
        // limbs and all 32 bits of the sign-extended MSL.
        let (lower_flip, msl_flip) = if subtract {
            (LOW31_BITS_SET, u32::MAX)
        } else {
            (0, 0)
        };

        for &idx in &self.in_play_list {
            let mut carry = [u32::from(subtract); LANES];
            for j in 0..n - 1 {
                let x = a.limb_vectors(j)[idx];
                let y = b.limb_vectors(j)[idx];
                let mut r = ZERO;
                for l in 0..LANES {
                    let sum = x[l]
                        .wrapping_add(y[l] ^ lower_flip)
                        .wrapping_add(carry[l]);
                    r[l] = sum & LOW31_BITS_SET;
                    carry[l] = sum >> 31;
                }
                self.counts.a_carries += carry.iter().map(|&c| c as u64).sum::<u64>();
                c.limb_vectors_mut(j)[idx] = r;
            }

            let x = a.limb_vectors(n - 1)[idx];
            let y = b.limb_vectors(n - 1)[idx];
            let mut r = ZERO;
            for l in 0..LANES {
                r[l] = x[l].wrapping_add(y[l] ^ msl_flip).wrapping_add(carry[l]);
            }
            c.limb_vectors_mut(n - 1)[idx] = r;

            for (l, msl) in r.iter().enumerate() {
                let overflow = (msl >> 31) != ((msl >> 30) & 1);
                let index = idx * LANES + l;
                if overflow && !self.done_flags[index] {
                    return Err(FpError::Overflow { operation, index });
                }
            }
        }
        Ok(())
    }

    fn sum_the_partials(&mut self) {
        let mut carry = WIDE_ZERO;
        for k in 0..self.bins.len() {
            for l in 0..LANES {
                let v = self.bins[k][l] + carry[l];
                self.product[k][l] = (v & LOW31_BITS_SET as u64) as u32;
                carry[l] = v >> 31;
            }
            self.counts.m_carries += carry.iter().filter(|&&c| c != 0).count() as u64;
        }
    }

    fn check_product_overflow(&self, idx: usize, operation: &'static str) -> Result<(), FpError> {
        let bb = self.format.bits_before_binary_point() as u32;
        let top = &self.product[self.product.len() - 1];
        for (l, word) in top.iter().enumerate() {
            let index = idx * LANES + l;
            if word >> (30 - bb) != 0 && !self.done_flags[index] {
                return Err(FpError::Overflow { operation, index });
            }
        }
        Ok(())
    }

    /// Limb `k` of the product shifted down by the format's fractional bits.
    fn shifted_limb(&self, k: usize) -> LimbVector {
        let n = self.format.limb_count();
        let bb = self.format.bits_before_binary_point() as u32;
        let (hi, lo) = (&self.product[k + n], &self.product[k + n - 1]);
        let mut r = ZERO;
        for l in 0..LANES {
            r[l] = ((hi[l] << bb) & LOW31_BITS_SET) | (lo[l] >> (31 - bb));
        }
        r
    }

    fn lanes_in_play(&self) -> u64 {
        (self.in_play_list.len() * LANES) as u64
    }

    fn check_decks(&self, decks: &[&FP31Deck]) -> Result<(), FpError> {
        for deck in decks {
            if deck.limb_count() != self.format.limb_count() || deck.value_count() != self.value_count {
                return Err(FpError::DimensionMismatch(format!(
                    "deck of {} limbs x {} values, engine expects {} limbs x {} values",
                    deck.limb_count(),
                    deck.value_count(),
                    self.format.limb_count(),
                    self.value_count
                )));
            }
        }
        Ok(())
    }
}

/// Absolute values of vector `idx` into `out`; returns 1 per negative lane.
fn load_magnitude(deck: &FP31Deck, idx: usize, out: &mut [LimbVector]) -> LimbVector {
    let n = out.len();
    let msl = deck.limb_vectors(n - 1)[idx];
    let mut sign = ZERO;
    let mut flip = ZERO;
    let mut carry = ZERO;
    for l in 0..LANES {
        sign[l] = (msl[l] & TEST_BIT_30) >> 30;
        flip[l] = sign[l] * LOW31_BITS_SET;
        carry[l] = sign[l];
    }
    for (j, limb) in out.iter_mut().enumerate() {
        let v = deck.limb_vectors(j)[idx];
        for l in 0..LANES {
            let x = ((v[l] & LOW31_BITS_SET) ^ flip[l]) + carry[l];
            limb[l] = x & LOW31_BITS_SET;
            carry[l] = x >> 31;
        }
    }
    sign
}

/// Copy the sign bit of each lane's MSL into its reserved bit.
fn sign_extend(msl: &mut LimbVector) {
    for word in msl.iter_mut() {
        *word = (*word & LOW31_BITS_SET) | ((*word & TEST_BIT_30) << 1);
    }
}
