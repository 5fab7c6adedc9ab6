//! Limb-major packing of many fixed-point values.
//!
//! `mantissas[limb][value]` keeps limb `j` of every value contiguous so one
//! vector operation covers limb `j` of `LANES` values. Decks are buffers: the
//! generator allocates them once per block and refills them row by row, so a
//! deck's contents are only valid until the next refill.

use crate::lanes::{padded_len, vector_count, LimbVector};
use mset_core::{FPValue, FixedPointFormat, FpError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FP31Deck {
    mantissas: Vec<Vec<u32>>,
    value_count: usize,
}

impl FP31Deck {
    /// Zeroed deck. `value_count` is rounded up to a whole number of vectors.
    pub fn new(limb_count: usize, value_count: usize) -> Result<Self, FpError> {
        if limb_count == 0 {
            return Err(FpError::DimensionMismatch(
                "a deck needs at least one limb".to_string(),
            ));
        }
        let value_count = padded_len(value_count);
        Ok(Self {
            mantissas: vec![vec![0; value_count]; limb_count],
            value_count,
        })
    }

    /// Transpose `values` into limb-major order; padding lanes are zero.
    pub fn from_values(values: &[FPValue]) -> Result<Self, FpError> {
        let limb_count = values.first().map(|v| v.limb_count()).ok_or_else(|| {
            FpError::DimensionMismatch("cannot build a deck from no values".to_string())
        })?;
        let mut deck = Self::new(limb_count, values.len())?;
        deck.load_values(values)?;
        Ok(deck)
    }

    /// Broadcast one value into `count` lanes.
    pub fn duplicate(value: &FPValue, count: usize) -> Result<Self, FpError> {
        let mut deck = Self::new(value.limb_count(), count)?;
        deck.fill_duplicate(value)?;
        Ok(deck)
    }

    /// Refill every lane with `value`.
    pub fn fill_duplicate(&mut self, value: &FPValue) -> Result<(), FpError> {
        self.check_limb_count(value)?;
        for (limb, &word) in self.mantissas.iter_mut().zip(value.mantissa()) {
            limb.fill(word);
        }
        Ok(())
    }

    /// Refill the first `values.len()` lanes; the rest are cleared.
    pub fn load_values(&mut self, values: &[FPValue]) -> Result<(), FpError> {
        if values.len() > self.value_count {
            return Err(FpError::DimensionMismatch(format!(
                "{} values do not fit a deck of {}",
                values.len(),
                self.value_count
            )));
        }
        self.clear_all();
        for (i, value) in values.iter().enumerate() {
            self.set_value(i, value)?;
        }
        Ok(())
    }

    pub fn clear_all(&mut self) {
        for limb in &mut self.mantissas {
            limb.fill(0);
        }
    }

    pub fn clear_lanes(&mut self, indices: &[usize]) {
        for limb in &mut self.mantissas {
            for &i in indices {
                if let Some(word) = limb.get_mut(i) {
                    *word = 0;
                }
            }
        }
    }

    pub fn limb_count(&self) -> usize {
        self.mantissas.len()
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn vector_count(&self) -> usize {
        vector_count(self.value_count)
    }

    /// Limb `limb` of every value, as vectors.
    pub fn limb_vectors(&self, limb: usize) -> &[LimbVector] {
        bytemuck::cast_slice(&self.mantissas[limb][..])
    }

    pub fn limb_vectors_mut(&mut self, limb: usize) -> &mut [LimbVector] {
        bytemuck::cast_slice_mut(&mut self.mantissas[limb][..])
    }

    /// Limb `limb` of every value, one word per lane.
    pub fn limb_values(&self, limb: usize) -> &[u32] {
        &self.mantissas[limb]
    }

    pub fn get_value(&self, index: usize, format: &FixedPointFormat, precision: u32) -> Result<FPValue, FpError> {
        self.check_index(index)?;
        let mantissa = self.mantissas.iter().map(|limb| limb[index]).collect();
        FPValue::from_mantissa(mantissa, format, precision)
    }

    pub fn set_value(&mut self, index: usize, value: &FPValue) -> Result<(), FpError> {
        self.check_index(index)?;
        self.check_limb_count(value)?;
        for (limb, &word) in self.mantissas.iter_mut().zip(value.mantissa()) {
            limb[index] = word;
        }
        Ok(())
    }

    /// Copy one lane from a deck of the same shape.
    pub fn copy_lane_from(&mut self, other: &FP31Deck, index: usize) -> Result<(), FpError> {
        self.check_same_shape(other, "copying a lane")?;
        self.check_index(index)?;
        for (dst, src) in self.mantissas.iter_mut().zip(&other.mantissas) {
            dst[index] = src[index];
        }
        Ok(())
    }

    /// Overwrite every lane with `other`'s.
    pub fn copy_from(&mut self, other: &FP31Deck) -> Result<(), FpError> {
        self.check_same_shape(other, "copying a deck")?;
        for (dst, src) in self.mantissas.iter_mut().zip(&other.mantissas) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    pub fn check_same_shape(&self, other: &FP31Deck, operation: &str) -> Result<(), FpError> {
        if self.limb_count() != other.limb_count() || self.value_count != other.value_count {
            return Err(FpError::DimensionMismatch(format!(
                "{operation}: deck of {} limbs x {} values vs {} limbs x {} values",
                self.limb_count(),
                self.value_count,
                other.limb_count(),
                other.value_count
            )));
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), FpError> {
        if index >= self.value_count {
            return Err(FpError::DimensionMismatch(format!(
                "lane {index} is outside a deck of {} values",
                self.value_count
            )));
        }
        Ok(())
    }

    fn check_limb_count(&self, value: &FPValue) -> Result<(), FpError> {
        if value.limb_count() != self.limb_count() {
            return Err(FpError::DimensionMismatch(format!(
                "value has {} limbs, deck has {}",
                value.limb_count(),
                self.limb_count()
            )));
        }
        Ok(())
    }
}
