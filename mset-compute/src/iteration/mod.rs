//! Escape-time iteration over one row of sample points.
//!
//! The driver owns every deck it needs and reuses them for each row of a
//! block. Per-point progress lives in three arrays (counts, escaped flags and
//! the engine's done flags); the engine's in-play list shrinks as whole
//! vector positions finish.

use crate::deck::FP31Deck;
use crate::error::ComputeError;
use crate::lanes::LANES;
use crate::vec_math::FP31VecMath;
use mset_core::{FixedPointFormat, FpError, MathOpCounts, ZValue, DEFAULT_PRECISION};

#[cfg(test)]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationState {
    NotStarted,
    Iterating,
    AllEscapedOrDone,
}

/// Counts and flags for the real (unpadded) points of a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowResult {
    pub counts: Vec<u16>,
    pub escaped_flags: Vec<bool>,
    pub z_values: Option<Vec<ZValue>>,
}

/// Previous results for one row, used to continue to a higher target.
pub struct RowResume<'a> {
    pub counts: &'a [u16],
    pub escaped_flags: &'a [bool],
    pub z_values: &'a [ZValue],
}

pub struct RowIterator {
    engine: FP31VecMath,
    target_iterations: u32,
    sample_count: usize,
    state: IterationState,
    cr: FP31Deck,
    ci: FP31Deck,
    zr: FP31Deck,
    zi: FP31Deck,
    zr_sqrs: FP31Deck,
    zi_sqrs: FP31Deck,
    sum_of_sqrs: FP31Deck,
    zr_zi: FP31Deck,
    zr_zi_sqrs: FP31Deck,
    temp: FP31Deck,
    zr_zi_2: FP31Deck,
    final_zr: FP31Deck,
    final_zi: FP31Deck,
    counts: Vec<u16>,
    escaped: Vec<bool>,
    escaped_now: Vec<bool>,
}

impl RowIterator {
    /// Driver for rows of `sample_count` points.
    pub fn new(
        format: FixedPointFormat,
        sample_count: usize,
        target_iterations: u32,
        threshold: u32,
    ) -> Result<Self, ComputeError> {
        if target_iterations == 0 || target_iterations > u16::MAX as u32 {
            return Err(ComputeError::InvalidRequest(format!(
                "target iterations {target_iterations} must be in 1..={}",
                u16::MAX
            )));
        }

        let engine = FP31VecMath::new(format, sample_count, threshold)?;
        let value_count = engine.value_count();
        let deck = FP31Deck::new(format.limb_count(), value_count)?;

        Ok(Self {
            engine,
            target_iterations,
            sample_count,
            state: IterationState::NotStarted,
            cr: deck.clone(),
            ci: deck.clone(),
            zr: deck.clone(),
            zi: deck.clone(),
            zr_sqrs: deck.clone(),
            zi_sqrs: deck.clone(),
            sum_of_sqrs: deck.clone(),
            zr_zi: deck.clone(),
            zr_zi_sqrs: deck.clone(),
            temp: deck.clone(),
            zr_zi_2: deck.clone(),
            final_zr: deck.clone(),
            final_zi: deck,
            counts: vec![0; value_count],
            escaped: vec![false; value_count],
            escaped_now: vec![false; value_count],
        })
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    pub fn in_play_list(&self) -> &[usize] {
        self.engine.in_play_list()
    }

    pub fn op_counts(&self) -> &MathOpCounts {
        self.engine.counts()
    }

    pub fn value_count(&self) -> usize {
        self.engine.value_count()
    }

    /// Iterate a row from z = 0 until every point has escaped or hit the target.
    pub fn iterate_row(
        &mut self,
        cr: &FP31Deck,
        ci: &FP31Deck,
        include_z_values: bool,
    ) -> Result<RowResult, FpError> {
        self.begin(cr, ci)?;
        while self.step()? {}
        self.result(include_z_values)
    }

    /// Continue a row from a previous result.
    pub fn resume_row(
        &mut self,
        cr: &FP31Deck,
        ci: &FP31Deck,
        resume: &RowResume<'_>,
        include_z_values: bool,
    ) -> Result<RowResult, FpError> {
        self.begin_resume(cr, ci, resume)?;
        while self.step()? {}
        self.result(include_z_values)
    }

    /// Load c and evaluate the first iteration, z1 = c.
    pub fn begin(&mut self, cr: &FP31Deck, ci: &FP31Deck) -> Result<(), FpError> {
        self.load_c(cr, ci)?;

        self.zr.copy_from(&self.cr)?;
        self.zi.copy_from(&self.ci)?;
        self.engine.square(&self.zr, &mut self.zr_sqrs)?;
        self.engine.square(&self.zi, &mut self.zi_sqrs)?;
        self.engine.add(&self.zr_sqrs, &self.zi_sqrs, &mut self.sum_of_sqrs)?;

        self.update_done_flags()?;
        self.update_state();
        Ok(())
    }

    /// Load c and the stored z of a previous computation.
    pub fn begin_resume(
        &mut self,
        cr: &FP31Deck,
        ci: &FP31Deck,
        resume: &RowResume<'_>,
    ) -> Result<(), FpError> {
        let n = self.sample_count;
        if resume.counts.len() != n || resume.escaped_flags.len() != n || resume.z_values.len() != n {
            return Err(FpError::DimensionMismatch(format!(
                "resume state has {} counts, {} flags and {} z values for a row of {}",
                resume.counts.len(),
                resume.escaped_flags.len(),
                resume.z_values.len(),
                n
            )));
        }

        self.load_c(cr, ci)?;
        for lane in 0..n {
            let z = &resume.z_values[lane];
            self.zr.set_value(lane, &z.re)?;
            self.zi.set_value(lane, &z.im)?;
            self.counts[lane] = resume.counts[lane];
            self.escaped[lane] = resume.escaped_flags[lane];
            if self.escaped[lane] || self.counts[lane] as u32 >= self.target_iterations {
                self.finish_lane(lane)?;
            }
        }
        self.engine.rebuild_in_play_list();

        self.engine.square(&self.zr, &mut self.zr_sqrs)?;
        self.engine.square(&self.zi, &mut self.zi_sqrs)?;
        self.update_state();
        Ok(())
    }

    /// One iteration of z = z² + c over the in-play vectors.
    ///
    /// Returns whether any vector is still in play.
    pub fn step(&mut self) -> Result<bool, FpError> {
        if self.state != IterationState::Iterating {
            return Ok(false);
        }

        // zi' = (zr + zi)² - zr² - zi² + ci
        self.engine.add(&self.zr, &self.zi, &mut self.zr_zi)?;
        self.engine.square(&self.zr_zi, &mut self.zr_zi_sqrs)?;
        self.engine.sub(&self.zr_zi_sqrs, &self.zr_sqrs, &mut self.temp)?;
        self.engine.sub(&self.temp, &self.zi_sqrs, &mut self.zr_zi_2)?;
        self.engine.add(&self.zr_zi_2, &self.ci, &mut self.zi)?;

        // zr' = zr² - zi² + cr
        self.engine.sub(&self.zr_sqrs, &self.zi_sqrs, &mut self.temp)?;
        self.engine.add(&self.temp, &self.cr, &mut self.zr)?;

        self.engine.square(&self.zr, &mut self.zr_sqrs)?;
        self.engine.square(&self.zi, &mut self.zi_sqrs)?;
        self.engine.add(&self.zr_sqrs, &self.zi_sqrs, &mut self.sum_of_sqrs)?;

        self.update_done_flags()?;
        self.update_state();
        Ok(self.state == IterationState::Iterating)
    }

    /// Results for the real points of the row.
    pub fn result(&self, include_z_values: bool) -> Result<RowResult, FpError> {
        let n = self.sample_count;
        let z_values = if include_z_values {
            let format = self.engine.format();
            let values = (0..n)
                .map(|lane| {
                    Ok(ZValue {
                        re: self.final_zr.get_value(lane, format, DEFAULT_PRECISION)?,
                        im: self.final_zi.get_value(lane, format, DEFAULT_PRECISION)?,
                    })
                })
                .collect::<Result<Vec<_>, FpError>>()?;
            Some(values)
        } else {
            None
        };

        Ok(RowResult {
            counts: self.counts[..n].to_vec(),
            escaped_flags: self.escaped[..n].to_vec(),
            z_values,
        })
    }

    fn load_c(&mut self, cr: &FP31Deck, ci: &FP31Deck) -> Result<(), FpError> {
        self.cr.copy_from(cr)?;
        self.ci.copy_from(ci)?;

        self.engine.reset();
        self.counts.fill(0);
        self.escaped.fill(false);
        self.state = IterationState::NotStarted;

        // Padding lanes never count.
        for lane in self.sample_count..self.engine.value_count() {
            self.engine.mark_done(lane)?;
        }
        self.engine.rebuild_in_play_list();
        Ok(())
    }

    fn update_done_flags(&mut self) -> Result<(), FpError> {
        self.engine
            .is_greater_or_equal_than_threshold(&self.sum_of_sqrs, &mut self.escaped_now)?;

        let in_play = self.engine.in_play_list().to_vec();
        let mut retired = Vec::new();
        for idx in in_play {
            let mut all_done = true;
            for lane in idx * LANES..(idx + 1) * LANES {
                if self.engine.done_flags()[lane] {
                    continue;
                }
                self.counts[lane] += 1;
                if self.escaped_now[lane] {
                    self.escaped[lane] = true;
                    self.finish_lane(lane)?;
                } else if self.counts[lane] as u32 >= self.target_iterations {
                    self.finish_lane(lane)?;
                } else {
                    all_done = false;
                }
            }
            if all_done {
                retired.push(idx);
            }
        }
        self.engine.retire_vectors(&retired);
        Ok(())
    }

    /// Mark a lane done and keep its z; later iterations overwrite the live decks.
    fn finish_lane(&mut self, lane: usize) -> Result<(), FpError> {
        self.engine.mark_done(lane)?;
        self.final_zr.copy_lane_from(&self.zr, lane)?;
        self.final_zi.copy_lane_from(&self.zi, lane)
    }

    fn update_state(&mut self) {
        self.state = if self.engine.in_play_list().is_empty() {
            IterationState::AllEscapedOrDone
        } else {
            IterationState::Iterating
        };
    }
}
