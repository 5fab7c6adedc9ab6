//! Block generation: one [`MapSectionRequest`] in, one [`MapSectionResponse`] out.
//!
//! Sample points are built once in scalar math, transposed into a cr deck
//! for a whole row, and every row reuses the same row iterator with a
//! broadcast ci deck.

use crate::cancellation::CancellationChecker;
use crate::deck::FP31Deck;
use crate::error::ComputeError;
use crate::iteration::{RowIterator, RowResume};
use mset_core::{
    format_for_delta, twos_complement, EscapedFlags, FixedPointFormat, GeneratorConfig,
    MapSectionRequest, MapSectionResponse, ScalarMath, ZValue, DEFAULT_GENERATOR_CONFIG,
};

pub struct MapSectionGenerator {
    config: GeneratorConfig,
    sections_generated: u64,
}

impl Default for MapSectionGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATOR_CONFIG)
    }
}

impl MapSectionGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            sections_generated: 0,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Number of `generate` calls so far, successful or not.
    pub fn sections_generated(&self) -> u64 {
        self.sections_generated
    }

    /// Format used for `request`: its explicit limb count, otherwise the
    /// precision needed for its sample spacing but never fewer limbs than
    /// the configured default.
    pub fn format_for(&self, request: &MapSectionRequest) -> Result<FixedPointFormat, ComputeError> {
        let bb = self.config.bits_before_binary_point;
        let format = match request.limb_count {
            Some(limb_count) => FixedPointFormat::new(bb, limb_count)?,
            None => {
                let derived =
                    format_for_delta(&request.sample_point_delta, request.target_iterations, bb)?;
                if derived.limb_count() < self.config.default_limb_count {
                    FixedPointFormat::new(bb, self.config.default_limb_count)?
                } else {
                    derived
                }
            }
        };
        Ok(format)
    }

    pub fn generate<C: CancellationChecker>(
        &mut self,
        request: &MapSectionRequest,
        cancel: &C,
    ) -> Result<MapSectionResponse, ComputeError> {
        self.sections_generated += 1;
        let section = self.sections_generated;

        let result = self.compute(section, request, cancel);
        match &result {
            Ok(_) => {}
            Err(ComputeError::Cancelled) => log::info!("Section {} cancelled", section),
            Err(e) => log::warn!("Section {} failed: {}", section, e),
        }
        result
    }

    fn compute<C: CancellationChecker>(
        &self,
        section: u64,
        request: &MapSectionRequest,
        cancel: &C,
    ) -> Result<MapSectionResponse, ComputeError> {
        validate(request)?;
        let format = self.format_for(request)?;
        if let Some(resume) = &request.resume {
            check_resume_values(&resume.z_values, &format)?;
        }

        let block_size = request.block_size;
        let width = block_size.width as usize;
        let height = block_size.height as usize;
        log::debug!(
            "Section {}: {}x{} at ({}, {}), format {}, target {}",
            section,
            width,
            height,
            request.position.x.to_f64(),
            request.position.y.to_f64(),
            format,
            request.target_iterations
        );

        let mut scalar = ScalarMath::new(format, request.threshold)?;
        let start_x = scalar.create_fp_value(&request.position.x)?;
        let start_y = scalar.create_fp_value(&request.position.y)?;
        let delta = scalar.create_fp_value(&request.sample_point_delta)?;
        let offsets = scalar.build_sample_point_offsets(&delta, width.max(height))?;
        let xs = scalar.build_sample_points(&start_x, &offsets[..width])?;
        let ys = scalar.build_sample_points(&start_y, &offsets[..height])?;

        let cr = FP31Deck::from_values(&xs)?;
        let mut ci = FP31Deck::new(format.limb_count(), width)?;
        let mut rows = RowIterator::new(format, width, request.target_iterations, request.threshold)?;

        let cells = block_size.number_of_cells();
        let mut counts = Vec::with_capacity(cells);
        let mut escaped = Vec::with_capacity(cells);
        let mut z_values = request.include_z_values.then(|| Vec::with_capacity(cells));

        for (row, y) in ys.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ComputeError::Cancelled);
            }

            ci.fill_duplicate(y)?;
            let row_result = match &request.resume {
                Some(resume) => {
                    let span = row * width..(row + 1) * width;
                    let row_resume = RowResume {
                        counts: &resume.counts[span.clone()],
                        escaped_flags: &resume.escaped_flags[span.clone()],
                        z_values: &resume.z_values[span],
                    };
                    rows.resume_row(&cr, &ci, &row_resume, request.include_z_values)?
                }
                None => rows.iterate_row(&cr, &ci, request.include_z_values)?,
            };

            counts.extend_from_slice(&row_result.counts);
            escaped.extend_from_slice(&row_result.escaped_flags);
            if let (Some(all), Some(row_z)) = (z_values.as_mut(), row_result.z_values) {
                all.extend(row_z);
            }
        }

        let mut op_counts = *scalar.counts();
        op_counts.merge(rows.op_counts());
        log::debug!(
            "Section {}: {} squarings, {} a-carries, {} m-carries",
            section,
            op_counts.squarings,
            op_counts.a_carries,
            op_counts.m_carries
        );

        Ok(MapSectionResponse {
            block_size,
            counts,
            escaped_flags: EscapedFlags::compress(escaped),
            z_values,
            format,
            op_counts,
        })
    }
}

fn validate(request: &MapSectionRequest) -> Result<(), ComputeError> {
    let size = request.block_size;
    if size.width == 0 || size.height == 0 {
        return Err(ComputeError::InvalidRequest(format!(
            "block size {}x{} has no points",
            size.width, size.height
        )));
    }

    if request.target_iterations == 0 || request.target_iterations > u16::MAX as u32 {
        return Err(ComputeError::InvalidRequest(format!(
            "target iterations {} must be in 1..={}",
            request.target_iterations,
            u16::MAX
        )));
    }

    if let Some(resume) = &request.resume {
        let cells = size.number_of_cells();
        if resume.counts.len() != cells
            || resume.escaped_flags.len() != cells
            || resume.z_values.len() != cells
        {
            return Err(ComputeError::InvalidRequest(format!(
                "resume state has {} counts, {} flags and {} z values for {} points",
                resume.counts.len(),
                resume.escaped_flags.len(),
                resume.z_values.len(),
                cells
            )));
        }

        // Counts are capped at the target; resuming only ever raises it.
        if let Some(&highest) = resume.counts.iter().max() {
            if highest as u32 > request.target_iterations {
                return Err(ComputeError::InvalidRequest(format!(
                    "resume state holds counts up to {highest}, above the target {}",
                    request.target_iterations
                )));
            }
        }
    }
    Ok(())
}

/// Stored z values must be in the block's format and well-formed two's complement.
fn check_resume_values(z_values: &[ZValue], format: &FixedPointFormat) -> Result<(), ComputeError> {
    for (index, z) in z_values.iter().enumerate() {
        for value in [&z.re, &z.im] {
            if value.format() != format {
                return Err(ComputeError::InvalidRequest(format!(
                    "resume z value {index} in format {} cannot continue in format {format}",
                    value.format()
                )));
            }
            twos_complement::check_reserved_bits(value.mantissa(), "loading resume state")
                .map_err(|e| ComputeError::InvalidRequest(format!("resume z value {index}: {e}")))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::NeverCancel;
    use mset_core::{BlockSize, RPoint, RValue};

    fn request(x: f64, y: f64, target: u32) -> MapSectionRequest {
        let position = RPoint {
            x: RValue::from_f64(x).unwrap(),
            y: RValue::from_f64(y).unwrap(),
        };
        let mut request = MapSectionRequest::new(position, RValue::from_f64(0.25).unwrap(), target);
        request.block_size = BlockSize::new(4, 3);
        request
    }

    #[test]
    fn format_falls_back_to_default_limb_count() {
        let generator = MapSectionGenerator::default();
        let format = generator.format_for(&request(0.0, 0.0, 10)).unwrap();
        assert_eq!(format.limb_count(), 2);
        assert_eq!(format.bits_before_binary_point(), 8);

        let mut explicit = request(0.0, 0.0, 10);
        explicit.limb_count = Some(4);
        assert_eq!(generator.format_for(&explicit).unwrap().limb_count(), 4);
    }

    #[test]
    fn deep_delta_needs_more_limbs() {
        let generator = MapSectionGenerator::default();
        let mut deep = request(0.0, 0.0, 1000);
        deep.sample_point_delta = RValue::from_f64(2f64.powi(-80)).unwrap();
        // 80 + 10 + 16 fractional bits plus 8 integer bits
        assert_eq!(generator.format_for(&deep).unwrap().limb_count(), 4);
    }

    #[test]
    fn small_block_is_row_major() {
        let mut generator = MapSectionGenerator::default();
        // x in {-2, -1.75, -1.5, -1.25}, y in {0, 0.25, 0.5}
        let response = generator.generate(&request(-2.0, 0.0, 20), &NeverCancel).unwrap();

        assert_eq!(response.counts.len(), 12);
        // |c|² = 4 reaches the threshold on the first iterate
        assert_eq!(response.counts[0], 1);
        assert_eq!(response.escaped_flags.get(0), Some(true));
        // c = -1.75 lies on the real segment of the set
        assert_eq!(response.counts[1], 20);
        assert_eq!(response.escaped_flags.get(1), Some(false));
        // c = -2 + 0.5i, third row
        assert_eq!(response.counts[8], 1);
        assert!(response.z_values.is_none());
        assert_eq!(generator.sections_generated(), 1);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let mut generator = MapSectionGenerator::default();

        let mut empty = request(0.0, 0.0, 10);
        empty.block_size = BlockSize::new(0, 3);
        assert!(matches!(
            generator.generate(&empty, &NeverCancel),
            Err(ComputeError::InvalidRequest(_))
        ));

        let too_many = request(0.0, 0.0, 70_000);
        assert!(matches!(
            generator.generate(&too_many, &NeverCancel),
            Err(ComputeError::InvalidRequest(_))
        ));

        let mut huge_threshold = request(0.0, 0.0, 10);
        huge_threshold.threshold = 1000;
        assert!(matches!(
            generator.generate(&huge_threshold, &NeverCancel),
            Err(ComputeError::Arithmetic(_))
        ));

        assert_eq!(generator.sections_generated(), 3);
    }
}
