use crate::config::DEFAULT_GENERATOR_CONFIG;
use crate::error::FpError;
use crate::fp_value::FPValue;
use crate::format::FixedPointFormat;
use crate::op_counts::MathOpCounts;
use crate::rvalue::RValue;
use serde::{Deserialize, Serialize};

/// Map coordinate of a block's first sample point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RPoint {
    pub x: RValue,
    pub y: RValue,
}

impl RPoint {
    /// Parse decimal coordinates at the default precision.
    pub fn from_decimal_strs(x: &str, y: &str) -> Result<Self, FpError> {
        let precision = DEFAULT_GENERATOR_CONFIG.default_precision;
        Ok(Self {
            x: RValue::from_decimal_str(x, precision)?,
            y: RValue::from_decimal_str(y, precision)?,
        })
    }
}

/// Block dimensions in sample points.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSize {
    pub width: u32,
    pub height: u32,
}

impl BlockSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn number_of_cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self::new(
            DEFAULT_GENERATOR_CONFIG.block_width,
            DEFAULT_GENERATOR_CONFIG.block_height,
        )
    }
}

/// Final iterate of one sample point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ZValue {
    pub re: FPValue,
    pub im: FPValue,
}

/// Output of a previous computation of the same block, used to continue
/// iterating to a higher target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
    pub counts: Vec<u16>,
    pub escaped_flags: Vec<bool>,
    pub z_values: Vec<ZValue>,
}

/// Request to compute one block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MapSectionRequest {
    pub position: RPoint,
    pub sample_point_delta: RValue,
    pub block_size: BlockSize,
    pub target_iterations: u32,
    pub threshold: u32,
    /// Explicit limb count; derived from the delta when absent.
    pub limb_count: Option<usize>,
    pub include_z_values: bool,
    pub resume: Option<ResumeState>,
}

impl MapSectionRequest {
    /// Fresh request with default threshold and block size.
    pub fn new(position: RPoint, sample_point_delta: RValue, target_iterations: u32) -> Self {
        Self {
            position,
            sample_point_delta,
            block_size: BlockSize::default(),
            target_iterations,
            threshold: DEFAULT_GENERATOR_CONFIG.threshold,
            limb_count: None,
            include_z_values: DEFAULT_GENERATOR_CONFIG.emit_z_values,
            resume: None,
        }
    }
}

/// Escaped flags for a block, collapsed to one value when every point agrees.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "value")]
pub enum EscapedFlags {
    Uniform(bool),
    PerPoint(Vec<bool>),
}

impl EscapedFlags {
    pub fn compress(flags: Vec<bool>) -> Self {
        match flags.first() {
            Some(&first) if flags.iter().all(|&f| f == first) => Self::Uniform(first),
            _ => Self::PerPoint(flags),
        }
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        match self {
            Self::Uniform(v) => Some(*v),
            Self::PerPoint(flags) => flags.get(index).copied(),
        }
    }

    pub fn expand(&self, len: usize) -> Vec<bool> {
        match self {
            Self::Uniform(v) => vec![*v; len],
            Self::PerPoint(flags) => flags.clone(),
        }
    }
}

/// Result of computing one block. All per-point arrays are row-major.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MapSectionResponse {
    pub block_size: BlockSize,
    pub counts: Vec<u16>,
    pub escaped_flags: EscapedFlags,
    pub z_values: Option<Vec<ZValue>>,
    pub format: FixedPointFormat,
    pub op_counts: MathOpCounts,
}

impl MapSectionResponse {
    /// State needed to continue this block at a higher target.
    pub fn resume_state(&self) -> Option<ResumeState> {
        let z_values = self.z_values.clone()?;
        Some(ResumeState {
            counts: self.counts.clone(),
            escaped_flags: self.escaped_flags.expand(self.counts.len()),
            z_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_collapses_uniform_flags() {
        assert_eq!(
            EscapedFlags::compress(vec![true, true, true]),
            EscapedFlags::Uniform(true)
        );
        assert_eq!(
            EscapedFlags::compress(vec![true, false]),
            EscapedFlags::PerPoint(vec![true, false])
        );
        assert_eq!(EscapedFlags::compress(vec![]), EscapedFlags::PerPoint(vec![]));
    }

    #[test]
    fn uniform_flags_expand() {
        let flags = EscapedFlags::Uniform(false);
        assert_eq!(flags.get(41), Some(false));
        assert_eq!(flags.expand(3), vec![false; 3]);
    }

    #[test]
    fn position_parses_decimals() {
        let position = RPoint::from_decimal_strs("-0.5", "0.25").unwrap();
        assert_eq!(position.x, RValue::from_f64(-0.5).unwrap());
        assert_eq!(position.y.precision(), 53);
        assert!(RPoint::from_decimal_strs("abc", "0").is_err());
    }

    #[test]
    fn request_serialization_round_trip() {
        let request = MapSectionRequest::new(
            RPoint {
                x: RValue::from_f64(-0.5).unwrap(),
                y: RValue::from_f64(0.5).unwrap(),
            },
            RValue::from_f64(1.0 / 1024.0).unwrap(),
            50,
        );
        let json = serde_json::to_string(&request).unwrap();
        let parsed: MapSectionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }
}
