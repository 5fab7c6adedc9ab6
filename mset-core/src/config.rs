//! Generator configuration.
//!
//! Defaults used when a block request leaves a setting unspecified. The
//! struct is serde-enabled so callers can keep overrides in a JSON file.

use serde::{Deserialize, Serialize};

/// Configuration for the map section generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Integer bits, sign included, of every fixed-point value.
    pub bits_before_binary_point: u8,
    /// Limb count used when neither the request nor the precision calculation decides.
    pub default_limb_count: usize,
    /// Escape threshold for |z|², 4 meaning escape radius 2.
    pub threshold: u32,
    /// Block width in sample points.
    pub block_width: u32,
    /// Block height in sample points.
    pub block_height: u32,
    /// Bits of significance for decimal coordinate parsing.
    pub default_precision: u32,
    /// Emit the final z of every point so a block can be resumed later.
    pub emit_z_values: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        DEFAULT_GENERATOR_CONFIG
    }
}

impl GeneratorConfig {
    /// Parse a JSON override. Missing fields are an error; use
    /// [`DEFAULT_GENERATOR_CONFIG`] as the base and serialize it to start a file.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn block_cells(&self) -> usize {
        self.block_width as usize * self.block_height as usize
    }
}

/// The canonical defaults.
pub static DEFAULT_GENERATOR_CONFIG: GeneratorConfig = GeneratorConfig {
    bits_before_binary_point: 8,
    default_limb_count: 2,
    threshold: 4,
    block_width: 128,
    block_height: 128,
    default_precision: crate::rvalue::DEFAULT_PRECISION,
    emit_z_values: false,
};
