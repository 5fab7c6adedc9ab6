pub mod config;
pub mod error;
pub mod format;
pub mod fp_value;
pub mod messages;
pub mod op_counts;
pub mod precision;
pub mod rvalue;
pub mod scalar_math;
pub mod twos_complement;

pub use config::{GeneratorConfig, DEFAULT_GENERATOR_CONFIG};
pub use error::FpError;
pub use format::{FixedPointFormat, EFFECTIVE_BITS_PER_LIMB, LOW31_BITS_SET, RESERVED_BIT, TEST_BIT_30};
pub use fp_value::FPValue;
pub use messages::{
    BlockSize, EscapedFlags, MapSectionRequest, MapSectionResponse, RPoint, ResumeState, ZValue,
};
pub use op_counts::MathOpCounts;
pub use precision::{format_for_delta, fractional_bits_for, limb_count_for_precision};
pub use rvalue::{RValue, DEFAULT_PRECISION};
pub use scalar_math::ScalarMath;
pub use dashu_base::Sign;
