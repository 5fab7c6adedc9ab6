//! Vectorized escape-time computation of Mandelbrot blocks in 31-bit-limb
//! fixed-point arithmetic.

pub mod cancellation;
pub mod deck;
pub mod error;
pub mod iteration;
pub mod lanes;
pub mod map_section;
pub mod scalar_iteration;
pub mod vec_math;

pub use cancellation::{AtomicBoolChecker, CancelToken, CancellationChecker, NeverCancel};
pub use deck::FP31Deck;
pub use error::ComputeError;
pub use iteration::{IterationState, RowIterator, RowResult, RowResume};
pub use lanes::{LimbVector, WideVector, LANES};
pub use map_section::MapSectionGenerator;
pub use scalar_iteration::{iterate_point, PointResult};
pub use vec_math::FP31VecMath;

// Re-export core types for convenience
pub use mset_core::*;
