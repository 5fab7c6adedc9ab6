//! Block computation error types.

use mset_core::FpError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error(transparent)]
    Arithmetic(#[from] FpError),

    #[error("Invalid map section request: {0}")]
    InvalidRequest(String),

    #[error("Computation cancelled")]
    Cancelled,
}
