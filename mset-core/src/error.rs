//! Fixed-point arithmetic error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FpError {
    #[error("Invalid fixed point format: {0}")]
    InvalidFormat(String),

    #[error("Value needs {needed_bits} magnitude bits but format {format} holds at most {max_bits}")]
    FormatCapacity {
        needed_bits: usize,
        max_bits: usize,
        format: String,
    },

    #[error("Reserved bit does not match the sign bit while {operation}: {limbs}")]
    ReservedBit {
        operation: &'static str,
        limbs: String,
    },

    #[error("Two's complement conversion failed: {0}")]
    TwosComplement(String),

    #[error("Overflow while {operation} (value {index})")]
    Overflow { operation: &'static str, index: usize },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Failed to parse value: {0}")]
    Parse(String),
}

/// Render limbs most significant first, the way they read as a number.
pub(crate) fn limbs_to_hex(limbs: &[u32]) -> String {
    limbs
        .iter()
        .rev()
        .map(|l| format!("{l:08x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
