use arrow::error::ArrowError;
use thiserror::Error;

/// Contract violations during batch encoding. Value-level parse failures are
/// folded into nullity and never surface here.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("row {row} has {actual} values but the schema expects {expected}")]
    ShapeMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("variable-width payload exceeds i32 offset range ({0} bytes)")]
    PayloadTooLarge(usize),

    #[error("arrow construction failed: {0}")]
    Arrow(#[from] ArrowError),
}
