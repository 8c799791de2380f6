use arrow::error::ArrowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("transform frame truncated at {0} bytes")]
    Truncated(usize),

    #[error("bad transform frame magic")]
    BadMagic,

    #[error("unsupported transform wire version: {0}")]
    UnsupportedVersion(u16),

    #[error("transform payload codec error: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("wire format error: {0}")]
    Wire(#[from] WireError),

    #[error("kernel error: {0}")]
    Kernel(String),

    #[error("no columnar table bound for '{0}'")]
    UnboundTable(String),

    #[error("unknown table handle {0}")]
    UnknownHandle(u64),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("transform request timed out after {0}ms")]
    Timeout(u64),
}
