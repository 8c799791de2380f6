use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Kernel or marshalling failure, carried as a display-ready message.
    #[error("computation failed: {0}")]
    Failed(String),

    /// The task was unregistered before its result settled.
    #[error("task was abandoned before settling")]
    Abandoned,
}
