use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during chain assembly and execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Stage already has a downstream link
    #[error("Stage '{0}' is already linked to a downstream stage")]
    AlreadyLinked(String),

    /// Stage already has an upstream link
    #[error("Stage '{0}' already has an upstream stage")]
    AlreadyConsuming(String),

    /// Multiplexer has already been started
    #[error("Multiplexer has already been started")]
    AlreadyStarted,

    /// Processor failure inside a stage
    #[error("Stage '{stage}' failed: {message}")]
    StageError { stage: String, message: String },

    /// Thread join error
    #[error("Worker thread for '{0}' panicked")]
    ThreadError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O failure while traversing a directory tree
    #[error("Tree walk failed at '{}': {source}", path.display())]
    WalkError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Build a stage error from any displayable processor failure.
    pub fn stage(stage: impl Into<String>, err: impl std::fmt::Display) -> Self {
        PipelineError::StageError {
            stage: stage.into(),
            message: err.to_string(),
        }
    }
}

/// A rejected link operation, handing the would-be downstream stage back
/// to the caller untouched.
pub struct LinkRejected<T> {
    pub error: PipelineError,
    pub stage: T,
}

impl<T> LinkRejected<T> {
    pub fn into_error(self) -> PipelineError {
        self.error
    }
}

impl<T> std::fmt::Debug for LinkRejected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Display for LinkRejected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}
