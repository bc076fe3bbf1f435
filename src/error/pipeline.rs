/// Pipeline wiring and node errors
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing required input '{required}' for node '{node}'")]
    MissingInput { node: String, required: String },

    #[error("Missing required output '{required}' for node '{node}'")]
    MissingOutput { node: String, required: String },

    #[error("Pipeline configuration error: {message}")]
    ConfigError { message: String },

    #[error("Node processing error: {0}")]
    NodeError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    /// Create a new ConfigError
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Wrap any node failure
    pub fn node(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::NodeError(Box::new(err))
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
