/// Per-file transform errors. These never abort a stage: the runner logs
/// them and drops the offending file from the run's output.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Sass compilation failed: {0}")]
    Sass(String),

    #[error("CSS processing failed: {0}")]
    Css(String),

    #[error("Invalid UTF-8 in source: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Image optimization failed: {0}")]
    Image(#[from] image::ImageError),
}

impl TransformError {
    pub fn sass(msg: impl Into<String>) -> Self {
        Self::Sass(msg.into())
    }

    pub fn css(msg: impl Into<String>) -> Self {
        Self::Css(msg.into())
    }
}

pub type TransformResult<T> = Result<T, TransformError>;
