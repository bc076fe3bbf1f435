/// Stage-level and startup errors
use super::pipeline::PipelineError;
use crate::config::Stage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("File not found with singular pattern: {0}")]
    SourceNotFound(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("{} of the build's stages failed: {}", .0.len(), describe_failures(.0))]
    StagesFailed(Vec<(Stage, BuildError)>),
}

fn describe_failures(failures: &[(Stage, BuildError)]) -> String {
    failures
        .iter()
        .map(|(stage, e)| format!("{stage} ({e})"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl BuildError {
    /// Attach the offending path to an I/O error
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn pattern(pattern: impl Into<String>, source: glob::PatternError) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            source,
        }
    }
}

pub type BuildResult<T> = Result<T, BuildError>;
