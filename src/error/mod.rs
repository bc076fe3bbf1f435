/// Centralized error handling for assetpipe
pub mod build;
pub mod pipeline;
pub mod transform;

pub use build::{BuildError, BuildResult};
pub use pipeline::{PipelineError, PipelineResult};
pub use transform::{TransformError, TransformResult};
