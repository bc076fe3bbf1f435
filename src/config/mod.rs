pub mod constants;
pub mod settings;
pub mod stage;

pub use settings::Settings;
pub use stage::{BuildConfig, Stage, StageConfig, StageOptions};
