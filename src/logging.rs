//! Tracing setup for the `assetpipe` binary

use crate::config::settings::LoggingSettings;
use crate::error::{BuildError, BuildResult};
use std::fs::OpenOptions;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr layer and, when configured, a debug-level file layer.
/// `RUST_LOG` overrides the configured level.
pub fn init(settings: &LoggingSettings) -> BuildResult<()> {
    let file_layer = match &settings.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            let log_file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .map_err(|e| BuildError::io(path, e))?;

            Some(
                fmt::layer()
                    .with_writer(log_file)
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_level(true)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_level(true)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(&settings.level)),
                ),
        )
        .with(file_layer)
        .init();

    Ok(())
}
