use crate::build::{BuildSummary, build_all};
use crate::config::{BuildConfig, Settings, Stage, constants};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::StageReport;
use crate::runner::run_stage;
use crate::watch::watch;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Compile, prefix and bundle stylesheets
    #[command(alias = "css")]
    Style,

    /// Copy, minify and bundle scripts
    #[command(alias = "js")]
    Script,

    /// Optimize changed images
    #[command(alias = "img")]
    Image,

    /// Copy changed fonts
    #[command(alias = "fonts")]
    Font,

    /// Minify changed markup
    #[command(alias = "content")]
    Markup,

    /// Run every stage once (default)
    Build,

    /// Build, then rebuild stages whenever their sources change
    Watch,
}

impl Commands {
    /// The single stage a command runs, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Commands::Style => Some(Stage::Style),
            Commands::Script => Some(Stage::Script),
            Commands::Image => Some(Stage::Image),
            Commands::Font => Some(Stage::Font),
            Commands::Markup => Some(Stage::Markup),
            Commands::Build | Commands::Watch => None,
        }
    }
}

/// Asset build pipeline
#[derive(Parser, Debug)]
#[command(version, about = None)]
pub struct Cli {
    /// Config file [default: assetpipe.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.cmd.unwrap_or(Commands::Build)
    }
}

/// Load settings. Only an explicitly named config file must exist.
pub fn load_settings(path: Option<&Path>) -> BuildResult<Settings> {
    match path {
        Some(path) => Settings::load(path, true),
        None => Settings::load(Path::new(constants::CONFIG_FILE), false),
    }
}

pub async fn stage_command(stage: Stage, config: &BuildConfig) -> BuildResult<StageReport> {
    debug!("Starting {} command", stage);
    run_stage(config.stage(stage)).await
}

pub async fn build_command(config: &BuildConfig) -> BuildResult<BuildSummary> {
    debug!("Starting build command");
    build_all(config).await
}

pub async fn watch_command(config: BuildConfig) -> BuildResult<()> {
    debug!("Starting watch command");
    watch(Arc::new(config)).await
}

/// Dispatch one command against resolved settings
pub async fn run(command: Commands, settings: &Settings) -> BuildResult<()> {
    let config = settings.resolve()?;

    match command {
        Commands::Build => {
            build_command(&config).await?;
        }
        Commands::Watch => watch_command(config).await?,
        single => {
            let stage = single
                .stage()
                .ok_or_else(|| BuildError::invalid_config(format!("{single:?} is not a stage")))?;
            stage_command(stage, &config).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_build() {
        let cli = Cli::try_parse_from(["assetpipe"]).unwrap();
        assert_eq!(cli.command(), Commands::Build);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_aliases_and_global_config() {
        let cli = Cli::try_parse_from(["assetpipe", "css", "--config", "site.toml"]).unwrap();
        assert_eq!(cli.command(), Commands::Style);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));

        for (alias, stage) in [
            ("js", Stage::Script),
            ("img", Stage::Image),
            ("fonts", Stage::Font),
            ("content", Stage::Markup),
        ] {
            let cli = Cli::try_parse_from(["assetpipe", alias]).unwrap();
            assert_eq!(cli.command().stage(), Some(stage));
        }
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_settings(Some(&dir.path().join("nope.toml"))),
            Err(BuildError::Io { .. })
        ));
    }
}
