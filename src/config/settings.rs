//! `assetpipe.toml` file model
//!
//! Every field has a default matching the conventional `src/` → `dist/`
//! layout, so an empty (or missing) file yields a working configuration.
//! `Settings::resolve` turns the file model into the immutable
//! [`BuildConfig`] used by runners and the watcher.

use super::constants;
use super::stage::{
    BrowserTargets, BuildConfig, ImageOptions, MarkupOptions, OutputStyle, ScriptOptions, Stage,
    StageConfig, StageOptions, StyleOptions,
};
use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Source tree root
    pub source: PathBuf,
    /// Destination tree root
    pub dist: PathBuf,
    /// Third-party bundle root
    pub vendor: PathBuf,
    pub logging: LoggingSettings,
    pub watch: WatchSettings,
    pub style: StyleSettings,
    pub script: ScriptSettings,
    pub image: ImageSettings,
    pub font: FontSettings,
    pub markup: MarkupSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: PathBuf::from(constants::SOURCE_DIR),
            dist: PathBuf::from(constants::DIST_DIR),
            vendor: PathBuf::from(constants::VENDOR_DIR),
            logging: LoggingSettings::default(),
            watch: WatchSettings::default(),
            style: StyleSettings::default(),
            script: ScriptSettings::default(),
            image: ImageSettings::default(),
            font: FontSettings::default(),
            markup: MarkupSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional debug-level log file
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub interval_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval_ms: constants::POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSettings {
    /// Entry stylesheets, relative to `source`
    pub entry: Vec<String>,
    /// Patterns re-triggering the stage, relative to `source`
    pub watch: Vec<String>,
    /// Output directory, relative to `dist`
    pub out: PathBuf,
    /// Sass include paths, relative to `vendor`
    pub include_paths: Vec<PathBuf>,
    pub output_style: OutputStyle,
    pub bundle: String,
    pub targets: BrowserTargets,
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self {
            entry: vec!["scss/style.scss".to_string()],
            watch: vec!["scss/**/*.scss".to_string()],
            out: PathBuf::from("css"),
            include_paths: vec![PathBuf::from("assets/stylesheets")],
            output_style: OutputStyle::Expanded,
            bundle: constants::STYLE_BUNDLE.to_string(),
            targets: BrowserTargets::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Script prepended to the bundle, relative to `vendor`
    pub vendor_bundle: Option<String>,
    /// Project scripts, relative to `source`
    pub patterns: Vec<String>,
    pub out: PathBuf,
    pub bundle: String,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            vendor_bundle: Some("assets/javascripts/bootstrap.js".to_string()),
            patterns: vec!["js/**/*.js".to_string()],
            out: PathBuf::from("js"),
            bundle: constants::SCRIPT_BUNDLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub patterns: Vec<String>,
    pub out: PathBuf,
    pub jpeg_quality: u8,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            patterns: vec!["img/**/*".to_string()],
            out: PathBuf::from("img"),
            jpeg_quality: constants::JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    pub patterns: Vec<String>,
    /// Extra fonts, relative to `vendor`
    pub vendor_patterns: Vec<String>,
    pub out: PathBuf,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            patterns: vec!["fonts/*.*".to_string()],
            vendor_patterns: vec!["assets/fonts/**/*".to_string()],
            out: PathBuf::from("fonts"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupSettings {
    pub extension: String,
    pub collapse_whitespace: bool,
    pub conservative_collapse: bool,
    pub remove_comments: bool,
    pub minify_css: bool,
    pub minify_js: bool,
}

impl Default for MarkupSettings {
    fn default() -> Self {
        Self {
            extension: constants::MARKUP_EXTENSION.to_string(),
            collapse_whitespace: true,
            conservative_collapse: true,
            remove_comments: true,
            minify_css: true,
            minify_js: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults when
    /// `required` is false.
    pub fn load(path: &Path, required: bool) -> BuildResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!("Loading config from {:?}", path);
                Self::parse(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                debug!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(BuildError::io(path, e)),
        }
    }

    pub fn parse(content: &str) -> BuildResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve paths and patterns into the per-stage configuration.
    /// Every pattern is compiled once here so bad globs fail before any
    /// stage runs.
    pub fn resolve(&self) -> BuildResult<BuildConfig> {
        if self.watch.interval_ms == 0 {
            return Err(BuildError::invalid_config("watch.interval_ms must be positive"));
        }
        let exclude = vec![self.dist.clone()];

        let style_inputs = join_all(&self.source, &self.style.entry);
        let style = StageConfig {
            stage: Stage::Style,
            watch: join_all(&self.source, &self.style.watch),
            inputs: style_inputs,
            output: self.dist.join(&self.style.out),
            exclude: exclude.clone(),
            options: StageOptions::Style(StyleOptions {
                output_style: self.style.output_style,
                include_paths: self
                    .style
                    .include_paths
                    .iter()
                    .map(|p| self.vendor.join(p))
                    .collect(),
                bundle: self.style.bundle.clone(),
                targets: self.style.targets.clone(),
            }),
        };

        let mut script_inputs = Vec::new();
        if let Some(bundle) = &self.script.vendor_bundle {
            script_inputs.push(join(&self.vendor, bundle));
        }
        script_inputs.extend(join_all(&self.source, &self.script.patterns));
        let script = StageConfig {
            stage: Stage::Script,
            watch: script_inputs.clone(),
            inputs: script_inputs,
            output: self.dist.join(&self.script.out),
            exclude: exclude.clone(),
            options: StageOptions::Script(ScriptOptions {
                bundle: self.script.bundle.clone(),
            }),
        };

        let image_inputs = join_all(&self.source, &self.image.patterns);
        let image = StageConfig {
            stage: Stage::Image,
            watch: image_inputs.clone(),
            inputs: image_inputs,
            output: self.dist.join(&self.image.out),
            exclude: exclude.clone(),
            options: StageOptions::Image(ImageOptions {
                jpeg_quality: self.image.jpeg_quality.clamp(1, 100),
            }),
        };

        let mut font_inputs = join_all(&self.source, &self.font.patterns);
        font_inputs.extend(join_all(&self.vendor, &self.font.vendor_patterns));
        let font = StageConfig {
            stage: Stage::Font,
            watch: font_inputs.clone(),
            inputs: font_inputs,
            output: self.dist.join(&self.font.out),
            exclude: exclude.clone(),
            options: StageOptions::Font,
        };

        let markup_inputs = vec![join(
            &self.source,
            &format!("**/*.{}", self.markup.extension.trim_start_matches('.')),
        )];
        let markup = StageConfig {
            stage: Stage::Markup,
            watch: markup_inputs.clone(),
            inputs: markup_inputs,
            output: self.dist.clone(),
            exclude,
            options: StageOptions::Markup(MarkupOptions {
                collapse_whitespace: self.markup.collapse_whitespace,
                conservative_collapse: self.markup.conservative_collapse,
                remove_comments: self.markup.remove_comments,
                minify_css: self.markup.minify_css,
                minify_js: self.markup.minify_js,
            }),
        };

        let stages = vec![style, script, image, font, markup];
        for stage in &stages {
            for pattern in stage.inputs.iter().chain(stage.watch.iter()) {
                glob::Pattern::new(pattern).map_err(|e| BuildError::pattern(pattern, e))?;
            }
        }

        BuildConfig::new(stages, Duration::from_millis(self.watch.interval_ms))
            .ok_or_else(|| BuildError::invalid_config("stages out of build order"))
    }
}

fn join(base: &Path, pattern: &str) -> String {
    base.join(pattern).to_string_lossy().into_owned()
}

fn join_all(base: &Path, patterns: &[String]) -> Vec<String> {
    patterns.iter().map(|p| join(base, p)).collect()
}
