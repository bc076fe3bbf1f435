//! Resolved, immutable stage definitions shared by runners and the watcher

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One asset class of the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Style,
    Script,
    Image,
    Font,
    Markup,
}

impl Stage {
    /// Full build order
    pub const ALL: [Stage; 5] = [
        Stage::Style,
        Stage::Script,
        Stage::Image,
        Stage::Font,
        Stage::Markup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Style => "style",
            Stage::Script => "script",
            Stage::Image => "image",
            Stage::Font => "font",
            Stage::Markup => "markup",
        }
    }

    /// Whether the stage skips inputs whose outputs are up to date
    pub fn uses_change_filter(&self) -> bool {
        matches!(self, Stage::Image | Stage::Font | Stage::Markup)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sass output formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

/// Minimum browser major versions used for vendor prefixing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserTargets {
    pub chrome: Option<u32>,
    pub edge: Option<u32>,
    pub firefox: Option<u32>,
    pub safari: Option<u32>,
    pub ios_saf: Option<u32>,
    pub android: Option<u32>,
    pub opera: Option<u32>,
    pub samsung: Option<u32>,
    pub ie: Option<u32>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: Some(80),
            edge: Some(80),
            firefox: Some(78),
            safari: Some(12),
            ios_saf: Some(12),
            android: Some(80),
            opera: Some(67),
            samsung: Some(12),
            ie: Some(11),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleOptions {
    pub output_style: OutputStyle,
    pub include_paths: Vec<PathBuf>,
    pub bundle: String,
    pub targets: BrowserTargets,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    pub bundle: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupOptions {
    pub collapse_whitespace: bool,
    /// Keep optional tags, the doctype and attribute quotes while collapsing
    pub conservative_collapse: bool,
    pub remove_comments: bool,
    pub minify_css: bool,
    pub minify_js: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOptions {
    Style(StyleOptions),
    Script(ScriptOptions),
    Image(ImageOptions),
    Font,
    Markup(MarkupOptions),
}

/// Inputs, output and options of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    pub stage: Stage,
    /// Input glob patterns, in concatenation order
    pub inputs: Vec<String>,
    /// Patterns whose changes re-trigger the stage
    pub watch: Vec<String>,
    pub output: PathBuf,
    /// Roots never read as input
    pub exclude: Vec<PathBuf>,
    pub options: StageOptions,
}

impl StageConfig {
    /// Stage options as an ordered name/value table
    pub fn options(&self) -> IndexMap<&'static str, String> {
        let mut table = IndexMap::new();
        match &self.options {
            StageOptions::Style(style) => {
                table.insert("output_style", format!("{:?}", style.output_style).to_lowercase());
                table.insert(
                    "include_paths",
                    style
                        .include_paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                );
                table.insert("bundle", style.bundle.clone());
            }
            StageOptions::Script(script) => {
                table.insert("bundle", script.bundle.clone());
            }
            StageOptions::Image(image) => {
                table.insert("jpeg_quality", image.jpeg_quality.to_string());
            }
            StageOptions::Font => {}
            StageOptions::Markup(markup) => {
                table.insert("collapse_whitespace", markup.collapse_whitespace.to_string());
                table.insert("conservative_collapse", markup.conservative_collapse.to_string());
                table.insert("remove_comments", markup.remove_comments.to_string());
                table.insert("minify_css", markup.minify_css.to_string());
                table.insert("minify_js", markup.minify_js.to_string());
            }
        }
        table
    }
}

/// Immutable configuration handed to every runner and to the watcher
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    stages: Vec<StageConfig>,
    pub poll_interval: Duration,
}

impl BuildConfig {
    /// Stages must be given in `Stage::ALL` order, one per asset class
    pub fn new(stages: Vec<StageConfig>, poll_interval: Duration) -> Option<Self> {
        let ordered = stages.len() == Stage::ALL.len()
            && stages
                .iter()
                .zip(Stage::ALL.iter())
                .all(|(config, stage)| config.stage == *stage);
        ordered.then_some(Self {
            stages,
            poll_interval,
        })
    }

    pub fn stage(&self, stage: Stage) -> &StageConfig {
        let index = Stage::ALL
            .iter()
            .position(|s| *s == stage)
            .unwrap_or_default();
        &self.stages[index]
    }

    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }
}
