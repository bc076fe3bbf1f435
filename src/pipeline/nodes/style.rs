//! Stylesheet nodes: Sass compilation, vendor prefixing, minification
//!
//! A failing entry stylesheet is recompiled segment by segment (each
//! top-level import on its own, the remaining rules in between) so that one
//! broken partial only costs its own output. Every rejected segment is
//! logged once.

use crate::config::stage::{BrowserTargets, OutputStyle, StyleOptions};
use crate::config::StageOptions;
use crate::error::{PipelineError, PipelineResult, TransformError, TransformResult};
use crate::pipeline::keys::{ASSETS, REPORT, STAGE};
use crate::pipeline::nodes::basic::transform_contents;
use crate::pipeline::{Asset, PipeMap, PipeNode};
use async_trait::async_trait;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error};

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*@(import|use|forward)\s+(.+?);\s*$"#).expect("valid import regex")
});

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("valid quote regex"));

fn style_options(data: &PipeMap, node: &str) -> PipelineResult<StyleOptions> {
    match &data.require(STAGE, node)?.options {
        StageOptions::Style(options) => Ok(options.clone()),
        other => Err(PipelineError::config(format!(
            "{node} needs style options, got {other:?}"
        ))),
    }
}

/// Sass compiler node - compile entry stylesheets to CSS
pub struct SassCompilerNode;

#[async_trait]
impl PipeNode for SassCompilerNode {
    fn name(&self) -> String {
        "SassCompiler".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![
            STAGE.name().to_string(),
            ASSETS.name().to_string(),
            REPORT.name().to_string(),
        ]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let name = self.name();
        let options = style_options(&data, &name)?;
        let assets = data.take_required(ASSETS, &name)?;
        let report = data.require_mut(REPORT, &name)?;

        let mut compiled = Vec::new();
        for asset in assets {
            if is_partial(&asset.source) {
                debug!("Skipping partial {:?}", asset.source);
                continue;
            }

            let source = match String::from_utf8(asset.contents.clone()) {
                Ok(source) => source,
                Err(e) => {
                    let e = TransformError::from(e);
                    error!(
                        stage = "style",
                        path = %asset.source.display(),
                        "Failed to process {}: {}",
                        asset.source.display(),
                        e
                    );
                    report.record_failure(&asset.source, e.to_string());
                    continue;
                }
            };

            let outcome = compile_entry(&asset.source, &source, &options);
            for failure in &outcome.failures {
                let e = TransformError::sass(failure.to_string());
                error!(
                    stage = "style",
                    path = %asset.source.display(),
                    import = failure.target.as_deref().unwrap_or(""),
                    "Failed to process {}: {}",
                    asset.source.display(),
                    e
                );
                report.record_failure(&asset.source, e.to_string());
            }

            if let Some(css) = outcome.css {
                compiled.push(
                    Asset {
                        contents: css.into_bytes(),
                        ..asset
                    }
                    .with_extension("css"),
                );
            }
        }

        data.insert_typed(ASSETS, compiled);
        Ok(data)
    }
}

/// Prefixer node - add vendor prefixes for the configured browsers
pub struct PrefixerNode;

#[async_trait]
impl PipeNode for PrefixerNode {
    fn name(&self) -> String {
        "Prefixer".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![
            STAGE.name().to_string(),
            ASSETS.name().to_string(),
            REPORT.name().to_string(),
        ]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let name = self.name();
        let options = style_options(&data, &name)?;
        let assets = data.take_required(ASSETS, &name)?;
        let report = data.require_mut(REPORT, &name)?;

        let prefixed = transform_contents(assets, report, |asset| {
            process_css(asset, &options.targets, false).map(String::into_bytes)
        });

        data.insert_typed(ASSETS, prefixed);
        Ok(data)
    }
}

/// CSS minifier node
pub struct CssMinifierNode;

#[async_trait]
impl PipeNode for CssMinifierNode {
    fn name(&self) -> String {
        "CssMinifier".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![
            STAGE.name().to_string(),
            ASSETS.name().to_string(),
            REPORT.name().to_string(),
        ]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let name = self.name();
        let options = style_options(&data, &name)?;
        let assets = data.take_required(ASSETS, &name)?;
        let report = data.require_mut(REPORT, &name)?;

        let minified = transform_contents(assets, report, |asset| {
            process_css(asset, &options.targets, true).map(String::into_bytes)
        });

        data.insert_typed(ASSETS, minified);
        Ok(data)
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('_'))
}

fn browser_targets(targets: &BrowserTargets) -> Targets {
    // lightningcss encodes versions as major << 16 | minor << 8 | patch
    let version = |major: Option<u32>| major.map(|m| m << 16);
    Targets::from(Browsers {
        android: version(targets.android),
        chrome: version(targets.chrome),
        edge: version(targets.edge),
        firefox: version(targets.firefox),
        ie: version(targets.ie),
        ios_saf: version(targets.ios_saf),
        opera: version(targets.opera),
        safari: version(targets.safari),
        samsung: version(targets.samsung),
    })
}

/// Parse, prefix for the given browsers and print CSS, optionally minified
fn process_css(asset: &Asset, targets: &BrowserTargets, minify: bool) -> TransformResult<String> {
    let code = String::from_utf8(asset.contents.clone())?;
    let targets = browser_targets(targets);

    let mut sheet = StyleSheet::parse(
        &code,
        ParserOptions {
            filename: asset.source.display().to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| TransformError::css(e.to_string()))?;

    // Prefixes are added while lowering for the targets, which lightningcss
    // only does in its minify pass. `minify` only controls printing.
    sheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| TransformError::css(e.to_string()))?;

    let result = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| TransformError::css(e.to_string()))?;

    Ok(result.code)
}

/// One rejected piece of an entry stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    /// Import target, `None` for plain rules of the entry itself
    pub target: Option<String>,
    pub message: String,
}

impl std::fmt::Display for SegmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "import '{}': {}", target, self.message),
            None => write!(f, "stylesheet rules: {}", self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct SassOutcome {
    pub css: Option<String>,
    pub failures: Vec<SegmentFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    text: String,
    target: Option<String>,
}

fn grass_options(entry: &Path, options: &StyleOptions) -> grass::Options<'static> {
    let style = match options.output_style {
        OutputStyle::Expanded => grass::OutputStyle::Expanded,
        OutputStyle::Compressed => grass::OutputStyle::Compressed,
    };
    let mut grass_options = grass::Options::default().style(style);
    if let Some(dir) = entry.parent() {
        grass_options = grass_options.load_path(dir);
    }
    grass_options.load_paths(&options.include_paths)
}

/// Compile an entry stylesheet, isolating broken imports on failure
pub fn compile_entry(entry: &Path, source: &str, options: &StyleOptions) -> SassOutcome {
    let grass_options = grass_options(entry, options);

    match grass::from_string(source.to_string(), &grass_options) {
        Ok(css) => SassOutcome {
            css: Some(css),
            failures: Vec::new(),
        },
        Err(e) => {
            debug!("{:?} failed as a whole ({}), isolating segments", entry, e);
            compile_segments(source, &grass_options)
        }
    }
}

fn compile_segments(source: &str, grass_options: &grass::Options<'_>) -> SassOutcome {
    let mut accepted: Vec<Segment> = Vec::new();
    let mut failures = Vec::new();

    for segment in split_segments(source) {
        let candidate = join_segments(accepted.iter().chain(std::iter::once(&segment)));
        match grass::from_string(candidate, grass_options) {
            Ok(_) => accepted.push(segment),
            Err(e) => failures.push(SegmentFailure {
                target: segment.target,
                message: e.to_string(),
            }),
        }
    }

    let css = if accepted.is_empty() {
        None
    } else {
        grass::from_string(join_segments(accepted.iter()), grass_options).ok()
    };

    SassOutcome { css, failures }
}

fn join_segments<'a>(segments: impl Iterator<Item = &'a Segment>) -> String {
    segments
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a stylesheet into top-level import statements (one target each)
/// and the runs of other lines between them
fn split_segments(source: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut body = String::new();
    let mut depth: i32 = 0;

    let flush = |body: &mut String, segments: &mut Vec<Segment>| {
        if !body.trim().is_empty() {
            segments.push(Segment {
                text: std::mem::take(body),
                target: None,
            });
        }
        body.clear();
    };

    for line in source.lines() {
        let import = if depth == 0 {
            IMPORT_RE.captures(line)
        } else {
            None
        };

        match import {
            Some(captures) => {
                flush(&mut body, &mut segments);
                let rule = &captures[1];
                let targets: Vec<String> = QUOTED_RE
                    .captures_iter(&captures[2])
                    .map(|c| c[1].to_string())
                    .collect();

                if rule == "import" && targets.len() > 1 {
                    for target in targets {
                        segments.push(Segment {
                            text: format!("@import \"{target}\";"),
                            target: Some(target),
                        });
                    }
                } else {
                    segments.push(Segment {
                        text: line.to_string(),
                        target: targets
                            .into_iter()
                            .next()
                            .or_else(|| Some(captures[2].trim().to_string())),
                    });
                }
            }
            None => {
                depth += line.matches('{').count() as i32 - line.matches('}').count() as i32;
                body.push_str(line);
                body.push('\n');
            }
        }
    }
    flush(&mut body, &mut segments);

    segments
}
