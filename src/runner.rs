//! Per-stage pipelines and their runner

use crate::config::constants;
use crate::config::{StageConfig, StageOptions};
use crate::error::{BuildResult, PipelineResult};
use crate::pipeline::keys::{REPORT, STAGE};
use crate::pipeline::nodes::basic::{
    ChangeFilterNode, ConcatNode, FileWriterNode, SourceCollectorNode, SourceReaderNode,
};
use crate::pipeline::nodes::image::ImageOptimizerNode;
use crate::pipeline::nodes::markup::HtmlMinifierNode;
use crate::pipeline::nodes::script::JsMinifierNode;
use crate::pipeline::nodes::style::{CssMinifierNode, PrefixerNode, SassCompilerNode};
use crate::pipeline::{PipeMap, Pipeline, StageReport};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Assemble the node sequence for one stage
pub fn stage_pipeline(config: &StageConfig) -> PipelineResult<Pipeline> {
    let stage = config.stage;
    let mut pipeline = Pipeline::new(&format!("{stage}Pipeline"))
        .with_external_inputs(vec![STAGE.name().to_string()])
        .add_node(Box::new(SourceCollectorNode))?;

    if stage.uses_change_filter() {
        pipeline = pipeline.add_node(Box::new(ChangeFilterNode))?;
    }
    pipeline = pipeline.add_node(Box::new(SourceReaderNode))?;

    pipeline = match &config.options {
        StageOptions::Style(options) => pipeline
            .add_node(Box::new(SassCompilerNode))?
            .add_node(Box::new(PrefixerNode))?
            .add_node(Box::new(FileWriterNode))?
            .add_node(Box::new(CssMinifierNode))?
            .add_node(Box::new(ConcatNode::new(bundle_name(
                &options.bundle,
                constants::STYLE_BUNDLE,
            ))))?
            .add_node(Box::new(FileWriterNode))?,
        StageOptions::Script(options) => pipeline
            .add_node(Box::new(FileWriterNode))?
            .add_node(Box::new(JsMinifierNode))?
            .add_node(Box::new(ConcatNode::new(bundle_name(
                &options.bundle,
                constants::SCRIPT_BUNDLE,
            ))))?
            .add_node(Box::new(FileWriterNode))?,
        StageOptions::Image(_) => pipeline
            .add_node(Box::new(ImageOptimizerNode))?
            .add_node(Box::new(FileWriterNode))?,
        StageOptions::Font => pipeline.add_node(Box::new(FileWriterNode))?,
        StageOptions::Markup(_) => pipeline
            .add_node(Box::new(HtmlMinifierNode))?
            .add_node(Box::new(FileWriterNode))?,
    };

    Ok(pipeline)
}

fn bundle_name<'a>(configured: &'a str, fallback: &'a str) -> &'a str {
    if configured.trim().is_empty() {
        fallback
    } else {
        configured
    }
}

/// Run one stage over its whole input set.
///
/// Per-file failures end up in the report; anything returned as `Err`
/// aborted the stage.
pub async fn run_stage(config: &StageConfig) -> BuildResult<StageReport> {
    let started = Instant::now();
    debug!(
        "Running {} stage with options {:?}",
        config.stage,
        config.options()
    );

    let pipeline = stage_pipeline(config)?;
    let mut data = PipeMap::new();
    data.insert_typed(STAGE, config.clone());

    let mut result = pipeline.execute(data).await?;
    let report = result.take_required(REPORT, pipeline.name())?;

    log_report(&report, started);
    Ok(report)
}

fn log_report(report: &StageReport, started: Instant) {
    let elapsed = started.elapsed();
    if report.is_clean() {
        info!(
            stage = %report.stage,
            "Finished '{}' after {:?}: {} matched, {} skipped, {} written",
            report.stage,
            elapsed,
            report.matched,
            report.skipped.len(),
            report.written.len()
        );
    } else {
        warn!(
            stage = %report.stage,
            "Finished '{}' after {:?} with {} failed files: {} matched, {} written",
            report.stage,
            elapsed,
            report.failures.len(),
            report.matched,
            report.written.len()
        );
    }
}
