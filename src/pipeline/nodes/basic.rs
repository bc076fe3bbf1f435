use crate::config::constants;
use crate::error::{BuildError, PipelineError, PipelineResult, TransformResult};
use crate::pipeline::keys::{ASSETS, REPORT, SOURCES, STAGE};
use crate::pipeline::{Asset, PipeMap, PipeNode, StageReport};
use crate::util::change::ChangeFilter;
use crate::util::file::collect_sources;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, error};

/// Source collector node - expand the stage's input patterns
pub struct SourceCollectorNode;

#[async_trait]
impl PipeNode for SourceCollectorNode {
    fn name(&self) -> String {
        "SourceCollector".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![STAGE.name().to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec![SOURCES.name().to_string(), REPORT.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let stage = data.require(STAGE, &self.name())?;
        let sources = collect_sources(stage).map_err(PipelineError::node)?;

        let mut report = StageReport::new(stage.stage);
        report.matched = sources.len();
        debug!("Found {} {} sources", sources.len(), stage.stage);

        data.insert_typed(SOURCES, sources);
        data.insert_typed(REPORT, report);
        Ok(data)
    }
}

/// Change filter node - drop sources whose output is up to date
pub struct ChangeFilterNode;

#[async_trait]
impl PipeNode for ChangeFilterNode {
    fn name(&self) -> String {
        "ChangeFilter".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![
            STAGE.name().to_string(),
            SOURCES.name().to_string(),
            REPORT.name().to_string(),
        ]
    }

    fn output(&self) -> Vec<String> {
        vec![SOURCES.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let name = self.name();
        let filter = ChangeFilter::new(&data.require(STAGE, &name)?.output);
        let sources = data.take_required(SOURCES, &name)?;

        let mut stale = Vec::with_capacity(sources.len());
        let mut fresh = Vec::new();
        for source in sources {
            if filter.is_stale(&source).await.map_err(PipelineError::node)? {
                debug!("Source changed: {:?}", source.path);
                stale.push(source);
            } else {
                fresh.push(source.path);
            }
        }

        debug!(
            "{} sources stale, {} up to date in {:?}",
            stale.len(),
            fresh.len(),
            filter.dest()
        );
        data.require_mut(REPORT, &name)?.skipped.extend(fresh);
        data.insert_typed(SOURCES, stale);
        Ok(data)
    }
}

/// Source reader node - load every source into memory
pub struct SourceReaderNode;

#[async_trait]
impl PipeNode for SourceReaderNode {
    fn name(&self) -> String {
        "SourceReader".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![SOURCES.name().to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let sources = data.require(SOURCES, &self.name())?;

        let mut assets = Vec::with_capacity(sources.len());
        for source in sources {
            let contents = tokio::fs::read(&source.path)
                .await
                .map_err(|e| PipelineError::node(BuildError::io(&source.path, e)))?;
            assets.push(Asset::from_source(source, contents));
        }

        data.insert_typed(ASSETS, assets);
        Ok(data)
    }
}

/// File writer node - write assets below the stage output directory
pub struct FileWriterNode;

#[async_trait]
impl PipeNode for FileWriterNode {
    fn name(&self) -> String {
        "FileWriter".to_string()
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
        let output = data.require(STAGE, &name)?.output.clone();

        let mut written = Vec::new();
        for asset in data.require(ASSETS, &name)? {
            let target = output.join(&asset.relative);
            // Destinations may vanish between runs, recreate on demand
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PipelineError::node(BuildError::io(parent, e)))?;
            }
            tokio::fs::write(&target, &asset.contents)
                .await
                .map_err(|e| PipelineError::node(BuildError::io(&target, e)))?;

            debug!("Wrote {:?} ({} bytes)", target, asset.contents.len());
            written.push(target);
        }

        data.require_mut(REPORT, &name)?.written.extend(written);
        Ok(data)
    }
}

/// Concat node - join every asset into one named artifact, in order
pub struct ConcatNode {
    file_name: String,
}

impl ConcatNode {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

#[async_trait]
impl PipeNode for ConcatNode {
    fn name(&self) -> String {
        format!("Concat({})", self.file_name)
    }

    fn input(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let assets = data.take_required(ASSETS, &self.name())?;
        data.insert_typed(ASSETS, concat(&self.file_name, &assets).into_iter().collect());
        Ok(data)
    }
}

/// Join asset contents with a newline; nothing to join yields no artifact
pub fn concat(file_name: &str, assets: &[Asset]) -> Option<Asset> {
    if assets.is_empty() {
        return None;
    }

    let separator = constants::CONCAT_SEPARATOR.as_bytes();
    let mut contents = Vec::new();
    for (index, asset) in assets.iter().enumerate() {
        if index > 0 {
            contents.extend_from_slice(separator);
        }
        contents.extend_from_slice(&asset.contents);
    }

    Some(Asset {
        source: PathBuf::from(file_name),
        relative: PathBuf::from(file_name),
        contents,
    })
}

/// Apply a per-file transform. Failures are logged with the source path,
/// recorded in the report, and the file is dropped from the run.
pub fn transform_contents<F>(
    assets: Vec<Asset>,
    report: &mut StageReport,
    mut transform: F,
) -> Vec<Asset>
where
    F: FnMut(&Asset) -> TransformResult<Vec<u8>>,
{
    assets
        .into_iter()
        .filter_map(|asset| match transform(&asset) {
            Ok(contents) => Some(Asset { contents, ..asset }),
            Err(e) => {
                error!(
                    stage = %report.stage,
                    path = %asset.source.display(),
                    "Failed to process {}: {}",
                    asset.source.display(),
                    e
                );
                report.record_failure(&asset.source, e.to_string());
                None
            }
        })
        .collect()
}
