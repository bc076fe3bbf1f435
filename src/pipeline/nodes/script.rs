use crate::error::PipelineResult;
use crate::pipeline::keys::{ASSETS, REPORT};
use crate::pipeline::nodes::basic::transform_contents;
use crate::pipeline::{PipeMap, PipeNode};
use async_trait::async_trait;
use tracing::debug;

/// JS minifier node
pub struct JsMinifierNode;

#[async_trait]
impl PipeNode for JsMinifierNode {
    fn name(&self) -> String {
        "JsMinifier".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![ASSETS.name().to_string(), REPORT.name().to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let name = self.name();
        let assets = data.take_required(ASSETS, &name)?;
        let report = data.require_mut(REPORT, &name)?;

        let minified = transform_contents(assets, report, |asset| {
            let code = String::from_utf8(asset.contents.clone())?;
            let out = minifier::js::minify(&code).to_string();
            debug!(
                "Minified {:?}: {} -> {} bytes",
                asset.source,
                code.len(),
                out.len()
            );
            Ok(out.into_bytes())
        });

        data.insert_typed(ASSETS, minified);
        Ok(data)
    }
}
