use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::PipeMap;
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait PipeNode: Send + Sync {
    fn name(&self) -> String;

    fn input(&self) -> Vec<String>;

    fn output(&self) -> Vec<String>;

    async fn process(&self, data: PipeMap) -> PipelineResult<PipeMap>;

    fn validate_input(&self, data: &PipeMap) -> PipelineResult<()> {
        for input in self.input() {
            let is_optional = input.ends_with('?');
            let clean_input = if is_optional {
                input.trim_end_matches('?')
            } else {
                input.as_str()
            };

            if !is_optional && !data.contains_key(clean_input) {
                return Err(PipelineError::MissingInput {
                    node: self.name(),
                    required: clean_input.to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_output(&self, data: &PipeMap) -> PipelineResult<()> {
        for output in self.output() {
            // Output does not support optional syntax, all outputs are required
            if !data.contains_key(&output) {
                return Err(PipelineError::MissingOutput {
                    node: self.name(),
                    required: output.to_string(),
                });
            }
        }
        Ok(())
    }
}

pub struct Pipeline {
    nodes: Vec<Box<dyn PipeNode>>,
    name: String,
    external_inputs: Vec<String>,
}

impl Pipeline {
    pub fn new(name: &str) -> Self {
        Self {
            nodes: Vec::new(),
            name: name.to_string(),
            external_inputs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set external inputs that will be provided via initial PipeMap
    pub fn with_external_inputs(mut self, external_inputs: Vec<String>) -> Self {
        self.external_inputs = external_inputs;
        self
    }

    pub fn add_node(mut self, node: Box<dyn PipeNode>) -> PipelineResult<Self> {
        let current_inputs = node.input();
        let mut available_sources = self.external_inputs.clone();
        for existing_node in &self.nodes {
            available_sources.extend(existing_node.output());
        }

        // The first node may be fed entirely by the initial PipeMap
        if !self.nodes.is_empty() || !self.external_inputs.is_empty() {
            let missing_inputs: Vec<_> = current_inputs
                .iter()
                .filter(|input| !input.ends_with('?'))
                .filter(|input| !available_sources.iter().any(|source| source == *input))
                .cloned()
                .collect();

            if !missing_inputs.is_empty() {
                return Err(PipelineError::config(format!(
                    "Node '{}' requires inputs {:?} that are not available.\n\
                     Available sources (previous node outputs + external inputs): {:?}\n\
                     Tip: Add '?' suffix to make inputs optional (e.g., 'report?')",
                    node.name(),
                    missing_inputs,
                    available_sources,
                )));
            }
        }

        debug!(
            "Adding node '{}' to pipeline '{}'. Inputs: {:?}, Available sources: {:?}",
            node.name(),
            self.name,
            current_inputs,
            available_sources
        );

        self.nodes.push(node);
        Ok(self)
    }

    pub async fn execute(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        debug!(
            "Executing pipeline '{}' with {} nodes",
            self.name,
            self.nodes.len()
        );

        for (index, node) in self.nodes.iter().enumerate() {
            debug!("Processing node {}: '{}'", index + 1, node.name());

            node.validate_input(&data)?;
            data = node.process(data).await?;
            node.validate_output(&data)?;

            debug!("Node '{}' processed successfully", node.name());
        }

        debug!("Pipeline '{}' executed successfully", self.name);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Stage;
    use crate::pipeline::StageReport;
    use crate::pipeline::keys::{REPORT, SOURCES};

    struct CountNode;

    #[async_trait]
    impl PipeNode for CountNode {
        fn name(&self) -> String {
            "Count".to_string()
        }

        fn input(&self) -> Vec<String> {
            vec![SOURCES.name().to_string()]
        }

        fn output(&self) -> Vec<String> {
            vec![REPORT.name().to_string()]
        }

        async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
            let matched = data.require(SOURCES, "Count")?.len();
            let mut report = StageReport::new(Stage::Font);
            report.matched = matched;
            data.insert_typed(REPORT, report);
            Ok(data)
        }
    }

    #[test]
    fn test_add_node_rejects_unavailable_input() {
        let result = Pipeline::new("wiring")
            .with_external_inputs(vec!["stage".to_string()])
            .add_node(Box::new(CountNode));
        assert!(matches!(result, Err(PipelineError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn test_execute_validates_inputs() {
        let pipeline = Pipeline::new("counting").add_node(Box::new(CountNode)).unwrap();

        let err = pipeline.execute(PipeMap::new()).await.err().unwrap();
        assert!(matches!(err, PipelineError::MissingInput { .. }));

        let mut data = PipeMap::new();
        data.insert_typed(SOURCES, Vec::new());
        let data = pipeline.execute(data).await.unwrap();
        assert_eq!(data.get_typed(REPORT).unwrap().matched, 0);
    }
}
