//! The config service: from a configuration document to an executable flow.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::error::ConfigSystemError;
use crate::config::node::NodeConfig;
use crate::config::{ConfigFormat, OutputDecl, PipelineFile, PipelineSpec, Result, StepSpec};
use crate::config::{OrchestrationSpec, ParamValue};
use crate::graph::plan::ExecutionPlan;
use crate::graph::source::{DataDependencySource, DependencySource, ExplicitDependencySource};
use crate::graph::DependencyGraph;

/// A fully compiled flow: validated specs, graph, plan, and node configs
pub struct FlowPlan {
    pub name: String,
    pub orchestration: OrchestrationSpec,
    pub specs: BTreeMap<String, StepSpec>,
    pub nodes: BTreeMap<String, Arc<NodeConfig>>,
    pub graph: DependencyGraph,
    pub plan: ExecutionPlan,
}

impl std::fmt::Debug for FlowPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowPlan")
            .field("name", &self.name)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("layers", &self.plan.depth())
            .finish()
    }
}

/// Turns a configuration tree into a validated graph and an ordered set of
/// node configs ready for the engine.
pub struct ConfigService {
    sources: Vec<Arc<dyn DependencySource>>,
}

impl std::fmt::Debug for ConfigService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("ConfigService").field("sources", &names).finish()
    }
}

impl ConfigService {
    /// Create a service with the data and explicit dependency sources
    pub fn new() -> Self {
        Self {
            sources: vec![
                Arc::new(DataDependencySource),
                Arc::new(ExplicitDependencySource),
            ],
        }
    }

    /// Plug in an additional dependency source (resource, temporal, ...)
    pub fn add_source(&mut self, source: Arc<dyn DependencySource>) {
        self.sources.push(source);
    }

    /// Load and parse a configuration file, detecting the format from the
    /// extension.
    pub fn load_file(&self, path: &Path) -> Result<PipelineSpec> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            ConfigSystemError::UnsupportedFormat {
                path: path.to_path_buf(),
            }
        })?;
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigSystemError::Io {
                source,
                path: path.to_path_buf(),
                operation: "read config".to_string(),
            })?;
        self.load_str(&contents, format)
    }

    /// Parse configuration text in the given format
    pub fn load_str(&self, contents: &str, format: ConfigFormat) -> Result<PipelineSpec> {
        let file: PipelineFile = match format {
            ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| {
                ConfigSystemError::Deserialization {
                    format: "JSON".to_string(),
                    source: Box::new(e),
                }
            })?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| {
                ConfigSystemError::Deserialization {
                    format: "YAML".to_string(),
                    source: Box::new(e),
                }
            })?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| {
                ConfigSystemError::Deserialization {
                    format: "TOML".to_string(),
                    source: Box::new(e),
                }
            })?,
        };
        Ok(file.pipeline)
    }

    /// Validate and compile a parsed spec into a [`FlowPlan`].
    ///
    /// Bubbles `CyclicDependencyError` and `UnknownReferenceError` from graph
    /// construction via the crate error type at the call site.
    pub fn compile(&self, spec: PipelineSpec) -> crate::error::Result<FlowPlan> {
        let mut specs = self.parse_steps(spec.steps)?;
        self.scan_references(&mut specs)?;
        let graph = self.build_dependency_graph(&specs)?;
        let plan = ExecutionPlan::from_graph(&graph)?;
        let nodes = self.build_auto_nodes(&specs);
        Ok(FlowPlan {
            name: spec.name,
            orchestration: spec.orchestration,
            specs,
            nodes,
            graph,
            plan,
        })
    }

    /// Convenience: load, parse, and compile a file in one call
    pub fn compile_file(&self, path: &Path) -> crate::error::Result<FlowPlan> {
        let spec = self.load_file(path)?;
        self.compile(spec)
    }

    /// Index steps by name, rejecting duplicates and structural misuse
    fn parse_steps(&self, steps: Vec<StepSpec>) -> Result<BTreeMap<String, StepSpec>> {
        if steps.is_empty() {
            return Err(ConfigSystemError::InvalidStructure {
                reason: "pipeline.steps must not be empty".to_string(),
            });
        }
        let mut specs = BTreeMap::new();
        for step in steps {
            if step.name.is_empty() {
                return Err(ConfigSystemError::InvalidStructure {
                    reason: "every step must carry a non-empty name".to_string(),
                });
            }
            if step.component.is_empty() {
                return Err(ConfigSystemError::InvalidStep {
                    step: step.name.clone(),
                    reason: "component must not be empty".to_string(),
                });
            }
            let name = step.name.clone();
            if specs.insert(name.clone(), step).is_some() {
                return Err(ConfigSystemError::DuplicateStep { name });
            }
        }
        Ok(specs)
    }

    /// Walk every parameter value; record referenced outputs, and auto-add
    /// any referenced output missing from the upstream step's declarations.
    fn scan_references(&self, specs: &mut BTreeMap<String, StepSpec>) -> Result<()> {
        let mut referenced: Vec<(String, String)> = Vec::new();
        for spec in specs.values() {
            for value in spec.parameters.values() {
                if let ParamValue::Ref(output_ref) = value {
                    referenced.push((output_ref.step.clone(), output_ref.output.clone()));
                }
            }
        }
        for (step, output) in referenced {
            // Unknown upstream steps are reported by graph construction;
            // here we only widen declared outputs.
            if let Some(upstream) = specs.get_mut(&step) {
                let declared = upstream.outputs.parameters.iter().any(|o| o.name == output);
                if !declared {
                    log::debug!("auto-adding output '{}' to step '{}'", output, step);
                    upstream.outputs.parameters.push(OutputDecl {
                        name: output,
                        dtype: None,
                    });
                }
            }
        }
        Ok(())
    }

    /// Run every dependency source over every step and assemble the graph
    fn build_dependency_graph(
        &self,
        specs: &BTreeMap<String, StepSpec>,
    ) -> crate::error::Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for name in specs.keys() {
            graph.add_node(name);
        }
        for name in specs.keys() {
            for source in &self.sources {
                for edge in source.edges_for(specs, name)? {
                    graph.add_edge(edge)?;
                }
            }
        }
        graph.validate()?;
        Ok(graph)
    }

    /// Compile each spec into a node config with one handle per method
    fn build_auto_nodes(
        &self,
        specs: &BTreeMap<String, StepSpec>,
    ) -> BTreeMap<String, Arc<NodeConfig>> {
        specs
            .iter()
            .map(|(name, spec)| (name.clone(), Arc::new(NodeConfig::from_spec(spec))))
            .collect()
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
