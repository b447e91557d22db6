//! Compiled node configs.
use std::collections::BTreeMap;

use crate::config::reference::{OutputRef, ParamValue};
use crate::config::StepSpec;
use crate::registry::handle::{EnginePreference, MethodHandle};

/// The compiled form of a [`StepSpec`] used by the execution engine.
///
/// Owns one late-binding [`MethodHandle`] per method in the chain; the
/// handles' caches live and die with this config.
pub struct NodeConfig {
    pub name: String,
    pub component: String,
    pub methods: Vec<String>,
    pub engine: EnginePreference,
    pub handles: Vec<MethodHandle>,
    pub parameters: BTreeMap<String, ParamValue>,
    /// Resolved upstream references, in parameter order
    pub input_refs: Vec<OutputRef>,
    /// Declared output dataset names (without the step prefix)
    pub outputs: Vec<String>,
    pub depends_on: Vec<String>,
}

impl NodeConfig {
    /// Compile a step spec into a node config
    pub fn from_spec(spec: &StepSpec) -> Self {
        let engine = if spec.is_auto_engine() {
            EnginePreference::Auto
        } else {
            EnginePreference::Fixed(spec.engine.clone())
        };
        let handles = spec
            .method
            .iter()
            .map(|method| MethodHandle::new(&spec.component, method, engine.clone()))
            .collect();
        let input_refs = spec
            .parameters
            .values()
            .filter_map(|v| v.as_ref().cloned())
            .collect();
        Self {
            name: spec.name.clone(),
            component: spec.component.clone(),
            methods: spec.method.clone(),
            engine,
            handles,
            parameters: spec.parameters.clone(),
            input_refs,
            outputs: spec.output_names(),
            depends_on: spec.depends_on.clone(),
        }
    }

    /// Literal parameters only, as raw JSON values
    pub fn literal_parameters(&self) -> BTreeMap<String, serde_json::Value> {
        self.parameters
            .iter()
            .filter_map(|(k, v)| v.as_literal().map(|value| (k.clone(), value.clone())))
            .collect()
    }

    /// Fully qualified dataset names this node writes
    pub fn dataset_names(&self) -> Vec<String> {
        self.outputs
            .iter()
            .map(|output| format!("{}__{}", self.name, output))
            .collect()
    }

    /// The first declared output, by convention the primary one
    pub fn primary_output(&self) -> Option<&str> {
        self.outputs.first().map(|s| s.as_str())
    }
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("name", &self.name)
            .field("component", &self.component)
            .field("methods", &self.methods)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}
