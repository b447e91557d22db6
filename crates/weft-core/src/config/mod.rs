//! # Weft Core Configuration
//!
//! This module turns a declarative configuration tree into validated step
//! specs, a dependency graph, and compiled node configs ready for the
//! execution engine.
//!
//! ## Core Concepts & Components:
//!
//! - **[`PipelineFile`] / [`PipelineSpec`]**: The serde schema of the
//!   `pipeline:` document (name, orchestration directives, steps as a list
//!   or a name-keyed map).
//! - **[`StepSpec`]**: One declarative step: component, engine (or `auto`),
//!   a method chain, parameters (literals or upstream references), declared
//!   outputs, and explicit `depends_on` names.
//! - **[`ParamValue`](reference::ParamValue) /
//!   [`OutputRef`](reference::OutputRef)**: Literal-vs-reference parameter
//!   values and the `steps.<step>.outputs.parameters.<name>` syntax.
//! - **[`NodeConfig`](node::NodeConfig)**: The compiled form of a step, with
//!   one late-binding method handle per chained method.
//! - **[`ConfigService`](service::ConfigService)**: load → parse →
//!   scan references → build graph → plan → build nodes.
pub mod error;
pub mod node;
pub mod reference;
pub mod service;

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::error::ConfigSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Top level of a configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineFile {
    pub pipeline: PipelineSpec,
}

/// The `pipeline:` block
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default)]
    pub orchestration: OrchestrationSpec,
    #[serde(deserialize_with = "steps_field")]
    pub steps: Vec<StepSpec>,
}

/// Scheduling granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Node,
    Pipeline,
}

/// How nodes inside one layer are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRunner {
    #[default]
    Sequential,
    Concurrent,
}

/// Orchestration directives with their documented defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationSpec {
    pub granularity: Granularity,
    pub task_runner: TaskRunner,
    pub max_workers: usize,
    pub soft_fail: bool,
    pub retry_count: u32,
    /// Seconds between retry attempts
    pub retry_delay: u64,
    /// Per-node wall-clock timeout, seconds
    pub timeout: Option<u64>,
}

impl Default for OrchestrationSpec {
    fn default() -> Self {
        Self {
            granularity: Granularity::Node,
            task_runner: TaskRunner::Sequential,
            max_workers: 1,
            soft_fail: false,
            retry_count: 0,
            retry_delay: 0,
            timeout: None,
        }
    }
}

/// Declared output of a step
#[derive(Debug, Clone, Deserialize)]
pub struct OutputDecl {
    pub name: String,
    #[serde(default, rename = "type")]
    pub dtype: Option<String>,
}

/// The `outputs:` block of a step
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputsSpec {
    #[serde(default)]
    pub parameters: Vec<OutputDecl>,
}

/// One declarative step from the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StepSpec {
    /// Unique step name; filled from the map key in map-form configs
    #[serde(default)]
    pub name: String,
    pub component: String,
    /// A fixed engine tag, or `auto`
    #[serde(default = "default_engine")]
    pub engine: String,
    /// One method, or an ordered method chain
    #[serde(deserialize_with = "method_field")]
    pub method: Vec<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub outputs: OutputsSpec,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl StepSpec {
    /// Declared output names, in declaration order
    pub fn output_names(&self) -> Vec<String> {
        self.outputs
            .parameters
            .iter()
            .map(|o| o.name.clone())
            .collect()
    }

    /// Whether the step wants automatic engine selection
    pub fn is_auto_engine(&self) -> bool {
        self.engine == "auto"
    }
}

fn default_engine() -> String {
    "auto".to_string()
}

/// Accept `method: clean` as well as `method: [clean, validate]`
fn method_field<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let methods = match value {
        Value::String(s) => vec![s],
        Value::Array(items) => {
            let mut methods = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => methods.push(s),
                    other => {
                        return Err(D::Error::custom(format!(
                            "method chain entries must be strings, got {}",
                            other
                        )))
                    }
                }
            }
            methods
        }
        other => {
            return Err(D::Error::custom(format!(
                "method must be a string or a list of strings, got {}",
                other
            )))
        }
    };
    if methods.is_empty() {
        return Err(D::Error::custom("method chain must not be empty"));
    }
    Ok(methods)
}

/// Accept steps as a sequence of specs or as a name-keyed map
fn steps_field<'de, D>(deserializer: D) -> std::result::Result<Vec<StepSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => {
            let mut steps = Vec::with_capacity(items.len());
            for item in items {
                let step: StepSpec =
                    serde_json::from_value(item).map_err(D::Error::custom)?;
                if step.name.is_empty() {
                    return Err(D::Error::custom("list-form steps must carry a name"));
                }
                steps.push(step);
            }
            Ok(steps)
        }
        Value::Object(map) => {
            let mut steps = Vec::with_capacity(map.len());
            for (name, item) in map {
                let mut step: StepSpec =
                    serde_json::from_value(item).map_err(D::Error::custom)?;
                if !step.name.is_empty() && step.name != name {
                    return Err(D::Error::custom(format!(
                        "step '{}' also declares conflicting name '{}'",
                        name, step.name
                    )));
                }
                step.name = name;
                steps.push(step);
            }
            Ok(steps)
        }
        other => Err(D::Error::custom(format!(
            "pipeline.steps must be a list or a map, got {}",
            other
        ))),
    }
}

// Re-export important types
pub use node::NodeConfig;
pub use reference::{OutputRef, ParamValue};
pub use service::{ConfigService, FlowPlan};

/// Shorthand for Result with the config error type
pub type Result<T> = std::result::Result<T, ConfigSystemError>;

// Test module declaration
#[cfg(test)]
mod tests;
