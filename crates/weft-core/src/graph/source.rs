//! Dependency sources.
//!
//! Each source inspects the complete step-spec map and one step name, and
//! yields that step's inbound edges. The config service runs every source
//! over every step when building the graph; additional sources (resource,
//! temporal) can be plugged in the same way.
use std::collections::BTreeMap;

use crate::config::{ParamValue, StepSpec};
use crate::graph::error::GraphSystemError;
use crate::graph::{DepType, DependencyEdge};

/// Pluggable extractor of inbound dependency edges
pub trait DependencySource: Send + Sync {
    fn name(&self) -> &str;

    /// Inbound edges of `step`, given the full spec map
    fn edges_for(
        &self,
        specs: &BTreeMap<String, StepSpec>,
        step: &str,
    ) -> std::result::Result<Vec<DependencyEdge>, GraphSystemError>;
}

/// Yields a DATA edge for every parameter value that references an upstream
/// output.
pub struct DataDependencySource;

impl DependencySource for DataDependencySource {
    fn name(&self) -> &str {
        "data"
    }

    fn edges_for(
        &self,
        specs: &BTreeMap<String, StepSpec>,
        step: &str,
    ) -> std::result::Result<Vec<DependencyEdge>, GraphSystemError> {
        let Some(spec) = specs.get(step) else {
            return Ok(Vec::new());
        };
        let mut edges = Vec::new();
        for value in spec.parameters.values() {
            if let ParamValue::Ref(output_ref) = value {
                if !specs.contains_key(&output_ref.step) {
                    return Err(GraphSystemError::UnknownReference {
                        step: step.to_string(),
                        referenced: output_ref.step.clone(),
                    });
                }
                edges.push(
                    DependencyEdge::new(&output_ref.step, step, DepType::Data)
                        .with_metadata(&output_ref.output),
                );
            }
        }
        Ok(edges)
    }
}

/// Yields an EXPLICIT edge per `depends_on` entry. Pure ordering: no dataset
/// flows along these edges.
pub struct ExplicitDependencySource;

impl DependencySource for ExplicitDependencySource {
    fn name(&self) -> &str {
        "explicit"
    }

    fn edges_for(
        &self,
        specs: &BTreeMap<String, StepSpec>,
        step: &str,
    ) -> std::result::Result<Vec<DependencyEdge>, GraphSystemError> {
        let Some(spec) = specs.get(step) else {
            return Ok(Vec::new());
        };
        let mut edges = Vec::new();
        for upstream in &spec.depends_on {
            if !specs.contains_key(upstream) {
                return Err(GraphSystemError::UnknownReference {
                    step: step.to_string(),
                    referenced: upstream.clone(),
                });
            }
            edges.push(DependencyEdge::new(upstream, step, DepType::Explicit));
        }
        Ok(edges)
    }
}
