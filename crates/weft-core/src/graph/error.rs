//! # Weft Core Graph Errors
//!
//! Defines error types specific to dependency-graph construction and
//! execution planning.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphSystemError {
    #[error("Dependency cycle detected. Path: {cycle_path:?}")]
    CycleDetected { cycle_path: Vec<String> },

    #[error("Step '{step}' references unknown step '{referenced}'")]
    UnknownReference { step: String, referenced: String },

    #[error("Edge '{from}' -> '{to}' names a node missing from the graph")]
    MissingEndpoint { from: String, to: String },

    #[error("Duplicate node '{name}' in dependency graph")]
    DuplicateNode { name: String },
}
