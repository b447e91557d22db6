//! # Weft Core Engine Errors
//!
//! Defines error types raised while executing a flow: node failures, cache
//! integrity violations, catalog misuse, timeouts, and cancellation.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineSystemError {
    #[error("Node '{step}' failed (signature {signature}): {source}")]
    NodeExecution {
        step: String,
        signature: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Cache integrity violation for '{step}': outputs missing despite matching signature: {missing:?}")]
    CacheIntegrity { step: String, missing: Vec<String> },

    #[error("Duplicate catalog write for dataset '{dataset}'")]
    DuplicateCatalogWrite { dataset: String },

    #[error("Node '{step}' expected a mapping with output keys {expected:?}, got a non-matching result")]
    OutputShapeMismatch { step: String, expected: Vec<String> },

    #[error("Node '{step}' timed out after {seconds}s")]
    Timeout { step: String, seconds: u64 },

    #[error("Flow cancelled while '{step}' was pending")]
    Cancelled { step: String },

    #[error("State store I/O error during '{operation}' on '{path}': {source}")]
    State {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        operation: String,
    },

    #[error("Failed to encode state for '{step}': {source}")]
    StateEncoding {
        step: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}
