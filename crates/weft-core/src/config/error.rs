//! # Weft Core Config Errors
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigSystemError {
    #[error("I/O error during '{operation}' on '{path}': {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        operation: String,
    },

    #[error("Unknown or unsupported config format for path: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to parse {format} configuration: {source}")]
    Deserialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Invalid step '{step}': {reason}")]
    InvalidStep { step: String, reason: String },

    #[error("Duplicate step name '{name}'")]
    DuplicateStep { name: String },

    #[error("Invalid configuration structure: {reason}")]
    InvalidStructure { reason: String },
}
