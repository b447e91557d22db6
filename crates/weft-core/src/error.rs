//! # Weft Core Errors
//!
//! Defines the top-level error type for the weft orchestrator core.
//!
//! Each subsystem (registry, graph, config, engine, hooks) carries its own
//! `thiserror` enum; [`Error`] aggregates them so callers can hold a single
//! error type across subsystem boundaries.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::error::ConfigSystemError;
use crate::engine::error::EngineSystemError;
use crate::graph::error::GraphSystemError;
use crate::hooks::error::HookSystemError;
use crate::registry::error::RegistrySystemError;

/// Top-level error type for the weft orchestrator
#[derive(Debug, ThisError)]
pub enum Error {
    /// Method registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistrySystemError),

    /// Dependency graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphSystemError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigSystemError),

    /// Execution engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineSystemError),

    /// Hook bus error
    #[error("Hook error: {0}")]
    Hook(#[from] HookSystemError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Process exit code for this error at the flow-runner boundary.
    ///
    /// Pre-execution errors (configuration, graph construction) exit with 2;
    /// everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Graph(_) => 2,
            _ => 1,
        }
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
