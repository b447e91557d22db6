//! # Weft Core Registry Errors
//!
//! Defines error types specific to the method registry: lookup failures,
//! duplicate registrations, strategy selection failures, input-style
//! violations, and failures propagated from invoked methods.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrySystemError {
    #[error("No method '{method}' registered for component '{component}'")]
    MethodNotFound { component: String, method: String },

    #[error("No engine '{engine}' registered for '{component}::{method}'")]
    EngineNotFound {
        component: String,
        engine: String,
        method: String,
    },

    #[error("Strategy '{strategy}' selected no candidate for '{component}::{method}'")]
    NoCandidate {
        component: String,
        method: String,
        strategy: String,
    },

    #[error("Duplicate registration for full key '{full_key}'")]
    DuplicateRegistration { full_key: String },

    #[error("Unknown selection strategy '{name}'")]
    UnknownStrategy { name: String },

    #[error("Input style violation for '{full_key}': {reason}")]
    InputStyle { full_key: String, reason: String },

    #[error("Invalid directive argument '{name}': {reason}")]
    InvalidDirective { name: String, reason: String },

    #[error("Method '{full_key}' failed: {source}")]
    MethodFailed {
        full_key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}
