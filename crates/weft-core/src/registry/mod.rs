//! # Weft Core Method Registry
//!
//! This module provides the process-wide index of domain method
//! implementations. Domain plug-ins contribute callables keyed by a
//! `(component, method, engine)` triple; the registry selects one
//! implementation per call through a pluggable [`SelectionStrategy`] and
//! dispatches to it.
//!
//! ## Core Concepts & Components:
//!
//! - **[`Registration`]**: One callable made available by a provider, with
//!   version, priority, and deprecation metadata.
//! - **[`MethodIndex`](index::MethodIndex)**: The hierarchical
//!   `component → method → engine` lookup structure behind the registry.
//! - **[`SelectionStrategy`](strategy::SelectionStrategy)**: A policy that
//!   picks exactly one registration out of a candidate set. Built-in
//!   strategies: `default`, `latest`, `stable`, `priority`,
//!   `engine_override`.
//! - **[`MethodProvider`](provider::MethodProvider)**: The trait plug-ins
//!   implement to contribute method definitions; the registry scans
//!   providers and registers everything they declare.
//! - **[`MethodHandle`](handle::MethodHandle)**: A late-binding token that
//!   defers implementation choice from configuration time to execution time,
//!   with deterministic signature prediction for cache keys.
//! - **[`SharedMethodRegistry`](registry::SharedMethodRegistry)**: The
//!   thread-safe public face of the registry.
pub mod conflict;
pub mod error;
pub mod handle;
pub mod index;
pub mod provider;
pub mod registry;
pub mod strategy;
pub mod style;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use semver::Version;
use serde::Serialize;
use serde_json::Value;

use crate::registry::error::RegistrySystemError;

/// Boxed error type used by method callables
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Owned future returned by a method callable
pub type MethodFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, BoxError>> + Send>>;

/// A registered method implementation body
pub type MethodCallable = Arc<dyn Fn(MethodArgs) -> MethodFuture + Send + Sync>;

/// Arguments passed to a method invocation.
///
/// `primary` carries the unnamed first positional input of the method-chain
/// convention; `named` carries keyword arguments bound from step parameters.
#[derive(Debug, Clone, Default)]
pub struct MethodArgs {
    pub primary: Option<Value>,
    pub named: BTreeMap<String, Value>,
}

impl MethodArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary(mut self, value: Value) -> Self {
        self.primary = Some(value);
        self
    }

    pub fn with_arg(mut self, name: &str, value: Value) -> Self {
        self.named.insert(name.to_string(), value);
        self
    }

    /// Get a named argument
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Get a named argument, or fail with a descriptive error
    pub fn require(&self, name: &str) -> std::result::Result<&Value, BoxError> {
        self.named
            .get(name)
            .ok_or_else(|| format!("missing required argument '{}'", name).into())
    }
}

/// One callable made available by a domain provider.
///
/// Inserted during registry scans; replaced under the configured conflict
/// policy; removed only by an explicit `refresh()` re-scan.
#[derive(Clone)]
pub struct Registration {
    /// Logical namespace grouping related methods
    pub component: String,
    /// Public name of the operation
    pub method: String,
    /// Tag identifying this implementation
    pub engine: String,
    /// Implementation version
    pub version: Version,
    /// Selection priority; higher wins
    pub priority: i32,
    /// Deprecated implementations are kept but excluded by default strategies
    pub deprecated: bool,
    pub description: String,
    /// Whether the callable accepts the unnamed first positional (chain) input
    pub takes_primary: bool,
    /// Declared shape of the primary input
    pub input_shape: InputShape,
    pub callable: MethodCallable,
}

impl Registration {
    /// `component::engine::method`, unique across all live registrations
    pub fn full_key(&self) -> String {
        format!("{}::{}::{}", self.component, self.engine, self.method)
    }

    /// Metadata view of this registration
    pub fn info(&self) -> ImplementationInfo {
        ImplementationInfo {
            component: self.component.clone(),
            method: self.method.clone(),
            engine: self.engine.clone(),
            version: self.version.clone(),
            priority: self.priority,
            deprecated: self.deprecated,
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("full_key", &self.full_key())
            .field("version", &self.version)
            .field("priority", &self.priority)
            .field("deprecated", &self.deprecated)
            .finish_non_exhaustive()
    }
}

/// Metadata describing one implementation, without the callable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImplementationInfo {
    pub component: String,
    pub method: String,
    pub engine: String,
    pub version: Version,
    pub priority: i32,
    pub deprecated: bool,
    pub description: String,
}

impl ImplementationInfo {
    /// Stable `method@engine:version:priority` token used in node signatures
    pub fn signature_token(&self) -> String {
        format!(
            "{}@{}:{}:{}",
            self.method, self.engine, self.version, self.priority
        )
    }
}

impl fmt::Display for ImplementationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{} v{} (priority {}{})",
            self.component,
            self.engine,
            self.method,
            self.version,
            self.priority,
            if self.deprecated { ", deprecated" } else { "" }
        )
    }
}

/// A method definition produced by a [`MethodProvider`](provider::MethodProvider).
///
/// The registry converts definitions into [`Registration`]s, assigning the
/// insertion order used for tie-breaking.
#[derive(Clone)]
pub struct MethodDef {
    pub component: String,
    pub engine: String,
    pub method: String,
    pub version: Version,
    pub priority: i32,
    pub deprecated: bool,
    pub description: String,
    pub takes_primary: bool,
    pub input_shape: InputShape,
    pub callable: MethodCallable,
}

impl MethodDef {
    /// Create a definition with version `0.1.0`, priority 0 and no primary input
    pub fn new(component: &str, engine: &str, method: &str, callable: MethodCallable) -> Self {
        Self {
            component: component.to_string(),
            engine: engine.to_string(),
            method: method.to_string(),
            version: Version::new(0, 1, 0),
            priority: 0,
            deprecated: false,
            description: String::new(),
            takes_primary: false,
            input_shape: InputShape::Any,
            callable,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn takes_primary(mut self, takes_primary: bool) -> Self {
        self.takes_primary = takes_primary;
        self
    }

    pub fn input_shape(mut self, shape: InputShape) -> Self {
        self.input_shape = shape;
        self
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("component", &self.component)
            .field("engine", &self.engine)
            .field("method", &self.method)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Wrap an async closure as a [`MethodCallable`]
pub fn callable<F, Fut>(f: F) -> MethodCallable
where
    F: Fn(MethodArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, BoxError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// Wrap a synchronous closure as a [`MethodCallable`]
pub fn sync_callable<F>(f: F) -> MethodCallable
where
    F: Fn(MethodArgs) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
{
    Arc::new(move |args| {
        let result = f(args);
        Box::pin(async move { result })
    })
}

// Re-export important types
pub use conflict::ConflictPolicy;
pub use handle::{EnginePreference, MethodHandle};
pub use index::MethodIndex;
pub use provider::MethodProvider;
pub use registry::{MethodRegistry, SharedMethodRegistry};
pub use strategy::{SelectionStrategy, StrategySet};
pub use style::{InputShape, InputStylePolicy};

/// Shorthand for Result with the registry error type
pub type Result<T> = std::result::Result<T, RegistrySystemError>;

// Test module declaration
#[cfg(test)]
mod tests;
