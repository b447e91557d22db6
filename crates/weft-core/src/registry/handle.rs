//! Late-binding method handles.
//!
//! Configuration completes before every provider has registered, so a step
//! cannot pick its implementation at configuration time. A [`MethodHandle`]
//! captures the intent (`component`, `method`, engine preference) and defers
//! the choice to execution time. Signature prediction runs the same selection
//! rule without touching the cache, keeping cache keys stable against
//! transient registry states.
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::registry::registry::SharedMethodRegistry;
use crate::registry::{ImplementationInfo, MethodArgs, Result};

/// Soft TTL of a cached resolution
pub const RESOLVE_TTL: Duration = Duration::from_secs(5);

/// How a handle chooses its engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePreference {
    /// Let the default strategy decide
    Auto,
    /// Always use the named engine
    Fixed(String),
}

#[derive(Debug, Clone)]
struct HandleCache {
    info: ImplementationInfo,
    resolved_at: Instant,
}

/// A late-binding token for one step method invocation.
///
/// The handle exclusively owns its resolution cache; concurrent `resolve`
/// calls are serialized by a per-handle mutex so at most one strategy
/// evaluation is in flight per handle.
pub struct MethodHandle {
    component: String,
    method: String,
    prefer: EnginePreference,
    ttl: Duration,
    predict_fast_path: bool,
    cache: Mutex<Option<HandleCache>>,
}

impl std::fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodHandle")
            .field("component", &self.component)
            .field("method", &self.method)
            .field("prefer", &self.prefer)
            .finish_non_exhaustive()
    }
}

impl MethodHandle {
    pub fn new(component: &str, method: &str, prefer: EnginePreference) -> Self {
        Self {
            component: component.to_string(),
            method: method.to_string(),
            prefer,
            ttl: RESOLVE_TTL,
            predict_fast_path: true,
            cache: Mutex::new(None),
        }
    }

    /// Override the cache TTL (tests use short TTLs)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Disable the predict fast path so every prediction re-runs selection
    pub fn with_predict_fast_path(mut self, enabled: bool) -> Self {
        self.predict_fast_path = enabled;
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn prefer(&self) -> &EnginePreference {
        &self.prefer
    }

    async fn run_selection(&self, registry: &SharedMethodRegistry) -> Result<ImplementationInfo> {
        match &self.prefer {
            EnginePreference::Fixed(engine) => {
                registry
                    .info_for_engine(&self.component, engine, &self.method)
                    .await
            }
            EnginePreference::Auto => registry.select(&self.component, &self.method, None).await,
        }
    }

    /// Predict which implementation the default strategy would pick, without
    /// writing to the cache.
    ///
    /// A cached resolution younger than TTL/5 is reused when the fast path is
    /// enabled; signatures stay deterministic either way because the cached
    /// value was produced by the same selection rule.
    pub async fn predict_signature(
        &self,
        registry: &SharedMethodRegistry,
    ) -> Result<ImplementationInfo> {
        if self.predict_fast_path {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if cached.resolved_at.elapsed() < self.ttl / 5 {
                    return Ok(cached.info.clone());
                }
            }
        }
        self.run_selection(registry).await
    }

    /// Resolve the implementation, caching the result.
    ///
    /// A cached resolution within the TTL is authoritative; beyond the TTL,
    /// or after `invalidate()`, selection re-runs.
    pub async fn resolve(&self, registry: &SharedMethodRegistry) -> Result<ImplementationInfo> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.resolved_at.elapsed() < self.ttl {
                return Ok(cached.info.clone());
            }
        }
        let info = self.run_selection(registry).await?;
        *cache = Some(HandleCache {
            info: info.clone(),
            resolved_at: Instant::now(),
        });
        Ok(info)
    }

    /// Ensure resolved, then dispatch to the resolved engine
    pub async fn execute(&self, registry: &SharedMethodRegistry, args: MethodArgs) -> Result<Value> {
        let info = self.resolve(registry).await?;
        registry
            .execute_with_engine(&self.component, &info.engine, &self.method, args)
            .await
    }

    /// Clear the cached resolution
    pub async fn invalidate(&self) {
        let mut cache = self.cache.lock().await;
        *cache = None;
    }

    /// The cached engine, if a resolution is live
    pub async fn resolved_engine(&self) -> Option<String> {
        let cache = self.cache.lock().await;
        cache.as_ref().map(|c| c.info.engine.clone())
    }
}
