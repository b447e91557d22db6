//! The method registry and its thread-safe shared wrapper.
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::hooks::{HookBus, HookEvent, HookPayload};
use crate::registry::conflict::ConflictPolicy;
use crate::registry::error::RegistrySystemError;
use crate::registry::index::MethodIndex;
use crate::registry::provider::{load_disabled, MethodProvider};
use crate::registry::strategy::{EngineOverrideStrategy, SelectionStrategy, StrategySet};
use crate::registry::style::InputStylePolicy;
use crate::registry::{ImplementationInfo, MethodArgs, MethodDef, Registration, Result};

/// Directive argument naming the strategy to use for one call
pub const STRATEGY_DIRECTIVE: &str = "_strategy";
/// Directive argument naming the engine to use for one call
pub const ENGINE_DIRECTIVE: &str = "_engine_type";

/// Registry of method implementations (internal, wrapped by
/// [`SharedMethodRegistry`]).
pub struct MethodRegistry {
    index: MethodIndex,
    strategies: StrategySet,
    conflict_policy: ConflictPolicy,
    providers: Vec<Arc<dyn MethodProvider>>,
    disabled: HashSet<String>,
    input_policy: InputStylePolicy,
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("registrations", &self.index.len())
            .field("providers", &self.providers.len())
            .field("conflict_policy", &self.conflict_policy)
            .finish()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            index: MethodIndex::new(),
            strategies: StrategySet::new(),
            conflict_policy: ConflictPolicy::default(),
            providers: Vec::new(),
            disabled: HashSet::new(),
            input_policy: InputStylePolicy::from_env(),
        }
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Load the disabled-provider set for a project directory
    pub fn with_disabled_from(mut self, project_dir: &Path) -> Self {
        self.disabled = load_disabled(project_dir);
        self
    }

    pub fn set_input_policy(&mut self, policy: InputStylePolicy) {
        self.input_policy = policy;
    }

    pub fn input_policy(&self) -> InputStylePolicy {
        self.input_policy
    }

    /// Register one definition under the configured conflict policy.
    /// Returns whether the registration was stored.
    pub fn register(&mut self, def: MethodDef) -> Result<bool> {
        let reg = Registration {
            component: def.component,
            method: def.method,
            engine: def.engine,
            version: def.version,
            priority: def.priority,
            deprecated: def.deprecated,
            description: def.description,
            takes_primary: def.takes_primary,
            input_shape: def.input_shape,
            callable: def.callable,
        };
        let full_key = reg.full_key();
        let stored = self.index.insert(reg, self.conflict_policy)?;
        if stored {
            log::debug!("registered method {}", full_key);
        } else {
            log::debug!("kept existing registration over {}", full_key);
        }
        Ok(stored)
    }

    /// Register everything a provider declares, retaining the provider for
    /// later `refresh()` re-scans. A disabled provider is skipped.
    pub fn scan(&mut self, provider: Arc<dyn MethodProvider>) -> Result<usize> {
        if self.disabled.contains(provider.name()) {
            log::info!("provider '{}' is disabled, skipping scan", provider.name());
            self.providers.push(provider);
            return Ok(0);
        }
        let defs = provider.methods();
        let mut stored = 0;
        for def in defs {
            if self.register(def)? {
                stored += 1;
            }
        }
        self.providers.push(provider);
        Ok(stored)
    }

    /// Clear the index and re-scan every retained provider
    pub fn refresh(&mut self) -> Result<usize> {
        self.index.clear();
        let providers = std::mem::take(&mut self.providers);
        let mut stored = 0;
        for provider in providers {
            stored += self.scan(provider)?;
        }
        Ok(stored)
    }

    /// All non-deleted candidates for a `(component, method)` pair
    pub fn describe(&self, component: &str, method: &str) -> Result<Vec<ImplementationInfo>> {
        Ok(self
            .index
            .method_candidates(component, method)?
            .iter()
            .map(|r| r.info())
            .collect())
    }

    /// Engine tags registered for a `(component, method)` pair
    pub fn list_engines(&self, component: &str, method: &str) -> Result<Vec<String>> {
        self.index.engines(component, method)
    }

    pub fn components(&self) -> Vec<String> {
        self.index.components()
    }

    pub fn methods_of(&self, component: &str) -> Vec<String> {
        self.index.methods_of(component)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Register an additional named strategy
    pub fn register_strategy(&mut self, strategy: Arc<dyn SelectionStrategy>) {
        self.strategies.register(strategy);
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.names()
    }

    /// Run a selection against the current candidates without invoking
    /// anything. `strategy` of `None` means the default strategy.
    pub fn select(
        &self,
        component: &str,
        method: &str,
        strategy: Option<&str>,
    ) -> Result<ImplementationInfo> {
        let candidates = self.index.method_candidates(component, method)?;
        let refs: Vec<&Registration> = candidates.iter().collect();
        let strategy = match strategy {
            Some(name) => self.strategies.get(name)?,
            None => self.strategies.default_strategy(),
        };
        strategy.select(&refs).map(|r| r.info())
    }

    /// Metadata for one exact `(component, method, engine)` triple
    pub fn info_for_engine(
        &self,
        component: &str,
        engine: &str,
        method: &str,
    ) -> Result<ImplementationInfo> {
        self.index.get(component, method, engine).map(|r| r.info())
    }

    fn resolve_call(
        &self,
        component: &str,
        method: &str,
        engine: &str,
    ) -> Result<(String, crate::registry::MethodCallable, bool, crate::registry::InputShape)> {
        let reg = self.index.get(component, method, engine)?;
        Ok((
            reg.full_key(),
            reg.callable.clone(),
            reg.takes_primary,
            reg.input_shape,
        ))
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe method registry.
///
/// Reads dominate during execution; writes happen at startup and on explicit
/// `refresh()`, so the inner registry sits behind an `RwLock`.
#[derive(Clone)]
pub struct SharedMethodRegistry {
    registry: Arc<RwLock<MethodRegistry>>,
    hooks: Option<Arc<HookBus>>,
}

impl std::fmt::Debug for SharedMethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMethodRegistry").finish_non_exhaustive()
    }
}

impl SharedMethodRegistry {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(MethodRegistry::new())),
            hooks: None,
        }
    }

    pub fn from_registry(registry: MethodRegistry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            hooks: None,
        }
    }

    /// Attach a hook bus; registry events fire on it from then on
    pub fn with_hooks(mut self, hooks: Arc<HookBus>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn registry(&self) -> Arc<RwLock<MethodRegistry>> {
        self.registry.clone()
    }

    /// Register one definition; fires `after_method_registered` when stored
    pub async fn register(&self, def: MethodDef) -> Result<bool> {
        let full_key = format!("{}::{}::{}", def.component, def.engine, def.method);
        let stored = {
            let mut registry = self.registry.write().await;
            registry.register(def)?
        };
        if stored {
            if let Some(hooks) = &self.hooks {
                let payload = HookPayload::default().full_key(&full_key);
                hooks.emit(HookEvent::MethodRegistered, &payload).await;
            }
        }
        Ok(stored)
    }

    /// Scan a provider; fires `after_method_registered` once per scan that
    /// stored at least one registration.
    pub async fn scan(&self, provider: Arc<dyn MethodProvider>) -> Result<usize> {
        let name = provider.name().to_string();
        let stored = {
            let mut registry = self.registry.write().await;
            registry.scan(provider)?
        };
        if stored > 0 {
            if let Some(hooks) = &self.hooks {
                let payload = HookPayload::default().full_key(&name);
                hooks.emit(HookEvent::MethodRegistered, &payload).await;
            }
        }
        Ok(stored)
    }

    /// Clear and re-scan all providers; fires `after_registry_refresh`
    pub async fn refresh(&self) -> Result<usize> {
        let stored = {
            let mut registry = self.registry.write().await;
            registry.refresh()?
        };
        if let Some(hooks) = &self.hooks {
            hooks
                .emit(HookEvent::RegistryRefresh, &HookPayload::default())
                .await;
        }
        Ok(stored)
    }

    pub async fn describe(&self, component: &str, method: &str) -> Result<Vec<ImplementationInfo>> {
        let registry = self.registry.read().await;
        registry.describe(component, method)
    }

    pub async fn list_engines(&self, component: &str, method: &str) -> Result<Vec<String>> {
        let registry = self.registry.read().await;
        registry.list_engines(component, method)
    }

    pub async fn components(&self) -> Vec<String> {
        let registry = self.registry.read().await;
        registry.components()
    }

    pub async fn methods_of(&self, component: &str) -> Vec<String> {
        let registry = self.registry.read().await;
        registry.methods_of(component)
    }

    pub async fn len(&self) -> usize {
        let registry = self.registry.read().await;
        registry.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn register_strategy(&self, strategy: Arc<dyn SelectionStrategy>) {
        let mut registry = self.registry.write().await;
        registry.register_strategy(strategy);
    }

    /// Run a selection without invoking anything
    pub async fn select(
        &self,
        component: &str,
        method: &str,
        strategy: Option<&str>,
    ) -> Result<ImplementationInfo> {
        let registry = self.registry.read().await;
        registry.select(component, method, strategy)
    }

    pub async fn info_for_engine(
        &self,
        component: &str,
        engine: &str,
        method: &str,
    ) -> Result<ImplementationInfo> {
        let registry = self.registry.read().await;
        registry.info_for_engine(component, engine, method)
    }

    /// Select an implementation via a strategy and invoke it.
    ///
    /// Directive arguments may ride along in `args.named`: `_strategy` names
    /// the strategy, `_engine_type` bypasses strategies and dispatches to the
    /// named engine directly. Both are removed before the callable sees the
    /// arguments.
    pub async fn execute(&self, component: &str, method: &str, mut args: MethodArgs) -> Result<Value> {
        let strategy_directive = take_directive(&mut args, STRATEGY_DIRECTIVE)?;
        let engine_directive = take_directive(&mut args, ENGINE_DIRECTIVE)?;

        let engine = match engine_directive {
            Some(engine) => engine,
            None => {
                let registry = self.registry.read().await;
                let candidates = registry.index_candidates(component, method)?;
                let strategy: Arc<dyn SelectionStrategy> = match strategy_directive.as_deref() {
                    Some(name) => registry.strategies.get(name)?,
                    None => registry.strategies.default_strategy(),
                };
                let refs: Vec<&Registration> = candidates.iter().collect();
                strategy.select(&refs)?.engine.clone()
            }
        };

        self.execute_with_engine(component, &engine, method, args).await
    }

    /// Bypass strategy selection and dispatch to one exact engine
    pub async fn execute_with_engine(
        &self,
        component: &str,
        engine: &str,
        method: &str,
        mut args: MethodArgs,
    ) -> Result<Value> {
        let (full_key, callable, takes_primary, shape, policy) = {
            let registry = self.registry.read().await;
            let (full_key, callable, takes_primary, shape) =
                registry.resolve_call(component, method, engine)?;
            (full_key, callable, takes_primary, shape, registry.input_policy())
        };

        if let Some(primary) = args.primary.take() {
            if takes_primary {
                args.primary = Some(policy.check_primary(&full_key, shape, primary)?);
            }
            // A method that does not accept the chain input simply never
            // sees it.
        }

        if let Some(hooks) = &self.hooks {
            let payload = HookPayload::default().full_key(&full_key);
            hooks.emit(HookEvent::MethodExecute, &payload).await;
        }

        callable(args)
            .await
            .map_err(|source| RegistrySystemError::MethodFailed { full_key, source })
    }

    /// Select with a one-off engine override (the `engine_override` strategy)
    pub async fn select_with_engine_override(
        &self,
        component: &str,
        method: &str,
        engine: &str,
    ) -> Result<ImplementationInfo> {
        let registry = self.registry.read().await;
        let candidates = registry.index_candidates(component, method)?;
        let refs: Vec<&Registration> = candidates.iter().collect();
        let strategy = EngineOverrideStrategy {
            engine: engine.to_string(),
        };
        strategy.select(&refs).map(|r| r.info())
    }
}

impl Default for SharedMethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub(crate) fn index_candidates(&self, component: &str, method: &str) -> Result<&[Registration]> {
        self.index.method_candidates(component, method)
    }
}

fn take_directive(args: &mut MethodArgs, name: &str) -> Result<Option<String>> {
    match args.named.remove(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(RegistrySystemError::InvalidDirective {
            name: name.to_string(),
            reason: format!("expected a string, got {}", other),
        }),
    }
}
