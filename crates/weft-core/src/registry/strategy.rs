//! Selection strategies.
//!
//! A strategy takes the candidate registrations for one
//! `(component, method)` pair and returns exactly one, or fails with
//! `NoCandidate`. Strategies are pure; ties are broken by insertion order.
use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::error::RegistrySystemError;
use crate::registry::{Registration, Result};

/// A policy that picks one registration out of a candidate set
pub trait SelectionStrategy: Send + Sync {
    /// The name this strategy is registered under
    fn name(&self) -> &str;

    /// Select exactly one candidate. `candidates` is never empty and comes in
    /// insertion order.
    fn select<'a>(&self, candidates: &[&'a Registration]) -> Result<&'a Registration>;
}

fn no_candidate(strategy: &str, candidates: &[&Registration]) -> RegistrySystemError {
    // Candidates share component and method by construction.
    let (component, method) = candidates
        .first()
        .map(|r| (r.component.clone(), r.method.clone()))
        .unwrap_or_default();
    RegistrySystemError::NoCandidate {
        component,
        method,
        strategy: strategy.to_string(),
    }
}

/// Keep only non-deprecated candidates; fall back to the full set when every
/// candidate is deprecated.
fn prefer_live<'a>(candidates: &[&'a Registration]) -> Vec<&'a Registration> {
    let live: Vec<&Registration> = candidates.iter().copied().filter(|r| !r.deprecated).collect();
    if live.is_empty() {
        candidates.to_vec()
    } else {
        live
    }
}

/// First candidate with the maximal key; earlier insertion wins ties
fn max_by_key<'a, K: Ord>(
    candidates: &[&'a Registration],
    key: impl Fn(&Registration) -> K,
) -> Option<&'a Registration> {
    let mut best: Option<(&'a Registration, K)> = None;
    for &reg in candidates {
        let k = key(reg);
        match &best {
            Some((_, best_k)) if k <= *best_k => {}
            _ => best = Some((reg, k)),
        }
    }
    best.map(|(r, _)| r)
}

/// `priority` desc, then semver `version` desc; deprecated excluded unless
/// nothing else is available.
pub struct DefaultStrategy;

impl SelectionStrategy for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn select<'a>(&self, candidates: &[&'a Registration]) -> Result<&'a Registration> {
        let pool = prefer_live(candidates);
        max_by_key(&pool, |r| (r.priority, r.version.clone()))
            .ok_or_else(|| no_candidate(self.name(), candidates))
    }
}

/// Semver `version` desc; deprecated excluded outright
pub struct LatestStrategy;

impl SelectionStrategy for LatestStrategy {
    fn name(&self) -> &str {
        "latest"
    }

    fn select<'a>(&self, candidates: &[&'a Registration]) -> Result<&'a Registration> {
        let live: Vec<&Registration> =
            candidates.iter().copied().filter(|r| !r.deprecated).collect();
        max_by_key(&live, |r| r.version.clone())
            .ok_or_else(|| no_candidate(self.name(), candidates))
    }
}

/// Exclude pre-release versions, then apply the default rule. Falls back to
/// the full candidate set when everything carries a pre-release tag.
pub struct StableStrategy;

impl SelectionStrategy for StableStrategy {
    fn name(&self) -> &str {
        "stable"
    }

    fn select<'a>(&self, candidates: &[&'a Registration]) -> Result<&'a Registration> {
        let released: Vec<&Registration> = candidates
            .iter()
            .copied()
            .filter(|r| r.version.pre.is_empty())
            .collect();
        let pool = if released.is_empty() {
            candidates.to_vec()
        } else {
            released
        };
        let pool = prefer_live(&pool);
        max_by_key(&pool, |r| (r.priority, r.version.clone()))
            .ok_or_else(|| no_candidate(self.name(), candidates))
    }
}

/// Strictly by `priority` desc
pub struct PriorityStrategy;

impl SelectionStrategy for PriorityStrategy {
    fn name(&self) -> &str {
        "priority"
    }

    fn select<'a>(&self, candidates: &[&'a Registration]) -> Result<&'a Registration> {
        max_by_key(candidates, |r| r.priority)
            .ok_or_else(|| no_candidate(self.name(), candidates))
    }
}

/// Pick the candidate whose engine equals the caller-supplied tag
pub struct EngineOverrideStrategy {
    pub engine: String,
}

impl SelectionStrategy for EngineOverrideStrategy {
    fn name(&self) -> &str {
        "engine_override"
    }

    fn select<'a>(&self, candidates: &[&'a Registration]) -> Result<&'a Registration> {
        candidates
            .iter()
            .copied()
            .find(|r| r.engine == self.engine)
            .ok_or_else(|| no_candidate(self.name(), candidates))
    }
}

/// Registration list of named strategies; the extension point for future
/// selection policies.
pub struct StrategySet {
    strategies: HashMap<String, Arc<dyn SelectionStrategy>>,
    default_name: String,
}

impl std::fmt::Debug for StrategySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategySet")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .field("default", &self.default_name)
            .finish()
    }
}

impl StrategySet {
    /// Create a set pre-populated with the built-in strategies
    pub fn new() -> Self {
        let mut set = Self {
            strategies: HashMap::new(),
            default_name: "default".to_string(),
        };
        set.register(Arc::new(DefaultStrategy));
        set.register(Arc::new(LatestStrategy));
        set.register(Arc::new(StableStrategy));
        set.register(Arc::new(PriorityStrategy));
        set
    }

    /// Register a strategy under its own name, replacing any previous holder
    pub fn register(&mut self, strategy: Arc<dyn SelectionStrategy>) {
        self.strategies
            .insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SelectionStrategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrySystemError::UnknownStrategy {
                name: name.to_string(),
            })
    }

    /// The strategy used when the caller names none
    pub fn default_strategy(&self) -> Arc<dyn SelectionStrategy> {
        self.strategies
            .get(&self.default_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultStrategy))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::new()
    }
}
