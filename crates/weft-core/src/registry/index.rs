//! Hierarchical method index.
//!
//! Three-level map `component → method → engine → registration`. All writes
//! go through the registry; the index itself performs no background mutation.
use std::collections::HashMap;

use crate::registry::conflict::{ConflictPolicy, Resolution};
use crate::registry::error::RegistrySystemError;
use crate::registry::{Registration, Result};

/// Candidates for one `(component, method)` pair, kept in insertion order
#[derive(Default)]
struct MethodSlot {
    candidates: Vec<Registration>,
}

impl MethodSlot {
    fn position(&self, engine: &str) -> Option<usize> {
        self.candidates.iter().position(|r| r.engine == engine)
    }
}

/// Hierarchical lookup `component → method → engine → registration`
#[derive(Default)]
pub struct MethodIndex {
    components: HashMap<String, HashMap<String, MethodSlot>>,
    len: usize,
}

impl std::fmt::Debug for MethodIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodIndex")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("registrations", &self.len)
            .finish()
    }
}

impl MethodIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a registration, applying the conflict policy when the full key
    /// is already occupied. Returns whether the registration was stored.
    pub fn insert(&mut self, reg: Registration, policy: ConflictPolicy) -> Result<bool> {
        let slot = self
            .components
            .entry(reg.component.clone())
            .or_default()
            .entry(reg.method.clone())
            .or_default();

        match slot.position(&reg.engine) {
            Some(pos) => match policy.resolve(&slot.candidates[pos], &reg)? {
                Resolution::KeepExisting => Ok(false),
                Resolution::Replace => {
                    // Keep the original position so insertion-order tie-breaks
                    // stay stable across replacement.
                    slot.candidates[pos] = reg;
                    Ok(true)
                }
            },
            None => {
                slot.candidates.push(reg);
                self.len += 1;
                Ok(true)
            }
        }
    }

    /// All candidates for a `(component, method)` pair, in insertion order
    pub fn method_candidates(&self, component: &str, method: &str) -> Result<&[Registration]> {
        self.components
            .get(component)
            .and_then(|methods| methods.get(method))
            .map(|slot| slot.candidates.as_slice())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RegistrySystemError::MethodNotFound {
                component: component.to_string(),
                method: method.to_string(),
            })
    }

    /// One registration by exact `(component, method, engine)` triple
    pub fn get(&self, component: &str, method: &str, engine: &str) -> Result<&Registration> {
        let candidates = self.method_candidates(component, method)?;
        candidates
            .iter()
            .find(|r| r.engine == engine)
            .ok_or_else(|| RegistrySystemError::EngineNotFound {
                component: component.to_string(),
                engine: engine.to_string(),
                method: method.to_string(),
            })
    }

    /// Engine tags registered for a `(component, method)` pair
    pub fn engines(&self, component: &str, method: &str) -> Result<Vec<String>> {
        Ok(self
            .method_candidates(component, method)?
            .iter()
            .map(|r| r.engine.clone())
            .collect())
    }

    /// All component names
    pub fn components(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.keys().cloned().collect();
        names.sort();
        names
    }

    /// Method names registered under a component
    pub fn methods_of(&self, component: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .components
            .get(component)
            .map(|methods| methods.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Total number of live registrations
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop everything; used by `refresh()` before a re-scan
    pub fn clear(&mut self) {
        self.components.clear();
        self.len = 0;
    }
}
