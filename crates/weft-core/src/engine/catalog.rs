//! The dataset catalog.
//!
//! A process-local store from dataset name (`stepName__outputName`) to value.
//! Values are inserted on successful node completion and read by downstream
//! nodes; a written key is never overwritten during one flow run, so a
//! duplicate write signals an engine bug and is rejected. The catalog also
//! records the signature each completed step ran under, which is what cache
//! checks compare against.
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::engine::error::EngineSystemError;

#[derive(Default)]
struct CatalogState {
    datasets: HashMap<String, Value>,
    signatures: HashMap<String, String>,
}

/// Concurrent dataset store shared by all node tasks
#[derive(Clone, Default)]
pub struct Catalog {
    inner: Arc<RwLock<CatalogState>>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dataset. Rejects duplicate writes within the catalog's
    /// lifetime.
    pub async fn insert(
        &self,
        name: &str,
        value: Value,
    ) -> std::result::Result<(), EngineSystemError> {
        let mut state = self.inner.write().await;
        if state.datasets.contains_key(name) {
            return Err(EngineSystemError::DuplicateCatalogWrite {
                dataset: name.to_string(),
            });
        }
        state.datasets.insert(name.to_string(), value);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Value> {
        let state = self.inner.read().await;
        state.datasets.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        let state = self.inner.read().await;
        state.datasets.contains_key(name)
    }

    /// Record the signature a step completed under
    pub async fn record_signature(&self, step: &str, signature: &str) {
        let mut state = self.inner.write().await;
        state
            .signatures
            .insert(step.to_string(), signature.to_string());
    }

    pub async fn signature_of(&self, step: &str) -> Option<String> {
        let state = self.inner.read().await;
        state.signatures.get(step).cloned()
    }

    /// All recorded step signatures
    pub async fn signatures(&self) -> HashMap<String, String> {
        let state = self.inner.read().await;
        state.signatures.clone()
    }

    /// Drop a step's datasets and signature; used by cache-integrity
    /// recovery and `cache clear`.
    pub async fn evict_step(&self, step: &str, datasets: &[String]) {
        let mut state = self.inner.write().await;
        for dataset in datasets {
            state.datasets.remove(dataset);
        }
        state.signatures.remove(step);
    }

    pub async fn dataset_names(&self) -> Vec<String> {
        let state = self.inner.read().await;
        let mut names: Vec<String> = state.datasets.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        let state = self.inner.read().await;
        state.datasets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop everything
    pub async fn clear(&self) {
        let mut state = self.inner.write().await;
        state.datasets.clear();
        state.signatures.clear();
    }
}
