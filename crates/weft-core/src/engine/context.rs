//! Shared per-run state.
use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestrationSpec;
use crate::engine::catalog::Catalog;
use crate::engine::metrics::{FlowReport, LineageRecord, NodeMetrics, NodeStatus};

/// State shared by every node task during one flow run.
///
/// The catalog outlives the run (cache hits across runs read it); statuses,
/// metrics and lineage are per-run.
pub struct FlowContext {
    pub flow_name: String,
    pub orchestration: OrchestrationSpec,
    pub catalog: Catalog,
    pub cancel: CancellationToken,
    statuses: Mutex<BTreeMap<String, NodeStatus>>,
    metrics: Mutex<BTreeMap<String, NodeMetrics>>,
    lineage: Mutex<BTreeMap<String, LineageRecord>>,
}

impl FlowContext {
    pub fn new(
        flow_name: &str,
        orchestration: OrchestrationSpec,
        catalog: Catalog,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            flow_name: flow_name.to_string(),
            orchestration,
            catalog,
            cancel,
            statuses: Mutex::new(BTreeMap::new()),
            metrics: Mutex::new(BTreeMap::new()),
            lineage: Mutex::new(BTreeMap::new()),
        })
    }

    pub async fn set_status(&self, step: &str, status: NodeStatus) {
        let mut statuses = self.statuses.lock().await;
        statuses.insert(step.to_string(), status);
    }

    pub async fn status_of(&self, step: &str) -> Option<NodeStatus> {
        let statuses = self.statuses.lock().await;
        statuses.get(step).cloned()
    }

    pub async fn record_metrics(&self, metrics: NodeMetrics) {
        let mut map = self.metrics.lock().await;
        map.insert(metrics.step.clone(), metrics);
    }

    pub async fn record_lineage(&self, record: LineageRecord) {
        let mut map = self.lineage.lock().await;
        map.insert(record.step.clone(), record);
    }

    /// Assemble the final report for this run
    pub async fn into_report(&self, succeeded: bool) -> FlowReport {
        let metrics = self.metrics.lock().await.clone();
        let lineage = self.lineage.lock().await.clone();
        FlowReport {
            flow: self.flow_name.clone(),
            succeeded,
            metrics,
            lineage,
        }
    }
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("flow_name", &self.flow_name)
            .finish_non_exhaustive()
    }
}
