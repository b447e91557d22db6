//! Per-node metrics and lineage records.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Terminal state of one node in a flow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeStatus {
    Succeeded,
    Failed { soft: bool },
    Skipped { reason: String },
    Cancelled,
}

impl NodeStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, NodeStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, NodeStatus::Skipped { .. })
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Succeeded => write!(f, "succeeded"),
            NodeStatus::Failed { soft: true } => write!(f, "failed (soft)"),
            NodeStatus::Failed { soft: false } => write!(f, "failed"),
            NodeStatus::Skipped { reason } => write!(f, "skipped ({})", reason),
            NodeStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Execution metrics for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub step: String,
    pub status: NodeStatus,
    pub duration_ms: u64,
    pub cached: bool,
    pub signature: String,
}

/// Lineage record for one node: what it read, what it wrote, under which
/// signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageRecord {
    pub step: String,
    /// Resolved upstream dataset names
    pub inputs: Vec<String>,
    /// Fully qualified output dataset names
    pub outputs: Vec<String>,
    pub primary_output: Option<String>,
    pub signature: String,
    pub duration_ms: u64,
    pub cached: bool,
}

/// The assembled result of one flow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow: String,
    pub succeeded: bool,
    pub metrics: BTreeMap<String, NodeMetrics>,
    pub lineage: BTreeMap<String, LineageRecord>,
}

impl FlowReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Markdown table rendering for the `metrics` command
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Flow: {}\n\n", self.flow);
        out.push_str("| step | status | duration (ms) | cached | signature |\n");
        out.push_str("|------|--------|---------------|--------|-----------|\n");
        for m in self.metrics.values() {
            out.push_str(&format!(
                "| {} | {} | {} | {} | `{}` |\n",
                m.step, m.status, m.duration_ms, m.cached, m.signature
            ));
        }
        out
    }

    /// Count of nodes per terminal status class
    pub fn status_counts(&self) -> (usize, usize, usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut skipped = 0;
        let mut cancelled = 0;
        for m in self.metrics.values() {
            match m.status {
                NodeStatus::Succeeded => succeeded += 1,
                NodeStatus::Failed { .. } => failed += 1,
                NodeStatus::Skipped { .. } => skipped += 1,
                NodeStatus::Cancelled => cancelled += 1,
            }
        }
        (succeeded, failed, skipped, cancelled)
    }
}
