//! Persisted flow state: failure snapshots and the signature index.
//!
//! Everything lives under `<project>/.pipeline/`: one JSON snapshot per
//! failed step in `failures/`, an optional signature index in
//! `cache/signatures.db`, and the last run's report in `metrics.json`.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::error::EngineSystemError;
use crate::engine::metrics::FlowReport;

/// Directory name under the project root
pub const STATE_DIR: &str = ".pipeline";

/// Snapshot written when a node fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSnapshot {
    pub step_name: String,
    pub error_type: String,
    pub error_message: String,
    pub traceback: String,
    pub timestamp: DateTime<Utc>,
    pub parameters: BTreeMap<String, Value>,
    pub upstream_outputs: BTreeMap<String, Value>,
}

/// On-disk state under `<project>/.pipeline/`
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

type Result<T> = std::result::Result<T, EngineSystemError>;

fn io_err(source: std::io::Error, path: &Path, operation: &str) -> EngineSystemError {
    EngineSystemError::State {
        source,
        path: path.to_path_buf(),
        operation: operation.to_string(),
    }
}

impl StateStore {
    /// State store rooted at `<project>/.pipeline`
    pub fn new(project_dir: &Path) -> Self {
        Self {
            root: project_dir.join(STATE_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn failures_dir(&self) -> PathBuf {
        self.root.join("failures")
    }

    fn signatures_path(&self) -> PathBuf {
        self.root.join("cache").join("signatures.db")
    }

    fn metrics_path(&self) -> PathBuf {
        self.root.join("metrics.json")
    }

    fn snapshot_path(&self, step: &str) -> PathBuf {
        self.failures_dir().join(format!("{}.json", step))
    }

    /// Write one failure snapshot, creating directories as needed
    pub fn write_snapshot(&self, snapshot: &FailureSnapshot) -> Result<()> {
        let dir = self.failures_dir();
        std::fs::create_dir_all(&dir).map_err(|e| io_err(e, &dir, "create failures dir"))?;
        let path = self.snapshot_path(&snapshot.step_name);
        let data = serde_json::to_string_pretty(snapshot).map_err(|e| {
            EngineSystemError::StateEncoding {
                step: snapshot.step_name.clone(),
                source: Box::new(e),
            }
        })?;
        std::fs::write(&path, data).map_err(|e| io_err(e, &path, "write snapshot"))
    }

    /// Load every snapshot present; unparsable files are skipped with a log
    pub fn load_snapshots(&self) -> Result<Vec<FailureSnapshot>> {
        let dir = self.failures_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&dir).map_err(|e| io_err(e, &dir, "read failures dir"))?;
        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(e, &dir, "read failures dir"))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents =
                std::fs::read_to_string(&path).map_err(|e| io_err(e, &path, "read snapshot"))?;
            match serde_json::from_str::<FailureSnapshot>(&contents) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => log::warn!("skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }
        snapshots.sort_by(|a, b| a.step_name.cmp(&b.step_name));
        Ok(snapshots)
    }

    /// Remove the snapshot for a step that has recovered
    pub fn clear_snapshot(&self, step: &str) -> Result<()> {
        let path = self.snapshot_path(step);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e, &path, "remove snapshot")),
        }
    }

    /// Persist the step → signature index
    pub fn save_signatures(&self, signatures: &BTreeMap<String, String>) -> Result<()> {
        let path = self.signatures_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(e, dir, "create cache dir"))?;
        }
        let data = serde_json::to_string_pretty(signatures).map_err(|e| {
            EngineSystemError::StateEncoding {
                step: "signatures".to_string(),
                source: Box::new(e),
            }
        })?;
        std::fs::write(&path, data).map_err(|e| io_err(e, &path, "write signatures"))
    }

    /// Load the persisted step → signature index, empty when absent
    pub fn load_signatures(&self) -> Result<BTreeMap<String, String>> {
        let path = self.signatures_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents =
            std::fs::read_to_string(&path).map_err(|e| io_err(e, &path, "read signatures"))?;
        serde_json::from_str(&contents).map_err(|e| EngineSystemError::StateEncoding {
            step: "signatures".to_string(),
            source: Box::new(e),
        })
    }

    /// Drop persisted signatures for the named steps, or all of them
    pub fn clear_signatures(&self, steps: Option<&[String]>) -> Result<()> {
        match steps {
            None => {
                let path = self.signatures_path();
                match std::fs::remove_file(&path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(io_err(e, &path, "remove signatures")),
                }
            }
            Some(steps) => {
                let mut signatures = self.load_signatures()?;
                for step in steps {
                    signatures.remove(step);
                }
                self.save_signatures(&signatures)
            }
        }
    }

    /// Persist the last run's report for the `metrics` command
    pub fn save_report(&self, report: &FlowReport) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| io_err(e, &self.root, "create state dir"))?;
        let path = self.metrics_path();
        std::fs::write(&path, report.to_json()).map_err(|e| io_err(e, &path, "write metrics"))
    }

    /// Load the last run's report, if any
    pub fn load_report(&self) -> Result<Option<FlowReport>> {
        let path = self.metrics_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&path).map_err(|e| io_err(e, &path, "read metrics"))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| EngineSystemError::StateEncoding {
                step: "metrics".to_string(),
                source: Box::new(e),
            })
    }
}
