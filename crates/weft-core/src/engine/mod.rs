//! # Weft Core Execution Engine
//!
//! Executes a compiled flow layer by layer: resolves upstream references,
//! checks the signature cache, dispatches each node through its late-binding
//! method handles, captures outputs into the catalog, and fires lifecycle
//! hooks.
//!
//! ## Scheduling model
//!
//! Single-process. Parallelism exists only *within* a layer: layer `k` runs
//! to completion before layer `k+1` starts, which gives every node a full
//! happens-before view of all earlier layers. Under the `concurrent` task
//! runner, layer members are spawned as tasks bounded by a semaphore of
//! `max_workers` permits; the `sequential` runner awaits them one at a time.
//!
//! ## Failure discipline
//!
//! With `soft_fail` off, the first node failure cancels the flow and
//! surfaces the node's error. With `soft_fail` on, a failed node is recorded
//! and its descendants skip with reason `missing_upstream` while the rest of
//! the flow proceeds. Either way the failing step gets a failure snapshot
//! and an `on_failure` hook.
pub mod catalog;
pub mod context;
pub mod error;
pub mod metrics;
pub mod signature;
pub mod snapshot;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::service::FlowPlan;
use crate::config::{Granularity, NodeConfig, ParamValue, TaskRunner};
use crate::engine::error::EngineSystemError;
use crate::hooks::{HookBus, HookEvent, HookPayload};
use crate::registry::registry::SharedMethodRegistry;
use crate::registry::{ImplementationInfo, MethodArgs};

/// Skip reason recorded when an upstream output cannot be resolved
pub const SKIP_MISSING_UPSTREAM: &str = "missing_upstream";
/// Skip reason recorded for steps excluded by `--only` / `--exclude`
pub const SKIP_FILTERED: &str = "filtered";

/// Per-run options from the flow-runner boundary
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// When set, only these steps execute
    pub only: Option<HashSet<String>>,
    /// Steps to exclude
    pub exclude: HashSet<String>,
    /// Re-execute failed steps and their descendants from snapshots
    pub resume: bool,
    /// Bypass the cache entirely
    pub force: bool,
    /// External cancellation signal; workers check it before starting a node
    /// and in-flight nodes receive a cooperative cancel request
    pub cancel: Option<tokio_util::sync::CancellationToken>,
}

/// One entry of a cache plan
#[derive(Debug, Clone, Serialize)]
pub struct CachePlanEntry {
    pub step: String,
    pub signature: String,
    pub hit: bool,
}

/// The layered flow executor.
///
/// The catalog belongs to the engine, not to a run: re-running the same flow
/// against one engine turns unchanged steps into cache hits.
pub struct ExecutionEngine {
    registry: SharedMethodRegistry,
    hooks: Arc<HookBus>,
    catalog: Catalog,
    state: Option<StateStore>,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("persistent", &self.state.is_some())
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    pub fn new(registry: SharedMethodRegistry, hooks: Arc<HookBus>) -> Self {
        Self {
            registry,
            hooks,
            catalog: Catalog::new(),
            state: None,
        }
    }

    /// Attach on-disk state (failure snapshots, signature index, last report)
    pub fn with_state_store(mut self, state: StateStore) -> Self {
        self.state = Some(state);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Seed the in-memory signature map from the persisted index. A cache
    /// hit still requires the outputs themselves to be present.
    pub async fn preload_signatures(&self) -> crate::error::Result<()> {
        if let Some(state) = &self.state {
            for (step, sig) in state.load_signatures()? {
                if self.catalog.signature_of(&step).await.is_none() {
                    self.catalog.record_signature(&step, &sig).await;
                }
            }
        }
        Ok(())
    }

    /// Execute the plan. Returns the report on success (including soft-fail
    /// runs); returns the first fatal error otherwise.
    pub async fn run(
        &self,
        flow: &FlowPlan,
        opts: RunOptions,
    ) -> crate::error::Result<FlowReport> {
        let cancel = opts.cancel.clone().unwrap_or_default();
        let ctx = FlowContext::new(
            &flow.name,
            flow.orchestration.clone(),
            self.catalog.clone(),
            cancel,
        );

        self.hooks
            .emit(HookEvent::BeforeFlow, &HookPayload::for_flow(&flow.name))
            .await;

        // Persisted signatures from earlier processes seed the cache check.
        self.preload_signatures().await?;

        // Resume: failed steps and everything downstream of them re-execute.
        let mut bypass: HashSet<String> = HashSet::new();
        if opts.resume {
            if let Some(state) = &self.state {
                let failed: HashSet<String> = state
                    .load_snapshots()?
                    .into_iter()
                    .map(|s| s.step_name)
                    .filter(|name| flow.nodes.contains_key(name))
                    .collect();
                if !failed.is_empty() {
                    log::info!(
                        "resuming flow '{}': re-executing {:?} and descendants",
                        flow.name,
                        failed
                    );
                    bypass.extend(flow.graph.descendants_of(&failed));
                    bypass.extend(failed);
                }
            }
        }
        let cache_enabled = !opts.force && flow.orchestration.granularity == Granularity::Node;

        let mut fatal: Option<EngineSystemError> = None;

        'layers: for layer in &flow.plan.layers {
            let mut pending = Vec::new();
            for name in &layer.nodes {
                if is_filtered(name, &opts) {
                    ctx.set_status(
                        name,
                        NodeStatus::Skipped {
                            reason: SKIP_FILTERED.to_string(),
                        },
                    )
                    .await;
                    ctx.record_metrics(NodeMetrics {
                        step: name.clone(),
                        status: NodeStatus::Skipped {
                            reason: SKIP_FILTERED.to_string(),
                        },
                        duration_ms: 0,
                        cached: false,
                        signature: String::new(),
                    })
                    .await;
                    continue;
                }
                let Some(node) = flow.nodes.get(name) else {
                    continue;
                };
                pending.push(NodeTask {
                    node: node.clone(),
                    preds: flow.graph.predecessors_of(name).to_vec(),
                    registry: self.registry.clone(),
                    hooks: self.hooks.clone(),
                    ctx: ctx.clone(),
                    state: self.state.clone(),
                    use_cache: cache_enabled && !bypass.contains(name),
                });
            }

            let concurrent = flow.orchestration.task_runner == TaskRunner::Concurrent
                && flow.orchestration.max_workers > 1;

            if concurrent {
                let semaphore = Arc::new(Semaphore::new(flow.orchestration.max_workers));
                let mut handles = Vec::with_capacity(pending.len());
                for task in pending {
                    let name = task.node.name.clone();
                    let semaphore = semaphore.clone();
                    handles.push((
                        name,
                        tokio::spawn(async move {
                            let _permit = semaphore.acquire_owned().await.ok();
                            run_node(task).await
                        }),
                    ));
                }
                for (name, handle) in handles {
                    match handle.await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            ctx.cancel.cancel();
                            if fatal.is_none() {
                                fatal = Some(e);
                            }
                        }
                        Err(join_err) => {
                            ctx.cancel.cancel();
                            if fatal.is_none() {
                                fatal = Some(EngineSystemError::NodeExecution {
                                    step: name,
                                    signature: String::new(),
                                    source: Box::new(join_err),
                                });
                            }
                        }
                    }
                }
                if fatal.is_some() {
                    break 'layers;
                }
            } else {
                for task in pending {
                    if let Err(e) = run_node(task).await {
                        ctx.cancel.cancel();
                        fatal = Some(e);
                        break 'layers;
                    }
                }
            }
        }

        if let Some(state) = &self.state {
            let signatures: BTreeMap<String, String> =
                self.catalog.signatures().await.into_iter().collect();
            state.save_signatures(&signatures)?;
        }

        let succeeded = fatal.is_none();
        let report = ctx.into_report(succeeded).await;
        if let Some(state) = &self.state {
            state.save_report(&report)?;
        }

        let mut payload = HookPayload::for_flow(&flow.name);
        if let Some(e) = &fatal {
            payload = payload.error(&e.to_string());
        }
        self.hooks.emit(HookEvent::AfterFlow, &payload).await;

        match fatal {
            Some(e) => Err(e.into()),
            None => Ok(report),
        }
    }

    /// Compute which steps would hit the cache without executing anything.
    ///
    /// Signatures chain through the topological order, so a miss anywhere
    /// shows up as misses all the way downstream.
    pub async fn cache_plan(&self, flow: &FlowPlan) -> crate::error::Result<Vec<CachePlanEntry>> {
        let order = flow.graph.topological_sort()?;
        let mut computed: BTreeMap<String, String> = BTreeMap::new();
        let mut entries = Vec::with_capacity(order.len());
        for name in order {
            let Some(node) = flow.nodes.get(&name) else {
                continue;
            };
            let mut impls = Vec::with_capacity(node.handles.len());
            for handle in &node.handles {
                impls.push(handle.predict_signature(&self.registry).await?);
            }
            let mut upstream = BTreeMap::new();
            for pred in flow.graph.predecessors_of(&name) {
                if let Some(sig) = computed.get(pred) {
                    upstream.insert(pred.clone(), sig.clone());
                }
            }
            let sig = signature::node_signature(
                &node.methods,
                &impls,
                &node.literal_parameters(),
                &upstream,
            );
            let stored = self.catalog.signature_of(&name).await;
            let mut hit = stored.as_deref() == Some(sig.as_str());
            if hit {
                for dataset in node.dataset_names() {
                    if !self.catalog.contains(&dataset).await {
                        hit = false;
                        break;
                    }
                }
            }
            computed.insert(name.clone(), sig.clone());
            entries.push(CachePlanEntry {
                step: name,
                signature: sig,
                hit,
            });
        }
        Ok(entries)
    }

    /// Evict cached outputs and signatures, for the named steps or for all
    /// steps of the flow.
    pub async fn cache_clear(
        &self,
        flow: &FlowPlan,
        steps: Option<&[String]>,
    ) -> crate::error::Result<()> {
        let targets: Vec<String> = match steps {
            Some(steps) => steps.to_vec(),
            None => flow.nodes.keys().cloned().collect(),
        };
        for step in &targets {
            if let Some(node) = flow.nodes.get(step) {
                self.catalog.evict_step(step, &node.dataset_names()).await;
            }
        }
        if let Some(state) = &self.state {
            state.clear_signatures(steps)?;
        }
        Ok(())
    }
}

fn is_filtered(name: &str, opts: &RunOptions) -> bool {
    if opts.exclude.contains(name) {
        return true;
    }
    if let Some(only) = &opts.only {
        return !only.contains(name);
    }
    false
}

/// Everything one node task needs, cloned out of the engine so the task is
/// `'static` and spawnable.
struct NodeTask {
    node: Arc<NodeConfig>,
    preds: Vec<String>,
    registry: SharedMethodRegistry,
    hooks: Arc<HookBus>,
    ctx: Arc<FlowContext>,
    state: Option<StateStore>,
    use_cache: bool,
}

/// Execute one node through its full lifecycle. Returns `Err` only for
/// fatal failures (`soft_fail` off); every other outcome is recorded on the
/// context and reported as `Ok`.
async fn run_node(task: NodeTask) -> std::result::Result<(), EngineSystemError> {
    let step = task.node.name.clone();
    let flow = task.ctx.flow_name.clone();

    if task.ctx.cancel.is_cancelled() {
        record_terminal(&task, NodeStatus::Cancelled, 0, false, "").await;
        return Ok(());
    }

    // 1. Resolve inputs.
    let mut named: BTreeMap<String, Value> = BTreeMap::new();
    let mut input_datasets: Vec<String> = Vec::new();
    let mut upstream_values: BTreeMap<String, Value> = BTreeMap::new();
    for (param, value) in &task.node.parameters {
        match value {
            ParamValue::Literal(v) => {
                named.insert(param.clone(), v.clone());
            }
            ParamValue::Ref(output_ref) => {
                let dataset = output_ref.dataset_name();
                match task.ctx.catalog.get(&dataset).await {
                    Some(v) => {
                        upstream_values.insert(dataset.clone(), v.clone());
                        named.insert(param.clone(), v);
                        input_datasets.push(dataset);
                    }
                    None => {
                        return skip_node(&task, SKIP_MISSING_UPSTREAM).await;
                    }
                }
            }
        }
    }

    // 2. Signature, from predictions so resolve caches never shift it.
    let mut impls: Vec<ImplementationInfo> = Vec::with_capacity(task.node.handles.len());
    for handle in &task.node.handles {
        match handle.predict_signature(&task.registry).await {
            Ok(info) => impls.push(info),
            Err(e) => {
                return fail_node(&task, String::new(), named, upstream_values, Box::new(e)).await;
            }
        }
    }
    let mut upstream_sigs: BTreeMap<String, String> = BTreeMap::new();
    for pred in &task.preds {
        match task.ctx.catalog.signature_of(pred).await {
            Some(sig) => {
                upstream_sigs.insert(pred.clone(), sig);
            }
            // An upstream without a recorded signature was skipped, failed,
            // or filtered out; nothing to run on.
            None => return skip_node(&task, SKIP_MISSING_UPSTREAM).await,
        }
    }
    let sig = signature::node_signature(
        &task.node.methods,
        &impls,
        &task.node.literal_parameters(),
        &upstream_sigs,
    );

    // 3. Cache check.
    let datasets = task.node.dataset_names();
    if task.use_cache && task.ctx.catalog.signature_of(&step).await.as_deref() == Some(sig.as_str())
    {
        let mut missing = Vec::new();
        for dataset in &datasets {
            if !task.ctx.catalog.contains(dataset).await {
                missing.push(dataset.clone());
            }
        }
        if missing.is_empty() {
            task.hooks
                .emit(
                    HookEvent::CacheHit,
                    &HookPayload::for_step(&flow, &step).signature(&sig),
                )
                .await;
            task.ctx
                .record_lineage(LineageRecord {
                    step: step.clone(),
                    inputs: input_datasets,
                    outputs: datasets,
                    primary_output: task.node.primary_output().map(|s| s.to_string()),
                    signature: sig.clone(),
                    duration_ms: 0,
                    cached: true,
                })
                .await;
            record_terminal(&task, NodeStatus::Succeeded, 0, true, &sig).await;
            return Ok(());
        }
        if missing.len() < datasets.len() {
            // Partial presence under a matching signature is a corrupted
            // cache: evict and fall through to one fresh execution.
            log::warn!(
                "cache integrity violation for '{}': missing {:?}, re-executing",
                step,
                missing
            );
            let integrity = EngineSystemError::CacheIntegrity {
                step: step.clone(),
                missing,
            };
            task.hooks
                .emit(
                    HookEvent::Failure,
                    &HookPayload::for_step(&flow, &step).error(&integrity.to_string()),
                )
                .await;
        }
    }
    task.hooks
        .emit(
            HookEvent::CacheMiss,
            &HookPayload::for_step(&flow, &step).signature(&sig),
        )
        .await;
    // Stale outputs from an earlier run would trip the duplicate-write
    // guard, so they go before the node re-executes.
    task.ctx.catalog.evict_step(&step, &datasets).await;

    // 4. Execute the method chain, with retries.
    task.hooks
        .emit(HookEvent::BeforeNode, &HookPayload::for_step(&flow, &step))
        .await;
    let started = Instant::now();
    let attempts = task.ctx.orchestration.retry_count + 1;
    let mut result: Option<Value> = None;
    let mut last_err: Option<EngineSystemError> = None;
    for attempt in 0..attempts {
        if attempt > 0 && task.ctx.orchestration.retry_delay > 0 {
            tokio::time::sleep(Duration::from_secs(task.ctx.orchestration.retry_delay)).await;
        }
        match run_chain(&task, &named).await {
            Ok(value) => {
                result = Some(value);
                last_err = None;
                break;
            }
            Err(e @ EngineSystemError::Cancelled { .. }) => {
                record_terminal(&task, NodeStatus::Cancelled, 0, false, &sig).await;
                log::info!("node '{}' cancelled: {}", step, e);
                return Ok(());
            }
            Err(e) => {
                if attempt + 1 < attempts {
                    log::warn!(
                        "node '{}' attempt {}/{} failed: {}",
                        step,
                        attempt + 1,
                        attempts,
                        e
                    );
                }
                last_err = Some(e);
            }
        }
    }
    let duration_ms = started.elapsed().as_millis() as u64;

    if let Some(e) = last_err {
        return fail_node(&task, sig, named, upstream_values, Box::new(e)).await;
    }
    let result = result.unwrap_or(Value::Null);

    // 5. Output capture.
    match datasets.len() {
        0 => {}
        1 => {
            task.ctx.catalog.insert(&datasets[0], result).await?;
        }
        _ => match result {
            Value::Object(mut map) => {
                for (output, dataset) in task.node.outputs.iter().zip(&datasets) {
                    let Some(value) = map.remove(output) else {
                        let e = EngineSystemError::OutputShapeMismatch {
                            step: step.clone(),
                            expected: task.node.outputs.clone(),
                        };
                        return fail_node(&task, sig, named, upstream_values, Box::new(e)).await;
                    };
                    task.ctx.catalog.insert(dataset, value).await?;
                }
            }
            _ => {
                let e = EngineSystemError::OutputShapeMismatch {
                    step: step.clone(),
                    expected: task.node.outputs.clone(),
                };
                return fail_node(&task, sig, named, upstream_values, Box::new(e)).await;
            }
        },
    }

    // 6. Lineage, metrics, events.
    task.ctx.catalog.record_signature(&step, &sig).await;
    if let Some(state) = &task.state {
        state.clear_snapshot(&step)?;
    }
    task.ctx
        .record_lineage(LineageRecord {
            step: step.clone(),
            inputs: input_datasets,
            outputs: datasets,
            primary_output: task.node.primary_output().map(|s| s.to_string()),
            signature: sig.clone(),
            duration_ms,
            cached: false,
        })
        .await;
    record_terminal(&task, NodeStatus::Succeeded, duration_ms, false, &sig).await;
    Ok(())
}

/// Run the node's method chain once, honoring timeout and cancellation.
async fn run_chain(
    task: &NodeTask,
    named: &BTreeMap<String, Value>,
) -> std::result::Result<Value, EngineSystemError> {
    let step = &task.node.name;
    let chain = async {
        let mut current: Option<Value> = None;
        for handle in &task.node.handles {
            let args = MethodArgs {
                primary: current.take(),
                named: named.clone(),
            };
            let value = handle.execute(&task.registry, args).await.map_err(|e| {
                EngineSystemError::NodeExecution {
                    step: step.clone(),
                    signature: String::new(),
                    source: Box::new(e),
                }
            })?;
            current = Some(value);
        }
        Ok(current.unwrap_or(Value::Null))
    };

    let guarded = async {
        match task.ctx.orchestration.timeout {
            Some(seconds) => {
                match tokio::time::timeout(Duration::from_secs(seconds), chain).await {
                    Ok(result) => result,
                    Err(_) => Err(EngineSystemError::Timeout {
                        step: step.clone(),
                        seconds,
                    }),
                }
            }
            None => chain.await,
        }
    };

    tokio::select! {
        _ = task.ctx.cancel.cancelled() => Err(EngineSystemError::Cancelled { step: step.clone() }),
        result = guarded => result,
    }
}

async fn skip_node(
    task: &NodeTask,
    reason: &str,
) -> std::result::Result<(), EngineSystemError> {
    let status = NodeStatus::Skipped {
        reason: reason.to_string(),
    };
    log::info!("skipping node '{}': {}", task.node.name, reason);
    record_terminal(task, status, 0, false, "").await;
    task.hooks
        .emit(
            HookEvent::AfterNode,
            &HookPayload::for_step(&task.ctx.flow_name, &task.node.name),
        )
        .await;
    Ok(())
}

/// Record a failure: status, snapshot, `on_failure`. Fatal unless the flow
/// runs with `soft_fail`.
async fn fail_node(
    task: &NodeTask,
    signature: String,
    parameters: BTreeMap<String, Value>,
    upstream_outputs: BTreeMap<String, Value>,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> std::result::Result<(), EngineSystemError> {
    let step = task.node.name.clone();
    let soft = task.ctx.orchestration.soft_fail;

    let error_type = classify_error(source.as_ref());
    let message = source.to_string();
    log::error!("node '{}' failed: {}", step, message);

    if let Some(state) = &task.state {
        let snapshot = FailureSnapshot {
            step_name: step.clone(),
            error_type: error_type.to_string(),
            error_message: message.clone(),
            traceback: format!("{:?}", source),
            timestamp: chrono::Utc::now(),
            parameters,
            upstream_outputs,
        };
        if let Err(e) = state.write_snapshot(&snapshot) {
            log::warn!("failed to write failure snapshot for '{}': {}", step, e);
        }
    }

    task.hooks
        .emit(
            HookEvent::Failure,
            &HookPayload::for_step(&task.ctx.flow_name, &step).error(&message),
        )
        .await;

    record_terminal(task, NodeStatus::Failed { soft }, 0, false, &signature).await;
    task.hooks
        .emit(
            HookEvent::AfterNode,
            &HookPayload::for_step(&task.ctx.flow_name, &step),
        )
        .await;

    if soft {
        Ok(())
    } else {
        Err(EngineSystemError::NodeExecution {
            step,
            signature,
            source,
        })
    }
}

fn classify_error(e: &(dyn std::error::Error + 'static)) -> &'static str {
    if let Some(engine_err) = e.downcast_ref::<EngineSystemError>() {
        match engine_err {
            EngineSystemError::Timeout { .. } => "TimeoutError",
            EngineSystemError::Cancelled { .. } => "CancellationError",
            EngineSystemError::CacheIntegrity { .. } => "CacheIntegrityError",
            _ => "NodeExecutionError",
        }
    } else {
        "NodeExecutionError"
    }
}

/// Record status + metrics and, for non-skip terminal states, `after_node`
async fn record_terminal(task: &NodeTask, status: NodeStatus, duration_ms: u64, cached: bool, sig: &str) {
    task.ctx.set_status(&task.node.name, status.clone()).await;
    task.ctx
        .record_metrics(NodeMetrics {
            step: task.node.name.clone(),
            status: status.clone(),
            duration_ms,
            cached,
            signature: sig.to_string(),
        })
        .await;
    if matches!(status, NodeStatus::Succeeded) {
        task.hooks
            .emit(
                HookEvent::AfterNode,
                &HookPayload::for_step(&task.ctx.flow_name, &task.node.name),
            )
            .await;
    }
}

// Re-export important types
pub use catalog::Catalog;
pub use context::FlowContext;
pub use metrics::{FlowReport, LineageRecord, NodeMetrics, NodeStatus};
pub use snapshot::{FailureSnapshot, StateStore};

// Test module declaration
#[cfg(test)]
mod tests;
