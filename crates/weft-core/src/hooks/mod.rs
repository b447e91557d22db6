//! # Weft Core Hook Bus
//!
//! Lifecycle notifications published by the engine and the registry to any
//! registered handlers. Handlers run in registration order on a stable
//! snapshot of the handler list; a handler error is logged and never aborts
//! the flow. Hooks are for side effects, not decisions.
pub mod error;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::hooks::error::HookSystemError;
use crate::registry::BoxError;

/// Identifier returned on registration, used to unregister
pub type HookId = u64;

/// The event channels published by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeFlow,
    AfterFlow,
    BeforeNode,
    AfterNode,
    CacheHit,
    CacheMiss,
    MethodExecute,
    Failure,
    MethodRegistered,
    RegistryRefresh,
}

impl HookEvent {
    pub const ALL: [HookEvent; 10] = [
        HookEvent::BeforeFlow,
        HookEvent::AfterFlow,
        HookEvent::BeforeNode,
        HookEvent::AfterNode,
        HookEvent::CacheHit,
        HookEvent::CacheMiss,
        HookEvent::MethodExecute,
        HookEvent::Failure,
        HookEvent::MethodRegistered,
        HookEvent::RegistryRefresh,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::BeforeFlow => "before_flow",
            HookEvent::AfterFlow => "after_flow",
            HookEvent::BeforeNode => "before_node",
            HookEvent::AfterNode => "after_node",
            HookEvent::CacheHit => "on_cache_hit",
            HookEvent::CacheMiss => "on_cache_miss",
            HookEvent::MethodExecute => "on_method_execute",
            HookEvent::Failure => "on_failure",
            HookEvent::MethodRegistered => "after_method_registered",
            HookEvent::RegistryRefresh => "after_registry_refresh",
        }
    }
}

/// Context delivered with every hook invocation. Fields are filled as far as
/// they make sense for the event.
#[derive(Debug, Clone, Default)]
pub struct HookPayload {
    pub flow: Option<String>,
    pub step: Option<String>,
    pub dataset: Option<String>,
    pub signature: Option<String>,
    pub full_key: Option<String>,
    pub error: Option<String>,
}

impl HookPayload {
    pub fn for_flow(flow: &str) -> Self {
        Self {
            flow: Some(flow.to_string()),
            ..Default::default()
        }
    }

    pub fn for_step(flow: &str, step: &str) -> Self {
        Self {
            flow: Some(flow.to_string()),
            step: Some(step.to_string()),
            ..Default::default()
        }
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn full_key(mut self, full_key: &str) -> Self {
        self.full_key = Some(full_key.to_string());
        self
    }

    pub fn error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Handler invoked for hook events
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn handle(&self, event: HookEvent, payload: &HookPayload)
        -> std::result::Result<(), BoxError>;
}

type HookFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<(), BoxError>> + Send + 'a>>;

/// Handler built from a closure (internal helper)
struct FnHandler {
    f: Box<dyn for<'a> Fn(HookEvent, &'a HookPayload) -> HookFuture<'a> + Send + Sync>,
}

#[async_trait]
impl HookHandler for FnHandler {
    async fn handle(
        &self,
        event: HookEvent,
        payload: &HookPayload,
    ) -> std::result::Result<(), BoxError> {
        (self.f)(event, payload).await
    }
}

/// Wrap a synchronous closure as a hook handler
pub fn sync_hook<F>(f: F) -> Arc<dyn HookHandler>
where
    F: Fn(HookEvent, &HookPayload) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        f: Box::new(move |event, payload| {
            let result = f(event, payload);
            Box::pin(async move { result })
        }),
    })
}

#[derive(Default)]
struct HookBusState {
    handlers: HashMap<HookEvent, Vec<(HookId, Arc<dyn HookHandler>)>>,
    counters: HashMap<HookEvent, u64>,
    next_id: HookId,
}

/// Process-wide event bus.
///
/// The handler list is copy-on-write: `emit` snapshots the current handlers
/// for the event and iterates the snapshot, so registration during dispatch
/// never affects an in-flight emission.
pub struct HookBus {
    state: RwLock<HookBusState>,
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookBus").finish_non_exhaustive()
    }
}

impl HookBus {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HookBusState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Register a handler for one event channel
    pub async fn register(&self, event: HookEvent, handler: Arc<dyn HookHandler>) -> HookId {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        state.handlers.entry(event).or_default().push((id, handler));
        id
    }

    /// Register a handler on several channels at once, returning one id per
    /// channel in the same order.
    pub async fn register_many(
        &self,
        events: &[HookEvent],
        handler: Arc<dyn HookHandler>,
    ) -> Vec<HookId> {
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            ids.push(self.register(*event, handler.clone()).await);
        }
        ids
    }

    /// Remove a handler by id
    pub async fn unregister(&self, id: HookId) -> std::result::Result<(), HookSystemError> {
        let mut state = self.state.write().await;
        let mut found = false;
        for handlers in state.handlers.values_mut() {
            let before = handlers.len();
            handlers.retain(|(h_id, _)| *h_id != id);
            if handlers.len() < before {
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(HookSystemError::HandlerNotFound { id })
        }
    }

    /// Drop all handlers and reset counters
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.handlers.clear();
        state.counters.clear();
    }

    /// Number of handlers registered for an event
    pub async fn handler_count(&self, event: HookEvent) -> usize {
        let state = self.state.read().await;
        state.handlers.get(&event).map(|h| h.len()).unwrap_or(0)
    }

    /// How many times an event has been emitted
    pub async fn invocation_count(&self, event: HookEvent) -> u64 {
        let state = self.state.read().await;
        state.counters.get(&event).copied().unwrap_or(0)
    }

    /// Emit an event: handlers run in registration order; errors are logged
    /// and swallowed.
    pub async fn emit(&self, event: HookEvent, payload: &HookPayload) {
        let snapshot: Vec<Arc<dyn HookHandler>> = {
            let mut state = self.state.write().await;
            *state.counters.entry(event).or_insert(0) += 1;
            state
                .handlers
                .get(&event)
                .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        for handler in snapshot {
            if let Err(e) = handler.handle(event, payload).await {
                log::warn!("hook handler failed on {}: {}", event.name(), e);
            }
        }
    }
}

impl Default for HookBus {
    fn default() -> Self {
        Self::new()
    }
}
