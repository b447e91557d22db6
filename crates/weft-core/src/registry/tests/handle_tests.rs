use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use serde_json::json;

use crate::registry::error::RegistrySystemError;
use crate::registry::handle::{EnginePreference, MethodHandle};
use crate::registry::registry::SharedMethodRegistry;
use crate::registry::{sync_callable, MethodArgs, MethodDef};

fn def(engine: &str, priority: i32) -> MethodDef {
    let tag = engine.to_string();
    MethodDef::new(
        "frame",
        engine,
        "clean",
        sync_callable(move |_| Ok(json!(tag.clone()))),
    )
    .version(Version::new(1, 0, 0))
    .priority(priority)
}

#[tokio::test]
async fn resolve_caches_within_ttl() {
    let registry = SharedMethodRegistry::new();
    registry.register(def("v1", 1)).await.expect("register");

    let handle = MethodHandle::new("frame", "clean", EnginePreference::Auto);
    let first = handle.resolve(&registry).await.expect("resolve");
    assert_eq!(first.engine, "v1");

    // A better candidate appears, but the cache is still authoritative.
    registry.register(def("v2", 10)).await.expect("register");
    let second = handle.resolve(&registry).await.expect("resolve");
    assert_eq!(second.engine, "v1");

    handle.invalidate().await;
    let third = handle.resolve(&registry).await.expect("resolve");
    assert_eq!(third.engine, "v2");
}

#[tokio::test]
async fn resolve_reruns_selection_after_ttl() {
    let registry = SharedMethodRegistry::new();
    registry.register(def("v1", 1)).await.expect("register");

    let handle =
        MethodHandle::new("frame", "clean", EnginePreference::Auto).with_ttl(Duration::ZERO);
    assert_eq!(handle.resolve(&registry).await.expect("resolve").engine, "v1");

    registry.register(def("v2", 10)).await.expect("register");
    assert_eq!(handle.resolve(&registry).await.expect("resolve").engine, "v2");
}

#[tokio::test]
async fn predict_does_not_write_the_cache() {
    let registry = SharedMethodRegistry::new();
    registry.register(def("v1", 1)).await.expect("register");

    let handle = MethodHandle::new("frame", "clean", EnginePreference::Auto)
        .with_predict_fast_path(false);
    assert_eq!(
        handle.predict_signature(&registry).await.expect("predict").engine,
        "v1"
    );
    assert_eq!(handle.resolved_engine().await, None);

    // Prediction tracks the live registry when nothing is cached.
    registry.register(def("v2", 10)).await.expect("register");
    assert_eq!(
        handle.predict_signature(&registry).await.expect("predict").engine,
        "v2"
    );
}

#[tokio::test]
async fn predict_fast_path_reuses_fresh_resolution() {
    let registry = SharedMethodRegistry::new();
    registry.register(def("v1", 1)).await.expect("register");

    let handle = MethodHandle::new("frame", "clean", EnginePreference::Auto);
    handle.resolve(&registry).await.expect("resolve");

    registry.register(def("v2", 10)).await.expect("register");
    // Within TTL/5 the cached pick is reused without a fresh selection.
    let predicted = handle.predict_signature(&registry).await.expect("predict");
    assert_eq!(predicted.engine, "v1");
}

#[tokio::test]
async fn fixed_engine_skips_strategy() {
    let registry = SharedMethodRegistry::new();
    registry.register(def("v1", 1)).await.expect("register");
    registry.register(def("v2", 10)).await.expect("register");

    let handle = MethodHandle::new(
        "frame",
        "clean",
        EnginePreference::Fixed("v1".to_string()),
    );
    assert_eq!(handle.resolve(&registry).await.expect("resolve").engine, "v1");

    let result = handle.execute(&registry, MethodArgs::new()).await.expect("execute");
    assert_eq!(result, json!("v1"));
}

#[tokio::test]
async fn resolve_without_candidates_fails() {
    let registry = SharedMethodRegistry::new();
    let handle = MethodHandle::new("frame", "clean", EnginePreference::Auto);
    match handle.resolve(&registry).await {
        Err(RegistrySystemError::MethodNotFound { .. }) => {}
        other => panic!("expected MethodNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_resolves_agree() {
    let registry = SharedMethodRegistry::new();
    registry.register(def("v1", 1)).await.expect("register");
    registry.register(def("v2", 10)).await.expect("register");

    let handle = Arc::new(MethodHandle::new("frame", "clean", EnginePreference::Auto));
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let handle = handle.clone();
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            handle.resolve(&registry).await.expect("resolve").engine
        }));
    }
    for task in tasks {
        assert_eq!(task.await.expect("join"), "v2");
    }
}
