//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans on cache and store operations.

#![allow(clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use gatekeeper_storage::{
    IdentityStore, MemoryBackend, MemoryIdentityStore, MemoryRoleStore, RoleStore,
    StorageBackend, UserId, testutil::StallingStore, with_timeout,
};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn install() -> (Arc<Mutex<Vec<String>>>, tracing::subscriber::DefaultGuard) {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    (spans, tracing::subscriber::set_default(subscriber))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_backend_operations_create_spans() {
    let (spans, _guard) = install();

    let backend = MemoryBackend::new();
    backend
        .set_with_ttl(b"user-1".to_vec(), b"{}".to_vec(), Duration::from_secs(60))
        .await
        .expect("set_with_ttl should succeed");
    let _ = backend.get(b"user-1").await;
    backend.delete(b"user-1").await.expect("delete should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["set_with_ttl", "get", "delete"] {
        assert!(recorded.iter().any(|s| s == name), "expected a '{name}' span, got: {recorded:?}");
    }
}

#[tokio::test]
async fn identity_store_lookup_creates_span() {
    let (spans, _guard) = install();

    let store = MemoryIdentityStore::new();
    let _ = store.get_by_id(UserId(1)).await;
    let _ = store.get_by_email("nobody@example.com").await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "get_by_id"), "got: {recorded:?}");
    assert!(recorded.iter().any(|s| s == "get_by_email"), "got: {recorded:?}");
}

#[tokio::test]
async fn role_store_lookup_creates_span() {
    let (spans, _guard) = install();

    let roles = MemoryRoleStore::with_default_roles();
    roles.get_by_name("admin").await.expect("admin is seeded");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "get_by_name"), "got: {recorded:?}");
}

#[tokio::test(start_paused = true)]
async fn timeout_wrapper_creates_span() {
    let (spans, _guard) = install();

    let store = StallingStore::new(Duration::from_secs(10));
    let result =
        with_timeout(Duration::from_secs(5), "get_by_id", store.get_by_id(UserId(1))).await;
    assert!(result.is_err());

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "with_timeout"), "got: {recorded:?}");
}
