//! Per-operation timeout behavior against slow durable stores.

#![allow(clippy::expect_used, clippy::panic)]

use std::time::Duration;

use gatekeeper_storage::{
    DEFAULT_STORE_TIMEOUT, IdentityStore, MemoryIdentityStore, RoleStore, StorageError, UserId,
    assert_timeout,
    testutil::{StallingStore, identity_with_level},
    with_timeout,
};

#[tokio::test(start_paused = true)]
async fn stalled_identity_lookup_times_out_at_default_limit() {
    let store = StallingStore::new(DEFAULT_STORE_TIMEOUT + Duration::from_secs(1));
    let started = tokio::time::Instant::now();

    let result = with_timeout(DEFAULT_STORE_TIMEOUT, "get_by_id", store.get_by_id(UserId(1))).await;

    assert_timeout!(result);
    let elapsed = started.elapsed();
    assert!(elapsed >= DEFAULT_STORE_TIMEOUT, "gave up early: {elapsed:?}");
    assert!(elapsed < DEFAULT_STORE_TIMEOUT + Duration::from_secs(1), "waited too long: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn stalled_role_lookup_times_out() {
    let store = StallingStore::new(Duration::from_secs(30));
    let result = with_timeout(Duration::from_secs(5), "get_by_name", store.get_by_name("admin")).await;
    assert_timeout!(result);
}

#[tokio::test(start_paused = true)]
async fn slow_store_under_limit_surfaces_its_own_error() {
    let store = StallingStore::new(Duration::from_secs(1));
    let result = with_timeout(Duration::from_secs(5), "get_by_id", store.get_by_id(UserId(1))).await;
    assert!(
        matches!(result, Err(StorageError::Connection { .. })),
        "expected the store's own error, got {result:?}"
    );
}

#[tokio::test]
async fn fast_store_is_unaffected() {
    let store = MemoryIdentityStore::new();
    store.insert(identity_with_level(4, 1));

    let identity = with_timeout(DEFAULT_STORE_TIMEOUT, "get_by_id", store.get_by_id(UserId(4)))
        .await
        .expect("in-memory lookup completes immediately");
    assert_eq!(identity.id, UserId(4));
}
