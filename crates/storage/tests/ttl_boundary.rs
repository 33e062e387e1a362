//! TTL boundary condition tests for `MemoryBackend`.
//!
//! The identity cache relies on the backend alone to expire entries, so the
//! edges matter: zero TTL, the exact expiry instant, and TTL replacement.

#![allow(clippy::expect_used, clippy::panic)]

use std::time::Duration;

use bytes::Bytes;
use gatekeeper_storage::{MemoryBackend, StorageBackend};

const IDENTITY_TTL: Duration = Duration::from_secs(60);

// ============================================================================
// Zero TTL
// ============================================================================

/// A key set with `Duration::ZERO` expires at its insertion instant, so the
/// next read already sees it as absent.
#[tokio::test(start_paused = true)]
async fn zero_ttl_is_immediately_expired() {
    let backend = MemoryBackend::new();

    backend
        .set_with_ttl(b"user-1".to_vec(), b"{}".to_vec(), Duration::ZERO)
        .await
        .expect("set_with_ttl with zero duration should succeed");

    let result = backend.get(b"user-1").await.expect("get should not error");
    assert_eq!(result, None, "a key with zero TTL should read as absent");
}

// ============================================================================
// Exact boundary
// ============================================================================

/// One tick before expiry the entry is visible; at the expiry instant it is not.
#[tokio::test(start_paused = true)]
async fn expiry_boundary_is_exclusive() {
    let backend = MemoryBackend::new();
    backend
        .set_with_ttl(b"user-2".to_vec(), b"snapshot".to_vec(), IDENTITY_TTL)
        .await
        .expect("set_with_ttl");

    tokio::time::advance(IDENTITY_TTL - Duration::from_millis(1)).await;
    assert_eq!(
        backend.get(b"user-2").await.expect("get"),
        Some(Bytes::from("snapshot")),
        "entry must still be visible just before its TTL"
    );

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(backend.get(b"user-2").await.expect("get"), None, "entry must expire at its TTL");
}

// ============================================================================
// Replacement
// ============================================================================

/// Re-setting a key restarts its TTL from the time of the second write.
#[tokio::test(start_paused = true)]
async fn set_with_ttl_replaces_expiry() {
    let backend = MemoryBackend::new();
    backend.set_with_ttl(b"user-3".to_vec(), b"v1".to_vec(), IDENTITY_TTL).await.expect("set");

    tokio::time::advance(Duration::from_secs(50)).await;
    backend.set_with_ttl(b"user-3".to_vec(), b"v2".to_vec(), IDENTITY_TTL).await.expect("set");

    // 70s after the first write, 20s after the second.
    tokio::time::advance(Duration::from_secs(20)).await;
    assert_eq!(backend.get(b"user-3").await.expect("get"), Some(Bytes::from("v2")));

    tokio::time::advance(Duration::from_secs(40)).await;
    assert_eq!(backend.get(b"user-3").await.expect("get"), None);
}

/// A shorter TTL on overwrite wins over a longer earlier one.
#[tokio::test(start_paused = true)]
async fn shorter_ttl_overwrite_wins() {
    let backend = MemoryBackend::new();
    backend
        .set_with_ttl(b"user-4".to_vec(), b"long".to_vec(), Duration::from_secs(3600))
        .await
        .expect("set");
    backend
        .set_with_ttl(b"user-4".to_vec(), b"short".to_vec(), Duration::from_secs(1))
        .await
        .expect("set");

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(backend.get(b"user-4").await.expect("get"), None);
}

/// Expiry of one key leaves its neighbours alone.
#[tokio::test(start_paused = true)]
async fn expiry_is_per_key() {
    let backend = MemoryBackend::new();
    backend
        .set_with_ttl(b"user-5".to_vec(), b"short".to_vec(), Duration::from_secs(1))
        .await
        .expect("set");
    backend.set_with_ttl(b"user-6".to_vec(), b"long".to_vec(), IDENTITY_TTL).await.expect("set");

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(backend.get(b"user-5").await.expect("get"), None);
    assert_eq!(backend.get(b"user-6").await.expect("get"), Some(Bytes::from("long")));
}
