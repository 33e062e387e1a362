//! Building a pipeline from configuration.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use gatekeeper_admission::{AdmissionConfig, AdmissionRequest, RejectionStatus};
use gatekeeper_storage::{MemoryBackend, MemoryIdentityStore, MemoryRoleStore, RoleStore};

const CONFIG: &str = r#"{
    "rate_limit": { "enabled": true, "requests": 3, "window": "10s" },
    "cache": { "enabled": true, "ttl": "30s" },
    "token": { "secret": "integration-secret", "issuer": "gatekeeper-tests", "ttl": "1h" },
    "basic": { "user": "ops", "pass": "ops-pass" },
    "store_timeout": "250ms"
}"#;

#[test]
fn humantime_durations_parse() {
    let config: AdmissionConfig = serde_json::from_str(CONFIG).unwrap();
    assert_eq!(config.rate_limit.window, Duration::from_secs(10));
    assert_eq!(config.cache.ttl, Duration::from_secs(30));
    assert_eq!(config.token.ttl, Duration::from_secs(3600));
    assert_eq!(config.store_timeout, Duration::from_millis(250));
    config.validate().unwrap();
}

#[tokio::test]
async fn configured_pipeline_enforces_configured_limits() {
    let config: AdmissionConfig = serde_json::from_str(CONFIG).unwrap();

    let roles = Arc::new(MemoryRoleStore::with_default_roles());
    let users = Arc::new(MemoryIdentityStore::new());
    let mia = users
        .create_identity("mia", "mia@example.com", roles.get_by_name("moderator").await.unwrap())
        .await
        .unwrap();

    let pipeline = config.build_pipeline(users, roles, Arc::new(MemoryBackend::new())).unwrap();
    let token = config.authenticator().unwrap().issue_for(mia.id).unwrap();
    let request = AdmissionRequest::new("10.1.1.1", Some(format!("Bearer {token}")));

    for _ in 0..3 {
        assert!(pipeline.admit(&request).await.is_admitted());
    }
    let rejection = pipeline.admit(&request).await.rejection().cloned().unwrap();
    assert_eq!(rejection.status, RejectionStatus::TooManyRequests);
    assert!(rejection.retry_after.unwrap() <= Duration::from_secs(10));
}

#[tokio::test]
async fn tokens_from_another_issuer_are_rejected() {
    let config: AdmissionConfig = serde_json::from_str(CONFIG).unwrap();
    let mut other = config.clone();
    other.token.issuer = "someone-else".to_owned();

    let pipeline = config
        .build_pipeline(
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(MemoryRoleStore::with_default_roles()),
            Arc::new(MemoryBackend::new()),
        )
        .unwrap();
    let token = other.authenticator().unwrap().issue_for(1.into()).unwrap();

    let decision = pipeline.admit(&AdmissionRequest::new("c", Some(format!("Bearer {token}")))).await;
    assert_eq!(decision.rejection().unwrap().status, RejectionStatus::Unauthorized);
}
