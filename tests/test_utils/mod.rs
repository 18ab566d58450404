//! Test utilities for integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, body::Body};

use pushd::api::{AppState, app};
use pushd::core::AppConfig;
use pushd::notify::{
    DeliveryOutcome, FanoutEngine, MemorySubscriptionStore, PushClient, PushSubscription,
    StoreError, SubscriptionStore,
};

pub const TEST_PUBLIC_KEY: &str = "test-vapid-public-key";

/// Config for tests: in-memory store, no countdown job.
pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "PUSHD_VAPID_SUBJECT" => Some("mailto:test@example.com".to_string()),
        "PUSHD_VAPID_PUBLIC_KEY" => Some(TEST_PUBLIC_KEY.to_string()),
        "PUSHD_VAPID_PRIVATE_KEY" => Some("test-vapid-private-key".to_string()),
        "PUSHD_DB_PATH" => Some("memory".to_string()),
        "PUSHD_COUNTDOWN_SCHEDULE" => Some("off".to_string()),
        _ => None,
    })
    .expect("Failed to build test config")
}

/// Push client that answers from a script instead of the network.
/// Endpoints without a scripted outcome are delivered.
#[derive(Default)]
pub struct FakePushClient {
    outcomes: HashMap<String, DeliveryOutcome>,
    delays: HashMap<String, Duration>,
    pub sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakePushClient {
    pub fn with(outcomes: &[(&str, DeliveryOutcome)]) -> Self {
        Self {
            outcomes: outcomes
                .iter()
                .map(|(e, o)| (e.to_string(), o.clone()))
                .collect(),
            ..Default::default()
        }
    }

    /// Answer for `endpoint` only after `delay`.
    pub fn delayed(mut self, endpoint: &str, delay: Duration) -> Self {
        self.delays.insert(endpoint.to_string(), delay);
        self
    }

    pub fn sent_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(e, _)| e.clone())
            .collect();
        endpoints.sort();
        endpoints
    }
}

#[async_trait]
impl PushClient for FakePushClient {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryOutcome {
        if let Some(delay) = self.delays.get(&subscription.endpoint) {
            tokio::time::sleep(*delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.to_vec()));
        self.outcomes
            .get(&subscription.endpoint)
            .cloned()
            .unwrap_or(DeliveryOutcome::Delivered)
    }
}

/// Store whose every operation fails with the given error.
pub struct FailingStore {
    pub unavailable: bool,
}

impl FailingStore {
    fn error(&self) -> StoreError {
        if self.unavailable {
            StoreError::Unavailable("connection closed".to_string())
        } else {
            StoreError::Backend("disk I/O error".to_string())
        }
    }
}

#[async_trait]
impl SubscriptionStore for FailingStore {
    async fn upsert(
        &self,
        _subscription: PushSubscription,
    ) -> Result<PushSubscription, StoreError> {
        Err(self.error())
    }
    async fn list_all(&self) -> Result<Vec<PushSubscription>, StoreError> {
        Err(self.error())
    }
    async fn delete_by_endpoint(&self, _endpoint: &str) -> Result<bool, StoreError> {
        Err(self.error())
    }
    async fn clear(&self) -> Result<usize, StoreError> {
        Err(self.error())
    }
}

pub fn test_app_with_config(
    config: AppConfig,
    store: Arc<dyn SubscriptionStore>,
    client: Arc<dyn PushClient>,
) -> Router {
    let engine = FanoutEngine::new(store, client);
    app(Arc::new(AppState::new(engine, config)))
}

pub fn test_app_with(store: Arc<dyn SubscriptionStore>, client: Arc<dyn PushClient>) -> Router {
    test_app_with_config(test_config(), store, client)
}

/// Creates a test application backed by an in-memory store where every
/// delivery succeeds.
pub fn test_app() -> Router {
    test_app_with(
        Arc::new(MemorySubscriptionStore::default()),
        Arc::new(FakePushClient::default()),
    )
}

pub fn subscription_json(endpoint: &str, p256dh: &str, auth: &str) -> String {
    serde_json::json!({
        "endpoint": endpoint,
        "expirationTime": null,
        "keys": {
            "p256dh": p256dh,
            "auth": auth
        }
    })
    .to_string()
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}
