use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::client::PushClient;
use super::models::{DeliveryOutcome, FanoutReport, PushNotificationPayload};
use super::store::{StoreError, SubscriptionStore};

#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("failed to read subscriptions: {0}")]
    Snapshot(#[from] StoreError),
    #[error("failed to encode notification payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("broadcast task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FanoutError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FanoutError::Snapshot(e) if e.is_unavailable())
    }
}

/// Delivers one payload to every stored subscription and prunes the
/// ones the push service reports as gone.
#[derive(Clone)]
pub struct FanoutEngine {
    store: Arc<dyn SubscriptionStore>,
    client: Arc<dyn PushClient>,
    limiter: Option<Arc<Semaphore>>,
}

impl FanoutEngine {
    pub fn new(store: Arc<dyn SubscriptionStore>, client: Arc<dyn PushClient>) -> Self {
        Self {
            store,
            client,
            limiter: None,
        }
    }

    /// Cap the number of sends in flight at once.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// Send `payload` to every subscription in the current snapshot.
    ///
    /// Individual delivery failures only show up in the report. The only
    /// error is failing to read the snapshot (or encode the payload).
    ///
    /// The fan-out runs on its own task so dropping the returned future
    /// (e.g. a disconnected HTTP client) does not abort in-flight sends or
    /// skip reclaiming gone subscriptions.
    pub async fn broadcast(
        &self,
        payload: &PushNotificationPayload,
    ) -> Result<FanoutReport, FanoutError> {
        let engine = self.clone();
        let payload = payload.clone();
        tokio::spawn(async move { engine.deliver(&payload).await }).await?
    }

    async fn deliver(
        &self,
        payload: &PushNotificationPayload,
    ) -> Result<FanoutReport, FanoutError> {
        let subscriptions = self.store.list_all().await?;
        if subscriptions.is_empty() {
            tracing::debug!("No push subscriptions, skipping broadcast");
            return Ok(FanoutReport::default());
        }

        // Every recipient gets the same bytes
        let body: Arc<[u8]> = serde_json::to_vec(payload)?.into();

        let mut report = FanoutReport {
            attempted: subscriptions.len(),
            ..Default::default()
        };

        let mut tasks = JoinSet::new();
        for sub in subscriptions {
            let client = Arc::clone(&self.client);
            let body = Arc::clone(&body);
            let limiter = self.limiter.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = client.send(&sub, &body).await;
                (sub.endpoint, outcome)
            });
        }

        let mut gone = Vec::new();
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok((endpoint, DeliveryOutcome::Delivered)) => {
                    tracing::debug!("Delivered push to {}", endpoint);
                    report.delivered += 1;
                }
                Ok((endpoint, DeliveryOutcome::Gone)) => {
                    tracing::info!("Push endpoint gone: {}", endpoint);
                    report.gone += 1;
                    gone.push(endpoint);
                }
                Ok((endpoint, DeliveryOutcome::TransientFailure { reason })) => {
                    tracing::warn!("Push to {} failed: {}", endpoint, reason);
                    report.transient += 1;
                }
                // A panicking send still leaves its subscription in place
                Err(e) => {
                    tracing::error!("Push delivery task failed: {}", e);
                    report.transient += 1;
                }
            }
        }

        let reclaimed = futures::future::join_all(gone.iter().map(|e| self.reclaim(e))).await;
        for (endpoint, result) in gone.iter().zip(reclaimed) {
            match result {
                Ok(_) => report.removed += 1,
                Err(e) => tracing::error!("Failed to remove subscription {}: {}", endpoint, e),
            }
        }

        tracing::info!(
            "Broadcast finished: {} attempted, {} delivered, {} removed, {} failed",
            report.attempted,
            report.delivered,
            report.removed,
            report.transient
        );
        Ok(report)
    }

    /// Delete a dead subscription. Deleting an endpoint that is already
    /// gone succeeds.
    pub async fn reclaim(&self, endpoint: &str) -> Result<bool, StoreError> {
        let removed = self.store.delete_by_endpoint(endpoint).await?;
        if removed {
            tracing::info!("Removed subscription {}", endpoint);
        } else {
            tracing::debug!("Subscription {} was already removed", endpoint);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::notify::{MemorySubscriptionStore, PushSubscription};

    /// Scripted outcomes per endpoint, `Delivered` otherwise.
    #[derive(Default)]
    struct ScriptedClient {
        outcomes: HashMap<String, DeliveryOutcome>,
        bodies: Mutex<Vec<Vec<u8>>>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedClient {
        fn with(outcomes: &[(&str, DeliveryOutcome)]) -> Self {
            Self {
                outcomes: outcomes
                    .iter()
                    .map(|(e, o)| (e.to_string(), o.clone()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PushClient for ScriptedClient {
        async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.bodies.lock().unwrap().push(payload.to_vec());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if subscription.endpoint.ends_with("/panic") {
                panic!("send blew up");
            }
            self.outcomes
                .get(&subscription.endpoint)
                .cloned()
                .unwrap_or(DeliveryOutcome::Delivered)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SubscriptionStore for BrokenStore {
        async fn upsert(
            &self,
            _subscription: PushSubscription,
        ) -> Result<PushSubscription, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn list_all(&self) -> Result<Vec<PushSubscription>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn delete_by_endpoint(&self, _endpoint: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn clear(&self) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    /// Reads work, deletes fail.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemorySubscriptionStore,
    }

    #[async_trait]
    impl SubscriptionStore for ReadOnlyStore {
        async fn upsert(
            &self,
            subscription: PushSubscription,
        ) -> Result<PushSubscription, StoreError> {
            self.inner.upsert(subscription).await
        }
        async fn list_all(&self) -> Result<Vec<PushSubscription>, StoreError> {
            self.inner.list_all().await
        }
        async fn delete_by_endpoint(&self, _endpoint: &str) -> Result<bool, StoreError> {
            Err(StoreError::Backend("attempt to write a readonly database".to_string()))
        }
        async fn clear(&self) -> Result<usize, StoreError> {
            Err(StoreError::Backend("attempt to write a readonly database".to_string()))
        }
    }

    async fn store_with(endpoints: &[&str]) -> Arc<MemorySubscriptionStore> {
        let store = Arc::new(MemorySubscriptionStore::default());
        for endpoint in endpoints {
            store
                .upsert(PushSubscription::new(endpoint, "k", "a"))
                .await
                .unwrap();
        }
        store
    }

    async fn endpoints(store: &MemorySubscriptionStore) -> Vec<String> {
        store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.endpoint)
            .collect()
    }

    fn payload() -> PushNotificationPayload {
        PushNotificationPayload::new("T", "B", None, None)
    }

    #[tokio::test]
    async fn it_removes_only_gone_subscriptions() {
        let store = store_with(&["https://push/a", "https://push/b", "https://push/c"]).await;
        let client = Arc::new(ScriptedClient::with(&[
            ("https://push/b", DeliveryOutcome::Gone),
            ("https://push/c", DeliveryOutcome::transient("503")),
        ]));
        let engine = FanoutEngine::new(store.clone(), client);

        let report = engine.broadcast(&payload()).await.unwrap();

        assert_eq!(
            report,
            FanoutReport {
                attempted: 3,
                delivered: 1,
                gone: 1,
                removed: 1,
                transient: 1,
            }
        );
        assert_eq!(
            endpoints(&store).await,
            vec!["https://push/a", "https://push/c"]
        );
    }

    #[tokio::test]
    async fn it_is_a_noop_without_subscriptions() {
        let store = store_with(&[]).await;
        let client = Arc::new(ScriptedClient::default());
        let engine = FanoutEngine::new(store.clone(), client.clone());

        let report = engine.broadcast(&payload()).await.unwrap();

        assert_eq!(report, FanoutReport::default());
        assert!(client.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_sends_identical_bytes_to_everyone() {
        let store = store_with(&["https://push/a", "https://push/b"]).await;
        let client = Arc::new(ScriptedClient::default());
        let engine = FanoutEngine::new(store, client.clone());

        engine.broadcast(&payload()).await.unwrap();

        let bodies = client.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
        let sent: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
        assert_eq!(sent["title"], "T");
        assert_eq!(sent["body"], "B");
    }

    #[tokio::test]
    async fn it_fails_when_snapshot_fails() {
        let engine = FanoutEngine::new(Arc::new(BrokenStore), Arc::new(ScriptedClient::default()));

        let err = engine.broadcast(&payload()).await.unwrap_err();

        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn it_reports_gone_when_delete_fails() {
        let store = Arc::new(ReadOnlyStore::default());
        store
            .upsert(PushSubscription::new("https://push/a", "k", "a"))
            .await
            .unwrap();
        store
            .upsert(PushSubscription::new("https://push/b", "k", "a"))
            .await
            .unwrap();
        let client = Arc::new(ScriptedClient::with(&[(
            "https://push/a",
            DeliveryOutcome::Gone,
        )]));
        let engine = FanoutEngine::new(store.clone(), client);

        let report = engine.broadcast(&payload()).await.unwrap();

        assert_eq!(
            report,
            FanoutReport {
                attempted: 2,
                delivered: 1,
                gone: 1,
                removed: 0,
                transient: 0,
            }
        );
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn it_finishes_when_the_caller_goes_away() {
        let store = store_with(&["https://push/gone", "https://push/slow"]).await;
        let client = Arc::new(ScriptedClient {
            outcomes: HashMap::from([("https://push/gone".to_string(), DeliveryOutcome::Gone)]),
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let engine = FanoutEngine::new(store.clone(), client.clone());

        let payload = payload();
        let broadcast = engine.broadcast(&payload);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), broadcast)
                .await
                .is_err()
        );
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(client.bodies.lock().unwrap().len(), 2);
        assert_eq!(endpoints(&store).await, vec!["https://push/slow"]);
    }

    #[tokio::test]
    async fn it_survives_a_panicking_send() {
        let store = store_with(&["https://push/a", "https://push/panic"]).await;
        let engine = FanoutEngine::new(store.clone(), Arc::new(ScriptedClient::default()));

        let report = engine.broadcast(&payload()).await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.transient, 1);
        assert_eq!(endpoints(&store).await.len(), 2);
    }

    #[tokio::test]
    async fn it_sends_concurrently() {
        let endpoints: Vec<String> = (0..8).map(|i| format!("https://push/{i}")).collect();
        let refs: Vec<&str> = endpoints.iter().map(String::as_str).collect();
        let store = store_with(&refs).await;
        let client = Arc::new(ScriptedClient {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let engine = FanoutEngine::new(store, client.clone());

        let report = engine.broadcast(&payload()).await.unwrap();

        assert_eq!(report.delivered, 8);
        assert!(client.max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn it_respects_max_concurrency() {
        let endpoints: Vec<String> = (0..6).map(|i| format!("https://push/{i}")).collect();
        let refs: Vec<&str> = endpoints.iter().map(String::as_str).collect();
        let store = store_with(&refs).await;
        let client = Arc::new(ScriptedClient {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let engine = FanoutEngine::new(store, client.clone()).with_max_concurrency(2);

        let report = engine.broadcast(&payload()).await.unwrap();

        assert_eq!(report.delivered, 6);
        assert!(client.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn it_reclaims_idempotently() {
        let store = store_with(&["https://push/a"]).await;
        let engine = FanoutEngine::new(store.clone(), Arc::new(ScriptedClient::default()));

        assert!(engine.reclaim("https://push/a").await.unwrap());
        assert!(!engine.reclaim("https://push/a").await.unwrap());
        assert!(!engine.reclaim("https://push/unknown").await.unwrap());
        assert!(endpoints(&store).await.is_empty());
    }
}
