use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::models::PushSubscription;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store was never initialized or its connection is gone
    #[error("subscription store unavailable: {0}")]
    Unavailable(String),
    #[error("subscription store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Durable mapping from endpoint to subscription. Implementations must
/// allow concurrent operations on distinct endpoints.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace the subscription keyed by its endpoint.
    async fn upsert(&self, subscription: PushSubscription)
    -> Result<PushSubscription, StoreError>;

    /// Snapshot of every subscription at call time.
    async fn list_all(&self) -> Result<Vec<PushSubscription>, StoreError>;

    /// Remove the subscription if present. Returns whether a record was
    /// removed; a missing endpoint is not an error.
    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<bool, StoreError>;

    /// Remove every subscription, returning how many were removed.
    async fn clear(&self) -> Result<usize, StoreError>;
}

/// Process local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: RwLock<HashMap<String, PushSubscription>>,
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn upsert(
        &self,
        subscription: PushSubscription,
    ) -> Result<PushSubscription, StoreError> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.endpoint.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn list_all(&self) -> Result<Vec<PushSubscription>, StoreError> {
        let mut all: Vec<PushSubscription> =
            self.subscriptions.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        Ok(all)
    }

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<bool, StoreError> {
        Ok(self.subscriptions.write().await.remove(endpoint).is_some())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let mut subscriptions = self.subscriptions.write().await;
        let count = subscriptions.len();
        subscriptions.clear();
        Ok(count)
    }
}
