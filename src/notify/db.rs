use async_trait::async_trait;
use tokio_rusqlite::Connection;

use super::models::PushSubscription;
use super::store::{StoreError, SubscriptionStore};

/// Subscription store backed by the `push_subscription` table.
#[derive(Clone)]
pub struct SqliteSubscriptionStore {
    db: Connection,
}

impl SqliteSubscriptionStore {
    /// The schema must already exist, see `core::db::initialize_db`.
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::ConnectionClosed => {
                StoreError::Unavailable("connection closed".to_string())
            }
            tokio_rusqlite::Error::Rusqlite(e) if is_missing_schema(&e) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

fn is_missing_schema(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table")
    )
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn upsert(
        &self,
        subscription: PushSubscription,
    ) -> Result<PushSubscription, StoreError> {
        let stored = self
            .db
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO push_subscription (endpoint, p256dh, auth, expiration_time)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(endpoint) DO UPDATE SET
                        p256dh = excluded.p256dh,
                        auth = excluded.auth,
                        expiration_time = excluded.expiration_time,
                        updated_at = CURRENT_TIMESTAMP
                    "#,
                    rusqlite::params![
                        subscription.endpoint,
                        subscription.p256dh,
                        subscription.auth,
                        subscription.expiration_time,
                    ],
                )?;
                Ok(subscription)
            })
            .await?;
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<PushSubscription>, StoreError> {
        let subscriptions = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT endpoint, p256dh, auth, expiration_time FROM push_subscription ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map([], |i| {
                        Ok(PushSubscription {
                            endpoint: i.get(0)?,
                            p256dh: i.get(1)?,
                            auth: i.get(2)?,
                            expiration_time: i.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<PushSubscription>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(subscriptions)
    }

    async fn delete_by_endpoint(&self, endpoint: &str) -> Result<bool, StoreError> {
        let endpoint = endpoint.to_string();
        let deleted = self
            .db
            .call(move |conn| {
                let count = conn.execute(
                    "DELETE FROM push_subscription WHERE endpoint = ?1",
                    [endpoint],
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(deleted)
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let count = self
            .db
            .call(|conn| Ok(conn.execute("DELETE FROM push_subscription", [])?))
            .await?;
        Ok(count)
    }
}
