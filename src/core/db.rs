use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_rusqlite::Connection;

use crate::notify::{MemorySubscriptionStore, SqliteSubscriptionStore, SubscriptionStore};

/// Value of `PUSHD_DB_PATH` that selects the non-durable store.
pub const MEMORY_STORE: &str = "memory";

pub async fn async_db(db_path: &str) -> Result<Connection> {
    let db = Connection::open(db_path)
        .await
        .with_context(|| format!("Failed to open sqlite db at {}", db_path))?;
    db.call(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    })
    .await?;
    Ok(db)
}

pub fn initialize_db(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS push_subscription (
            endpoint TEXT PRIMARY KEY,
            p256dh TEXT NOT NULL,
            auth TEXT NOT NULL,
            expiration_time INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
}

/// Brings an existing db up to the current schema. Safe to run repeatedly.
pub fn migrate_db(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    initialize_db(conn)?;

    // Databases created before expiration metadata was stored
    let has_expiration = conn
        .prepare(
            "SELECT 1 FROM pragma_table_info('push_subscription') WHERE name = 'expiration_time'",
        )?
        .exists([])?;
    if !has_expiration {
        conn.execute(
            "ALTER TABLE push_subscription ADD COLUMN expiration_time INTEGER",
            [],
        )?;
    }
    Ok(())
}

/// Open the subscription store named by `db_path`, creating the schema
/// if needed. Any failure here means the process must not serve.
pub async fn open_store(db_path: &str) -> Result<Arc<dyn SubscriptionStore>> {
    if db_path == MEMORY_STORE {
        tracing::warn!(
            "Using in-memory subscription store, subscriptions will not survive a restart"
        );
        return Ok(Arc::new(MemorySubscriptionStore::default()));
    }

    let db = async_db(db_path).await?;
    db.call(|conn| {
        migrate_db(conn)?;
        Ok(())
    })
    .await
    .context("Failed to initialize subscription schema")?;

    Ok(Arc::new(SqliteSubscriptionStore::new(db)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_migrates_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pushd.sqlite");
        let db = async_db(path.to_str().unwrap()).await.unwrap();

        let columns = db
            .call(|conn| {
                migrate_db(conn)?;
                migrate_db(conn)?;
                let mut stmt =
                    conn.prepare("SELECT name FROM pragma_table_info('push_subscription')")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();

        assert!(columns.contains(&"endpoint".to_string()));
        assert!(columns.contains(&"expiration_time".to_string()));
    }

    #[tokio::test]
    async fn it_adds_missing_expiration_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.sqlite");
        let db = async_db(path.to_str().unwrap()).await.unwrap();

        let has_column = db
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE push_subscription (
                        endpoint TEXT PRIMARY KEY,
                        p256dh TEXT NOT NULL,
                        auth TEXT NOT NULL,
                        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                    );",
                )?;
                migrate_db(conn)?;
                let exists = conn
                    .prepare(
                        "SELECT 1 FROM pragma_table_info('push_subscription') WHERE name = 'expiration_time'",
                    )?
                    .exists([])?;
                Ok(exists)
            })
            .await
            .unwrap();

        assert!(has_column);
    }

    #[tokio::test]
    async fn it_opens_memory_store() {
        let store = open_store(MEMORY_STORE).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
