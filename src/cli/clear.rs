use anyhow::Result;

use crate::core::db::open_store;
use crate::core::db_path;

/// Administrative reset, removes every subscription.
pub async fn run() -> Result<()> {
    let store = open_store(&db_path()).await?;
    let removed = store.clear().await?;
    println!("Removed {} subscriptions", removed);
    Ok(())
}
