use anyhow::{Result, anyhow};

use crate::core::db::{MEMORY_STORE, async_db, migrate_db};
use crate::core::db_path;

pub async fn run() -> Result<()> {
    let db_path = db_path();
    if db_path == MEMORY_STORE {
        return Err(anyhow!("Nothing to initialize for the in-memory store"));
    }

    println!("Initializing db at {}...", db_path);
    let db = async_db(&db_path).await?;
    db.call(|conn| {
        migrate_db(conn)?;
        Ok(())
    })
    .await?;
    println!("Finished initializing db");

    Ok(())
}
