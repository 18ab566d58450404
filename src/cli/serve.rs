use anyhow::Result;

use crate::api;
use crate::core::AppConfig;

pub async fn run(host: String, port: String) -> Result<()> {
    let config = AppConfig {
        host,
        port,
        ..AppConfig::from_env()?
    };
    api::serve(config).await
}
