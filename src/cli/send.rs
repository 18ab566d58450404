use anyhow::Result;

use crate::api::engine_from_config;
use crate::core::AppConfig;
use crate::notify::PushNotificationPayload;

pub async fn run(
    title: String,
    body: String,
    url: Option<String>,
    tag: Option<String>,
) -> Result<()> {
    let config = AppConfig::from_env()?;
    let engine = engine_from_config(&config).await?;

    let payload = PushNotificationPayload::new(&title, &body, url.as_deref(), tag.as_deref());
    let report = engine.broadcast(&payload).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
