use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::api::state::AppState;
use crate::core::{AppConfig, db::open_store};
use crate::jobs::{DailyCountdown, spawn_periodic_job};
use crate::notify::{FanoutEngine, WebPushDeliveryClient};

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn app(shared_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&shared_state.config.allowed_origins);

    Router::new()
        .merge(routes::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::clone(&shared_state))
}

/// Build the fan-out engine from config, opening the store. Fails if the
/// store can not be reached.
pub async fn engine_from_config(config: &AppConfig) -> Result<FanoutEngine> {
    let store = open_store(&config.db_path).await?;
    let client = WebPushDeliveryClient::new(&config.vapid, config.send_timeout, config.push_ttl)?;
    let engine = FanoutEngine::new(store, Arc::new(client));

    Ok(match config.max_concurrency {
        Some(max) => engine.with_max_concurrency(max),
        None => engine,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

// Run the server
pub async fn serve(config: AppConfig) -> Result<()> {
    let engine = engine_from_config(&config)
        .await
        .context("Subscription store is unavailable, refusing to start")?;

    let app_state = AppState::new(engine.clone(), config.clone());
    let app = app(Arc::new(app_state));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

    tracing::info!("Server started. Listening on {}", listener.local_addr()?);

    // The countdown broadcast runs in its own tokio task in a loop
    match DailyCountdown::from_config(&config) {
        Some(job) => {
            spawn_periodic_job(engine, job);
        }
        None => tracing::info!("Countdown notifications are disabled"),
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
