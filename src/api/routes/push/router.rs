//! Router for the push API

use std::sync::Arc;

use anyhow::anyhow;
use axum::{Json, Router, extract::State, http::StatusCode};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::notify::{PushNotificationPayload, PushSubscription};

type SharedState = Arc<AppState>;

// Register a client for push notifications
async fn push_subscription(
    State(state): State<SharedState>,
    Json(subscription): Json<public::PushSubscriptionRequest>,
) -> Result<(StatusCode, Json<public::SubscriptionResponse>), ApiError> {
    let public::PushSubscriptionRequest {
        endpoint,
        expiration_time,
        keys,
    } = subscription;

    if endpoint.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            anyhow!("Subscription endpoint is empty"),
        ));
    }

    let stored = state
        .engine
        .store()
        .upsert(PushSubscription {
            endpoint,
            p256dh: keys.p256dh,
            auth: keys.auth,
            expiration_time,
        })
        .await?;
    tracing::info!("Saved push subscription {}", stored.endpoint);

    Ok((
        StatusCode::CREATED,
        Json(public::SubscriptionResponse {
            success: true,
            endpoint: stored.endpoint,
        }),
    ))
}

// Send a push notification to all subscriptions
async fn send_notification(
    State(state): State<SharedState>,
    Json(request): Json<public::NotificationRequest>,
) -> Result<Json<public::NotificationResponse>, ApiError> {
    if let Some(email) = &request.email {
        tracing::debug!("Ignoring mail recipient {} for push broadcast", email);
    }

    let payload = PushNotificationPayload::new(
        &request.title,
        &request.body,
        request.url.as_deref(),
        request.tag.as_deref(),
    );
    let report = state.engine.broadcast(&payload).await?;

    Ok(Json(public::NotificationResponse {
        success: true,
        report,
    }))
}

// Application server key browsers need to subscribe
async fn vapid_public_key(
    State(state): State<SharedState>,
) -> Json<public::VapidPublicKeyResponse> {
    Json(public::VapidPublicKeyResponse {
        public_key: state.config.vapid.public_key.clone(),
    })
}

/// Create the push router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/subscribe", axum::routing::post(push_subscription))
        .route("/sendNotification", axum::routing::post(send_notification))
        .route("/send", axum::routing::post(send_notification))
        .route("/vapidPublicKey", axum::routing::get(vapid_public_key))
}
