//! API routes module

pub mod push;

use std::sync::Arc;

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<AppState>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    // Push notification routes are served from the root, browsers
    // subscribe with `POST /subscribe`
    Router::new().merge(push::router())
}
