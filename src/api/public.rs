//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::notify::{FanoutError, StoreError};

// Errors

pub struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    pub fn new(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self.error);
        } else {
            tracing::warn!("Rejected request: {}", self.error);
        }

        // Respond with an error status
        (
            self.status,
            format!("Something went wrong: {}", self.error),
        )
            .into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`. A store
/// that is not reachable is a 503, anything else a 500.
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        let unavailable = error
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_unavailable)
            || error
                .downcast_ref::<FanoutError>()
                .is_some_and(FanoutError::is_unavailable);
        let status = if unavailable {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self { status, error }
    }
}

// Re-export public types from each route

pub mod push {
    pub use crate::api::routes::push::public::*;
}
