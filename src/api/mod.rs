//! API layer -- axum routes, handlers, and the error envelope.

mod routes;
pub mod state;

use self::state::AppState;
use crate::error::PublishError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

impl PublishError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PublishError::Validation(_) => StatusCode::BAD_REQUEST,
            PublishError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Every failure leaves the API as `{ "message": ... }`.
impl IntoResponse for PublishError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "message": self.to_string() }))).into_response()
    }
}
