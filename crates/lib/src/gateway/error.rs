//! Error responses for the HTTP surface: `{ "detail": "..." }` with a mapped status.

use crate::graph::GraphError;
use crate::llm::ProviderError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed inbound payload or schema; rejected before the core runs.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Provider(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Graph(GraphError::Encode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Graph(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Graph(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::warn!("request failed ({}): {}", status, self);
        } else {
            log::debug!("request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
