//! HTTP API: routes in [`server`], error mapping here.

mod server;

pub use server::{router, serve};

use crate::error::RiskError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// [`RiskError`] as an HTTP response.
pub struct ApiError(pub RiskError);

impl From<RiskError> for ApiError {
    fn from(err: RiskError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RiskError::Validation(_) | RiskError::MissingSignal { .. } => StatusCode::BAD_REQUEST,
            RiskError::NotFound(_) => StatusCode::NOT_FOUND,
            RiskError::InvalidTransition { .. } | RiskError::InvalidStatus(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
