use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Every failure answers `500 { "error": "Conversion failed", "details" }`;
/// the variants only pick the log level.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The upload never reached the converter: missing fields, unreadable
    /// multipart data, unusable format tags, oversized bodies.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("conversion failed: {0}")]
    ConversionFailed(String),
}

impl ServerError {
    pub fn conversion(e: anyhow::Error) -> Self {
        ServerError::ConversionFailed(format!("{e:#}"))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let details = match self {
            ServerError::InvalidUpload(d) => {
                warn!(details = %d, "rejected upload");
                d
            }
            ServerError::ConversionFailed(d) => {
                error!(details = %d, "conversion failed");
                d
            }
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Conversion failed", "details": details })),
        )
            .into_response()
    }
}
