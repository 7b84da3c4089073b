use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::oracle::SourceError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to load versions")]
    Versions(#[source] SourceError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Versions(source) => {
                error!(error = %source, "Version lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
