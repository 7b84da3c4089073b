use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sitecache_core::models::VersionSnapshot;

use crate::error::ServerError;
use crate::oracle::version_snapshot;
use crate::state::AppState;

/// Success envelope shared with the rest of the site API.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

/// `GET /api/version`
pub async fn version_handler(State(state): State<AppState>) -> Result<Json<Envelope<VersionSnapshot>>, ServerError> {
    let data = version_snapshot(state.source.as_ref())
        .await
        .map_err(ServerError::Versions)?;
    Ok(Json(Envelope { success: true, data }))
}

/// `GET /health`
pub async fn health_handler() -> &'static str {
    "ok"
}
