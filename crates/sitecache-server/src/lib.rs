//! sitecache-server - the version oracle.
//!
//! Serves `GET /api/version` with the current modification stamp of the
//! profile, todo list and site config so clients can tell, with one small
//! request, whether their cached copies are still current.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod oracle;
pub mod routes;
pub mod state;

use config::ServerConfig;
use oracle::{DocumentSource, JsonDirSource, MemorySource};
use routes::{health_handler, version_handler};
use state::AppState;

/// Preflight responses may be cached for this long.
const CORS_MAX_AGE: Duration = Duration::from_secs(60 * 60);

pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        // Credentials rule out a literal `*`, so echo the caller's origin
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(CORS_MAX_AGE)
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/version", get(version_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

pub fn document_source(config: &ServerConfig) -> Arc<dyn DocumentSource> {
    match &config.data_dir {
        Some(dir) => {
            info!(data_dir = %dir.display(), "Reading documents from directory");
            Arc::new(JsonDirSource::new(dir.clone()))
        }
        None => {
            warn!("SITECACHE_DATA_DIR not set, serving an empty in-memory source");
            Arc::new(MemorySource::new())
        }
    }
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let state = AppState::new(document_source(&config));
    let app = build_router(state, &config);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(origins = ?config.cors_origins, "Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use sitecache_core::models::{ProfileDocument, Todo};
    use tower::ServiceExt;

    fn config() -> ServerConfig {
        ServerConfig::from_lookup(|_| None).unwrap()
    }

    fn app_with(source: Arc<dyn DocumentSource>) -> Router {
        build_router(AppState::new(source), &config())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let source = Arc::new(MemorySource::new());
        source.set_profile(Some(ProfileDocument {
            updated_at: Some(Utc.timestamp_millis_opt(1_714_550_400_000).unwrap()),
            ..Default::default()
        }));
        source.set_todos(vec![Todo {
            server_id: Some("a".to_string()),
            updated_at: Some(Utc.timestamp_millis_opt(1_704_164_645_000).unwrap()),
            ..Default::default()
        }]);

        let (status, body) = get_json(app_with(source), "/api/version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["profile"], "1714550400000");
        assert_eq!(body["data"]["todos"], "1704164645000");
        assert_eq!(body["data"]["config"], "0");
    }

    #[tokio::test]
    async fn test_version_endpoint_reports_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{broken").unwrap();

        let (status, body) = get_json(app_with(Arc::new(JsonDirSource::new(dir.path()))), "/api/version").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Failed to load versions");
    }

    #[tokio::test]
    async fn test_health() {
        let response = app_with(Arc::new(MemorySource::new()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_only() {
        let app = app_with(Arc::new(MemorySource::new()));
        let request = |origin: &str| {
            Request::builder()
                .uri("/api/version")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app.clone().oneshot(request("http://localhost:5173")).await.unwrap();
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );

        let denied = app.oneshot(request("https://evil.example")).await.unwrap();
        assert!(denied.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_cors_wildcard_mirrors_origin() {
        let config = ServerConfig::from_lookup(|key| (key == "CORS_ORIGINS").then(|| "*".to_string())).unwrap();
        let app = build_router(AppState::new(Arc::new(MemorySource::new())), &config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/version")
                    .header(header::ORIGIN, "https://anywhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://anywhere.example"
        );
    }

    #[tokio::test]
    async fn test_preflight_allows_patch() {
        let response = app_with(Arc::new(MemorySource::new()))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/todos/a1/toggle")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let allowed = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(allowed.contains("PATCH"), "allowed methods: {}", allowed);
    }
}
