//! API client for the site backend.
//!
//! This module provides the `ApiClient` struct for fetching profile, todo and
//! config payloads, the version snapshot, and issuing the user mutations.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{NewTodo, Profile, ProfileDocument, SiteConfig, TimelineEntry, Todo, TodoPatch, VersionSnapshot};

use super::{ApiError, SiteApi};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// The `{ success, data, message }` wrapper every site endpoint returns.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, url: &str) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| format!("{} reported failure", url)),
            ));
        }
        self.data
            .ok_or_else(|| ApiError::Malformed(format!("Missing data in response from {}", url)))
    }

    fn into_ack(self, url: &str) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| format!("{} reported failure", url)),
            ))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeleteCompletedResponse {
    #[serde(default, alias = "deletedCount")]
    deleted_count: u64,
}

#[derive(Serialize)]
struct TogglePayload {
    completed: bool,
}

#[derive(Serialize)]
struct TimelinePayload<'a> {
    timeline: &'a [TimelineEntry],
}

#[derive(Serialize)]
struct SkillsPayload<'a> {
    skills: &'a [String],
}

#[derive(Serialize)]
struct TokenPayload<'a> {
    token: &'a str,
}

/// API client for the site backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<String>,
    token: Option<Arc<String>>,
}

impl ApiClient {
    /// Create a new API client for the given base URL (e.g. `http://host/api`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::new(base_url.into().trim_end_matches('/').to_string()),
            token: None,
        })
    }

    /// Create a new ApiClient with the given bearer token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(Arc::new(token.into())),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Whether a 429 for this method may be retried. Non-idempotent writes
    /// fail on the first 429.
    fn retries_rate_limit(method: &Method) -> bool {
        method.is_idempotent()
    }

    /// Send a request and decode the envelope, backing off on 429 for
    /// idempotent methods.
    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token.as_str());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    debug!(url = %url, method = %method, "Request succeeded");
                    return response
                        .json::<Envelope<T>>()
                        .await
                        .map_err(|e| ApiError::Malformed(format!("Failed to parse JSON response from {}: {}", url, e)));
                }
                None => {
                    retries += 1;
                    if !Self::retries_rate_limit(&method) || retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::GET, path, None)
            .await?
            .into_data(path)
    }

    async fn call<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        self.send::<T, B>(method, path, body).await?.into_data(path)
    }

    async fn ack<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.send::<Value, B>(method, path, body).await?.into_ack(path)
    }

    // ===== Data Fetching Methods =====

    pub async fn versions(&self) -> Result<VersionSnapshot, ApiError> {
        self.get("/version").await
    }

    pub async fn profile(&self) -> Result<ProfileDocument, ApiError> {
        self.get("/profile").await
    }

    pub async fn todos(&self) -> Result<Vec<Todo>, ApiError> {
        self.get("/todos").await
    }

    pub async fn config(&self) -> Result<SiteConfig, ApiError> {
        self.get("/config").await
    }
}

impl SiteApi for ApiClient {
    fn fetch_versions(&self) -> BoxFuture<'_, Result<VersionSnapshot, ApiError>> {
        self.versions().boxed()
    }

    fn fetch_profile(&self) -> BoxFuture<'_, Result<ProfileDocument, ApiError>> {
        self.profile().boxed()
    }

    fn fetch_todos(&self) -> BoxFuture<'_, Result<Vec<Todo>, ApiError>> {
        self.todos().boxed()
    }

    fn fetch_config(&self) -> BoxFuture<'_, Result<SiteConfig, ApiError>> {
        self.config().boxed()
    }

    fn create_todo<'a>(&'a self, todo: &'a NewTodo) -> BoxFuture<'a, Result<Todo, ApiError>> {
        self.call(Method::POST, "/todos", Some(todo)).boxed()
    }

    fn update_todo<'a>(&'a self, id: &'a str, patch: &'a TodoPatch) -> BoxFuture<'a, Result<(), ApiError>> {
        async move { self.ack(Method::PUT, &format!("/todos/{}", id), Some(patch)).await }.boxed()
    }

    fn toggle_todo<'a>(&'a self, id: &'a str, completed: bool) -> BoxFuture<'a, Result<(), ApiError>> {
        async move {
            self.ack(Method::PATCH, &format!("/todos/{}/toggle", id), Some(&TogglePayload { completed }))
                .await
        }
        .boxed()
    }

    fn delete_todo<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        async move { self.ack::<()>(Method::DELETE, &format!("/todos/{}", id), None).await }.boxed()
    }

    fn delete_completed_todos(&self) -> BoxFuture<'_, Result<u64, ApiError>> {
        async move {
            let envelope = self
                .send::<DeleteCompletedResponse, ()>(Method::DELETE, "/todos/completed", None)
                .await?;
            if !envelope.success {
                return Err(ApiError::Rejected(
                    envelope.message.unwrap_or_else(|| "Failed to delete completed todos".to_string()),
                ));
            }
            Ok(envelope.data.unwrap_or_default().deleted_count)
        }
        .boxed()
    }

    fn update_profile<'a>(&'a self, profile: &'a Profile) -> BoxFuture<'a, Result<ProfileDocument, ApiError>> {
        self.call(Method::PUT, "/profile", Some(profile)).boxed()
    }

    fn update_timeline<'a>(
        &'a self,
        timeline: &'a [TimelineEntry],
    ) -> BoxFuture<'a, Result<ProfileDocument, ApiError>> {
        async move {
            self.call(Method::PUT, "/profile/timeline", Some(&TimelinePayload { timeline }))
                .await
        }
        .boxed()
    }

    fn update_skills<'a>(&'a self, skills: &'a [String]) -> BoxFuture<'a, Result<ProfileDocument, ApiError>> {
        async move {
            self.call(Method::PUT, "/profile/skills", Some(&SkillsPayload { skills }))
                .await
        }
        .boxed()
    }

    fn reset_profile(&self) -> BoxFuture<'_, Result<ProfileDocument, ApiError>> {
        self.call::<ProfileDocument, ()>(Method::POST, "/profile/reset", None)
            .boxed()
    }

    fn update_github_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        async move {
            self.ack(Method::POST, "/config/github-token", Some(&TokenPayload { token }))
                .await
        }
        .boxed()
    }

    fn delete_github_token(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        self.ack::<()>(Method::DELETE, "/config/github-token", None)
            .boxed()
    }
}
