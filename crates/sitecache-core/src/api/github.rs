//! GitHub repository listing for the projects page.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use reqwest::{header, Client, StatusCode};
use tracing::debug;

use crate::models::{GithubRepo, Project};

use super::ApiError;

const GITHUB_API_URL: &str = "https://api.github.com";

/// Repositories per listing request.
const REPOS_PER_PAGE: u32 = 50;

const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = "sitecache";

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    base_url: String,
}

impl GithubClient {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(GITHUB_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch a user's most recently updated repositories as project cards.
    pub async fn fetch_projects(&self, username: &str, token: Option<&str>) -> Result<Vec<Project>, ApiError> {
        let url = format!(
            "{}/users/{}/repos?sort=updated&per_page={}",
            self.base_url, username, REPOS_PER_PAGE
        );

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github.v3+json");
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            request = request.header(header::AUTHORIZATION, format!("token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let remaining = header_str(&response, "x-ratelimit-remaining");
            let reset = header_str(&response, "x-ratelimit-reset");
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_error(status, username, remaining.as_deref(), reset.as_deref(), &body));
        }

        let repos: Vec<GithubRepo> = response
            .json()
            .await
            .map_err(|e| ApiError::Malformed(format!("Failed to parse GitHub repositories: {}", e)))?;
        debug!(username, count = repos.len(), "GitHub repositories fetched");

        Ok(repos.iter().enumerate().map(|(i, r)| r.to_project(i)).collect())
    }

    fn map_error(
        status: StatusCode,
        username: &str,
        remaining: Option<&str>,
        reset: Option<&str>,
        body: &str,
    ) -> ApiError {
        match status {
            StatusCode::FORBIDDEN if remaining == Some("0") => {
                let reset_at = reset
                    .and_then(|r| r.parse::<i64>().ok())
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "a while".to_string());
                ApiError::Forbidden(format!(
                    "GitHub API rate limit reached; retry after {} or configure an access token",
                    reset_at
                ))
            }
            StatusCode::FORBIDDEN => {
                ApiError::Forbidden("GitHub API refused the request; try configuring an access token".to_string())
            }
            StatusCode::NOT_FOUND => ApiError::NotFound(format!("GitHub user \"{}\"", username)),
            _ => ApiError::from_status(status, body),
        }
    }
}

fn header_str(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message_includes_reset() {
        let err = GithubClient::map_error(StatusCode::FORBIDDEN, "octo", Some("0"), Some("1700000000"), "");
        let msg = err.to_string();
        assert!(msg.contains("rate limit"), "{}", msg);
        assert!(msg.contains("2023-11-14 22:13 UTC"), "{}", msg);
    }

    #[test]
    fn test_plain_forbidden_and_not_found() {
        let err = GithubClient::map_error(StatusCode::FORBIDDEN, "octo", Some("12"), None, "");
        assert!(matches!(err, ApiError::Forbidden(ref m) if m.contains("access token")));

        let err = GithubClient::map_error(StatusCode::NOT_FOUND, "nobody", None, None, "");
        assert!(matches!(err, ApiError::NotFound(ref m) if m.contains("nobody")));
    }

    #[test]
    fn test_other_status_falls_back() {
        let err = GithubClient::map_error(StatusCode::INTERNAL_SERVER_ERROR, "octo", None, None, "boom");
        assert!(matches!(err, ApiError::Server { status: 500, ref message } if message == "boom"));
    }
}
