use serde::Deserialize;
use thiserror::Error;

/// Failures talking to the site API or to GitHub.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Could not reach the server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not signed in, or the admin token has expired")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests, try again later")]
    RateLimited,

    /// The server answered `{ success: false }` or refused the payload.
    #[error("Server rejected the request: {0}")]
    Rejected(String),

    #[error("Server failed ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("Unreadable response: {0}")]
    Malformed(String),
}

/// Longest error body carried into a message.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error bodies from the site API use the usual envelope.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// The envelope's `message` when there is one, else the (truncated) body.
    fn body_message(body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| Self::truncate_body(body.trim()))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::body_message(body);
        match status.as_u16() {
            400 | 422 => ApiError::Rejected(message),
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            code @ 500..=599 => ApiError::Server { status: code, message },
            code => ApiError::Unexpected { status: code, message },
        }
    }
}
