use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::StoreError;
use crate::config::ConfigError;

/// Failure before any response arrived.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid request: {0}")]
    Request(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::Request(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("Request failed with status {status}: {}", truncate_body(body))]
    Status { status: StatusCode, body: String },

    #[error("Session expired - please log in again ({0})")]
    SessionExpired(Box<ApiError>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stored access token is not a valid header value")]
    InvalidToken,

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
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

/// Fallback shown when the server gave nothing usable
const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

impl ApiError {
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        ApiError::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// HTTP status of the failed response, if one arrived.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::SessionExpired(inner) => inner.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }

    /// Server payload parsed as JSON, when the body is JSON.
    pub fn body_json(&self) -> Option<Value> {
        match self {
            ApiError::Status { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// Message suitable for an inline error banner.
    ///
    /// Looks for Django REST style payloads: `detail`, `message`, `error`,
    /// `non_field_errors`, then the first field-level error.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { .. } => self
                .body_json()
                .and_then(|v| server_message(&v))
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            ApiError::SessionExpired(_) => {
                "Your session has expired. Please log in again.".to_string()
            }
            ApiError::Network(_) => {
                "Could not reach the server. Check your connection.".to_string()
            }
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

fn server_message(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    for key in ["detail", "message", "error", "non_field_errors"] {
        if let Some(msg) = obj.get(key).and_then(first_text) {
            return Some(msg);
        }
    }
    obj.iter()
        .find_map(|(field, v)| first_text(v).map(|msg| format!("{}: {}", field, msg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with(&format!("(truncated, {} total bytes)", long.len())));
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn test_user_message_prefers_detail() {
        let err = ApiError::from_status(
            StatusCode::FORBIDDEN,
            br#"{"detail": "You do not have permission to perform this action."}"#,
        );
        assert_eq!(err.user_message(), "You do not have permission to perform this action.");
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_user_message_field_errors() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            br#"{"email": ["user with this email already exists."]}"#,
        );
        assert_eq!(err.user_message(), "email: user with this email already exists.");

        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            br#"{"non_field_errors": ["Invalid credentials"]}"#,
        );
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[test]
    fn test_user_message_fallback() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, b"<html>Bad Gateway</html>");
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        assert!(err.body_json().is_none());
    }

    #[test]
    fn test_session_expired_keeps_inner_status() {
        let inner = ApiError::from_status(StatusCode::UNAUTHORIZED, b"{}");
        let err = ApiError::SessionExpired(Box::new(inner));
        assert!(err.is_session_expired());
        assert!(err.is_unauthorized());
    }
}
