//! Shared error types including RFC7807 Problem Details.

use serde::{Deserialize, Serialize};

/// RFC7807 Problem Details (application/problem+json)
///
/// The backend answers most failed `/api/*` calls with this envelope. The
/// client only reads it to produce a readable message; the error variant is
/// always decided by the status code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type", default)]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    #[serde(default)]
    pub title: String,
    /// HTTP status code.
    #[serde(default)]
    pub status: u16,
    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Attempt to parse an RFC7807 (or RFC7807-ish) JSON body into a user-facing message.
/// Prefers `detail`, falls back to `title`. FastAPI style `{"detail": "..."}`
/// bodies are accepted too.
pub fn try_problem_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ProblemDetails>(body).ok()?;
    if let Some(detail) = parsed.detail {
        if !detail.trim().is_empty() {
            return Some(detail);
        }
    }
    if !parsed.title.trim().is_empty() {
        return Some(parsed.title);
    }
    None
}

/// Error surfaced by every API call, cache read and auth operation.
///
/// The transport classifies failures once; everything above it passes the
/// value through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure, no response was received.
    #[error("Network error: {0}")]
    Network(String),
    /// 404 from the backend.
    #[error("Not found: {path}")]
    NotFound { path: String },
    /// Any other 4xx.
    #[error("HTTP {status}: {body}")]
    Client { status: u16, body: String },
    /// 5xx.
    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },
    /// 401. Credentials were cleared before this was returned.
    #[error("Session expired")]
    AuthExpired,
    /// 403 on a state-changing request.
    #[error("CSRF token rejected: {0}")]
    CsrfInvalid(String),
    /// The response did not match the expected type.
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    /// The request could not be built (bad params, bad body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    ///
    /// `state_changing` is true for POST/PUT/PATCH/DELETE; only those turn a
    /// 403 into [`ApiError::CsrfInvalid`].
    pub fn from_status(status: u16, path: &str, body: String, state_changing: bool) -> Self {
        match status {
            401 => ApiError::AuthExpired,
            403 if state_changing => ApiError::CsrfInvalid(body),
            404 => ApiError::NotFound {
                path: path.to_string(),
            },
            400..=499 => ApiError::Client { status, body },
            _ => ApiError::Server { status, body },
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => Some(*status),
            ApiError::AuthExpired => Some(401),
            ApiError::CsrfInvalid(_) => Some(403),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Message suitable for an inline error next to a retry action.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Client { body, .. } | ApiError::Server { body, .. } => {
                try_problem_detail(body).unwrap_or_else(|| self.to_string())
            }
            ApiError::CsrfInvalid(body) => try_problem_detail(body)
                .unwrap_or_else(|| "Your session needs to be refreshed. Please retry.".to_string()),
            ApiError::AuthExpired => "Your session has expired. Please sign in again.".to_string(),
            ApiError::NotFound { .. } => "The requested item no longer exists.".to_string(),
            ApiError::Network(_) => "Could not reach the server. Check your connection.".to_string(),
            _ => self.to_string(),
        }
    }
}
