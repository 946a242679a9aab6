//! Failure taxonomy shared by route handlers and the streaming proxy.

use axum::http::StatusCode;

/// Message used when a failure carries none of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "Internal server error";

/// Why a handler could not produce a result.
///
/// Each variant decides its own HTTP status and the message shown to the
/// client. How the message is wrapped (envelope or bare `{error}`) is up to
/// the writer.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A required parameter was missing or malformed.
    #[error("{0}")]
    ClientInput(String),

    /// The upstream answered with a non-success status.
    #[error("Failed to fetch content: {} {reason}", .status.as_u16())]
    Upstream { status: StatusCode, reason: String },

    /// Network failure talking to the upstream (connect, timeout, read).
    #[error("Proxy error: {0}")]
    Transport(String),

    /// Any other collaborator failure.
    #[error("{}", .message.as_deref().unwrap_or(DEFAULT_ERROR_MESSAGE))]
    Handler {
        status: StatusCode,
        message: Option<String>,
    },
}

impl HandlerError {
    /// Build an upstream failure from the status line the upstream sent.
    /// Without a reason phrase of its own, the canonical one is quoted.
    pub fn upstream(status: StatusCode, reason: Option<String>) -> Self {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown".to_string());
        HandlerError::Upstream { status, reason }
    }

    /// HTTP status the client sees for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::ClientInput(_) => StatusCode::BAD_REQUEST,
            HandlerError::Upstream { status, .. } => *status,
            HandlerError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HandlerError::Handler { status, .. } => *status,
        }
    }

    /// Visible message, never empty.
    pub fn message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

impl From<reqwest::Error> for HandlerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HandlerError::Transport(format!("upstream timed out: {e}"))
        } else {
            HandlerError::Transport(e.to_string())
        }
    }
}
