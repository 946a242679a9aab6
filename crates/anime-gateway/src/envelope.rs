//! The uniform JSON wrapper for non-streaming routes.
//!
//! Success: `{"success": true, "results": <value>}` with 200.
//! Failure: `{"success": false, "message": <string>}` with the failure's status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::HandlerError;

/// Wire shape of an enveloped response. Exactly one of `results` and
/// `message` is present, chosen by `success`.
#[derive(Debug, Serialize)]
pub struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Envelope {
    pub fn success(results: serde_json::Value) -> Self {
        Self {
            success: true,
            results: Some(results),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            message: Some(message.into()),
        }
    }
}

/// 200 with the success envelope.
pub fn success_response(results: serde_json::Value) -> Response {
    (StatusCode::OK, axum::Json(Envelope::success(results))).into_response()
}

/// Failure envelope written with `status`.
pub fn error_response(message: impl Into<String>, status: StatusCode) -> Response {
    (status, axum::Json(Envelope::failure(message))).into_response()
}

/// Normalize a handler failure into its failure envelope.
pub fn from_error(err: &HandlerError) -> Response {
    error_response(err.message(), err.status())
}
