//! Permissive cross-origin policy so browser media players can read any
//! response, including proxied streams.

use std::time::Duration;

use axum::http::header::{
    ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, ORIGIN, RANGE,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

const MAX_AGE_SECS: u64 = 86_400;
const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

fn allowed_methods() -> [Method; 3] {
    [Method::GET, Method::HEAD, Method::OPTIONS]
}

fn allowed_headers() -> [HeaderName; 5] {
    [CONTENT_TYPE, RANGE, ACCEPT, ORIGIN, X_REQUESTED_WITH]
}

fn exposed_headers() -> [HeaderName; 3] {
    [CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE]
}

/// Layer applied to the whole router: `*` origin on every response and
/// preflight answers.
pub fn layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(allowed_methods())
        .allow_headers(allowed_headers())
        .expose_headers(exposed_headers())
        .max_age(Duration::from_secs(MAX_AGE_SECS))
}

/// Headers the streaming proxy declares on its own responses.
pub fn apply_stream_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Range, Accept, Origin, X-Requested-With"),
    );
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Length, Content-Range, Content-Type"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(MAX_AGE_SECS));
}
