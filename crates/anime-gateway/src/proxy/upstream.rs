//! Header translation between the client, the proxy, and the upstream.

use axum::http::header::{
    ACCEPT, ACCEPT_LANGUAGE, ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, PRAGMA, RANGE, USER_AGENT,
};
use axum::http::{Extensions, HeaderMap, HeaderValue, StatusCode};

/// Upstream response headers relayed to the client. Anything else the
/// upstream sends is dropped.
const RELAYED_HEADERS: [axum::http::HeaderName; 3] = [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_RANGE];

/// Fixed browser-like headers sent on every upstream fetch.
pub fn browser_headers(user_agent: &str) -> Result<HeaderMap, axum::http::header::InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    Ok(headers)
}

/// Outbound headers for one fetch: the fixed set plus the client's range.
pub fn outbound_headers(base: &HeaderMap, range: Option<&HeaderValue>) -> HeaderMap {
    let mut headers = base.clone();
    if let Some(range) = range {
        headers.insert(RANGE, range.clone());
    }
    headers
}

/// Status and headers for the client response.
///
/// A client `Range` makes the response 206 with `Accept-Ranges: bytes`, even
/// if the upstream sent no `Content-Range`. Missing upstream headers stay
/// missing.
pub fn client_head(upstream: &HeaderMap, client_range: bool) -> (StatusCode, HeaderMap) {
    let mut headers = HeaderMap::new();
    for name in RELAYED_HEADERS {
        if let Some(value) = upstream.get(&name) {
            headers.insert(name, value.clone());
        }
    }

    let status = if client_range {
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    (status, headers)
}

/// Reason phrase from the upstream's status line. hyper only keeps it when it
/// differs from the canonical phrase for the status.
pub fn reason_phrase(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
}

/// Host part of the target, for span labels.
pub fn host_of(url: &reqwest::Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => "unknown".to_string(),
    }
}
