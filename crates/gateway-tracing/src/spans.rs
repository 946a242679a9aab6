//! Span builder helpers for gateway instrumentation.

/// Span covering one inbound request from dispatch to the last body byte.
///
/// `route` is the matched pattern, `status` the status line sent, and
/// `latency_ms` the time until the handler produced its response.
#[macro_export]
macro_rules! gateway_request_span {
    ($request_id:expr, $method:expr, $path:expr) => {
        tracing::info_span!(
            "gateway_request",
            request_id = %$request_id,
            method = %$method,
            path = %$path,
            route = tracing::field::Empty,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}

/// Span for one upstream fetch made by the streaming proxy.
///
/// `bytes_streamed` is recorded when the body finishes, fails, or the
/// client goes away.
#[macro_export]
macro_rules! proxy_fetch_span {
    ($request_id:expr, $host:expr) => {
        tracing::info_span!(
            "proxy_fetch",
            request_id = %$request_id,
            host = %$host,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            bytes_streamed = tracing::field::Empty,
        )
    };
}

/// Span for a call into the content backend.
#[macro_export]
macro_rules! catalog_fetch_span {
    ($request_id:expr, $endpoint:expr) => {
        tracing::info_span!(
            "catalog_fetch",
            request_id = %$request_id,
            endpoint = %$endpoint,
            status = tracing::field::Empty,
        )
    };
}
