//! Range-aware streaming proxy for `GET /api/proxy?url=<absolute-url>`.
//!
//! 1. Reject a missing or non-http(s) `url` with 400 before any fetch
//! 2. GET the upstream with browser-like headers and the client's `Range`
//! 3. Relay a non-2xx upstream status with a JSON error, without a body
//! 4. Wait for the first body chunk, then commit status and headers
//! 5. Stream the rest as the client accepts it
//!
//! Failures before step 4 commits are answered with `{"error": ...}`. After
//! that the connection is aborted and the failure is only logged.
//!
//! A HEAD request is sent upstream as HEAD and answered with the relayed
//! head alone, without waiting on a body.

pub mod body;
pub mod upstream;

use std::future::poll_fn;
use std::time::Instant;

use axum::body::Body;
use axum::http::header::RANGE;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::cors;
use crate::dispatch::{handler, Handler, HandlerResult, Reply, RequestContext, ResponseWriter};
use crate::error::HandlerError;
use body::{ProxyBody, UpstreamStream};

/// Bare error body used by the proxy route (not the envelope).
pub fn error_response(err: &HandlerError) -> Response {
    (
        err.status(),
        axum::Json(serde_json::json!({ "error": err.message() })),
    )
        .into_response()
}

#[derive(Clone)]
pub struct StreamProxy {
    client: reqwest::Client,
    base_headers: HeaderMap,
    response_timeout: std::time::Duration,
    forward_range: bool,
}

impl StreamProxy {
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()?;
        let base_headers = upstream::browser_headers(&config.user_agent)?;

        if !config.forward_range {
            tracing::warn!("proxy.forward_range = false is deprecated; Range will not reach upstreams");
        }

        Ok(Self {
            client,
            base_headers,
            response_timeout: config.timeout(),
            forward_range: config.forward_range,
        })
    }

    /// Route handler wrapping [`StreamProxy::handle`].
    pub fn into_handler(self) -> Handler {
        handler(move |ctx| {
            let proxy = self.clone();
            async move { proxy.handle(ctx).await }
        })
    }

    /// Relay the upstream named by `?url=`. Always writes its own response.
    pub async fn handle(&self, ctx: RequestContext) -> HandlerResult {
        let writer = ctx.writer.clone();
        let head_only = ctx.method == Method::HEAD;
        let (response, complete) = match self.relay(ctx, writer.clone()).await {
            Ok(response) => (response, head_only),
            Err(err) => {
                tracing::error!(error = %err, status = err.status().as_u16(), "Proxy request failed");
                (error_response(&err), true)
            }
        };

        match writer.send(response) {
            Ok(()) if complete => writer.finish(),
            Ok(()) => {}
            Err(e) => tracing::error!(error = %e, "Proxy response dropped"),
        }
        Ok(Reply::Sent)
    }

    async fn relay(&self, ctx: RequestContext, writer: ResponseWriter) -> Result<Response, HandlerError> {
        let raw_url = ctx
            .query("url")
            .filter(|u| !u.is_empty())
            .ok_or_else(|| HandlerError::ClientInput("Missing url parameter".into()))?;
        let url = reqwest::Url::parse(raw_url)
            .map_err(|e| HandlerError::ClientInput(format!("Invalid url parameter: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HandlerError::ClientInput(format!(
                "Unsupported url scheme: {}",
                url.scheme()
            )));
        }

        let head_only = ctx.method == Method::HEAD;
        let client_range = ctx.headers.get(RANGE).cloned();
        let forwarded_range = client_range.as_ref().filter(|_| self.forward_range);

        let span = gateway_tracing::proxy_fetch_span!(&ctx.request_id, upstream::host_of(&url));
        let start = Instant::now();

        async {
            tracing::info!(method = %ctx.method, url = %url, range = ?client_range, "Proxying request");

            let method = if head_only { Method::HEAD } else { Method::GET };
            let request = self
                .client
                .request(method, url.clone())
                .headers(upstream::outbound_headers(&self.base_headers, forwarded_range));

            let upstream_resp = match tokio::time::timeout(self.response_timeout, request.send()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(HandlerError::Transport(format!(
                        "upstream did not respond within {}s",
                        self.response_timeout.as_secs()
                    )))
                }
            };

            let status = upstream_resp.status();
            tracing::Span::current().record("status", status.as_u16());
            if !status.is_success() {
                tracing::error!(status = status.as_u16(), "Upstream returned an error status");
                let reason = upstream::reason_phrase(upstream_resp.extensions());
                return Err(HandlerError::upstream(status, reason));
            }

            let (client_status, mut headers) =
                upstream::client_head(upstream_resp.headers(), client_range.is_some());
            cors::apply_stream_headers(&mut headers);

            if head_only {
                let mut response = client_status.into_response();
                response.headers_mut().extend(headers);
                return Ok(response);
            }

            let mut stream: UpstreamStream = Box::pin(upstream_resp.bytes_stream());
            let first = next_chunk(&mut stream).await.transpose()?;

            tracing::info!(
                upstream_status = status.as_u16(),
                status = client_status.as_u16(),
                content_type = ?headers.get(axum::http::header::CONTENT_TYPE),
                content_length = ?headers.get(axum::http::header::CONTENT_LENGTH),
                "Streaming upstream response"
            );

            let body = ProxyBody::new(first, stream, writer, tracing::Span::current(), start);
            let mut response = Response::builder()
                .status(client_status)
                .body(Body::from_stream(body))
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Failed to build response");
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
                });
            response.headers_mut().extend(headers);
            Ok(response)
        }
        .instrument(span)
        .await
    }
}

async fn next_chunk(stream: &mut UpstreamStream) -> Option<Result<Bytes, reqwest::Error>> {
    poll_fn(|cx| stream.as_mut().poll_next(cx)).await
}
