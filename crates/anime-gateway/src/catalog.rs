//! Seam to the domain controllers that produce anime metadata.
//!
//! The gateway does not compute any of these results. A [`ContentSource`]
//! answers each [`Endpoint`] with a JSON value or a [`HandlerError`]; the
//! dispatcher wraps whichever comes back.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tracing::Instrument;

use crate::dispatch::{BoxFuture, RequestContext};
use crate::error::HandlerError;

/// Domain endpoints served behind the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Home,
    Category(String),
    TopTen,
    Info,
    Episodes,
    Servers,
    Stream { fallback: bool },
    Search,
    Filter,
    SearchSuggest,
    Schedule,
    NextEpisodeSchedule,
    Random,
    RandomId,
    Qtip,
    Producer,
    CharacterList,
    Watchlist,
    Actors,
    Character,
    TopSearch,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Home => f.write_str("home"),
            Endpoint::Category(name) => write!(f, "category:{name}"),
            Endpoint::TopTen => f.write_str("top-ten"),
            Endpoint::Info => f.write_str("info"),
            Endpoint::Episodes => f.write_str("episodes"),
            Endpoint::Servers => f.write_str("servers"),
            Endpoint::Stream { fallback: false } => f.write_str("stream"),
            Endpoint::Stream { fallback: true } => f.write_str("stream-fallback"),
            Endpoint::Search => f.write_str("search"),
            Endpoint::Filter => f.write_str("filter"),
            Endpoint::SearchSuggest => f.write_str("search-suggest"),
            Endpoint::Schedule => f.write_str("schedule"),
            Endpoint::NextEpisodeSchedule => f.write_str("next-episode-schedule"),
            Endpoint::Random => f.write_str("random"),
            Endpoint::RandomId => f.write_str("random-id"),
            Endpoint::Qtip => f.write_str("qtip"),
            Endpoint::Producer => f.write_str("producer"),
            Endpoint::CharacterList => f.write_str("character-list"),
            Endpoint::Watchlist => f.write_str("watchlist"),
            Endpoint::Actors => f.write_str("actors"),
            Endpoint::Character => f.write_str("character"),
            Endpoint::TopSearch => f.write_str("top-search"),
        }
    }
}

impl Endpoint {
    /// Path parameter naming the item this endpoint looks up, if any.
    pub fn key_param(&self) -> Option<&'static str> {
        match self {
            Endpoint::Episodes
            | Endpoint::Servers
            | Endpoint::NextEpisodeSchedule
            | Endpoint::Qtip
            | Endpoint::Producer
            | Endpoint::CharacterList
            | Endpoint::Actors
            | Endpoint::Character => Some("id"),
            Endpoint::Watchlist => Some("userId"),
            _ => None,
        }
    }
}

/// Produces the result for a domain endpoint.
pub trait ContentSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<serde_json::Value, HandlerError>>;
}

pub type SharedSource = Arc<dyn ContentSource>;

/// Forwards domain requests to a separate content backend over HTTP.
///
/// The request path and query are replayed against `backend_url`. A body
/// shaped like the envelope is unwrapped so results are not double-wrapped.
#[derive(Clone)]
pub struct BackendSource {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl BackendSource {
    pub fn new(base_url: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    async fn forward(
        &self,
        endpoint: &Endpoint,
        ctx: &RequestContext,
    ) -> Result<serde_json::Value, HandlerError> {
        let Some(base) = &self.base_url else {
            return Err(HandlerError::Handler {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: Some("Content backend is not configured".into()),
            });
        };

        let query = ctx
            .raw_query
            .as_deref()
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        let url = format!("{base}{}{query}", ctx.path);

        let span = gateway_tracing::catalog_fetch_span!(&ctx.request_id, endpoint);
        let key = endpoint.key_param().and_then(|name| ctx.param(name));
        async {
            tracing::debug!(key = ?key, url = %url, "Forwarding to content backend");
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| backend_failure(endpoint, &e))?;

            let status = resp.status();
            tracing::Span::current().record("status", status.as_u16());

            let body: Option<serde_json::Value> = resp.json().await.ok();
            unwrap_backend_body(status, body)
        }
        .instrument(span)
        .await
    }
}

impl ContentSource for BackendSource {
    fn fetch<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<serde_json::Value, HandlerError>> {
        Box::pin(self.forward(endpoint, ctx))
    }
}

fn backend_failure(endpoint: &Endpoint, e: &reqwest::Error) -> HandlerError {
    tracing::error!(endpoint = %endpoint, error = %e, "Content backend unreachable");
    let status = if e.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    HandlerError::Handler {
        status,
        message: Some(e.to_string()),
    }
}

/// Interpret what the backend sent back.
fn unwrap_backend_body(
    status: StatusCode,
    body: Option<serde_json::Value>,
) -> Result<serde_json::Value, HandlerError> {
    let message = |body: &Option<serde_json::Value>| {
        body.as_ref()
            .and_then(|b| b.get("message").or_else(|| b.get("error")))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    };

    if !status.is_success() {
        return Err(HandlerError::Handler {
            status,
            message: message(&body),
        });
    }

    let Some(body) = body else {
        return Err(HandlerError::Handler {
            status: StatusCode::BAD_GATEWAY,
            message: Some("Content backend returned a non-JSON body".into()),
        });
    };

    match body.get("success").and_then(|s| s.as_bool()) {
        Some(true) => Ok(body.get("results").cloned().unwrap_or(serde_json::Value::Null)),
        Some(false) => Err(HandlerError::Handler {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message(&Some(body)),
        }),
        None => Ok(body),
    }
}
