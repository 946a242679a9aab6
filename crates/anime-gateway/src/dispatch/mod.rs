//! Route table and request dispatch.
//!
//! The table is built once at startup and read-only afterwards. Every
//! matched request gets its own [`RequestContext`] and [`ResponseWriter`];
//! the handler's outcome is wrapped in the envelope unless the handler
//! already wrote its own response.

pub mod pattern;
pub mod writer;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, Request};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

use crate::envelope;
use crate::error::{HandlerError, DEFAULT_ERROR_MESSAGE};
use crate::fallback::NotFoundPage;
use pattern::{PathParams, PatternError, RoutePattern};
pub use writer::ResponseWriter;

/// Header carrying the per-request id on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produced.
#[derive(Debug)]
pub enum Reply {
    /// A value for the dispatcher to wrap in the success envelope.
    Data(serde_json::Value),
    /// The handler committed its own response through the writer.
    Sent,
}

pub type HandlerResult = Result<Reply, HandlerError>;

/// A route handler: takes ownership of the request context.
pub type Handler = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap an async function as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Everything a handler may look at for one request.
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub raw_query: Option<String>,
    pub params: PathParams,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub writer: ResponseWriter,
}

impl RequestContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

fn parse_query(uri: &Uri) -> HashMap<String, String> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(q)| q)
        .unwrap_or_default()
}

/// A pattern paired with the handler responsible for it.
pub struct Route {
    pattern: RoutePattern,
    handler: Handler,
}

/// Immutable, ordered list of routes. First match wins.
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder { routes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first route whose pattern matches `path`.
    pub fn find(&self, path: &str) -> Option<(&Route, PathParams)> {
        self.routes
            .iter()
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }
}

pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    pub fn route(mut self, pattern: &str, handler: Handler) -> Result<Self, PatternError> {
        self.routes.push(Route {
            pattern: RoutePattern::parse(pattern)?,
            handler,
        });
        Ok(self)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
        }
    }
}

/// Matches requests against the route table and settles each one into
/// exactly one response.
pub struct Dispatcher {
    routes: RouteTable,
    not_found: NotFoundPage,
}

impl Dispatcher {
    pub fn new(routes: RouteTable, not_found: NotFoundPage) -> Self {
        Self { routes, not_found }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let (parts, _body) = request.into_parts();
        let path = parts.uri.path().to_string();
        let span = gateway_tracing::gateway_request_span!(&request_id, &parts.method, &path);
        let start = Instant::now();

        async move {
            let matched = if matches!(parts.method, Method::GET | Method::HEAD) {
                self.routes.find(&path)
            } else {
                None
            };

            let mut response = match matched {
                Some((route, params)) => {
                    tracing::Span::current().record("route", route.pattern.as_str());
                    let writer = ResponseWriter::new();
                    let ctx = RequestContext {
                        request_id: request_id.clone(),
                        method: parts.method.clone(),
                        path: path.clone(),
                        raw_query: parts.uri.query().map(str::to_string),
                        params,
                        query: parse_query(&parts.uri),
                        headers: parts.headers,
                        writer: writer.clone(),
                    };
                    let outcome = (route.handler)(ctx).await;
                    settle(outcome, &writer, route.pattern.as_str())
                }
                None => {
                    tracing::warn!(method = %parts.method, path = %path, "No route matched");
                    self.not_found.respond().await
                }
            };

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            let span = tracing::Span::current();
            span.record("status", response.status().as_u16());
            span.record("latency_ms", start.elapsed().as_millis() as u64);
            response
        }
        .instrument(span)
        .await
    }
}

/// Turn a handler outcome into the single response for the request.
fn settle(outcome: HandlerResult, writer: &ResponseWriter, route: &str) -> Response {
    match outcome {
        Ok(Reply::Data(value)) => match writer.send(envelope::success_response(value)) {
            Ok(()) => writer.finish(),
            Err(e) => {
                tracing::warn!(route = %route, error = %e, "Handler returned a result after responding; result dropped");
            }
        },
        Ok(Reply::Sent) => {}
        Err(err) => {
            if writer.is_started() {
                // The client already has a status line and maybe bytes.
                tracing::error!(route = %route, error = %err, "Handler failed after response started");
            } else {
                tracing::error!(route = %route, error = %err, status = err.status().as_u16(), "Handler failed");
                if writer.send(envelope::from_error(&err)).is_ok() {
                    writer.finish();
                }
            }
        }
    }

    writer.take().unwrap_or_else(|| {
        tracing::error!(route = %route, "Handler claimed a response but wrote none");
        envelope::error_response(DEFAULT_ERROR_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::IntoResponse;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher(routes: RouteTable) -> Dispatcher {
        Dispatcher::new(routes, NotFoundPage::new("/nonexistent/anime-gateway/public"))
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_result_is_enveloped() {
        let routes = RouteTable::builder()
            .route(
                "/api/schedule/:id",
                handler(|ctx: RequestContext| async move {
                    assert_eq!(ctx.param("id"), Some("42"));
                    Ok(Reply::Data(json!({"date": "2024-01-01"})))
                }),
            )
            .unwrap()
            .build();

        let response = dispatcher(routes).dispatch(get("/api/schedule/42")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "results": {"date": "2024-01-01"}})
        );
    }

    #[tokio::test]
    async fn test_handler_error_is_enveloped_with_status() {
        let routes = RouteTable::builder()
            .route(
                "/api/info",
                handler(|_ctx| async {
                    Err(HandlerError::Handler {
                        status: StatusCode::NOT_FOUND,
                        message: Some("Anime not found".into()),
                    })
                }),
            )
            .unwrap()
            .route(
                "/api/random",
                handler(|_ctx| async {
                    Err(HandlerError::Handler {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        message: None,
                    })
                }),
            )
            .unwrap()
            .build();
        let dispatcher = dispatcher(routes);

        let response = dispatcher.dispatch(get("/api/info?id=abc")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "message": "Anime not found"})
        );

        let response = dispatcher.dispatch(get("/api/random")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "message": "Internal server error"})
        );
    }

    #[tokio::test]
    async fn test_query_and_params_reach_handler() {
        let routes = RouteTable::builder()
            .route(
                "/api/watchlist/:userId/:page?",
                handler(|ctx: RequestContext| async move {
                    Ok(Reply::Data(json!({
                        "user": ctx.param("userId"),
                        "page": ctx.param("page"),
                        "sort": ctx.query("sort"),
                    })))
                }),
            )
            .unwrap()
            .build();

        let response = dispatcher(routes)
            .dispatch(get("/api/watchlist/u7?sort=recent"))
            .await;
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "results": {"user": "u7", "page": null, "sort": "recent"}})
        );
    }

    #[tokio::test]
    async fn test_handler_that_responds_then_fails_sends_once() {
        let routes = RouteTable::builder()
            .route(
                "/api/stream",
                handler(|ctx: RequestContext| async move {
                    ctx.writer
                        .send((StatusCode::PARTIAL_CONTENT, "partial").into_response())
                        .unwrap();
                    Err(HandlerError::Transport("connection reset".into()))
                }),
            )
            .unwrap()
            .build();

        let response = dispatcher(routes).dispatch(get("/api/stream")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"partial");
    }

    #[tokio::test]
    async fn test_handler_that_responds_then_returns_data_sends_once() {
        let routes = RouteTable::builder()
            .route(
                "/api/top-ten",
                handler(|ctx: RequestContext| async move {
                    ctx.writer
                        .send((StatusCode::ACCEPTED, "first").into_response())
                        .unwrap();
                    Ok(Reply::Data(json!("second")))
                }),
            )
            .unwrap()
            .build();

        let response = dispatcher(routes).dispatch(get("/api/top-ten")).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_sent_without_response_is_500() {
        let routes = RouteTable::builder()
            .route("/api/qtip/:id", handler(|_ctx| async { Ok(Reply::Sent) }))
            .unwrap()
            .build();

        let response = dispatcher(routes).dispatch(get("/api/qtip/1")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "message": "Internal server error"})
        );
    }

    #[tokio::test]
    async fn test_unmatched_path_never_reaches_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let routes = RouteTable::builder()
            .route(
                "/api/search",
                handler(move |_ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(Reply::Data(json!("searched"))) }
                }),
            )
            .unwrap()
            .build();
        let dispatcher = dispatcher(routes);

        // No 404 page on disk: the fallback answers 500.
        let response = dispatcher.dispatch(get("/api/nope")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let post = Request::builder()
            .method(Method::POST)
            .uri("/api/search")
            .body(Body::empty())
            .unwrap();
        let response = dispatcher.dispatch(post).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_registered_route_wins() {
        let routes = RouteTable::builder()
            .route("/api/random/id", handler(|_ctx| async { Ok(Reply::Data(json!("id"))) }))
            .unwrap()
            .route("/api/random/:kind", handler(|_ctx| async { Ok(Reply::Data(json!("kind"))) }))
            .unwrap()
            .build();

        let response = dispatcher(routes).dispatch(get("/api/random/id")).await;
        assert_eq!(body_json(response).await, json!({"success": true, "results": "id"}));
    }

    #[test]
    fn test_builder_rejects_bad_pattern() {
        let result = RouteTable::builder().route("no-slash", handler(|_ctx| async { Ok(Reply::Sent) }));
        assert!(result.is_err());
    }
}
