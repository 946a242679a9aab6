//! Body stream relaying upstream bytes to the client in arrival order.
//!
//! Bytes are pulled from upstream only when hyper polls for the next frame,
//! so a slow client stalls the upstream read instead of growing a buffer.
//! Dropping the body (client gone) drops the upstream response and closes
//! its connection.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use futures_core::Stream;

use crate::dispatch::ResponseWriter;

pub type UpstreamStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Streaming,
    Complete,
    Failed,
}

pub struct ProxyBody {
    /// Chunk already read while deciding whether the fetch succeeded.
    first: Option<Bytes>,
    inner: UpstreamStream,
    writer: ResponseWriter,
    span: tracing::Span,
    start: Instant,
    bytes_streamed: u64,
    progress: Progress,
}

impl ProxyBody {
    pub fn new(
        first: Option<Bytes>,
        inner: UpstreamStream,
        writer: ResponseWriter,
        span: tracing::Span,
        start: Instant,
    ) -> Self {
        Self {
            first,
            inner,
            writer,
            span,
            start,
            bytes_streamed: 0,
            progress: Progress::Streaming,
        }
    }

    fn record_end(&self) {
        self.span.record("bytes_streamed", self.bytes_streamed);
        self.span
            .record("latency_ms", self.start.elapsed().as_millis() as u64);
    }
}

impl Stream for ProxyBody {
    type Item = Result<Bytes, reqwest::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.progress != Progress::Streaming {
            return Poll::Ready(None);
        }

        if let Some(chunk) = self.first.take() {
            self.bytes_streamed += chunk.len() as u64;
            return Poll::Ready(Some(Ok(chunk)));
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.bytes_streamed += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                // Headers are out; the only signal left is an aborted connection.
                self.progress = Progress::Failed;
                self.record_end();
                self.span.in_scope(|| {
                    tracing::error!(
                        error = %e,
                        bytes_streamed = self.bytes_streamed,
                        "Upstream stream failed mid-transfer, closing connection"
                    );
                });
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.progress = Progress::Complete;
                self.writer.finish();
                self.record_end();
                self.span.in_scope(|| {
                    tracing::info!(bytes_streamed = self.bytes_streamed, "Proxy stream complete");
                });
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ProxyBody {
    fn drop(&mut self) {
        if self.progress == Progress::Streaming {
            self.record_end();
            self.span.in_scope(|| {
                tracing::warn!(
                    bytes_streamed = self.bytes_streamed,
                    "Client went away before the stream finished, aborting upstream fetch"
                );
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::writer::ResponseState;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    struct Chunks(std::vec::IntoIter<Bytes>);

    impl Stream for Chunks {
        type Item = Result<Bytes, reqwest::Error>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Poll::Ready(self.0.next().map(Ok))
        }
    }

    fn chunks(parts: &[&'static [u8]]) -> UpstreamStream {
        let items: Vec<Bytes> = parts.iter().map(|p| Bytes::from_static(p)).collect();
        Box::pin(Chunks(items.into_iter()))
    }

    #[tokio::test]
    async fn test_first_chunk_then_rest_in_order() {
        let writer = ResponseWriter::new();
        writer.send(StatusCode::OK.into_response()).unwrap();

        let body = ProxyBody::new(
            Some(Bytes::from_static(b"ab")),
            chunks(&[b"cd", b"ef"]),
            writer.clone(),
            tracing::Span::none(),
            Instant::now(),
        );

        let collected = axum::body::to_bytes(axum::body::Body::from_stream(body), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&collected[..], b"abcdef");
        assert_eq!(writer.state(), ResponseState::BodyComplete);
    }

    #[tokio::test]
    async fn test_dropped_early_leaves_body_incomplete() {
        let writer = ResponseWriter::new();
        writer.send(StatusCode::OK.into_response()).unwrap();

        let body = ProxyBody::new(
            None,
            chunks(&[b"xy"]),
            writer.clone(),
            tracing::Span::none(),
            Instant::now(),
        );
        drop(body);
        assert_eq!(writer.state(), ResponseState::HeadersSent);
    }
}
