//! Per-request response slot enforcing "at most one response".
//!
//! The dispatcher and the handler share one [`ResponseWriter`]. Whoever
//! calls [`ResponseWriter::send`] first owns the response; every later
//! attempt is refused and the rejected response is dropped.

use std::sync::{Arc, Mutex};

use axum::response::Response;

/// Lifecycle of the single response a request may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    NotStarted,
    HeadersSent,
    BodyComplete,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("response already started ({0:?})")]
pub struct ResponseAlreadyStarted(pub ResponseState);

struct Slot {
    state: ResponseState,
    pending: Option<Response>,
}

/// Cloneable handle to the request's response slot.
#[derive(Clone)]
pub struct ResponseWriter {
    inner: Arc<Mutex<Slot>>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Slot {
                state: ResponseState::NotStarted,
                pending: None,
            })),
        }
    }

    pub fn state(&self) -> ResponseState {
        self.lock().state
    }

    /// Whether a status line has been committed for this request.
    pub fn is_started(&self) -> bool {
        self.state() != ResponseState::NotStarted
    }

    /// Commit `response` as the one response for this request.
    pub fn send(&self, response: Response) -> Result<(), ResponseAlreadyStarted> {
        let mut slot = self.lock();
        if slot.state != ResponseState::NotStarted {
            return Err(ResponseAlreadyStarted(slot.state));
        }
        slot.state = ResponseState::HeadersSent;
        slot.pending = Some(response);
        Ok(())
    }

    /// Mark the committed body as fully produced.
    pub fn finish(&self) {
        let mut slot = self.lock();
        if slot.state == ResponseState::HeadersSent {
            slot.state = ResponseState::BodyComplete;
        }
    }

    /// Hand the committed response to the transport. Returns `None` if
    /// nothing was sent or it was already taken.
    pub(crate) fn take(&self) -> Option<Response> {
        self.lock().pending.take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        // A poisoned slot still holds a consistent state; keep using it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
