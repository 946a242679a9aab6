//! Answer for paths no route claims.

use std::path::{Path, PathBuf};

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

const MISSING_PAGE_BODY: &str = "Error loading 404 page.";

/// Serves `<public_dir>/404.html` with 404, or a plain 500 if the page
/// cannot be read.
#[derive(Debug, Clone)]
pub struct NotFoundPage {
    page: PathBuf,
}

impl NotFoundPage {
    pub fn new(public_dir: impl AsRef<Path>) -> Self {
        Self {
            page: public_dir.as_ref().join("404.html"),
        }
    }

    pub async fn respond(&self) -> Response {
        match tokio::fs::read(&self.page).await {
            Ok(html) => (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(page = %self.page.display(), error = %e, "Failed to read 404 page");
                (StatusCode::INTERNAL_SERVER_ERROR, MISSING_PAGE_BODY).into_response()
            }
        }
    }
}
