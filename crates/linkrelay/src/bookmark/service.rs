//! Bookmark service trait.

use async_trait::async_trait;

use super::error::BookmarkError;
use super::types::{BookmarkRequest, Destination};

/// A backend that can store a bookmark with a single HTTP call.
#[async_trait]
pub trait BookmarkService: Send + Sync {
    /// Which destination this service serves.
    fn destination(&self) -> Destination;

    /// Create the bookmark. `Ok` only for a status in the service's success set.
    async fn create_bookmark(&self, request: &BookmarkRequest) -> Result<(), BookmarkError>;
}

/// Map a response onto `Ok` when its status is in `accepted`.
pub(super) async fn check_response(
    response: reqwest::Response,
    accepted: &[u16],
) -> Result<(), BookmarkError> {
    let status = response.status().as_u16();
    if accepted.contains(&status) {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(BookmarkError::from_status(status, body))
}

/// Strip trailing slashes so path joins never produce `//`.
pub(super) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
