//! Bookmark error types.

use thiserror::Error;

use super::Destination;

/// Errors that can occur when creating a bookmark.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// HTTP request failed (connect, timeout, TLS)
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Service rejected the credentials (401/403)
    #[error("authorization failed (status {status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// Service returned any other non-success status
    #[error("api error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// No service registered for the destination
    #[error("no service registered for {0}")]
    Unregistered(Destination),

    /// Session reached submission without the fields it needs
    #[error("incomplete capture: missing {0}")]
    IncompleteCapture(&'static str),
}

impl BookmarkError {
    /// Classify a non-success response.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => BookmarkError::Unauthorized { status, body },
            _ => BookmarkError::Api { status, body },
        }
    }
}
