//! Submission of completed captures and outcome classification.

use tracing::{error, info};

use super::error::BookmarkError;
use super::registry::ServiceRegistry;
use super::types::{BookmarkRequest, Destination};

/// What happened to a submission, as far as the user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved(Destination),
    AuthFailed(Destination),
    Failed(Destination),
    Unexpected,
}

impl SubmitOutcome {
    /// Classify a service result, logging failures with their response body.
    pub fn classify(destination: Destination, result: Result<(), BookmarkError>) -> Self {
        match result {
            Ok(()) => {
                info!(%destination, "Bookmark saved");
                SubmitOutcome::Saved(destination)
            }
            Err(BookmarkError::Unauthorized { status, body }) => {
                error!(%destination, status, body = %body, "Bookmark service rejected credentials");
                SubmitOutcome::AuthFailed(destination)
            }
            Err(BookmarkError::Api { status, body }) => {
                error!(%destination, status, body = %body, "Bookmark service error");
                SubmitOutcome::Failed(destination)
            }
            Err(e) => Self::unexpected(&e),
        }
    }

    /// Any failure that never produced an HTTP status.
    pub fn unexpected(error: &BookmarkError) -> Self {
        error!(error = %error, "Unexpected error while saving bookmark");
        SubmitOutcome::Unexpected
    }

    /// Text shown to the user.
    pub fn message(&self) -> String {
        match self {
            SubmitOutcome::Saved(d) => format!("✅ Bookmark successfully saved to {d}! 📌"),
            SubmitOutcome::AuthFailed(_) => {
                "⛔ Authorization failed. Please check your API token.".to_string()
            }
            SubmitOutcome::Failed(d) => format!(
                "❌ Failed to save bookmark to {d}.\nPlease check your logs for troubleshooting."
            ),
            SubmitOutcome::Unexpected => {
                "An unexpected error occurred. Please try again.".to_string()
            }
        }
    }
}

/// Sends completed captures to the matching service.
#[derive(Clone)]
pub struct Submitter {
    services: ServiceRegistry,
}

impl Submitter {
    pub fn new(services: ServiceRegistry) -> Self {
        Self { services }
    }

    /// Perform exactly one create call. Never fails; every error becomes an outcome.
    pub async fn submit(&self, request: &BookmarkRequest) -> SubmitOutcome {
        let Some(service) = self.services.get(request.destination) else {
            return SubmitOutcome::unexpected(&BookmarkError::Unregistered(request.destination));
        };
        let result = service.create_bookmark(request).await;
        SubmitOutcome::classify(request.destination, result)
    }
}
