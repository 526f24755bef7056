//! Bookmark creation against the downstream services.

mod error;
mod linkding;
mod readeck;
mod registry;
mod service;
mod submit;
mod types;

pub use error::BookmarkError;
pub use linkding::LinkdingService;
pub use readeck::ReadeckService;
pub use registry::ServiceRegistry;
pub use service::BookmarkService;
pub use submit::{SubmitOutcome, Submitter};
pub use types::{BookmarkRequest, Destination};
