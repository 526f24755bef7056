//! Readeck bookmark service.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::error::BookmarkError;
use super::service::{BookmarkService, check_response, normalize_base_url};
use super::types::{BookmarkRequest, Destination};

/// Readeck REST API (`POST /api/bookmarks`, bearer auth).
pub struct ReadeckService {
    client: Client,
    base_url: String,
    api_token: String,
}

impl ReadeckService {
    /// Readeck answers 202 while it fetches the page in the background.
    const ACCEPTED: &'static [u16] = &[201, 202];

    pub fn new(client: Client, base_url: &str, api_token: String) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
            api_token,
        }
    }
}

#[async_trait]
impl BookmarkService for ReadeckService {
    fn destination(&self) -> Destination {
        Destination::Readeck
    }

    async fn create_bookmark(&self, request: &BookmarkRequest) -> Result<(), BookmarkError> {
        let url = format!("{}/api/bookmarks", self.base_url);
        let body = Request {
            url: &request.url,
            labels: &request.tags,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        check_response(response, Self::ACCEPTED).await
    }
}

#[derive(Serialize)]
struct Request<'a> {
    url: &'a str,
    labels: &'a [String],
}
