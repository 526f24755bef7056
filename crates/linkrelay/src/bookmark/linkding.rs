//! Linkding bookmark service.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::error::BookmarkError;
use super::service::{BookmarkService, check_response, normalize_base_url};
use super::types::{BookmarkRequest, Destination};

/// Linkding REST API (`POST /api/bookmarks/`, token auth).
pub struct LinkdingService {
    client: Client,
    base_url: String,
    api_token: String,
}

impl LinkdingService {
    const ACCEPTED: &'static [u16] = &[201];

    pub fn new(client: Client, base_url: &str, api_token: String) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
            api_token,
        }
    }
}

#[async_trait]
impl BookmarkService for LinkdingService {
    fn destination(&self) -> Destination {
        Destination::Linkding
    }

    async fn create_bookmark(&self, request: &BookmarkRequest) -> Result<(), BookmarkError> {
        let url = format!("{}/api/bookmarks/", self.base_url);
        let body = Request {
            url: &request.url,
            tag_names: &request.tags,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Token {}", self.api_token))
            .json(&body)
            .send()
            .await?;

        check_response(response, Self::ACCEPTED).await
    }
}

#[derive(Serialize)]
struct Request<'a> {
    url: &'a str,
    tag_names: &'a [String],
}
