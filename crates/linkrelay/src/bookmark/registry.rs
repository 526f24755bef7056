//! Service registry for bookmark backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

use super::linkding::LinkdingService;
use super::readeck::ReadeckService;
use super::service::BookmarkService;
use super::types::Destination;
use crate::config::Config;

/// Registry of bookmark services, keyed by destination.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<Destination, Arc<dyn BookmarkService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build services for every destination the config carries credentials for.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_seconds))
            .build()?;

        let mut registry = Self::new();

        let linkding = &config.linkding;
        registry.register(Arc::new(LinkdingService::new(
            client.clone(),
            linkding.base_url.as_str(),
            linkding.api_token.clone(),
        )));
        info!(base_url = %linkding.base_url, "Registered Linkding service");

        if let Some(readeck) = &config.readeck {
            registry.register(Arc::new(ReadeckService::new(
                client,
                readeck.base_url.as_str(),
                readeck.api_token.clone(),
            )));
            info!(base_url = %readeck.base_url, "Registered Readeck service");
        }

        Ok(registry)
    }

    /// Register a service under its own destination.
    pub fn register(&mut self, service: Arc<dyn BookmarkService>) {
        self.services.insert(service.destination(), service);
    }

    pub fn get(&self, destination: Destination) -> Option<Arc<dyn BookmarkService>> {
        self.services.get(&destination).cloned()
    }
}
