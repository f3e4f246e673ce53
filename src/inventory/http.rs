//! Inventory served over HTTP.

use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::{Inventory, InventoryResponse};
use crate::config::FrameConfig;
use crate::{FrameError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Inventory answering `GET <endpoint>?slot=<name>`.
pub struct HttpInventory {
    client: Client,
    endpoint: Url,
}

impl HttpInventory {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FrameError::config(format!("inventory endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FrameError::inventory_failed_with_source("could not build HTTP client", Box::new(e)))?;

        Ok(Self { client, endpoint })
    }

    /// Inventory for the configured `inventory_endpoint`, if one is set.
    pub fn from_config(config: &FrameConfig) -> Result<Option<Self>> {
        config.inventory_endpoint.as_deref().map(Self::new).transpose()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Request URL for a slot lookup.
    pub fn lookup_url(&self, slot_name: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("slot", slot_name);
        url
    }
}

#[async_trait::async_trait]
impl Inventory for HttpInventory {
    async fn lookup(&self, slot_name: &str) -> Result<InventoryResponse> {
        let url = self.lookup_url(slot_name);
        debug!(%url, "Fetching ad for slot {}", slot_name);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(%url, "Inventory request failed: {}", e);
            let reason = if e.is_connect() {
                format!("cannot connect to {}", self.endpoint)
            } else {
                "inventory request failed".to_string()
            };
            FrameError::inventory_failed_with_source(reason, Box::new(e))
        })?;

        // Error statuses still carry a `{ success: false }` body worth decoding.
        let status = response.status();
        let body: InventoryResponse = response.json().await.map_err(|e| {
            FrameError::inventory_failed_with_source(
                format!("unreadable inventory response ({})", status),
                Box::new(e),
            )
        })?;

        debug!(slot_name, success = body.success, ads = body.data.len(), "Inventory answered");
        Ok(body)
    }
}
