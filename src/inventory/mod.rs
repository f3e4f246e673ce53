//! Ad inventory lookup.
//!
//! The host asks an inventory service for the ads targeting a slot name and shows
//! the first one. An empty or unsuccessful response is a normal "no ad" outcome;
//! only transport or decoding failures are errors.

mod catalog;
mod http;

pub use catalog::StaticInventory;
pub use http::HttpInventory;

use serde::{Deserialize, Serialize};

use crate::types::AdDescriptor;
use crate::{FrameError, Result};

/// Source of ad descriptors.
#[async_trait::async_trait]
pub trait Inventory: Send + Sync {
    /// Look up ads for a slot name.
    ///
    /// Returns:
    /// - `Ok(response)` - the service answered, possibly with no ads
    /// - `Err(e)` - the service could not be reached or its answer was unreadable
    async fn lookup(&self, slot_name: &str) -> Result<InventoryResponse>;
}

/// Body of an inventory answer: `{ success, data, count?, error? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<AdDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InventoryResponse {
    /// Successful response carrying `ads`.
    pub fn found(ads: Vec<AdDescriptor>) -> Self {
        let count = ads.len();
        Self { success: true, data: ads, count: Some(count), error: None }
    }

    /// Unsuccessful response.
    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, data: Vec::new(), count: Some(0), error: Some(error.into()) }
    }

    /// The ad to show, if the response has one.
    pub fn first_ad(&self) -> Option<&AdDescriptor> {
        if !self.success {
            return None;
        }
        self.data.first()
    }

    /// Take the ad to show, or [`FrameError::NoAdAvailable`] for `slot`.
    pub fn into_ad(self, slot: &str) -> Result<AdDescriptor> {
        if !self.success {
            return Err(FrameError::NoAdAvailable { slot: slot.to_string() });
        }
        self.data.into_iter().next().ok_or_else(|| FrameError::NoAdAvailable { slot: slot.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::banner_ad;
    use serde_json::json;

    #[test]
    fn unsuccessful_response_has_no_ad_even_with_data() {
        let response = InventoryResponse { success: false, ..InventoryResponse::found(vec![banner_ad()]) };
        assert!(response.first_ad().is_none());
        assert!(InventoryResponse::found(Vec::new()).first_ad().is_none());
        assert_eq!(InventoryResponse::found(vec![banner_ad()]).first_ad().unwrap().id, "banner-001");
    }

    #[test]
    fn into_ad_distinguishes_empty() {
        let ad = InventoryResponse::found(vec![banner_ad()]).into_ad("header-leaderboard").unwrap();
        assert_eq!(ad.id, "banner-001");

        let err = InventoryResponse::failed("Internal server error").into_ad("footer").unwrap_err();
        assert!(matches!(err, FrameError::NoAdAvailable { ref slot } if slot == "footer"));
    }

    #[test]
    fn minimal_wire_shape_decodes() {
        let response: InventoryResponse = serde_json::from_value(json!({"success": true, "data": []})).unwrap();
        assert!(response.success);
        assert!(response.count.is_none());

        let response: InventoryResponse =
            serde_json::from_value(json!({"success": false, "error": "Internal server error"})).unwrap();
        assert_eq!(response.error.as_deref(), Some("Internal server error"));
        assert!(response.data.is_empty());
    }
}
