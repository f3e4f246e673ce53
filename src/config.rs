//! Runtime configuration.
//!
//! All timing values of the protocol live here so they can be tuned per deployment.
//! Configuration is plain YAML; every field is optional and falls back to the
//! defaults below.
//!
//! ```yaml
//! host_origin: https://publisher.example
//! handler_policy: isolate
//! readiness:
//!   poll_interval_ms: 100
//!   fallback_timeout_ms: 2000
//! delivery:
//!   payload_delay_ms: 500
//! ```

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::registry::HandlerPolicy;
use crate::{FrameError, Result};

/// Top-level configuration shared by host and guest components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Origin of the host page.
    pub host_origin: String,
    /// Base URL for same-tab product navigation.
    pub navigation_base: String,
    /// Inventory lookup endpoint for [`crate::inventory::HttpInventory`].
    pub inventory_endpoint: Option<String>,
    /// What happens when a message handler fails.
    pub handler_policy: HandlerPolicy,
    pub readiness: ReadinessConfig,
    pub delivery: DeliveryConfig,
    pub guest: GuestConfig,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            host_origin: "http://localhost:3000".to_string(),
            navigation_base: "http://localhost:3000/".to_string(),
            inventory_endpoint: None,
            handler_policy: HandlerPolicy::default(),
            readiness: ReadinessConfig::default(),
            delivery: DeliveryConfig::default(),
            guest: GuestConfig::default(),
        }
    }
}

/// Host-side frame readiness detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub poll_interval_ms: u64,
    pub fallback_timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 100, fallback_timeout_ms: 2000 }
    }
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }
}

/// Host-side payload delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Pause between "frame ready and ad fetched" and sending `ad-payload`.
    pub payload_delay_ms: u64,
    /// Stacking order applied to expanded frames.
    pub expanded_z_index: i32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { payload_delay_ms: 500, expanded_z_index: 9999 }
    }
}

impl DeliveryConfig {
    pub fn payload_delay(&self) -> Duration {
        Duration::from_millis(self.payload_delay_ms)
    }
}

/// Guest-side creative frame behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestConfig {
    /// Delay before the guest announces `frame-ready`.
    pub frame_ready_delay_ms: u64,
    /// Size requested by expandable creatives.
    pub expanded_width: u32,
    pub expanded_height: u32,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self { frame_ready_delay_ms: 100, expanded_width: 600, expanded_height: 400 }
    }
}

impl GuestConfig {
    pub fn frame_ready_delay(&self) -> Duration {
        Duration::from_millis(self.frame_ready_delay_ms)
    }
}

impl FrameConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: FrameConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|source| FrameError::Yaml { context: "frame config".to_string(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| FrameError::ConfigFile { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.readiness.poll_interval_ms == 0 {
            return Err(FrameError::config("readiness.poll_interval_ms must be non-zero"));
        }
        if self.readiness.fallback_timeout_ms == 0 {
            return Err(FrameError::config("readiness.fallback_timeout_ms must be non-zero"));
        }
        self.navigation_base_url()?;
        if let Some(endpoint) = &self.inventory_endpoint {
            Url::parse(endpoint).map_err(|e| {
                FrameError::config(format!("inventory_endpoint '{}': {}", endpoint, e))
            })?;
        }
        Ok(())
    }

    /// Parsed navigation base. It must be able to carry a `/product/<id>` path.
    pub fn navigation_base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.navigation_base).map_err(|e| {
            FrameError::config(format!("navigation_base '{}': {}", self.navigation_base, e))
        })?;
        if url.cannot_be_a_base() {
            return Err(FrameError::config(format!(
                "navigation_base '{}' cannot carry a path",
                self.navigation_base
            )));
        }
        Ok(url)
    }
}
