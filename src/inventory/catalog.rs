//! In-memory ad catalog.

use std::path::Path;

use tracing::debug;

use super::{Inventory, InventoryResponse};
use crate::types::{AdDescriptor, AdFormat};
use crate::{FrameError, Result};

/// Inventory answering from a fixed list of ads.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    ads: Vec<AdDescriptor>,
}

impl StaticInventory {
    pub fn new(ads: Vec<AdDescriptor>) -> Self {
        Self { ads }
    }

    /// Catalog served by the demo publisher: five ads across the header, sidebar and
    /// inline placements.
    pub fn demo() -> Self {
        let ad = |id: &str, slot: &str, format: AdFormat, width, height, creative: &str, click: &str| {
            AdDescriptor {
                id: id.to_string(),
                slot: slot.to_string(),
                format,
                width,
                height,
                creative_url: Some(creative.to_string()),
                markup: None,
                click_url: click.to_string(),
                headline: None,
                body: None,
                tracking_urls: Vec::new(),
            }
        };

        let mut banner = ad(
            "banner-001",
            "header-leaderboard",
            AdFormat::Banner,
            728,
            90,
            "https://placehold.co/728x90/0066CC/FFFFFF?text=Banner+Ad",
            "https://example.com/banner-click",
        );
        banner.tracking_urls = vec![
            "https://example.com/impression?id=banner-001".to_string(),
            "https://example.com/viewable?id=banner-001".to_string(),
        ];

        let mut sidebar = ad(
            "banner-002",
            "sidebar-rectangle",
            AdFormat::Banner,
            300,
            250,
            "https://placehold.co/300x250/FF6600/FFFFFF?text=Sidebar+Banner",
            "https://example.com/sidebar-click",
        );
        sidebar.tracking_urls = vec!["https://example.com/impression?id=banner-002".to_string()];

        let mut video = ad(
            "video-001",
            "header-leaderboard",
            AdFormat::Video,
            640,
            360,
            "https://samplelib.com/lib/preview/mp4/sample-5s.mp4",
            "https://example.com/video-click",
        );
        video.tracking_urls = vec![
            "https://example.com/video-impression?id=video-001".to_string(),
            "https://example.com/video-start?id=video-001".to_string(),
        ];

        let mut native = ad(
            "native-001",
            "inline-native",
            AdFormat::Native,
            300,
            250,
            "https://placehold.co/300x200/009900/FFFFFF?text=Native+Image",
            "https://example.com/native-click",
        );
        native.headline = Some("Amazing Product Deal".to_string());
        native.body = Some("Get 50% off on our premium products. Limited time offer!".to_string());
        native.tracking_urls = vec!["https://example.com/native-impression?id=native-001".to_string()];

        let mut expandable = ad(
            "expandable-001",
            "sidebar-rectangle",
            AdFormat::Expandable,
            300,
            250,
            "https://placehold.co/300x250/CC0066/FFFFFF?text=Hover+to+Expand",
            "https://example.com/expandable-click",
        );
        expandable.markup = Some(
            "<div class=\"expanded\"><h3>Expanded Content</h3>\
             <p>This is the expanded view with more details and interactive elements.</p>\
             <button>Learn More</button></div>"
                .to_string(),
        );
        expandable.tracking_urls =
            vec!["https://example.com/expandable-impression?id=expandable-001".to_string()];

        Self::new(vec![banner, sidebar, video, native, expandable])
    }

    /// Parse a YAML list of ad descriptors.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let ads: Vec<AdDescriptor> = serde_yaml_ng::from_str(yaml)
            .map_err(|source| FrameError::Yaml { context: "ad catalog".to_string(), source })?;
        debug!("Loaded catalog with {} ads", ads.len());
        Ok(Self::new(ads))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| FrameError::ConfigFile { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn ads(&self) -> &[AdDescriptor] {
        &self.ads
    }

    pub fn len(&self) -> usize {
        self.ads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }

    /// Ads matching both filters; `None` matches everything.
    pub fn filter(&self, slot: Option<&str>, format: Option<&AdFormat>) -> Vec<AdDescriptor> {
        self.ads
            .iter()
            .filter(|ad| slot.is_none_or(|slot| ad.slot == slot))
            .filter(|ad| format.is_none_or(|format| &ad.format == format))
            .cloned()
            .collect()
    }

    pub fn by_id(&self, id: &str) -> Option<&AdDescriptor> {
        self.ads.iter().find(|ad| ad.id == id)
    }

    /// Answer a lookup with both filters applied.
    pub fn respond(&self, slot: Option<&str>, format: Option<&AdFormat>) -> InventoryResponse {
        InventoryResponse::found(self.filter(slot, format))
    }
}

#[async_trait::async_trait]
impl Inventory for StaticInventory {
    async fn lookup(&self, slot_name: &str) -> Result<InventoryResponse> {
        Ok(self.respond(Some(slot_name), None))
    }
}
