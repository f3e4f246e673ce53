//! Ad descriptors as served by the inventory.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Creative format of an ad.
///
/// Unrecognised format strings deserialize into [`AdFormat::Other`] so the guest can
/// report them instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AdFormat {
    Banner,
    Video,
    Native,
    Expandable,
    Other(String),
}

impl AdFormat {
    pub fn as_str(&self) -> &str {
        match self {
            AdFormat::Banner => "banner",
            AdFormat::Video => "video",
            AdFormat::Native => "native",
            AdFormat::Expandable => "expandable",
            AdFormat::Other(format) => format,
        }
    }
}

impl From<String> for AdFormat {
    fn from(format: String) -> Self {
        match format.as_str() {
            "banner" => AdFormat::Banner,
            "video" => AdFormat::Video,
            "native" => AdFormat::Native,
            "expandable" => AdFormat::Expandable,
            _ => AdFormat::Other(format),
        }
    }
}

impl From<AdFormat> for String {
    fn from(format: AdFormat) -> Self {
        match format {
            AdFormat::Other(format) => format,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one ad creative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdDescriptor {
    pub id: String,
    /// Slot name the ad targets.
    pub slot: String,
    pub format: AdFormat,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_url: Option<String>,
    /// Inline creative markup, used instead of or alongside `creative_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    pub click_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Tracking pixels, fired by keyword match.
    #[serde(default)]
    pub tracking_urls: Vec<String>,
}
