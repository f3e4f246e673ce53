//! Tracking pixels.
//!
//! Each ad lists tracking URLs. An event fires every URL whose text contains the
//! event's keyword. Firing is fire-and-forget: failures are logged, never retried,
//! and nobody waits on them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use tracing::{debug, info, warn};

use crate::types::AdDescriptor;
use crate::{FrameError, Result};

/// Event class that selects tracking URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingEvent {
    Impression,
    Click,
    /// Video playback started.
    Start,
}

impl TrackingEvent {
    /// Substring a tracking URL must contain to fire for this event.
    pub fn keyword(&self) -> &'static str {
        match self {
            TrackingEvent::Impression => "impression",
            TrackingEvent::Click => "click",
            TrackingEvent::Start => "start",
        }
    }
}

impl fmt::Display for TrackingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Destination for pixel requests.
#[async_trait::async_trait]
pub trait PixelSink: Send + Sync {
    async fn fire(&self, url: &str) -> Result<()>;
}

/// Fires pixels as uncached HTTP GETs.
pub struct HttpPixelSink {
    client: Client,
}

impl HttpPixelSink {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| FrameError::tracking_failed("<client>", Some(e.into())))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl PixelSink for HttpPixelSink {
    async fn fire(&self, url: &str) -> Result<()> {
        self.client
            .get(url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await
            .map_err(|e| FrameError::tracking_failed(url, Some(e.into())))?;
        Ok(())
    }
}

/// Logs pixels instead of requesting them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPixelSink;

#[async_trait::async_trait]
impl PixelSink for LogPixelSink {
    async fn fire(&self, url: &str) -> Result<()> {
        info!("Tracking pixel fired: {}", url);
        Ok(())
    }
}

/// Keeps every fired URL, for inspection.
#[derive(Debug, Default)]
pub struct RecordingPixelSink {
    fired: Mutex<Vec<String>>,
}

impl RecordingPixelSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fired(&self) -> Vec<String> {
        self.fired.lock().clone()
    }
}

#[async_trait::async_trait]
impl PixelSink for RecordingPixelSink {
    async fn fire(&self, url: &str) -> Result<()> {
        self.fired.lock().push(url.to_string());
        Ok(())
    }
}

/// Fires an ad's tracking pixels for events.
#[derive(Clone)]
pub struct Tracker {
    sink: Arc<dyn PixelSink>,
}

impl Tracker {
    pub fn new(sink: Arc<dyn PixelSink>) -> Self {
        Self { sink }
    }

    /// Tracker that only logs.
    pub fn logging() -> Self {
        Self::new(Arc::new(LogPixelSink))
    }

    /// Tracking URLs of `ad` that fire for `event`.
    pub fn matching<'a>(ad: &'a AdDescriptor, event: TrackingEvent) -> Vec<&'a str> {
        ad.tracking_urls
            .iter()
            .filter(|url| url.contains(event.keyword()))
            .map(String::as_str)
            .collect()
    }

    /// Fire matching pixels in the background. Returns how many were started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn track(&self, ad: &AdDescriptor, event: TrackingEvent) -> usize {
        let urls = Self::matching(ad, event);
        debug!(ad_id = %ad.id, %event, "Firing {} tracking pixels", urls.len());

        for url in &urls {
            let sink = Arc::clone(&self.sink);
            let url = url.to_string();
            tokio::spawn(async move {
                if let Err(e) = sink.fire(&url).await {
                    warn!("Failed to fire tracking pixel {}: {}", url, e);
                }
            });
        }
        urls.len()
    }
}
