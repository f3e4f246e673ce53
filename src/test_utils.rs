//! Test doubles and fixtures shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::transport::{TargetOrigin, Transport, TransportId};
use crate::types::{AdDescriptor, AdFormat};

/// Transport that records every post instead of delivering it.
pub struct CountingTransport {
    id: TransportId,
    posts: Mutex<Vec<(Value, TargetOrigin)>>,
}

impl CountingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { id: TransportId::new(), posts: Mutex::new(Vec::new()) })
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }

    pub fn posts(&self) -> Vec<(Value, TargetOrigin)> {
        self.posts.lock().clone()
    }
}

impl Transport for CountingTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    fn post_message(&self, data: Value, target_origin: &TargetOrigin) {
        self.posts.lock().push((data, target_origin.clone()));
    }
}

/// A 728x90 banner for the header leaderboard.
pub fn banner_ad() -> AdDescriptor {
    AdDescriptor {
        id: "banner-001".to_string(),
        slot: "header-leaderboard".to_string(),
        format: AdFormat::Banner,
        width: 728,
        height: 90,
        creative_url: Some("https://placehold.co/728x90".to_string()),
        markup: None,
        click_url: "https://example.com/banner-click".to_string(),
        headline: None,
        body: None,
        tracking_urls: vec![
            "https://example.com/impression?id=banner-001".to_string(),
            "https://example.com/click?id=banner-001".to_string(),
            "https://example.com/viewable?id=banner-001".to_string(),
        ],
    }
}

/// Poll `condition` until it holds, yielding to other tasks between checks.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
