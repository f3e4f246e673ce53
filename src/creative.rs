//! The ad frame document.
//!
//! [`CreativeFrame`] is what runs inside the guest frame: it registers with the
//! SafeFrame surface, announces readiness to the host, waits for the ad payload,
//! picks a renderer for the ad's format and reports back. User interaction with the
//! rendered creative comes in through `record_*` and the expand/collapse calls.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GuestConfig;
use crate::guest::{GuestAdapter, GuestEnvironment, GuestListener, SafeFrameExt, WeakGuestAdapter};
use crate::tracking::{Tracker, TrackingEvent};
use crate::transport::Inbox;
use crate::types::{AdDescriptor, AdFormat, ExpandRequest, Message, MessageKind, NavigationRequest};
use crate::{FrameError, Result};

/// Template used to draw a creative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    Banner,
    Video,
    NativeCard,
    Expandable,
}

impl Renderer {
    /// Renderer for an ad format.
    pub fn for_format(format: &AdFormat) -> Result<Self> {
        match format {
            AdFormat::Banner => Ok(Renderer::Banner),
            AdFormat::Video => Ok(Renderer::Video),
            AdFormat::Native => Ok(Renderer::NativeCard),
            AdFormat::Expandable => Ok(Renderer::Expandable),
            AdFormat::Other(format) => Err(FrameError::unknown_format(format.as_str())),
        }
    }
}

/// What the frame currently displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreativeView {
    /// Waiting for the ad payload.
    Waiting,
    Showing { ad: AdDescriptor, renderer: Renderer },
    /// Visible error in place of the creative.
    Error { message: String },
}

/// Options for [`CreativeFrame::start`].
#[derive(Clone, Default)]
pub struct CreativeOptions {
    pub config: GuestConfig,
    /// Fires pixels from inside the frame when set.
    pub tracker: Option<Tracker>,
}

/// A running ad frame.
pub struct CreativeFrame {
    guest: GuestAdapter,
    sf: SafeFrameExt,
    view: watch::Receiver<CreativeView>,
    tracker: Option<Tracker>,
    config: GuestConfig,
    cancel: CancellationToken,
    listener: Option<GuestListener>,
}

impl CreativeFrame {
    /// Start the frame on `inbox`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(env: GuestEnvironment, inbox: Inbox, options: CreativeOptions) -> Self {
        info!("Ad frame initializing");
        let (guest, sf) = GuestAdapter::new(env);
        let (view_tx, view) = watch::channel(CreativeView::Waiting);

        let weak = guest.downgrade();
        guest.on_message(Arc::new(move |message: &Message| -> Result<()> {
            on_host_message(&weak, &view_tx, message);
            Ok(())
        }));

        sf.register("ad-frame", |status| debug!("SafeFrame registration status: {}", status.as_str()));

        let listener = guest.listen(inbox);
        let cancel = CancellationToken::new();
        tokio::spawn(announce_ready(guest.clone(), options.config.frame_ready_delay(), cancel.clone()));

        Self { guest, sf, view, tracker: options.tracker, config: options.config, cancel, listener: Some(listener) }
    }

    pub fn guest(&self) -> &GuestAdapter {
        &self.guest
    }

    /// SafeFrame surface exposed to creative code.
    pub fn safeframe(&self) -> &SafeFrameExt {
        &self.sf
    }

    pub fn view(&self) -> CreativeView {
        self.view.borrow().clone()
    }

    /// Wait until the view satisfies `predicate`; `None` if the frame went away.
    pub async fn wait_for_view(&self, predicate: impl FnMut(&CreativeView) -> bool) -> Option<CreativeView> {
        let mut view = self.view.clone();
        view.wait_for(predicate).await.ok().map(|view| view.clone())
    }

    /// The ad being shown, if any.
    pub fn ad(&self) -> Option<AdDescriptor> {
        match &*self.view.borrow() {
            CreativeView::Showing { ad, .. } => Some(ad.clone()),
            _ => None,
        }
    }

    /// The creative became visible.
    pub fn record_impression(&self) -> bool {
        let Some(ad) = self.ad() else {
            return false;
        };
        info!(ad_id = %ad.id, "Impression fired");
        self.track(&ad, TrackingEvent::Impression);
        self.guest.send_to_host(&Message::new(MessageKind::Impression).with_ad_id(&ad.id))
    }

    /// The user clicked the creative: report it, then ask the host to navigate.
    pub fn record_click(&self) -> bool {
        let Some(ad) = self.ad() else {
            return false;
        };
        info!(ad_id = %ad.id, "Click fired");
        self.guest.send_to_host(&Message::new(MessageKind::Click).with_ad_id(&ad.id));
        self.track(&ad, TrackingEvent::Click);

        let request = NavigationRequest {
            ad_id: ad.id.clone(),
            click_url: ad.click_url.clone(),
            product_id: format!("product-{}", ad.id),
            source: format!("{}-ad", ad.format),
        };
        match Message::navigate(&request) {
            Ok(message) => self.guest.send_to_host(&message),
            Err(e) => {
                warn!("Could not build navigate message: {}", e);
                false
            }
        }
    }

    /// Video playback started. Only video creatives have start pixels.
    pub fn playback_started(&self) -> bool {
        match self.view() {
            CreativeView::Showing { ad, renderer: Renderer::Video } => {
                self.track(&ad, TrackingEvent::Start);
                true
            }
            _ => false,
        }
    }

    /// Expandable creatives grow to the configured size.
    pub fn expand(&self) -> bool {
        let Some(ad) = self.ad().filter(|ad| ad.format == AdFormat::Expandable) else {
            return false;
        };
        let request = ExpandRequest::resize(self.config.expanded_width, self.config.expanded_height);
        match Message::expand(request) {
            Ok(message) => self.guest.send_to_host(&message.with_ad_id(&ad.id)),
            Err(e) => {
                warn!("Could not build expand message: {}", e);
                false
            }
        }
    }

    pub fn collapse(&self) -> bool {
        let Some(ad) = self.ad().filter(|ad| ad.format == AdFormat::Expandable) else {
            return false;
        };
        self.guest.send_to_host(&Message::collapse().with_ad_id(&ad.id))
    }

    /// Stop the frame and report how its listener ended.
    pub async fn close(mut self) -> Result<()> {
        self.cancel.cancel();
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        listener.cancel();
        listener.join().await
    }

    fn track(&self, ad: &AdDescriptor, event: TrackingEvent) {
        if let Some(tracker) = &self.tracker {
            tracker.track(ad, event);
        }
    }
}

impl Drop for CreativeFrame {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn announce_ready(guest: GuestAdapter, delay: std::time::Duration, cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {
            debug!(registered = guest.is_ready(), "SafeFrame ready check");
            guest.announce_ready();
        }
    }
}

fn on_host_message(guest: &WeakGuestAdapter, view: &watch::Sender<CreativeView>, message: &Message) {
    if message.kind != MessageKind::AdPayload {
        debug!(kind = %message.kind, "Ignoring host message");
        return;
    }
    let Some(ad) = message.ad_descriptor() else {
        warn!("ad-payload without a usable descriptor");
        return;
    };

    info!(ad_id = %ad.id, format = %ad.format, "Ad payload received");
    let ad_id = ad.id.clone();
    let next = match Renderer::for_format(&ad.format) {
        Ok(renderer) => CreativeView::Showing { ad, renderer },
        Err(e) => {
            warn!("{}", e);
            CreativeView::Error { message: e.to_string() }
        }
    };
    view.send_replace(next);

    if let Some(guest) = guest.upgrade() {
        guest.send_to_host(&Message::new(MessageKind::CreativeReady).with_ad_id(ad_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalWindow;
    use crate::test_utils::{banner_ad, eventually};
    use crate::tracking::RecordingPixelSink;
    use crate::transport::{MessageEvent, TargetOrigin, Transport};
    use crate::types::Dimensions;
    use serde_json::Value;
    use std::time::Duration;

    struct Harness {
        frame: CreativeFrame,
        host_inbox: Inbox,
        to_guest: Arc<dyn Transport>,
        pixels: Arc<RecordingPixelSink>,
    }

    impl Harness {
        fn start() -> Self {
            let (host, host_inbox) = LocalWindow::open("http://localhost:3000");
            let (guest, guest_inbox) = LocalWindow::open("http://localhost:3000");
            let env = GuestEnvironment {
                window_id: guest.id(),
                parent: Some(host.transport_from(&guest)),
                referrer: Some("http://localhost:3000/".to_string()),
                location: "http://localhost:3000/ad-frame".to_string(),
                viewport: Dimensions::new(728, 90),
                document: Dimensions::new(728, 90),
            };
            let pixels = RecordingPixelSink::new();
            let options = CreativeOptions { tracker: Some(Tracker::new(pixels.clone())), ..Default::default() };
            let frame = CreativeFrame::start(env, guest_inbox, options);
            Self { frame, host_inbox, to_guest: guest.transport_from(&host), pixels }
        }

        fn deliver(&self, ad: &AdDescriptor) {
            let data = Message::ad_payload(ad).unwrap().to_value().unwrap();
            self.to_guest.post_message(data, &TargetOrigin::Any);
        }

        async fn next_from_guest(&mut self) -> Message {
            let MessageEvent { data, .. } = self.host_inbox.recv().await.unwrap();
            Message::from_event_data(&data).unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn registers_then_announces_after_delay() {
        let mut harness = Harness::start();
        assert!(harness.frame.guest().is_ready());

        let started = tokio::time::Instant::now();
        let first = harness.next_from_guest().await;
        assert_eq!(first.kind, MessageKind::FrameReady);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn payload_renders_and_replies_creative_ready() {
        let mut harness = Harness::start();
        harness.next_from_guest().await;

        harness.deliver(&banner_ad());
        let reply = harness.next_from_guest().await;
        assert_eq!(reply.kind, MessageKind::CreativeReady);
        assert_eq!(reply.ad_id.as_deref(), Some("banner-001"));
        assert_eq!(harness.frame.view(), CreativeView::Showing { ad: banner_ad(), renderer: Renderer::Banner });
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_format_shows_error_view() {
        let mut harness = Harness::start();
        harness.next_from_guest().await;

        let mut ad = banner_ad();
        ad.format = AdFormat::Other("popunder".into());
        harness.deliver(&ad);
        harness.next_from_guest().await;

        assert_eq!(harness.frame.view(), CreativeView::Error { message: "Unknown ad format: popunder".into() });
        assert!(!harness.frame.record_click());
    }

    #[tokio::test(start_paused = true)]
    async fn click_reports_tracks_and_navigates() {
        let mut harness = Harness::start();
        harness.next_from_guest().await;
        harness.deliver(&banner_ad());
        harness.next_from_guest().await;

        assert!(harness.frame.record_click());
        assert_eq!(harness.next_from_guest().await.kind, MessageKind::Click);
        let navigate = harness.next_from_guest().await;
        let request = navigate.navigation().unwrap();
        assert_eq!(request.product_id, "product-banner-001");
        assert_eq!(request.source, "banner-ad");
        assert_eq!(request.click_url, "https://example.com/banner-click");

        assert!(eventually(|| !harness.pixels.fired().is_empty()).await);
        assert_eq!(harness.pixels.fired(), vec!["https://example.com/click?id=banner-001"]);
    }

    #[tokio::test(start_paused = true)]
    async fn only_expandable_creatives_expand() {
        let mut harness = Harness::start();
        harness.next_from_guest().await;
        harness.deliver(&banner_ad());
        harness.next_from_guest().await;
        assert!(!harness.frame.expand());

        let mut ad = banner_ad();
        ad.format = AdFormat::Expandable;
        harness.deliver(&ad);
        harness.next_from_guest().await;

        assert!(harness.frame.expand());
        let expand = harness.next_from_guest().await;
        assert_eq!(expand.expand_request(), Some(ExpandRequest::resize(600, 400)));
        assert!(harness.frame.collapse());
        assert_eq!(harness.next_from_guest().await.kind, MessageKind::Collapse);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_start_fires_only_for_video() {
        let mut harness = Harness::start();
        harness.next_from_guest().await;

        let mut ad = banner_ad();
        ad.tracking_urls = vec!["https://example.com/video-start?id=video-001".to_string()];
        harness.deliver(&ad);
        harness.next_from_guest().await;
        assert!(!harness.frame.playback_started());

        ad.format = AdFormat::Video;
        harness.deliver(&ad);
        harness.next_from_guest().await;
        assert!(harness.frame.playback_started());
        assert!(eventually(|| harness.pixels.fired().len() == 1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn non_payload_messages_are_ignored() {
        let mut harness = Harness::start();
        harness.next_from_guest().await;

        harness.to_guest.post_message(serde_json::json!({"kind": "collapse"}), &TargetOrigin::Any);
        harness.to_guest.post_message(Value::Null, &TargetOrigin::Any);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(harness.frame.view(), CreativeView::Waiting);
        assert!(harness.frame.close().await.is_ok());
    }
}
