//! Per-slot embedding.
//!
//! Mounting a slot starts two things at once: the inventory lookup for the slot
//! name and frame readiness detection. When both resolve the slot is registered with
//! the host, its message handler is installed, and after a short delay the ad payload
//! is delivered to the frame. The handler reacts to guest messages:
//!
//! | kind             | reaction                                           |
//! |------------------|----------------------------------------------------|
//! | `creative-ready` | state becomes [`SlotState::Rendered`]              |
//! | `impression`     | impression pixels fire                             |
//! | `click`          | click pixels fire                                  |
//! | `expand`         | frame resized (if dimensions given) and raised     |
//! | `collapse`       | registered size and default stacking restored      |
//! | `navigate`       | same-tab navigation to the product page            |
//! | anything else    | logged, no state change                            |
//!
//! Dropping the [`SlotEmbedding`] cancels pending work and unregisters the slot.

use std::sync::Arc;

use reqwest::Url;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::FrameConfig;
use crate::frame::{FrameElement, FrameStyle};
use crate::host::HostAdapter;
use crate::inventory::Inventory;
use crate::readiness::{ReadinessDetector, ReadinessTiming, ReadySignal};
use crate::registry::{Delivery, MessageHandler};
use crate::tracking::{Tracker, TrackingEvent};
use crate::transport::Transport;
use crate::types::{AdDescriptor, ExpandRequest, Message, MessageKind, NavigationRequest, Slot, SlotConfig};
use crate::{FrameError, Result};

/// Reason shown when the inventory has nothing for the slot.
pub const NO_ADS_AVAILABLE: &str = "No ads available for this slot";
/// Reason shown when the inventory lookup failed.
pub const FAILED_TO_LOAD: &str = "Failed to load ad";

/// Performs same-tab navigation of the host page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: Url);
}

/// What the embedding UI shows for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// Loading indicator visible.
    Loading,
    /// The creative reported it rendered.
    Rendered { ad_id: String },
    /// The inventory had no ad.
    Empty { reason: String },
    /// The inventory lookup failed.
    Failed { reason: String },
}

impl SlotState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SlotState::Loading)
    }

    /// Empty or failed.
    pub fn is_error(&self) -> bool {
        matches!(self, SlotState::Empty { .. } | SlotState::Failed { .. })
    }
}

/// Collaborators a slot embedding needs.
#[derive(Clone)]
pub struct EmbedContext {
    pub host: Arc<HostAdapter>,
    pub inventory: Arc<dyn Inventory>,
    /// The frame element hosting this slot's guest.
    pub frame: Arc<dyn FrameElement>,
    pub navigator: Arc<dyn Navigator>,
    pub tracker: Tracker,
    pub config: Arc<FrameConfig>,
}

/// One mounted ad slot.
pub struct SlotEmbedding {
    slot_id: String,
    host: Arc<HostAdapter>,
    state: watch::Receiver<SlotState>,
    readiness: Arc<ReadinessDetector>,
    cancel: CancellationToken,
}

impl SlotEmbedding {
    /// Mount a slot and start loading its ad.
    ///
    /// Must be called from within a tokio runtime. Fails only on an unusable
    /// navigation base in `ctx.config`.
    pub fn mount(slot: SlotConfig, ctx: EmbedContext) -> Result<Self> {
        let navigation_base = ctx.config.navigation_base_url()?;
        info!(slot_id = %slot.slot_id, slot_name = %slot.slot_name, "Mounting ad slot");

        let (state_tx, state) = watch::channel(SlotState::Loading);
        let readiness = Arc::new(ReadinessDetector::spawn(
            Arc::clone(&ctx.frame),
            ctx.host.subscribe(),
            ReadinessTiming::from(&ctx.config.readiness),
        ));
        let cancel = CancellationToken::new();

        let embedding = Self {
            slot_id: slot.slot_id.clone(),
            host: Arc::clone(&ctx.host),
            state,
            readiness: Arc::clone(&readiness),
            cancel: cancel.clone(),
        };

        let load = SlotLoad { slot, ctx, navigation_base, state: Arc::new(state_tx), readiness, cancel };
        tokio::spawn(load.run());

        Ok(embedding)
    }

    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    /// Current UI state.
    pub fn state(&self) -> SlotState {
        self.state.borrow().clone()
    }

    /// Wait until the state satisfies `predicate`.
    ///
    /// Returns `None` if the slot is torn down before that happens.
    pub async fn wait_for_state(&self, predicate: impl FnMut(&SlotState) -> bool) -> Option<SlotState> {
        let mut state = self.state.clone();
        let waiting = state.wait_for(predicate);
        tokio::select! {
            result = waiting => result.ok().map(|state| state.clone()),
            _ = self.cancel.cancelled() => None,
        }
    }

    /// Stream of state changes, starting with the current state.
    pub fn state_updates(&self) -> WatchStream<SlotState> {
        WatchStream::new(self.state.clone())
    }

    /// The element's load event fired.
    pub fn notify_frame_load(&self) -> bool {
        self.readiness.notify_load()
    }

    /// Which signal made the frame ready, if it is.
    pub fn ready_signal(&self) -> Option<ReadySignal> {
        self.readiness.signal()
    }

    /// Tear the slot down. Same as dropping it.
    pub fn unmount(self) {}
}

impl Drop for SlotEmbedding {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.readiness.cancel();
        if self.host.unregister_slot(&self.slot_id).is_some() {
            debug!(slot_id = %self.slot_id, "Slot unmounted");
        }
    }
}

/// The load task of one slot.
struct SlotLoad {
    slot: SlotConfig,
    ctx: EmbedContext,
    navigation_base: Url,
    state: Arc<watch::Sender<SlotState>>,
    readiness: Arc<ReadinessDetector>,
    cancel: CancellationToken,
}

impl SlotLoad {
    async fn run(self) {
        let slot_id = self.slot.slot_id.as_str();
        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(slot_id, "Slot load cancelled");
            }
            _ = self.load() => {}
        }
    }

    async fn load(&self) {
        let slot_id = self.slot.slot_id.as_str();
        debug!(slot_id, "Fetching ad for slot: {}", self.slot.slot_name);

        let lookup = self.ctx.inventory.lookup(&self.slot.slot_name).await;
        let ad = match lookup.and_then(|response| response.into_ad(&self.slot.slot_name)) {
            Ok(ad) => ad,
            Err(FrameError::NoAdAvailable { slot }) => {
                info!(slot_id, "No ads available for {}", slot);
                self.state.send_replace(SlotState::Empty { reason: NO_ADS_AVAILABLE.to_string() });
                return;
            }
            Err(e) => {
                error!(slot_id, "Error fetching ad: {}", e);
                self.state.send_replace(SlotState::Failed { reason: FAILED_TO_LOAD.to_string() });
                return;
            }
        };
        debug!(slot_id, ad_id = %ad.id, "Ad data received");
        self.ctx.frame.apply_style(FrameStyle::resting(ad.width, ad.height));

        let Some(signal) = self.readiness.wait_ready().await else {
            return;
        };
        debug!(slot_id, "Frame ready ({}), setting up", signal);

        if !self.register(&ad) {
            return;
        }

        tokio::time::sleep(self.ctx.config.delivery.payload_delay()).await;
        self.deliver(&ad);
    }

    fn slot_entry(&self, ad: &AdDescriptor, window: Option<Arc<dyn Transport>>) -> Slot {
        let slot = Slot::new(self.slot.slot_id.as_str(), self.slot.slot_name.as_str(), ad.width, ad.height);
        match window {
            Some(window) => slot.with_transport(window),
            None => slot,
        }
    }

    /// Register the slot and install its handler.
    ///
    /// Returns `false`, leaving nothing registered, when the embedding was torn down
    /// while this ran.
    fn register(&self, ad: &AdDescriptor) -> bool {
        let slot_id = self.slot.slot_id.as_str();
        let window = self.ctx.frame.content_window();
        if window.is_none() {
            warn!(slot_id, "Frame has no content window at registration");
        }
        self.ctx.host.register_slot(self.slot_entry(ad, window));
        self.ctx.host.on_message(slot_id, self.handler(ad.clone()));

        // Teardown may already have run its unregister.
        if self.cancel.is_cancelled() {
            self.ctx.host.unregister_slot(slot_id);
            debug!(slot_id, "Slot torn down during registration");
            return false;
        }
        true
    }

    fn deliver(&self, ad: &AdDescriptor) {
        let slot_id = self.slot.slot_id.as_str();
        let Some(window) = self.ctx.frame.content_window() else {
            warn!(slot_id, "Failed to send ad payload: frame has no content window");
            return;
        };

        let stale = self.ctx.host.registry().get(slot_id).is_some_and(|slot| slot.transport.is_none());
        if stale {
            debug!(slot_id, "Content window attached after registration, updating slot");
            self.ctx.host.register_slot(self.slot_entry(ad, Some(window)));
        }

        let message = match Message::ad_payload(ad) {
            Ok(message) => message,
            Err(e) => {
                error!(slot_id, "Failed to encode ad payload: {}", e);
                return;
            }
        };

        match self.ctx.host.send_to_slot(slot_id, &message) {
            Delivery::Sent => info!(slot_id, ad_id = %ad.id, "Ad payload sent"),
            Delivery::UnknownSlot => warn!(slot_id, "Failed to send ad payload: slot not in registry"),
            Delivery::NoTransport => warn!(slot_id, "Failed to send ad payload: slot registered without a frame"),
            Delivery::EncodeFailed => error!(slot_id, "Failed to send ad payload: encoding failed"),
        }
    }

    fn handler(&self, ad: AdDescriptor) -> MessageHandler {
        let reactions = SlotReactions {
            slot_id: self.slot.slot_id.clone(),
            registered: (ad.width, ad.height),
            ad,
            frame: Arc::clone(&self.ctx.frame),
            navigator: Arc::clone(&self.ctx.navigator),
            tracker: self.ctx.tracker.clone(),
            state: Arc::clone(&self.state),
            navigation_base: self.navigation_base.clone(),
            expanded_z_index: self.ctx.config.delivery.expanded_z_index,
        };
        Arc::new(move |message: &Message| reactions.react(message))
    }
}

/// Host reactions for one registered slot.
struct SlotReactions {
    slot_id: String,
    ad: AdDescriptor,
    /// Width and height the slot was registered with.
    registered: (u32, u32),
    frame: Arc<dyn FrameElement>,
    navigator: Arc<dyn Navigator>,
    tracker: Tracker,
    state: Arc<watch::Sender<SlotState>>,
    navigation_base: Url,
    expanded_z_index: i32,
}

impl SlotReactions {
    fn react(&self, message: &Message) -> Result<()> {
        let slot_id = self.slot_id.as_str();
        match &message.kind {
            MessageKind::CreativeReady => {
                let ad_id = message.ad_id.clone().unwrap_or_else(|| self.ad.id.clone());
                info!(slot_id, ad_id, "Creative ready");
                let rendered = SlotState::Rendered { ad_id };
                self.state.send_if_modified(|state| {
                    if *state == rendered {
                        return false;
                    }
                    *state = rendered;
                    true
                });
            }
            MessageKind::Impression => {
                info!(slot_id, "Impression logged");
                self.tracker.track(&self.ad, TrackingEvent::Impression);
            }
            MessageKind::Click => {
                info!(slot_id, "Click logged");
                self.tracker.track(&self.ad, TrackingEvent::Click);
            }
            MessageKind::Expand => self.expand(message),
            MessageKind::Collapse => {
                debug!(slot_id, "Collapse requested");
                let (width, height) = self.registered;
                self.frame.apply_style(FrameStyle::resting(width, height));
            }
            MessageKind::Navigate => match message.navigation() {
                Some(request) => match product_url(&self.navigation_base, &request) {
                    Ok(url) => {
                        info!(slot_id, ad_id = %request.ad_id, "Navigating to product page");
                        self.navigator.navigate(url);
                    }
                    Err(e) => error!(slot_id, ad_id = %request.ad_id, "Navigation skipped: {}", e),
                },
                None => warn!(slot_id, "Navigate message without a navigation descriptor"),
            },
            MessageKind::FrameReady => trace!(slot_id, "frame-ready after registration"),
            other => warn!(slot_id, "Unknown message type: {}", other),
        }
        Ok(())
    }

    fn expand(&self, message: &Message) {
        let slot_id = self.slot_id.as_str();
        let z_index = self.expanded_z_index;
        match message.expand_request() {
            Some(ExpandRequest::Resize { width, height }) => {
                debug!(slot_id, width, height, "Expand requested");
                self.frame.apply_style(FrameStyle::raised(width, height, z_index));
            }
            Some(ExpandRequest::Push { push }) => {
                debug!(slot_id, push, "Expand requested without dimensions");
                let current = self.frame.style();
                self.frame.apply_style(FrameStyle::raised(current.width, current.height, z_index));
            }
            None => warn!(slot_id, "Expand message without a usable payload"),
        }
    }
}

/// `<base>/product/<productId>?adId=..&source=..&originalUrl=..`
pub fn product_url(base: &Url, request: &NavigationRequest) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FrameError::Navigation { reason: format!("'{}' cannot carry a path", base) })?
        .pop_if_empty()
        .push("product")
        .push(&request.product_id);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut()
        .append_pair("adId", &request.ad_id)
        .append_pair("source", &request.source)
        .append_pair("originalUrl", &request.click_url);
    Ok(url)
}
