//! In-process windows, frames and navigation.
//!
//! These back the protocol with tokio channels instead of a browser, for the demo
//! binary and for tests. A [`LocalWindow`] is one document context with an inbox;
//! [`LocalWindow::transport_from`] hands out posting handles that stamp the poster's
//! identity and honour the target-origin restriction the way `postMessage` does.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::embed::Navigator;
use crate::frame::{DocumentState, FrameElement, FrameStyle};
use crate::transport::{Inbox, MessageEvent, TargetOrigin, Transport, TransportId};
use crate::{FrameError, Result};

/// One in-process document context.
#[derive(Clone)]
pub struct LocalWindow {
    id: TransportId,
    origin: String,
    sender: mpsc::UnboundedSender<MessageEvent>,
}

impl LocalWindow {
    /// Open a window at `origin`, returning it with the receiving end of its channel.
    pub fn open(origin: impl Into<String>) -> (Self, Inbox) {
        let (sender, inbox) = mpsc::unbounded_channel();
        let window = Self { id: TransportId::new(), origin: origin.into(), sender };
        debug!(id = %window.id, origin = %window.origin, "Local window opened");
        (window, inbox)
    }

    pub fn id(&self) -> TransportId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Handle through which `poster` posts into this window.
    pub fn transport_from(&self, poster: &LocalWindow) -> Arc<dyn Transport> {
        Arc::new(ChannelTransport {
            target: self.clone(),
            source: poster.id,
            source_origin: poster.origin.clone(),
        })
    }
}

struct ChannelTransport {
    target: LocalWindow,
    source: TransportId,
    source_origin: String,
}

impl Transport for ChannelTransport {
    fn id(&self) -> TransportId {
        self.target.id
    }

    fn post_message(&self, data: Value, target_origin: &TargetOrigin) {
        if !target_origin.admits(&self.target.origin) {
            trace!(
                target = %self.target.origin,
                restricted_to = %target_origin,
                "Origin mismatch, post dropped"
            );
            return;
        }

        let event = MessageEvent { source: Some(self.source), origin: self.source_origin.clone(), data };
        if self.target.sender.send(event).is_err() {
            trace!(target = %self.target.id, "Target window closed, post dropped");
        }
    }
}

/// Frame element backed by in-memory state.
pub struct LocalFrame {
    window: RwLock<Option<Arc<dyn Transport>>>,
    document: RwLock<DocumentState>,
    cross_origin: bool,
    style: Mutex<FrameStyle>,
}

impl LocalFrame {
    /// Frame whose document the host may inspect.
    pub fn same_origin(width: u32, height: u32) -> Self {
        Self::build(width, height, false)
    }

    /// Frame whose document refuses host inspection.
    pub fn cross_origin(width: u32, height: u32) -> Self {
        Self::build(width, height, true)
    }

    fn build(width: u32, height: u32, cross_origin: bool) -> Self {
        Self {
            window: RwLock::new(None),
            document: RwLock::new(DocumentState::Loading),
            cross_origin,
            style: Mutex::new(FrameStyle::resting(width, height)),
        }
    }

    /// Attach the content window.
    pub fn attach(&self, window: Arc<dyn Transport>) {
        *self.window.write() = Some(window);
    }

    /// Drop the content window, as when the frame is removed from the page.
    pub fn detach(&self) {
        *self.window.write() = None;
        *self.document.write() = DocumentState::Unavailable;
    }

    pub fn set_document_state(&self, state: DocumentState) {
        *self.document.write() = state;
    }
}

impl FrameElement for LocalFrame {
    fn content_window(&self) -> Option<Arc<dyn Transport>> {
        self.window.read().clone()
    }

    fn document_state(&self) -> Result<DocumentState> {
        if self.cross_origin {
            return Err(FrameError::CrossOriginAccess { origin: None });
        }
        Ok(*self.document.read())
    }

    fn style(&self) -> FrameStyle {
        *self.style.lock()
    }

    fn apply_style(&self, style: FrameStyle) {
        *self.style.lock() = style;
    }
}

/// Navigator that records every navigation instead of leaving the page.
#[derive(Default)]
pub struct LocalNavigator {
    history: Mutex<Vec<Url>>,
}

impl LocalNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Url> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<Url> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for LocalNavigator {
    fn navigate(&self, url: Url) {
        debug!(%url, "Navigating");
        self.history.lock().push(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn posts_carry_poster_identity() {
        let (host, _host_inbox) = LocalWindow::open("https://publisher.example");
        let (guest, mut guest_inbox) = LocalWindow::open("https://ads.example");

        let to_guest = guest.transport_from(&host);
        assert_eq!(to_guest.id(), guest.id());
        to_guest.post_message(json!({"kind": "ad-payload"}), &TargetOrigin::Any);

        let event = guest_inbox.try_recv().unwrap();
        assert_eq!(event.source, Some(host.id()));
        assert_eq!(event.origin, "https://publisher.example");
    }

    #[test]
    fn origin_mismatch_drops_the_post() {
        let (host, mut host_inbox) = LocalWindow::open("https://publisher.example");
        let (guest, _guest_inbox) = LocalWindow::open("https://ads.example");
        let to_host = host.transport_from(&guest);

        to_host.post_message(json!({"kind": "click"}), &TargetOrigin::Exact("https://evil.example".into()));
        assert!(host_inbox.try_recv().is_err());

        to_host.post_message(json!({"kind": "click"}), &TargetOrigin::Exact("https://publisher.example".into()));
        assert!(host_inbox.try_recv().is_ok());
    }

    #[test]
    fn posting_to_a_closed_window_is_silent() {
        let (host, _host_inbox) = LocalWindow::open("https://publisher.example");
        let (guest, guest_inbox) = LocalWindow::open("https://ads.example");
        drop(guest_inbox);

        guest.transport_from(&host).post_message(json!({"kind": "collapse"}), &TargetOrigin::Any);
    }

    #[test]
    fn cross_origin_frames_refuse_inspection() {
        let frame = LocalFrame::cross_origin(300, 250);
        assert!(matches!(frame.document_state(), Err(FrameError::CrossOriginAccess { .. })));

        let frame = LocalFrame::same_origin(300, 250);
        assert_eq!(frame.document_state().unwrap(), DocumentState::Loading);
        frame.detach();
        assert_eq!(frame.document_state().unwrap(), DocumentState::Unavailable);
        assert!(frame.content_window().is_none());
    }

    #[test]
    fn navigator_records_history() {
        let navigator = LocalNavigator::new();
        navigator.navigate(Url::parse("http://localhost:3000/product/p1").unwrap());
        assert_eq!(navigator.history().len(), 1);
        assert_eq!(navigator.last().unwrap().path(), "/product/p1");
    }
}
