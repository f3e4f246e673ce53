//! Guest protocol adapter.
//!
//! Runs inside the ad frame. Talks to exactly one host, so there is no routing table:
//! inbound messages go to a single handler and outbound messages go to the parent
//! window, restricted to the origin named by the document referrer when one exists.
//!
//! Construction also yields a [`SafeFrameExt`], the capability object creative code
//! uses for the SafeFrame `register`/`expand`/`collapse`/`geom`/`meta` surface.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::registry::MessageHandler;
use crate::transport::{Inbox, MessageEvent, TargetOrigin, Transport, TransportId};
use crate::types::{Dimensions, ExpandRequest, Geometry, Message, Meta};
use crate::{FrameError, Result};

/// Everything the guest knows about the document it runs in.
#[derive(Clone)]
pub struct GuestEnvironment {
    /// Identity of the guest window itself.
    pub window_id: TransportId,
    /// Handle to the parent window; `None` when not embedded at all.
    pub parent: Option<Arc<dyn Transport>>,
    /// The document referrer, normally the embedding page's URL.
    pub referrer: Option<String>,
    /// The guest document's own URL.
    pub location: String,
    pub viewport: Dimensions,
    pub document: Dimensions,
}

/// Status reported to a SafeFrame registration callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistrationStatus {
    Ok,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Ok => "ok",
        }
    }
}

struct GuestInner {
    window_id: TransportId,
    parent: Option<Arc<dyn Transport>>,
    host_origin: TargetOrigin,
    location: String,
    ready: AtomicBool,
    handler: RwLock<Option<MessageHandler>>,
    /// Correlation token last received from the host.
    frame_id: RwLock<Option<TransportId>>,
    geometry: RwLock<Geometry>,
}

/// Guest side of the frame protocol. Cheap to clone.
#[derive(Clone)]
pub struct GuestAdapter {
    inner: Arc<GuestInner>,
}

impl GuestAdapter {
    /// Build the adapter and its SafeFrame capability object.
    pub fn new(env: GuestEnvironment) -> (Self, SafeFrameExt) {
        let host_origin = TargetOrigin::from_referrer(env.referrer.as_deref());
        debug!(host_origin = %host_origin, "Guest adapter created");

        let inner = GuestInner {
            window_id: env.window_id,
            parent: env.parent,
            host_origin,
            location: env.location,
            ready: AtomicBool::new(false),
            handler: RwLock::new(None),
            frame_id: RwLock::new(None),
            geometry: RwLock::new(Geometry { win: env.viewport, self_: env.document }),
        };

        let adapter = Self { inner: Arc::new(inner) };
        let ext = SafeFrameExt { guest: adapter.clone() };
        (adapter, ext)
    }

    /// Origin outbound messages are restricted to.
    pub fn host_origin(&self) -> &TargetOrigin {
        &self.inner.host_origin
    }

    /// Whether the guest sits inside a distinct parent window.
    pub fn is_embedded(&self) -> bool {
        self.inner.parent.as_ref().is_some_and(|parent| parent.id() != self.inner.window_id)
    }

    /// Send a message to the host.
    ///
    /// Returns `false` without posting when there is no parent, or the parent is the
    /// guest window itself.
    pub fn send_to_host(&self, message: &Message) -> bool {
        let Some(parent) = self.inner.parent.as_ref() else {
            trace!(kind = %message.kind, "Not embedded, dropping outbound message");
            return false;
        };
        if parent.id() == self.inner.window_id {
            trace!(kind = %message.kind, "Parent is self, dropping outbound message");
            return false;
        }

        let mut message = message.clone();
        if message.frame_id.is_none() {
            message.frame_id = *self.inner.frame_id.read();
        }

        match message.to_value() {
            Ok(data) => {
                parent.post_message(data, &self.inner.host_origin);
                true
            }
            Err(e) => {
                warn!("Could not encode {} for host: {}", message.kind, e);
                false
            }
        }
    }

    /// Install the inbound handler, replacing any previous one.
    pub fn on_message(&self, handler: MessageHandler) {
        *self.inner.handler.write() = Some(handler);
    }

    /// Process one inbound channel event.
    ///
    /// Invalid values are dropped. Handler errors are returned to the caller as-is.
    pub fn handle_message(&self, event: MessageEvent) -> Result<()> {
        let Some(message) = Message::from_event_data(&event.data) else {
            return Ok(());
        };

        if let Some(frame_id) = message.frame_id {
            *self.inner.frame_id.write() = Some(frame_id);
        }

        let handler = self.inner.handler.read().clone();
        match handler {
            Some(handler) => handler(&message),
            None => {
                trace!(kind = %message.kind, "No guest handler installed");
                Ok(())
            }
        }
    }

    /// Tell the host the guest is set up and listening.
    pub fn announce_ready(&self) -> bool {
        debug!(ready = self.is_ready(), "Announcing frame-ready");
        self.send_to_host(&Message::frame_ready())
    }

    /// Whether SafeFrame registration has happened.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Update viewport and document dimensions reported by `geom`.
    pub fn resize(&self, viewport: Dimensions, document: Dimensions) {
        *self.inner.geometry.write() = Geometry { win: viewport, self_: document };
    }

    /// Spawn the listener task draining `inbox`.
    pub fn listen(&self, inbox: Inbox) -> GuestListener {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::listener_task(self.clone(), inbox, cancel.clone()));
        GuestListener { cancel, task: Some(task) }
    }

    async fn listener_task(guest: Self, mut inbox: Inbox, cancel: CancellationToken) -> Result<()> {
        info!("Guest listener started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = inbox.recv() => event,
            };
            let Some(event) = event else {
                debug!("Guest inbox closed");
                break;
            };
            if let Err(e) = guest.handle_message(event) {
                error!("Guest handler failed: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Handle that does not keep the adapter alive. Handlers installed on the adapter
    /// hold this instead of a clone.
    pub fn downgrade(&self) -> WeakGuestAdapter {
        WeakGuestAdapter { inner: Arc::downgrade(&self.inner) }
    }

    fn mark_registered(&self) {
        self.inner.ready.store(true, Ordering::Release);
    }
}

/// Non-owning [`GuestAdapter`] handle.
#[derive(Clone)]
pub struct WeakGuestAdapter {
    inner: Weak<GuestInner>,
}

impl WeakGuestAdapter {
    pub fn upgrade(&self) -> Option<GuestAdapter> {
        self.inner.upgrade().map(|inner| GuestAdapter { inner })
    }
}

/// Running guest listener. Dropping it stops the task.
pub struct GuestListener {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
}

impl GuestListener {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the listener to finish and return how it ended.
    pub async fn join(mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                Err(FrameError::handler("guest listener", "message handler panicked"))
            }
            Err(_) => Ok(()),
        }
    }
}

impl Drop for GuestListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// SafeFrame `$sf.ext` capability, handed to creative code explicitly.
#[derive(Clone)]
pub struct SafeFrameExt {
    guest: GuestAdapter,
}

impl SafeFrameExt {
    /// Register the creative. Always succeeds: the callback receives
    /// [`RegistrationStatus::Ok`] synchronously and the guest becomes ready.
    pub fn register(&self, id: &str, callback: impl FnOnce(RegistrationStatus)) {
        debug!(id, "SafeFrame registered");
        callback(RegistrationStatus::Ok);
        self.guest.mark_registered();
    }

    /// Ask the host to expand the frame.
    pub fn expand(&self, push: bool) -> bool {
        match Message::expand(ExpandRequest::Push { push }) {
            Ok(message) => self.guest.send_to_host(&message),
            Err(e) => {
                warn!("Could not build expand message: {}", e);
                false
            }
        }
    }

    /// Ask the host to collapse the frame.
    pub fn collapse(&self) -> bool {
        self.guest.send_to_host(&Message::collapse())
    }

    /// Current viewport and document dimensions.
    pub fn geom(&self) -> Geometry {
        *self.guest.inner.geometry.read()
    }

    /// The guest document URL.
    pub fn meta(&self) -> Meta {
        Meta { url: self.guest.inner.location.clone() }
    }
}
