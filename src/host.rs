//! Host protocol adapter.
//!
//! Owns the [`SlotRegistry`], validates every inbound event, republishes validated
//! events to subscribers (readiness detectors watch these for `frame-ready`), and
//! dispatches each message to the handler of the slot whose frame sent it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::config::FrameConfig;
use crate::registry::{Delivery, HandlerPolicy, MessageHandler, SlotRegistry};
use crate::transport::{Inbox, MessageEvent};
use crate::types::{Message, Slot};
use crate::{FrameError, Result};

const EVENT_BUFFER: usize = 256;

/// Host side of the frame protocol.
pub struct HostAdapter {
    registry: Arc<SlotRegistry>,
    policy: HandlerPolicy,
    events: broadcast::Sender<MessageEvent>,
}

impl HostAdapter {
    pub fn new(config: &FrameConfig) -> Self {
        Self::with_policy(config.handler_policy)
    }

    pub fn with_policy(policy: HandlerPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { registry: Arc::new(SlotRegistry::new()), policy, events }
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> HandlerPolicy {
        self.policy
    }

    pub fn register_slot(&self, slot: Slot) {
        self.registry.register(slot);
    }

    pub fn unregister_slot(&self, slot_id: &str) -> Option<Slot> {
        self.registry.unregister(slot_id)
    }

    pub fn send_to_slot(&self, slot_id: &str, message: &Message) -> Delivery {
        self.registry.send_to_slot(slot_id, message)
    }

    pub fn on_message(&self, slot_id: impl Into<String>, handler: MessageHandler) {
        self.registry.on_message(slot_id, handler);
    }

    /// Feed of every validated inbound event, whether or not a slot claims it.
    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.events.subscribe()
    }

    /// Process one inbound channel event.
    ///
    /// Invalid values are dropped. Handlers see the message without its `frame_id`
    /// correlation token, exactly as the guest built it. Under
    /// [`HandlerPolicy::Propagate`] a handler error is returned and a handler panic
    /// unwinds through this call; under [`HandlerPolicy::Isolate`] both are logged and
    /// `Ok(())` is returned.
    pub fn handle_message(&self, event: MessageEvent) -> Result<()> {
        let Some(mut message) = Message::from_event_data(&event.data) else {
            return Ok(());
        };

        // No subscribers is fine.
        let _ = self.events.send(event.clone());

        let Some((slot_id, handler)) = self.registry.route(&event, &message) else {
            trace!(kind = %message.kind, source = ?event.source, "No slot claims message");
            return Ok(());
        };
        message.frame_id = None;

        trace!(slot_id, kind = %message.kind, "Dispatching to slot handler");
        match self.policy {
            HandlerPolicy::Propagate => handler(&message),
            HandlerPolicy::Isolate => {
                match catch_unwind(AssertUnwindSafe(|| handler(&message))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(slot_id, kind = %message.kind, "Slot handler failed: {}", e),
                    Err(_) => error!(slot_id, kind = %message.kind, "Slot handler panicked"),
                }
                Ok(())
            }
        }
    }

    /// Spawn the listener task draining `inbox`.
    pub fn listen(self: &Arc<Self>, inbox: Inbox) -> HostListener {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::listener_task(Arc::clone(self), inbox, cancel.clone()));
        HostListener { cancel, task: Some(task) }
    }

    async fn listener_task(host: Arc<Self>, mut inbox: Inbox, cancel: CancellationToken) -> Result<()> {
        info!("Host listener started");
        let mut handled = 0u64;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Host listener cancelled");
                    break;
                }
                event = inbox.recv() => event,
            };

            let Some(event) = event else {
                debug!("Host inbox closed");
                break;
            };

            handled += 1;
            if let Err(e) = host.handle_message(event) {
                error!("Host listener stopping on handler error: {}", e);
                return Err(e);
            }
        }

        info!("Host listener ended ({} events)", handled);
        Ok(())
    }
}

/// Running host listener. Dropping it stops the task.
pub struct HostListener {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
}

impl HostListener {
    /// Stop listening.
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
                Err(FrameError::handler("host listener", "message handler panicked"))
            }
            Err(_) => Ok(()),
        }
    }
}

impl Drop for HostListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
