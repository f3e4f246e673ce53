//! Host-side slot registry.
//!
//! Maps slot ids to their frame transport and to one inbound-message handler per
//! slot. Inbound events are routed to the slot whose frame posted them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::Result;
use crate::transport::{MessageEvent, TargetOrigin};
use crate::types::{Message, Slot};

/// Callback receiving messages routed to a slot (or, on the guest, from the host).
pub type MessageHandler = Arc<dyn Fn(&Message) -> Result<()> + Send + Sync>;

/// What a failing handler does to the listener that invoked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerPolicy {
    /// Handler errors and panics escape the listener, ending it.
    #[default]
    Propagate,
    /// Handler errors and panics are logged; the listener keeps running.
    Isolate,
}

/// Outcome of [`SlotRegistry::send_to_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No slot is registered under the id.
    UnknownSlot,
    /// The slot exists but its frame has no content window.
    NoTransport,
    /// The message could not be encoded for the channel.
    EncodeFailed,
}

#[derive(Default)]
struct RegistryInner {
    /// Insertion-ordered; replacement keeps the original position.
    slots: Vec<Slot>,
    handlers: HashMap<String, MessageHandler>,
}

/// Registry of known ad placements.
#[derive(Default)]
pub struct SlotRegistry {
    inner: Mutex<RegistryInner>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot, or replace the entry with the same id wholesale.
    ///
    /// Dimensions are not validated.
    pub fn register(&self, slot: Slot) {
        let mut inner = self.inner.lock();
        debug!(slot_id = %slot.id, transport = ?slot.transport_id(), "Slot registered");
        match inner.slots.iter_mut().find(|existing| existing.id == slot.id) {
            Some(existing) => *existing = slot,
            None => inner.slots.push(slot),
        }
    }

    /// Remove a slot and its handler.
    pub fn unregister(&self, slot_id: &str) -> Option<Slot> {
        let mut inner = self.inner.lock();
        inner.handlers.remove(slot_id);
        let index = inner.slots.iter().position(|slot| slot.id == slot_id)?;
        debug!(slot_id, "Slot unregistered");
        Some(inner.slots.remove(index))
    }

    /// Install the handler for a slot, replacing any previous one.
    pub fn on_message(&self, slot_id: impl Into<String>, handler: MessageHandler) {
        self.inner.lock().handlers.insert(slot_id.into(), handler);
    }

    /// Post a message to a slot's frame with an unrestricted target origin.
    ///
    /// Unknown slots and slots without a transport are skipped silently; the returned
    /// [`Delivery`] tells the caller which case applied.
    pub fn send_to_slot(&self, slot_id: &str, message: &Message) -> Delivery {
        let transport = {
            let inner = self.inner.lock();
            match inner.slots.iter().find(|slot| slot.id == slot_id) {
                None => return Delivery::UnknownSlot,
                Some(slot) => match &slot.transport {
                    None => return Delivery::NoTransport,
                    Some(transport) => Arc::clone(transport),
                },
            }
        };

        let mut message = message.clone();
        if message.frame_id.is_none() {
            message.frame_id = Some(transport.id());
        }

        match message.to_value() {
            Ok(data) => {
                trace!(slot_id, kind = %message.kind, "Posting to slot");
                transport.post_message(data, &TargetOrigin::Any);
                Delivery::Sent
            }
            Err(e) => {
                debug!(slot_id, "Could not encode message: {}", e);
                Delivery::EncodeFailed
            }
        }
    }

    /// Find the handler for an inbound event.
    ///
    /// Matches the first slot, in insertion order, that has a handler and whose
    /// transport is the event's source. Events without a source fall back to the
    /// message's `frame_id` correlation token.
    pub fn route(&self, event: &MessageEvent, message: &Message) -> Option<(String, MessageHandler)> {
        let inner = self.inner.lock();
        let key = event.source.or(message.frame_id)?;

        inner
            .slots
            .iter()
            .filter(|slot| slot.transport_id() == Some(key))
            .find_map(|slot| {
                inner.handlers.get(&slot.id).map(|handler| (slot.id.clone(), Arc::clone(handler)))
            })
    }

    /// Snapshot of a registered slot.
    pub fn get(&self, slot_id: &str) -> Option<Slot> {
        self.inner.lock().slots.iter().find(|slot| slot.id == slot_id).cloned()
    }

    pub fn contains(&self, slot_id: &str) -> bool {
        self.inner.lock().slots.iter().any(|slot| slot.id == slot_id)
    }

    pub fn has_handler(&self, slot_id: &str) -> bool {
        self.inner.lock().handlers.contains_key(slot_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered slot ids in insertion order.
    pub fn slot_ids(&self) -> Vec<String> {
        self.inner.lock().slots.iter().map(|slot| slot.id.clone()).collect()
    }
}
