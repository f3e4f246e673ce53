//! Host-side ad placements.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::transport::{Transport, TransportId};

/// Registry entry for one logical ad placement.
///
/// The registry holds the transport without owning the frame behind it; a slot with
/// no transport (frame not attached yet, or torn down) is valid.
#[derive(Clone)]
pub struct Slot {
    pub id: String,
    /// Placement name used for inventory lookup.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub transport: Option<Arc<dyn Transport>>,
}

impl Slot {
    pub fn new(id: impl Into<String>, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self { id: id.into(), name: name.into(), width, height, transport: None }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Identity of the frame window backing this slot, if attached.
    pub fn transport_id(&self) -> Option<TransportId> {
        self.transport.as_ref().map(|t| t.id())
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("transport", &self.transport_id())
            .finish()
    }
}

/// Static configuration of a placement on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub slot_id: String,
    pub slot_name: String,
    pub width: u32,
    pub height: u32,
}

impl SlotConfig {
    pub fn new(
        slot_id: impl Into<String>,
        slot_name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self { slot_id: slot_id.into(), slot_name: slot_name.into(), width, height }
    }
}
