//! Core protocol data types.
//!
//! - [`Message`] is the unit of communication, with [`MessageKind`] naming its purpose
//!   and [`is_valid_message`] guarding every inbound channel value
//! - [`AdDescriptor`] is the inventory's description of a creative
//! - [`ExpandRequest`] and [`NavigationRequest`] are the typed payloads guests send up
//! - [`Slot`] is the host's registry entry for one placement
//!
//! ## Usage Example
//!
//! ```rust
//! use safeframe::types::{ExpandRequest, Message, MessageKind};
//! use serde_json::json;
//!
//! let inbound = json!({"kind": "expand", "payload": {"width": 500, "height": 400}});
//! let message = Message::from_event_data(&inbound).expect("valid protocol message");
//!
//! assert_eq!(message.kind, MessageKind::Expand);
//! assert_eq!(message.expand_request(), Some(ExpandRequest::resize(500, 400)));
//! ```

mod ad;
mod message;
mod payload;
mod slot;

pub use ad::{AdDescriptor, AdFormat};
pub use message::{Message, MessageKind, is_valid_message};
pub use payload::{Dimensions, ExpandRequest, Geometry, Meta, NavigationRequest};
pub use slot::{Slot, SlotConfig};
