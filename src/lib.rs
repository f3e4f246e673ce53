//! Host/guest control protocol for sandboxed display-ad frames.
//!
//! A publisher page (the host) embeds each ad in an isolated frame (the guest) and
//! talks to it only through posted messages. This crate implements both ends of that
//! conversation, modelled on IAB SafeFrame v2.
//!
//! # Features
//!
//! - **Message validation**: every inbound channel value is checked before anything
//!   looks at it; malformed values are dropped quietly
//! - **Slot routing**: the host keeps a registry of placements and routes each guest
//!   message to the handler of the slot whose frame sent it
//! - **SafeFrame surface**: the guest exposes `register`/`expand`/`collapse`/`geom`/`meta`
//!   through an explicit capability object
//! - **Readiness race**: load event, `frame-ready`, document polling and a fallback
//!   timeout compete; the first one wins
//! - **Slot embedding**: inventory lookup, registration, payload delivery and the
//!   host's reactions to creative messages
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use safeframe::local::{LocalFrame, LocalNavigator, LocalWindow};
//! use safeframe::{
//!     EmbedContext, FrameConfig, HostAdapter, SlotConfig, SlotEmbedding, SlotState,
//!     StaticInventory, Tracker,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> safeframe::Result<()> {
//!     let config = Arc::new(FrameConfig::default());
//!     let (page, page_inbox) = LocalWindow::open(config.host_origin.clone());
//!     let (ad_window, _ad_inbox) = LocalWindow::open(config.host_origin.clone());
//!
//!     let host = Arc::new(HostAdapter::new(&config));
//!     let _listener = host.listen(page_inbox);
//!
//!     let frame = Arc::new(LocalFrame::same_origin(728, 90));
//!     frame.attach(ad_window.transport_from(&page));
//!
//!     let slot = SlotEmbedding::mount(
//!         SlotConfig::new("header", "header-leaderboard", 728, 90),
//!         EmbedContext {
//!             host,
//!             inventory: Arc::new(StaticInventory::demo()),
//!             frame,
//!             navigator: Arc::new(LocalNavigator::new()),
//!             tracker: Tracker::logging(),
//!             config,
//!         },
//!     )?;
//!
//!     let state = slot.wait_for_state(|state| !state.is_loading()).await;
//!     println!("{:?}", state);
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(test)]
mod test_utils;
pub mod types;

pub mod config;
pub mod transport;

// Host side
pub mod embed;
pub mod frame;
pub mod host;
pub mod readiness;
pub mod registry;

// Guest side
pub mod creative;
pub mod guest;

// Collaborators
pub mod inventory;
pub mod local;
pub mod tracking;

pub use error::*;
pub use types::*;

pub use config::FrameConfig;
pub use creative::{CreativeFrame, CreativeOptions, CreativeView, Renderer};
pub use embed::{EmbedContext, Navigator, SlotEmbedding, SlotState};
pub use frame::{DocumentState, FrameElement, FrameStyle};
pub use guest::{GuestAdapter, GuestEnvironment, RegistrationStatus, SafeFrameExt};
pub use host::{HostAdapter, HostListener};
pub use inventory::{HttpInventory, Inventory, InventoryResponse, StaticInventory};
pub use readiness::{ReadinessDetector, ReadySignal};
pub use registry::{Delivery, HandlerPolicy, MessageHandler, SlotRegistry};
pub use tracking::{PixelSink, Tracker, TrackingEvent};
pub use transport::{MessageEvent, TargetOrigin, Transport, TransportId};
