//! The host page's view of an ad frame element.
//!
//! The element belongs to the embedding UI layer. Protocol code only reads its
//! content window, probes its document, and restyles it.

use std::sync::Arc;

use crate::Result;
use crate::transport::Transport;

/// `document.readyState` of the frame's content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// No content document yet.
    Unavailable,
    Loading,
    Interactive,
    Complete,
}

/// Stacking order of the frame element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackOrder {
    #[default]
    Auto,
    Raised(i32),
}

/// CSS positioning of the frame element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Static,
    Relative,
}

/// Presentational state of the frame element that the protocol may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStyle {
    pub width: u32,
    pub height: u32,
    pub stack: StackOrder,
    pub position: Position,
}

impl FrameStyle {
    /// Size with default stacking and positioning.
    pub fn resting(width: u32, height: u32) -> Self {
        Self { width, height, stack: StackOrder::Auto, position: Position::Static }
    }

    /// Size raised above surrounding content.
    pub fn raised(width: u32, height: u32, z_index: i32) -> Self {
        Self { width, height, stack: StackOrder::Raised(z_index), position: Position::Relative }
    }
}

/// Frame element hosting one guest document.
pub trait FrameElement: Send + Sync {
    /// Handle to the frame's content window, once attached.
    fn content_window(&self) -> Option<Arc<dyn Transport>>;

    /// Inspect the content document directly.
    ///
    /// Cross-origin documents refuse access; that refusal comes back as `Err`.
    fn document_state(&self) -> Result<DocumentState>;

    /// Current style.
    fn style(&self) -> FrameStyle;

    fn apply_style(&self, style: FrameStyle);
}
