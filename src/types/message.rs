//! Protocol messages and boundary validation.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::ad::AdDescriptor;
use super::payload::{ExpandRequest, NavigationRequest};
use crate::transport::TransportId;
use crate::{FrameError, Result};

/// Kind of a protocol message.
///
/// Serializes to the wire strings (`ad-payload`, `creative-ready`, ...). Any other
/// non-empty string is kept as [`MessageKind::Other`] so receivers can report it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    AdPayload,
    CreativeReady,
    Impression,
    Click,
    Expand,
    Collapse,
    FrameReady,
    Navigate,
    Other(String),
}

impl MessageKind {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::AdPayload => "ad-payload",
            MessageKind::CreativeReady => "creative-ready",
            MessageKind::Impression => "impression",
            MessageKind::Click => "click",
            MessageKind::Expand => "expand",
            MessageKind::Collapse => "collapse",
            MessageKind::FrameReady => "frame-ready",
            MessageKind::Navigate => "navigate",
            MessageKind::Other(kind) => kind,
        }
    }

    /// Whether this is one of the protocol's defined kinds.
    pub fn is_known(&self) -> bool {
        !matches!(self, MessageKind::Other(_))
    }
}

impl From<String> for MessageKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "ad-payload" => MessageKind::AdPayload,
            "creative-ready" => MessageKind::CreativeReady,
            "impression" => MessageKind::Impression,
            "click" => MessageKind::Click,
            "expand" => MessageKind::Expand,
            "collapse" => MessageKind::Collapse,
            "frame-ready" => MessageKind::FrameReady,
            "navigate" => MessageKind::Navigate,
            _ => MessageKind::Other(kind),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true iff `value` is an object with an own `kind` property holding a
/// non-empty string.
///
/// Every inbound channel event passes through this check before it is interpreted.
pub fn is_valid_message(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|object| object.get("kind"))
        .and_then(Value::as_str)
        .is_some_and(|kind| !kind.is_empty())
}

/// The unit of protocol communication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub kind: MessageKind,

    /// Kind-dependent data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Ad instance this message refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<String>,

    /// Correlation token naming the frame the conversation belongs to. Stamped by the
    /// host on outbound messages and echoed back by the guest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<TransportId>,
}

impl Message {
    /// Bare message of the given kind.
    pub fn new(kind: MessageKind) -> Self {
        Self { kind, payload: None, ad_id: None, frame_id: None }
    }

    /// Attach an ad id.
    pub fn with_ad_id(mut self, ad_id: impl Into<String>) -> Self {
        self.ad_id = Some(ad_id.into());
        self
    }

    /// Attach a serializable payload.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        let value = serde_json::to_value(payload)
            .map_err(|e| FrameError::serialization(format!("{} payload", self.kind), e))?;
        self.payload = Some(value);
        Ok(self)
    }

    /// `ad-payload` carrying a full descriptor, tagged with its id.
    pub fn ad_payload(ad: &AdDescriptor) -> Result<Self> {
        Message::new(MessageKind::AdPayload).with_ad_id(&ad.id).with_payload(ad)
    }

    /// `expand` carrying either a resize or a push request.
    pub fn expand(request: ExpandRequest) -> Result<Self> {
        Message::new(MessageKind::Expand).with_payload(&request)
    }

    /// `collapse` without payload.
    pub fn collapse() -> Self {
        Message::new(MessageKind::Collapse)
    }

    /// `frame-ready` without payload.
    pub fn frame_ready() -> Self {
        Message::new(MessageKind::FrameReady)
    }

    /// `navigate` carrying a navigation descriptor.
    pub fn navigate(request: &NavigationRequest) -> Result<Self> {
        Message::new(MessageKind::Navigate).with_payload(request)
    }

    /// Decode an inbound channel value.
    ///
    /// Returns `None` for anything failing [`is_valid_message`], and for values whose
    /// known fields have the wrong shape.
    pub fn from_event_data(data: &Value) -> Option<Self> {
        if !is_valid_message(data) {
            trace!("Dropping non-protocol channel value");
            return None;
        }

        match serde_json::from_value(data.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                trace!("Dropping malformed protocol message: {}", e);
                None
            }
        }
    }

    /// Encode for posting on a channel.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| FrameError::serialization(format!("{} message", self.kind), e))
    }

    /// Decode the payload as `T`, if present and well-formed.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.payload.as_ref().and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Ad descriptor carried by an `ad-payload` message.
    pub fn ad_descriptor(&self) -> Option<AdDescriptor> {
        match self.kind {
            MessageKind::AdPayload => self.payload_as(),
            _ => None,
        }
    }

    /// Expand request carried by an `expand` message.
    pub fn expand_request(&self) -> Option<ExpandRequest> {
        match self.kind {
            MessageKind::Expand => self.payload_as(),
            _ => None,
        }
    }

    /// Navigation descriptor carried by a `navigate` message.
    pub fn navigation(&self) -> Option<NavigationRequest> {
        match self.kind {
            MessageKind::Navigate => self.payload_as(),
            _ => None,
        }
    }
}
