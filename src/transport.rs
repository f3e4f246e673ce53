//! Message channel primitives shared by host and guest.
//!
//! A [`Transport`] is a handle to one target window. Posting through it enqueues a
//! [`MessageEvent`] in the target's inbox; the event records which window posted it
//! so the receiver can route by source.

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receiving end of a window's message channel.
pub type Inbox = mpsc::UnboundedReceiver<MessageEvent>;

/// Identity of a window (document context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportId(Uuid);

impl TransportId {
    /// Allocate a fresh, unique id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Origin restriction applied to an outbound post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// `*`: deliver regardless of the target's origin.
    Any,
    /// Deliver only if the target window has exactly this origin.
    Exact(String),
}

impl TargetOrigin {
    /// Derive the origin of a referrer URL, falling back to [`TargetOrigin::Any`] when the
    /// referrer is missing, unparsable, or has an opaque origin.
    pub fn from_referrer(referrer: Option<&str>) -> Self {
        let Some(referrer) = referrer.filter(|r| !r.is_empty()) else {
            return TargetOrigin::Any;
        };

        match Url::parse(referrer) {
            Ok(url) if url.origin().is_tuple() => {
                TargetOrigin::Exact(url.origin().ascii_serialization())
            }
            _ => TargetOrigin::Any,
        }
    }

    /// Whether a window with `origin` may receive a post restricted by this value.
    pub fn admits(&self, origin: &str) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOrigin::Any => f.write_str("*"),
            TargetOrigin::Exact(origin) => f.write_str(origin),
        }
    }
}

/// One delivery on a window's message channel.
///
/// `data` is untrusted: anything any script posted to the window lands here.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Window that posted the event, when the channel can tell.
    pub source: Option<TransportId>,
    /// Origin of the posting window.
    pub origin: String,
    /// Raw posted value.
    pub data: Value,
}

/// Handle used to post messages to a single target window.
pub trait Transport: Send + Sync {
    /// Identity of the target window.
    fn id(&self) -> TransportId;

    /// Post a value to the target window.
    ///
    /// Posting never fails from the sender's point of view; a closed or
    /// origin-mismatched target simply never sees the value.
    fn post_message(&self, data: Value, target_origin: &TargetOrigin);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referrer_origin_is_extracted() {
        let origin = TargetOrigin::from_referrer(Some("https://publisher.example:8443/news/a?b=c"));
        assert_eq!(origin, TargetOrigin::Exact("https://publisher.example:8443".to_string()));
        assert_eq!(origin.to_string(), "https://publisher.example:8443");
    }

    #[test]
    fn missing_or_unusable_referrer_falls_back_to_wildcard() {
        assert_eq!(TargetOrigin::from_referrer(None), TargetOrigin::Any);
        assert_eq!(TargetOrigin::from_referrer(Some("")), TargetOrigin::Any);
        assert_eq!(TargetOrigin::from_referrer(Some("not a url")), TargetOrigin::Any);
        assert_eq!(TargetOrigin::from_referrer(Some("data:text/html,hi")), TargetOrigin::Any);
        assert_eq!(TargetOrigin::Any.to_string(), "*");
    }

    #[test]
    fn exact_origin_admits_only_itself() {
        let origin = TargetOrigin::Exact("https://a.example".into());
        assert!(origin.admits("https://a.example"));
        assert!(!origin.admits("https://b.example"));
        assert!(TargetOrigin::Any.admits("https://b.example"));
    }

    #[test]
    fn transport_ids_are_unique() {
        assert_ne!(TransportId::new(), TransportId::new());
    }
}
