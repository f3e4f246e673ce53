//! Kind-specific payload shapes.

use serde::{Deserialize, Serialize};

/// Payload of an `expand` message.
///
/// Two shapes share the kind: a concrete resize instruction, and the boolean
/// push form sent by the SafeFrame `expand` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpandRequest {
    Resize { width: u32, height: u32 },
    Push { push: bool },
}

impl ExpandRequest {
    pub fn resize(width: u32, height: u32) -> Self {
        ExpandRequest::Resize { width, height }
    }

    /// Requested dimensions, if this is a resize.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match *self {
            ExpandRequest::Resize { width, height } => Some((width, height)),
            ExpandRequest::Push { .. } => None,
        }
    }
}

/// Payload of a `navigate` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub ad_id: String,
    pub click_url: String,
    pub product_id: String,
    /// Which creative produced the click, e.g. `banner-ad`.
    pub source: String,
}

/// Width and height in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub w: u32,
    pub h: u32,
}

impl Dimensions {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Result of the SafeFrame `geom` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Geometry {
    /// Viewport of the guest window.
    pub win: Dimensions,
    /// The guest document body.
    #[serde(rename = "self")]
    pub self_: Dimensions,
}

/// Result of the SafeFrame `meta` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expand_shapes_are_distinguished() {
        let resize: ExpandRequest =
            serde_json::from_value(json!({"width": 600, "height": 400, "adId": "x"})).unwrap();
        assert_eq!(resize.dimensions(), Some((600, 400)));

        let push: ExpandRequest = serde_json::from_value(json!({"push": false})).unwrap();
        assert_eq!(push, ExpandRequest::Push { push: false });
        assert_eq!(push.dimensions(), None);
    }

    #[test]
    fn geometry_serializes_self_key() {
        let geom = Geometry { win: Dimensions::new(1024, 768), self_: Dimensions::new(300, 250) };
        assert_eq!(
            serde_json::to_value(geom).unwrap(),
            json!({"win": {"w": 1024, "h": 768}, "self": {"w": 300, "h": 250}})
        );
    }
}
