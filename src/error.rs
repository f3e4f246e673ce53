//! Error types for the frame protocol.
//!
//! Protocol-layer problems (malformed messages, a slot without a transport) are
//! recovered locally and never surface here. This type covers the failures that do
//! reach callers: inventory lookups, creative formats the guest cannot render,
//! configuration, serialization, and errors raised by message handlers.
//!
//! ## Error Categories
//!
//! - **Inventory Errors**: The ad lookup service failed or returned garbage
//! - **Creative Errors**: An ad descriptor names a format no renderer handles
//! - **Frame Access Errors**: Cross-origin document access was refused
//! - **Configuration Errors**: Invalid values or unreadable config files
//! - **Handler Errors**: A slot or guest handler rejected a message
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use safeframe::FrameError;
//!
//! let error = FrameError::inventory_failed("connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for frame protocol operations.
pub type Result<T, E = FrameError> = std::result::Result<T, E>;

/// Main error type for frame protocol operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FrameError {
    #[error("Failed to load ad: {reason}")]
    Inventory {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("No ads available for slot '{slot}'")]
    NoAdAvailable { slot: String },

    #[error("Unknown ad format: {format}")]
    UnknownFormat { format: String },

    #[error("Blocked access to cross-origin frame document")]
    CrossOriginAccess { origin: Option<String> },

    #[error("Serialization error in {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error in {context}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Invalid navigation target: {reason}")]
    Navigation { reason: String },

    #[error("Handler for '{scope}' failed: {reason}")]
    Handler { scope: String, reason: String },

    #[error("Tracking pixel failed: {url}")]
    Tracking {
        url: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FrameError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FrameError::Inventory { .. } => true,
            FrameError::Tracking { .. } => true,
            FrameError::NoAdAvailable { .. } => false,
            FrameError::UnknownFormat { .. } => false,
            FrameError::CrossOriginAccess { .. } => false,
            FrameError::Serialization { .. } => false,
            FrameError::Config { .. } => false,
            FrameError::ConfigFile { .. } => false,
            FrameError::Yaml { .. } => false,
            FrameError::Navigation { .. } => false,
            FrameError::Handler { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            FrameError::Inventory { .. } => vec![
                "Check the inventory endpoint is reachable",
                "Verify the endpoint returns { success, data } JSON",
                "Reload the page to retry the lookup",
            ],
            FrameError::NoAdAvailable { .. } => vec![
                "Check the slot name matches the inventory catalog",
                "Add a creative targeting this slot",
            ],
            FrameError::UnknownFormat { .. } => vec![
                "Use one of banner, video, native or expandable",
                "Check the ad descriptor produced by the inventory",
            ],
            FrameError::CrossOriginAccess { .. } => vec![
                "Treat the frame as loaded and rely on protocol messages",
                "Serve the creative from the host origin for direct inspection",
            ],
            FrameError::Serialization { .. } => vec![
                "Check payload types are JSON-serializable",
                "Verify message field names match the wire format",
            ],
            FrameError::Config { .. } => vec![
                "Check intervals and timeouts are non-zero",
                "Verify configured URLs are absolute",
            ],
            FrameError::ConfigFile { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            FrameError::Yaml { .. } => vec![
                "Validate the YAML syntax",
                "Compare field names against the documented schema",
            ],
            FrameError::Navigation { .. } => vec![
                "Verify the navigation base URL is absolute",
                "Check the creative sends a productId",
            ],
            FrameError::Handler { .. } => vec![
                "Inspect the handler's log output for the failing message",
                "Switch handler_policy to isolate to keep other slots running",
            ],
            FrameError::Tracking { .. } => vec![
                "Check the tracking URL is reachable",
                "Ignore if the pixel host is known to be flaky",
            ],
        }
    }

    /// Helper constructor for inventory failures.
    pub fn inventory_failed(reason: impl Into<String>) -> Self {
        FrameError::Inventory { reason: reason.into(), source: None }
    }

    /// Helper constructor for inventory failures with source.
    pub fn inventory_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        FrameError::Inventory { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for unknown creative formats.
    pub fn unknown_format(format: impl Into<String>) -> Self {
        FrameError::UnknownFormat { format: format.into() }
    }

    /// Helper constructor for serialization errors with context.
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        FrameError::Serialization { context: context.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        FrameError::Config { reason: reason.into() }
    }

    /// Helper constructor for handler failures.
    pub fn handler(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        FrameError::Handler { scope: scope.into(), reason: reason.into() }
    }

    /// Helper constructor for tracking pixel failures.
    pub fn tracking_failed(
        url: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        FrameError::Tracking { url: url.into(), source }
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::Serialization { context: "<unknown>".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn messages_carry_their_context(
                reason in ".*",
                format in "\\w+",
                slot in "[a-z-]{1,24}"
            ) {
                let inventory = FrameError::inventory_failed(reason.clone());
                prop_assert!(inventory.to_string().contains(&reason));

                let unknown = FrameError::unknown_format(format.clone());
                prop_assert_eq!(unknown.to_string(), format!("Unknown ad format: {}", format));

                let empty = FrameError::NoAdAvailable { slot: slot.clone() };
                prop_assert!(empty.to_string().contains(&slot));
            }

            #[test]
            fn inventory_source_chain_is_preserved(base in ".*") {
                let error = FrameError::inventory_failed_with_source(
                    "lookup",
                    Box::new(std::io::Error::other(base.clone())),
                );
                let source = std::error::Error::source(&error);
                prop_assert!(source.is_some());
                prop_assert_eq!(source.map(|s| s.to_string()), Some(base));
            }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<FrameError>();

        let error = FrameError::config("poll interval must be non-zero");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification() {
        assert!(FrameError::inventory_failed("offline").is_retryable());
        assert!(FrameError::tracking_failed("https://example.com/impression", None).is_retryable());
        assert!(!FrameError::NoAdAvailable { slot: "footer".into() }.is_retryable());
        assert!(!FrameError::unknown_format("popunder").is_retryable());
        assert!(!FrameError::handler("header-banner", "boom").is_retryable());

        for error in [
            FrameError::inventory_failed("offline"),
            FrameError::unknown_format("popunder"),
            FrameError::CrossOriginAccess { origin: None },
        ] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn cross_origin_access_is_not_retryable() {
        let error = FrameError::CrossOriginAccess { origin: Some("https://ads.example".into()) };
        assert_eq!(error.to_string(), "Blocked access to cross-origin frame document");
        assert!(!error.is_retryable());
    }

    #[test]
    fn json_errors_convert() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let converted: FrameError = err.into();
        assert!(matches!(converted, FrameError::Serialization { .. }));
    }
}
