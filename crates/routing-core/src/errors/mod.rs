//! Error types for routing-core
//!
//! Predicate failures (no loose-route match, no transaction, ...) are not
//! errors; they come back from the facade as `false`. The variants below
//! cover the fatal category only: state that makes it unsafe to keep routing
//! the current message. The engine aborts that message and keeps serving.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Malformed message {id}: {reason}")]
    MalformedMessage { id: u64, reason: String },

    #[error("Message {id} already has a terminal action ({previous}), refusing {attempted}")]
    DuplicateTerminal {
        id: u64,
        previous: &'static str,
        attempted: &'static str,
    },

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Invalid SIP URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Branch parameter overflow: {len} bytes exceeds limit of {max}")]
    BranchParamOverflow { len: usize, max: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RoutingError {
    /// Shorthand for a malformed-message error
    pub fn malformed(id: u64, reason: impl Into<String>) -> Self {
        RoutingError::MalformedMessage {
            id,
            reason: reason.into(),
        }
    }

    /// Shorthand for an unparsable URI
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        RoutingError::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

pub type RoutingResult<T> = std::result::Result<T, RoutingError>;
