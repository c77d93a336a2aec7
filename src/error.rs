//! Error types for chainverify
//!
//! Transport and decoding problems are carried as [`Error`] values. A stage that
//! observes a resource in the wrong state does not produce an `Error`; it
//! produces a [`StageFailure`] so the engine can report it as part of a verdict.
//! [`Error::Verification`] only appears when a caller turns a failed verdict
//! into a hard error.

use thiserror::Error;

use crate::model::ResourceKind;
use crate::verify::StageFailure;

/// Main error type for chainverify operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Inventory query could not be completed
    #[error("inventory error for {kind} {key}: {message}")]
    Inventory {
        /// Kind of resource being read
        kind: ResourceKind,
        /// Name or id used as the lookup key
        key: String,
        /// Description of what failed
        message: String,
    },

    /// Inventory answered with a record that does not match the expected shape
    #[error("decode error for {kind} {key}: {message}")]
    Decode {
        /// Kind of resource being decoded
        kind: ResourceKind,
        /// Name or id used as the lookup key
        key: String,
        /// Missing or mistyped field
        message: String,
    },

    /// Create, delete or list call against the resource lifecycle API failed
    #[error("lifecycle API error during {operation} of {target}: {message}")]
    Lifecycle {
        /// Operation being performed (create, delete, list)
        operation: &'static str,
        /// Resource the operation targeted
        target: String,
        /// Description of what failed
        message: String,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error outside the inventory boundary
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A verification verdict failed and the caller asked for a hard error
    #[error("verification failed: {0}")]
    Verification(StageFailure),
}

impl Error {
    /// Create an inventory transport error
    pub fn inventory(kind: ResourceKind, key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Inventory {
            kind,
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a decode error for a malformed inventory record
    pub fn decode(kind: ResourceKind, key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            kind,
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a lifecycle API error
    pub fn lifecycle(
        operation: &'static str,
        target: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Lifecycle {
            operation,
            target: target.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Whether the failure is a structural mismatch rather than a transport hiccup
    ///
    /// Retrying a decode failure cannot change the record's shape, so stages
    /// report it as an invariant violation instead of polling again.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
