//! Error types for entimap core.

use crate::model::TypeMismatch;
use entimap_store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in entimap core operations.
///
/// Validation failures are not errors: soft operations report them as
/// `Ok(false)` with messages on the model. Lookups of missing keys are not
/// errors either; they yield `None` or omit the key.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store error that survived the retry budget, or was not retryable.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A strict save failed.
    #[error("{kind} entity not saved: {}", .messages.join(", "))]
    EntityNotSaved {
        /// Kind of the model.
        kind: &'static str,
        /// Validation messages, empty when the write itself failed.
        messages: Vec<String>,
    },

    /// A parent key was unusable.
    #[error("invalid parent key: {message}")]
    InvalidParent {
        /// Description of the problem.
        message: String,
    },

    /// Query options could not be compiled.
    #[error("malformed query: {message}")]
    MalformedQuery {
        /// Description of the problem.
        message: String,
    },

    /// An attribute name is not in the model's attribute table.
    #[error("unknown attribute {attribute} for kind {kind}")]
    UnknownAttribute {
        /// Kind of the model.
        kind: &'static str,
        /// Name that was not found.
        attribute: String,
    },

    /// A value had the wrong type for an attribute.
    #[error("attribute {kind}.{attribute} expects {expected}, got {found}")]
    AttributeType {
        /// Kind of the model.
        kind: &'static str,
        /// Attribute name.
        attribute: String,
        /// Expected value type.
        expected: &'static str,
        /// Value type received.
        found: &'static str,
    },

    /// Change tracking was used on an attribute that is not tracked.
    #[error("attribute {attribute} of kind {kind} is not configured for change tracking")]
    TrackingMisuse {
        /// Kind of the model.
        kind: &'static str,
        /// Attribute name, or `*` when the type tracks nothing.
        attribute: String,
    },

    /// Operation not permitted in the model's current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Configuration is missing or malformed.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an entity not saved error.
    pub fn entity_not_saved(kind: &'static str, messages: Vec<String>) -> Self {
        Self::EntityNotSaved { kind, messages }
    }

    /// Creates an invalid parent error.
    pub fn invalid_parent(message: impl Into<String>) -> Self {
        Self::InvalidParent {
            message: message.into(),
        }
    }

    /// Creates a malformed query error.
    pub fn malformed_query(message: impl Into<String>) -> Self {
        Self::MalformedQuery {
            message: message.into(),
        }
    }

    /// Creates an unknown attribute error.
    pub fn unknown_attribute(kind: &'static str, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            kind,
            attribute: attribute.into(),
        }
    }

    /// Creates an attribute type error from a setter's mismatch report.
    pub fn attribute_type(
        kind: &'static str,
        attribute: impl Into<String>,
        mismatch: TypeMismatch,
    ) -> Self {
        Self::AttributeType {
            kind,
            attribute: attribute.into(),
            expected: mismatch.expected,
            found: mismatch.found,
        }
    }

    /// Creates a tracking misuse error.
    pub fn tracking_misuse(kind: &'static str, attribute: impl Into<String>) -> Self {
        Self::TrackingMisuse {
            kind,
            attribute: attribute.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the error came from the store and may succeed when
    /// the whole operation is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Store(e) if e.is_retryable())
    }
}
