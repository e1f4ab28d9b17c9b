//! Domain error model.

use thiserror::Error;

/// Result type used across the engine.
pub type DomainResult<T> = Result<T, DomainError>;

/// Engine-level error.
///
/// Every failure is an expected outcome returned as a value. Nothing here is
/// retried and nothing is fatal: the caller branches on the variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller input is malformed (bad quantity, price, rate, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Strategy or workflow parameters are malformed (e.g. unsorted tiers).
    ///
    /// Raised when the configuration is built, never from a later compute call.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No pricing strategy produced a price.
    #[error("no price available: {0}")]
    Pricing(String),

    /// The event is not legal from the current workflow state.
    #[error("event '{event}' is not allowed from state '{from}'")]
    InvalidTransition { from: String, event: String },

    /// The event is legal in principle but a business condition blocks it.
    ///
    /// The message is meant to be shown to the user as-is.
    #[error("{0}")]
    GuardRejected(String),

    /// A document invariant was violated (e.g. editing a non-editable document).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (duplicate identifier, document already created).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn pricing(msg: impl Into<String>) -> Self {
        Self::Pricing(msg.into())
    }

    pub fn invalid_transition(from: impl Into<String>, event: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            event: event.into(),
        }
    }

    pub fn guard_rejected(reason: impl Into<String>) -> Self {
        Self::GuardRejected(reason.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejection_message_is_the_bare_reason() {
        let err = DomainError::guard_rejected("total must be greater than zero");
        assert_eq!(err.to_string(), "total must be greater than zero");
    }

    #[test]
    fn invalid_transition_names_state_and_event() {
        let err = DomainError::invalid_transition("paid", "void");
        assert_eq!(
            err.to_string(),
            "event 'void' is not allowed from state 'paid'"
        );
    }
}
