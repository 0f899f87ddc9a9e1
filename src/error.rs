//! Engine error types
//!
//! This module provides the unified error taxonomy surfaced by every engine
//! command. Callers receive the error kind plus a human-readable message; no
//! internal identifiers or backtraces cross the boundary.

use thiserror::Error;

use crate::models::BookingStatus;

/// Severity attached to WORKFLOW_ERROR events. High-severity errors are
/// escalated to the admin topic in addition to the acting user's topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Engine-wide error type
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    // Lifecycle errors
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Concurrency errors
    #[error("Another transition is in flight for this booking")]
    Busy,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Deadline elapsed before the transition committed")]
    Expired,

    // Infrastructure errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Machine-readable error code for this error kind
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::Busy => "busy",
            Self::Conflict(_) => "conflict",
            Self::Expired => "expired",
            Self::Internal(_) => "internal",
        }
    }

    /// Severity used when the error is published as a WORKFLOW_ERROR event
    pub fn severity(&self) -> Severity {
        match self {
            Self::Internal(_) => Severity::High,
            _ => Severity::Low,
        }
    }

    /// Create a user-facing message (hides internals for infrastructure errors)
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(resource) => format!("{} not found", resource),
            Self::InvalidTransition { from, to } => {
                format!("A booking in status {} cannot move to {}", from, to)
            }
            Self::Validation(msg) => msg.clone(),
            Self::Unauthorized(msg) => msg.clone(),
            Self::Busy => "The booking is being updated, retry shortly".to_string(),
            Self::Conflict(msg) => msg.clone(),
            Self::Expired => "The request deadline elapsed".to_string(),
            Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Helper trait for converting Option to EngineError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> EngineResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> EngineResult<T> {
        self.ok_or_else(|| EngineError::NotFound(resource.into()))
    }
}
