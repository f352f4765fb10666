//! Error types for the Guardian domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each failure class has its own type so callers can decide whether a
//! failure blocks a single step, annotates a plan, or is retried.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Guardian operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Guardrails ---
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    // --- Dispatch ---
    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),

    #[error("Invalid parameters for '{action}': {reason}")]
    InvalidParams { action: String, reason: String },

    #[error("Step failed: {0}")]
    Step(#[from] StepError),

    // --- External services ---
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Persistence ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code used in [`ErrorEnvelope`].
    pub fn code(&self) -> &'static str {
        match self {
            Error::Policy(_) => "policy_violation",
            Error::UnknownAction(_) => "unknown_action",
            Error::InvalidParams { .. } => "invalid_params",
            Error::Step(e) => e.code(),
            Error::Adapter(e) => e.code(),
            Error::Config { .. } => "config",
            Error::Memory(_) => "memory",
            Error::Serialization(_) => "serialization",
            Error::Internal(_) => "internal",
        }
    }

    /// Wrap this error into the uniform envelope returned to callers.
    pub fn into_envelope(self, correlation_id: impl Into<String>) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code().to_string(),
            message: self.to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// A guardrail failure. Blocks a single step or becomes a plan annotation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Policy violation: {message}")]
pub struct PolicyViolation {
    pub message: String,
}

impl PolicyViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An action name with no registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

/// How an adapter failure is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterErrorKind {
    /// The request never produced a usable response (connect, timeout, 5xx).
    Transport,
    /// The service answered and refused the request.
    Service,
}

/// The uniform error shape surfaced by every adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind:?}: {message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl AdapterError {
    /// A retryable transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    /// A non-retryable service (business-logic) failure.
    pub fn service(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Service,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            AdapterErrorKind::Transport => "adapter_transport",
            AdapterErrorKind::Service => "adapter_service",
        }
    }

    /// Whether the bounded retry policy may re-issue the call.
    pub fn should_retry(&self) -> bool {
        self.kind == AdapterErrorKind::Transport && self.retryable
    }
}

/// Why a single step ended FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// The service call succeeded but the outcome failed a review gate.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl StepError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StepError::Cancelled(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            StepError::Policy(_) => "policy_violation",
            StepError::Adapter(e) => e.code(),
            StepError::Rejected(_) => "rejected",
            StepError::InvalidParams(_) => "invalid_params",
            StepError::Cancelled(_) => "cancelled",
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid history document: {0}")]
    InvalidHistory(String),
}

/// The envelope callers receive for any unrecoverable internal error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub correlation_id: String,
}
