//! Error types for operations and the registry.

use thiserror::Error;

/// Classified failure raised while resolving or running an operation.
///
/// Every variant carries a human-readable message. The type is `Clone` so
/// the executor can record the failure in the execution context and still
/// return the original value to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// Invalid alias rename or malformed specification.
    #[error("spec conflict: {0}")]
    SpecConflict(String),

    /// The schema provider rejected a payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// Business logic failed during the handler phase.
    #[error("handler error: {0}")]
    Handler(String),

    /// Begin, commit or rollback failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A hook step broke its phase contract or failed.
    #[error("hook error: {0}")]
    Hook(String),

    /// Response shaping failed. Recovered locally by the executor.
    #[error("response shaping error: {0}")]
    ResponseShaping(String),

    /// The caller cancelled the invocation between phases.
    #[error("invocation cancelled before {0}")]
    Cancelled(String),
}

impl OpError {
    /// Creates a [`SpecConflict`](Self::SpecConflict).
    pub fn spec_conflict(msg: impl Into<String>) -> Self {
        Self::SpecConflict(msg.into())
    }

    /// Creates a [`Validation`](Self::Validation).
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a [`Handler`](Self::Handler).
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Creates a [`Transaction`](Self::Transaction).
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a [`Hook`](Self::Hook).
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// Creates a [`ResponseShaping`](Self::ResponseShaping).
    pub fn response_shaping(msg: impl Into<String>) -> Self {
        Self::ResponseShaping(msg.into())
    }

    /// Returns a short, stable name for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpecConflict(_) => "spec_conflict",
            Self::Validation(_) => "validation",
            Self::Handler(_) => "handler",
            Self::Transaction(_) => "transaction",
            Self::Hook(_) => "hook",
            Self::ResponseShaping(_) => "response_shaping",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Errors raised by registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No registered spec carries the alias being overridden.
    #[error("no registered operation with alias '{0}'")]
    UnknownAlias(String),

    /// The patched spec is invalid.
    #[error(transparent)]
    Invalid(#[from] OpError),
}
