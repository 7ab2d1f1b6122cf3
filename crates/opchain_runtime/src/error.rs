//! Invocation failures as seen by callers.

use core::fmt;

use opchain_spec::{OpError, Phase};
use thiserror::Error;

/// What happened to the invocation's side effects when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Failed before any transaction existed.
    NotStarted,
    /// The active transaction was rolled back.
    RolledBack,
    /// Failed inside the transactional window with no active transaction.
    NoTransaction,
    /// Failed after the transaction committed.
    Committed,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Disposition::NotStarted => "not started",
            Disposition::RolledBack => "rolled back",
            Disposition::NoTransaction => "no transaction",
            Disposition::Committed => "committed",
        };
        f.write_str(text)
    }
}

/// A failed invocation.
///
/// Carries the phase that failed, the [`Disposition`] of the transaction
/// and the original [`OpError`], unwrapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source} (during {phase}, {disposition})")]
pub struct InvocationError {
    /// Phase in which the failure was raised.
    pub phase: Phase,
    /// Fate of the transaction.
    pub disposition: Disposition,
    /// The error raised by the failing step.
    pub source: OpError,
}

impl InvocationError {
    /// Returns the original error.
    #[must_use]
    pub fn op_error(&self) -> &OpError {
        &self.source
    }

    /// Consumes the error, returning the original error.
    #[must_use]
    pub fn into_op_error(self) -> OpError {
        self.source
    }
}
