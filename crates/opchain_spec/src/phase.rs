//! Phase names for the invocation lifecycle.
//!
//! A phase is a named stage an invocation passes through. Hooks attach to a
//! phase; the executor runs each phase's merged hook chain in a fixed order.
//!
//! # Direction
//!
//! Every phase is either **enter-like** or **exit-like**. The direction
//! controls how hooks from the four sources (global, resource, operation,
//! imperative) are concatenated:
//!
//! - enter-like: `global ++ resource ++ operation ++ imperative`
//! - exit-like: `imperative ++ operation ++ resource ++ global`

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Merge direction of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseDirection {
    /// Broad-to-specific: the most general hook runs first.
    Enter,
    /// Specific-to-broad: the most specific hook runs first.
    Exit,
}

impl PhaseDirection {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            PhaseDirection::Enter => PhaseDirection::Exit,
            PhaseDirection::Exit => PhaseDirection::Enter,
        }
    }
}

/// Error returned for a phase name outside the fixed phase set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase '{0}'")]
pub struct UnknownPhase(pub String);

/// A named stage of the invocation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────
    /// Before any transaction exists. The only phase allowed to set
    /// `skip_persist`.
    PreTxBegin,
    /// Transaction begin. Prefixed with the engine's begin step for
    /// persisting operations.
    StartTx,
    /// Inside the transaction, before the core handler. Inbound payload
    /// validation happens at entry.
    PreHandler,
    /// The core handler. Hooks run before the handler step.
    Handler,
    /// Inside the transaction, after the core handler.
    PostHandler,
    /// Last chance to act before commit.
    PreCommit,
    /// Transaction commit. Suffixed with the engine's commit step for
    /// persisting operations.
    EndTx,
    /// After commit. Failures are not rolled back.
    PostCommit,
    /// Response shaping. Failures are non-fatal.
    PostResponse,
    /// Runs last, on success and on failure.
    Final,

    // ─────────────────────────────────────────────────────────────────────────
    // Error routing
    // ─────────────────────────────────────────────────────────────────────────
    /// Fallback for any failing phase without its own error hooks.
    OnError,
    /// Failure during [`Phase::PreTxBegin`].
    OnPreTxBeginError,
    /// Failure during [`Phase::StartTx`].
    OnStartTxError,
    /// Failure during [`Phase::PreHandler`].
    OnPreHandlerError,
    /// Failure during [`Phase::Handler`].
    OnHandlerError,
    /// Failure during [`Phase::PostHandler`].
    OnPostHandlerError,
    /// Failure during [`Phase::PreCommit`].
    OnPreCommitError,
    /// Failure during [`Phase::EndTx`].
    OnCommitError,
    /// Failure during [`Phase::PostCommit`].
    OnPostCommitError,
    /// Failure during [`Phase::PostResponse`].
    OnPostResponseError,
    /// After a transaction was rolled back.
    OnRollback,
}

impl Phase {
    /// Lifecycle phases in execution order.
    pub const LIFECYCLE: [Phase; 10] = [
        Phase::PreTxBegin,
        Phase::StartTx,
        Phase::PreHandler,
        Phase::Handler,
        Phase::PostHandler,
        Phase::PreCommit,
        Phase::EndTx,
        Phase::PostCommit,
        Phase::PostResponse,
        Phase::Final,
    ];

    /// Error-routing phases.
    pub const ERROR: [Phase; 11] = [
        Phase::OnError,
        Phase::OnPreTxBeginError,
        Phase::OnStartTxError,
        Phase::OnPreHandlerError,
        Phase::OnHandlerError,
        Phase::OnPostHandlerError,
        Phase::OnPreCommitError,
        Phase::OnCommitError,
        Phase::OnPostCommitError,
        Phase::OnPostResponseError,
        Phase::OnRollback,
    ];

    /// Iterates over every phase, lifecycle first.
    pub fn all() -> impl Iterator<Item = Phase> {
        Self::LIFECYCLE.into_iter().chain(Self::ERROR)
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::PreTxBegin => "PRE_TX_BEGIN",
            Phase::StartTx => "START_TX",
            Phase::PreHandler => "PRE_HANDLER",
            Phase::Handler => "HANDLER",
            Phase::PostHandler => "POST_HANDLER",
            Phase::PreCommit => "PRE_COMMIT",
            Phase::EndTx => "END_TX",
            Phase::PostCommit => "POST_COMMIT",
            Phase::PostResponse => "POST_RESPONSE",
            Phase::Final => "FINAL",
            Phase::OnError => "ON_ERROR",
            Phase::OnPreTxBeginError => "ON_PRE_TX_BEGIN_ERROR",
            Phase::OnStartTxError => "ON_START_TX_ERROR",
            Phase::OnPreHandlerError => "ON_PRE_HANDLER_ERROR",
            Phase::OnHandlerError => "ON_HANDLER_ERROR",
            Phase::OnPostHandlerError => "ON_POST_HANDLER_ERROR",
            Phase::OnPreCommitError => "ON_PRE_COMMIT_ERROR",
            Phase::OnCommitError => "ON_COMMIT_ERROR",
            Phase::OnPostCommitError => "ON_POST_COMMIT_ERROR",
            Phase::OnPostResponseError => "ON_POST_RESPONSE_ERROR",
            Phase::OnRollback => "ON_ROLLBACK",
        }
    }

    /// Returns the merge direction of the phase.
    #[must_use]
    pub const fn direction(self) -> PhaseDirection {
        match self {
            Phase::PreTxBegin
            | Phase::StartTx
            | Phase::PreHandler
            | Phase::Handler
            | Phase::PreCommit => PhaseDirection::Enter,
            _ => PhaseDirection::Exit,
        }
    }

    /// Returns whether the phase is part of error routing.
    #[must_use]
    pub const fn is_error_phase(self) -> bool {
        matches!(
            self,
            Phase::OnError
                | Phase::OnPreTxBeginError
                | Phase::OnStartTxError
                | Phase::OnPreHandlerError
                | Phase::OnHandlerError
                | Phase::OnPostHandlerError
                | Phase::OnPreCommitError
                | Phase::OnCommitError
                | Phase::OnPostCommitError
                | Phase::OnPostResponseError
                | Phase::OnRollback
        )
    }

    /// Returns the phase-specific error phase for a lifecycle phase.
    ///
    /// `Final` and the error phases themselves have none.
    #[must_use]
    pub const fn error_phase(self) -> Option<Phase> {
        match self {
            Phase::PreTxBegin => Some(Phase::OnPreTxBeginError),
            Phase::StartTx => Some(Phase::OnStartTxError),
            Phase::PreHandler => Some(Phase::OnPreHandlerError),
            Phase::Handler => Some(Phase::OnHandlerError),
            Phase::PostHandler => Some(Phase::OnPostHandlerError),
            Phase::PreCommit => Some(Phase::OnPreCommitError),
            Phase::EndTx => Some(Phase::OnCommitError),
            Phase::PostCommit => Some(Phase::OnPostCommitError),
            Phase::PostResponse => Some(Phase::OnPostResponseError),
            _ => None,
        }
    }

    /// Returns whether a failure in this phase happens inside the
    /// transaction and must be rolled back.
    #[must_use]
    pub const fn rolls_back(self) -> bool {
        matches!(
            self,
            Phase::StartTx
                | Phase::PreHandler
                | Phase::Handler
                | Phase::PostHandler
                | Phase::PreCommit
                | Phase::EndTx
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::all()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_phase_parses_from_its_name() {
        for phase in Phase::all() {
            assert_eq!(phase.as_str().parse::<Phase>(), Ok(phase));
        }
    }

    #[test]
    fn unknown_phase_is_rejected() {
        assert_eq!(
            "PRE_FLIGHT".parse::<Phase>(),
            Err(UnknownPhase("PRE_FLIGHT".to_string()))
        );
        assert!("pre_handler".parse::<Phase>().is_err());
    }

    #[test]
    fn enter_like_phases() {
        let enter: Vec<_> = Phase::all()
            .filter(|p| p.direction() == PhaseDirection::Enter)
            .collect();
        assert_eq!(
            enter,
            vec![
                Phase::PreTxBegin,
                Phase::StartTx,
                Phase::PreHandler,
                Phase::Handler,
                Phase::PreCommit
            ]
        );
    }

    #[test]
    fn error_phases_are_exit_like() {
        for phase in Phase::ERROR {
            assert!(phase.is_error_phase());
            assert_eq!(phase.direction(), PhaseDirection::Exit);
        }
    }

    #[test]
    fn commit_failures_route_to_on_commit_error() {
        assert_eq!(Phase::EndTx.error_phase(), Some(Phase::OnCommitError));
        assert_eq!(Phase::Final.error_phase(), None);
        assert_eq!(Phase::OnError.error_phase(), None);
    }

    #[test]
    fn serde_uses_upper_snake_case() {
        let json = serde_json::to_string(&Phase::PostResponse).unwrap();
        assert_eq!(json, "\"POST_RESPONSE\"");
    }
}
