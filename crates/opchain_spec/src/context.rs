//! Per-invocation execution state.
//!
//! An [`ExecutionContext`] is created fresh for every invocation and handed
//! mutably to each step the executor runs. Nothing in it is shared between
//! invocations.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};

use crate::error::OpError;
use crate::phase::Phase;
use crate::provider::TransactionProvider;
use crate::target::{Arity, Target};

/// Length of generated invocation identifiers.
const INVOCATION_ID_LEN: usize = 12;

// ─────────────────────────────────────────────────────────────────────────────
// CancelSignal
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-owned cancellation flag.
///
/// The executor checks it between phases, never inside a running step.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Env
// ─────────────────────────────────────────────────────────────────────────────

/// Static metadata about the operation being invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    /// Owning resource.
    pub resource: String,
    /// Public alias the caller used.
    pub alias: String,
    /// Canonical behavior family.
    pub target: Target,
    /// Member or collection.
    pub arity: Arity,
    /// Unique identifier of this invocation, for log correlation.
    pub invocation_id: String,
}

impl Env {
    /// Creates metadata for a new invocation with a fresh identifier.
    pub fn new(
        resource: impl Into<String>,
        alias: impl Into<String>,
        target: Target,
        arity: Arity,
    ) -> Self {
        Self {
            resource: resource.into(),
            alias: alias.into(),
            target,
            arity,
            invocation_id: nanoid::nanoid!(INVOCATION_ID_LEN),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExecutionContext
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable bag passed through every phase of one invocation.
pub struct ExecutionContext {
    /// Inbound payload. Replaced by the normalized value after validation.
    pub payload: Value,
    /// Result produced by the handler, reshaped by later phases.
    pub result: Option<Value>,
    /// Failure recorded by the executor when a phase fails.
    pub error: Option<OpError>,
    /// Identifiers extracted from the wire path, keyed by placeholder name.
    pub path_params: BTreeMap<String, String>,
    /// Operation metadata.
    pub env: Env,
    /// Transaction handle for this invocation, if the operation persists.
    pub transaction: Option<Arc<dyn TransactionProvider>>,
    /// Scratch space for hooks to pass values to later hooks.
    pub temp: Map<String, Value>,
    skip_persist: bool,
    phase: Option<Phase>,
    cancel: Option<CancelSignal>,
}

impl ExecutionContext {
    /// Creates a context for one invocation.
    #[must_use]
    pub fn new(env: Env, payload: Value) -> Self {
        Self {
            payload,
            result: None,
            error: None,
            path_params: BTreeMap::new(),
            env,
            transaction: None,
            temp: Map::new(),
            skip_persist: false,
            phase: None,
            cancel: None,
        }
    }

    /// Sets path parameters.
    #[must_use]
    pub fn with_path_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    /// Attaches a transaction handle.
    #[must_use]
    pub fn with_transaction(mut self, transaction: Arc<dyn TransactionProvider>) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Attaches a cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Returns whether persistence was skipped for this invocation.
    #[must_use]
    pub fn skip_persist(&self) -> bool {
        self.skip_persist
    }

    /// Marks the invocation as non-persisting.
    ///
    /// Once set, no begin or commit step runs for this invocation.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::Hook`] when called outside [`Phase::PreTxBegin`].
    pub fn mark_skip_persist(&mut self) -> Result<(), OpError> {
        match self.phase {
            Some(Phase::PreTxBegin) => {
                self.skip_persist = true;
                Ok(())
            }
            Some(phase) => Err(OpError::hook(format!(
                "skip_persist can only be set during {}, not {phase}",
                Phase::PreTxBegin
            ))),
            None => Err(OpError::hook(format!(
                "skip_persist can only be set during {}",
                Phase::PreTxBegin
            ))),
        }
    }

    /// Returns the phase currently running.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Records the phase about to run. Called by the executor.
    pub fn enter_phase(&mut self, phase: Phase) {
        self.phase = Some(phase);
    }

    /// Returns whether the caller requested cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    /// Returns the member identifier extracted under `param`, if any.
    #[must_use]
    pub fn path_param(&self, param: &str) -> Option<&str> {
        self.path_params.get(param).map(String::as_str)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("env", &self.env)
            .field("phase", &self.phase)
            .field("payload", &self.payload)
            .field("result", &self.result)
            .field("error", &self.error)
            .field("path_params", &self.path_params)
            .field("skip_persist", &self.skip_persist)
            .field("has_transaction", &self.transaction.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            Env::new("widget", "create", Target::Create, Arity::Collection),
            json!({"name": "a"}),
        )
    }

    #[test]
    fn skip_persist_only_in_pre_tx_begin() {
        let mut ctx = ctx();
        assert!(ctx.mark_skip_persist().is_err());

        ctx.enter_phase(Phase::PreHandler);
        let err = ctx.mark_skip_persist().unwrap_err();
        assert!(matches!(err, OpError::Hook(_)));
        assert!(!ctx.skip_persist());

        ctx.enter_phase(Phase::PreTxBegin);
        ctx.mark_skip_persist().unwrap();
        assert!(ctx.skip_persist());
    }

    #[test]
    fn cancel_signal_is_shared() {
        let signal = CancelSignal::new();
        let ctx = ctx().with_cancel(signal.clone());
        assert!(!ctx.is_cancelled());
        signal.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn invocation_ids_are_unique() {
        let a = Env::new("widget", "read", Target::Read, Arity::Member);
        let b = Env::new("widget", "read", Target::Read, Arity::Member);
        assert_ne!(a.invocation_id, b.invocation_id);
        assert_eq!(a.invocation_id.len(), INVOCATION_ID_LEN);
    }
}
