//! Bind-time diagnostics and introspection snapshots.
//!
//! Problems the binder tolerates instead of failing (an invalid rename, a
//! hook for an unknown phase, a failed rebind) are logged with `tracing` and
//! kept in a [`DiagnosticLog`]. Every bind re-derives the problems of the
//! whole resource, so the log keeps each distinct entry once. [`BindingSnapshot`] is the read-only view
//! of a binding used by tooling and tests; it is never used for execution.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use opchain_spec::{Arity, OpKey, PersistPolicy, Phase};
use parking_lot::Mutex;
use serde::Serialize;

/// Kind of tolerated problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A canonical rename was rejected; the canonical alias was kept.
    InvalidRename,
    /// A hook named a phase outside the fixed phase set and was dropped.
    UnknownHookPhase,
    /// A per-target canonical patch was rejected; the unpatched spec was kept.
    InvalidOverride,
    /// Two operations share an alias; the later one owns the callable entry.
    AliasShadowed,
    /// Two wire routes share a verb and path; the first one is kept.
    RouteConflict,
    /// A registry-triggered rebind failed; the previous binding stays.
    RebindFailed,
}

/// One tolerated problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// Resource being bound, or `*` for global hooks.
    pub resource: String,
    /// Human-readable detail.
    pub message: String,
}

/// Diagnostic store shared by one binder, in first-seen order.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<IndexSet<Diagnostic>>,
}

impl DiagnosticLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic and logs it the first time it is seen.
    ///
    /// Returns `false` when an identical entry is already recorded.
    pub fn record(&self, kind: DiagnosticKind, resource: &str, message: impl Into<String>) -> bool {
        let diagnostic = Diagnostic {
            kind,
            resource: resource.to_string(),
            message: message.into(),
        };
        let mut entries = self.entries.lock();
        if entries.contains(&diagnostic) {
            return false;
        }
        tracing::warn!(?kind, resource, "{}", diagnostic.message);
        entries.insert(diagnostic)
    }

    /// Returns a copy of every recorded diagnostic.
    #[must_use]
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Returns the diagnostics recorded for `resource`.
    #[must_use]
    pub fn for_resource(&self, resource: &str) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.resource == resource)
            .cloned()
            .collect()
    }

    /// Removes and returns every recorded diagnostic.
    pub fn drain(&self) -> Vec<Diagnostic> {
        self.entries.lock().drain(..).collect()
    }
}

/// Introspection view of one bound operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSnapshot {
    /// Dedupe key.
    pub key: OpKey,
    /// Arity.
    pub arity: Arity,
    /// Persistence policy.
    pub persist: PersistPolicy,
    /// Step identifiers of every non-empty phase, in execution order.
    pub chains: BTreeMap<Phase, Vec<String>>,
}

/// Introspection view of one resource binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSnapshot {
    /// Resource name.
    pub resource: String,
    /// How many times the resource has been bound.
    pub generation: u64,
    /// Effective operations in resolution order.
    pub operations: Vec<OperationSnapshot>,
    /// Wire routes as `"VERB /path"`.
    pub routes: Vec<String>,
    /// RPC method names.
    pub rpc_methods: Vec<String>,
}

impl BindingSnapshot {
    /// Returns the snapshot of the operation with `alias`.
    #[must_use]
    pub fn operation(&self, alias: &str) -> Option<&OperationSnapshot> {
        self.operations.iter().rev().find(|op| op.key.alias == alias)
    }

    /// Returns the step identifiers of one phase of `alias`.
    #[must_use]
    pub fn chain(&self, alias: &str, phase: Phase) -> Vec<String> {
        self.operation(alias)
            .and_then(|op| op.chains.get(&phase).cloned())
            .unwrap_or_default()
    }

    /// Renders the snapshot as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_filters_by_resource() {
        let log = DiagnosticLog::new();
        log.record(DiagnosticKind::InvalidRename, "widget", "bad alias");
        log.record(DiagnosticKind::UnknownHookPhase, "gadget", "typo");

        assert_eq!(log.entries().len(), 2);
        let widget = log.for_resource("widget");
        assert_eq!(widget.len(), 1);
        assert_eq!(widget[0].kind, DiagnosticKind::InvalidRename);

        assert_eq!(log.drain().len(), 2);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn identical_entries_are_kept_once() {
        let log = DiagnosticLog::new();
        assert!(log.record(DiagnosticKind::AliasShadowed, "widget", "create shadowed"));
        assert!(!log.record(DiagnosticKind::AliasShadowed, "widget", "create shadowed"));
        assert!(log.record(DiagnosticKind::AliasShadowed, "gadget", "create shadowed"));
        assert!(log.record(DiagnosticKind::RouteConflict, "widget", "create shadowed"));

        let kinds: Vec<_> = log.entries().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::AliasShadowed,
                DiagnosticKind::AliasShadowed,
                DiagnosticKind::RouteConflict
            ]
        );

        log.drain();
        assert!(log.record(DiagnosticKind::AliasShadowed, "widget", "create shadowed"));
    }
}
