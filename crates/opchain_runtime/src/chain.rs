//! Built phase chains.
//!
//! A [`PhaseChains`] is the immutable snapshot the executor runs for one
//! operation: one [`PhaseChain`] per phase plus the schema references the
//! engine needs at validation and response-build time. Snapshots are shared
//! behind `Arc`, so an invocation keeps the chain it started with even if
//! the operation is rebound while it runs.

use core::fmt;
use std::collections::BTreeMap;

use opchain_spec::{
    BoxedStep, Hook, HookPredicate, OpKey, PersistPolicy, Phase, SchemaRef, Target,
};
use serde_json::Value;

static EMPTY_CHAIN: PhaseChain = PhaseChain { steps: Vec::new() };

// ─────────────────────────────────────────────────────────────────────────────
// StepId
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque identifier of a step inside a chain.
///
/// Engine steps are prefixed `sys:`, hook steps `hook:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepId(String);

impl StepId {
    /// The engine's transaction begin step.
    pub const BEGIN: &'static str = "sys:tx_begin";
    /// The engine's transaction commit step.
    pub const COMMIT: &'static str = "sys:tx_commit";
    /// The engine's step marking `skip_persist`.
    pub const SKIP_PERSIST: &'static str = "sys:skip_persist";

    /// Identifier of a hook step.
    #[must_use]
    pub fn hook(name: &str) -> Self {
        Self(format!("hook:{name}"))
    }

    /// Identifier of an engine step.
    #[must_use]
    pub fn system(name: &'static str) -> Self {
        Self(name.to_string())
    }

    /// Identifier of the core handler step for `target`.
    #[must_use]
    pub fn handler(target: Target) -> Self {
        Self(format!("sys:handler:{target}"))
    }

    /// Returns whether this is an engine step.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.0.starts_with("sys:")
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChainStep / PhaseChain
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of a phase chain.
#[derive(Clone)]
pub struct ChainStep {
    id: StepId,
    step: BoxedStep,
    predicate: Option<HookPredicate>,
}

impl ChainStep {
    /// Wraps a hook.
    #[must_use]
    pub fn from_hook(hook: &Hook) -> Self {
        Self {
            id: StepId::hook(hook.name()),
            step: hook.step().clone(),
            predicate: hook.predicate().cloned(),
        }
    }

    /// Wraps an engine step.
    #[must_use]
    pub fn system(id: StepId, step: BoxedStep) -> Self {
        Self {
            id,
            step,
            predicate: None,
        }
    }

    /// Returns the step identifier.
    #[must_use]
    pub fn id(&self) -> &StepId {
        &self.id
    }

    /// Returns the executable step.
    #[must_use]
    pub fn step(&self) -> &BoxedStep {
        &self.step
    }

    /// Returns whether the step runs for `payload`.
    #[must_use]
    pub fn accepts(&self, payload: &Value) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(payload))
    }
}

impl fmt::Debug for ChainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChainStep").field(&self.id).finish()
    }
}

/// Ordered steps of one phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseChain {
    steps: Vec<ChainStep>,
}

impl PhaseChain {
    /// Creates a chain from ordered steps.
    #[must_use]
    pub fn new(steps: Vec<ChainStep>) -> Self {
        Self { steps }
    }

    /// Inserts a step at the front.
    pub fn prepend(&mut self, step: ChainStep) {
        self.steps.insert(0, step);
    }

    /// Appends a step at the back.
    pub fn push(&mut self, step: ChainStep) {
        self.steps.push(step);
    }

    /// Iterates over the steps in run order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainStep> {
        self.steps.iter()
    }

    /// Returns the step identifiers in run order.
    #[must_use]
    pub fn ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns whether the chain has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PhaseChains
// ─────────────────────────────────────────────────────────────────────────────

/// Every phase chain of one bound operation.
#[derive(Debug, Clone)]
pub struct PhaseChains {
    key: OpKey,
    persist: PersistPolicy,
    request_schema: Option<SchemaRef>,
    response_schema: Option<SchemaRef>,
    chains: BTreeMap<Phase, PhaseChain>,
}

impl PhaseChains {
    pub(crate) fn new(
        key: OpKey,
        persist: PersistPolicy,
        request_schema: Option<SchemaRef>,
        response_schema: Option<SchemaRef>,
    ) -> Self {
        Self {
            key,
            persist,
            request_schema,
            response_schema,
            chains: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, phase: Phase, chain: PhaseChain) {
        self.chains.insert(phase, chain);
    }

    pub(crate) fn entry(&mut self, phase: Phase) -> &mut PhaseChain {
        self.chains.entry(phase).or_default()
    }

    /// Returns the operation key.
    #[must_use]
    pub fn key(&self) -> &OpKey {
        &self.key
    }

    /// Returns the persistence policy the chains were built for.
    #[must_use]
    pub fn persist(&self) -> PersistPolicy {
        self.persist
    }

    /// Returns the request schema validated at handler entry.
    #[must_use]
    pub fn request_schema(&self) -> Option<&SchemaRef> {
        self.request_schema.as_ref()
    }

    /// Returns the response schema used to build the response.
    #[must_use]
    pub fn response_schema(&self) -> Option<&SchemaRef> {
        self.response_schema.as_ref()
    }

    /// Returns the chain of `phase`; empty if nothing was merged into it.
    #[must_use]
    pub fn get(&self, phase: Phase) -> &PhaseChain {
        self.chains.get(&phase).unwrap_or(&EMPTY_CHAIN)
    }

    /// Returns whether `phase` has at least one step.
    #[must_use]
    pub fn has_steps(&self, phase: Phase) -> bool {
        !self.get(phase).is_empty()
    }

    /// Returns the step identifiers of every non-empty phase.
    #[must_use]
    pub fn step_ids(&self) -> BTreeMap<Phase, Vec<StepId>> {
        self.chains
            .iter()
            .filter(|(_, chain)| !chain.is_empty())
            .map(|(phase, chain)| (*phase, chain.ids()))
            .collect()
    }
}
