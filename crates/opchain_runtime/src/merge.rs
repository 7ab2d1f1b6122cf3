//! Per-phase hook merging.
//!
//! Hooks reach an operation from four sources, from broadest to most
//! specific: global, resource, operation and imperative. Within a source,
//! hooks are stable-sorted by [`Hook::order`]. The sources are then
//! concatenated according to the phase's [`PhaseDirection`]:
//!
//! | Direction | Concatenation |
//! |-----------|---------------|
//! | enter | `global ++ resource ++ operation ++ imperative` |
//! | exit | `imperative ++ operation ++ resource ++ global` |
//!
//! [`HookMerger::build_chains`] merges every phase for one operation and
//! injects the engine's transaction steps.

use std::sync::Arc;

use opchain_spec::{BoxedStep, Hook, OperationSpec, Phase, PhaseDirection};

use crate::chain::{ChainStep, PhaseChain, PhaseChains, StepId};
use crate::steps::{BeginTransaction, CommitTransaction, MarkSkipPersist};

/// Origin of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookSource {
    /// Registered for every resource.
    Global,
    /// Declared on the resource.
    Resource,
    /// Declared on the operation spec.
    Operation,
    /// Registered at runtime against the resource.
    Imperative,
}

impl HookSource {
    /// Sources from broadest to most specific.
    pub const BROAD_TO_SPECIFIC: [HookSource; 4] = [
        HookSource::Global,
        HookSource::Resource,
        HookSource::Operation,
        HookSource::Imperative,
    ];

    /// Returns the concatenation order for `direction`.
    #[must_use]
    pub fn order_for(direction: PhaseDirection) -> [HookSource; 4] {
        let mut order = Self::BROAD_TO_SPECIFIC;
        if direction == PhaseDirection::Exit {
            order.reverse();
        }
        order
    }
}

/// Hooks from the four sources. Each list may span several phases.
#[derive(Debug, Clone, Default)]
pub struct HookSources {
    /// Hooks applying to every resource.
    pub global: Vec<Hook>,
    /// Hooks declared on the resource.
    pub resource: Vec<Hook>,
    /// Hooks declared on the operation.
    pub operation: Vec<Hook>,
    /// Hooks registered at runtime against the resource.
    pub imperative: Vec<Hook>,
}

impl HookSources {
    /// Returns the hooks of one source.
    #[must_use]
    pub fn get(&self, source: HookSource) -> &[Hook] {
        match source {
            HookSource::Global => &self.global,
            HookSource::Resource => &self.resource,
            HookSource::Operation => &self.operation,
            HookSource::Imperative => &self.imperative,
        }
    }

    /// Returns the hooks whose selector covers `alias`.
    #[must_use]
    pub fn selected(&self, alias: &str) -> HookSources {
        let pick = |hooks: &[Hook]| {
            hooks
                .iter()
                .filter(|h| h.selector().matches(alias))
                .cloned()
                .collect()
        };
        HookSources {
            global: pick(&self.global),
            resource: pick(&self.resource),
            operation: pick(&self.operation),
            imperative: pick(&self.imperative),
        }
    }
}

/// Computes ordered hook lists and complete phase chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookMerger;

impl HookMerger {
    /// Creates a merger.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the ordered hooks of `phase`.
    ///
    /// Hooks whose declared phase is not `phase` (or not a known phase at
    /// all) are ignored.
    #[must_use]
    pub fn merge_for_phase(&self, phase: Phase, sources: &HookSources) -> Vec<Hook> {
        self.merge_directed(phase, phase.direction(), sources)
    }

    /// Returns the ordered hooks of `phase` as if it had `direction`.
    #[must_use]
    pub fn merge_directed(
        &self,
        phase: Phase,
        direction: PhaseDirection,
        sources: &HookSources,
    ) -> Vec<Hook> {
        let mut merged = Vec::new();
        for source in HookSource::order_for(direction) {
            let mut hooks: Vec<Hook> = sources
                .get(source)
                .iter()
                .filter(|h| h.phase().is_ok_and(|p| p == phase))
                .cloned()
                .collect();
            hooks.sort_by_key(Hook::order);
            merged.extend(hooks);
        }
        merged
    }

    /// Builds every phase chain of `spec`.
    ///
    /// `sources` are filtered by the spec's alias first. The handler step is
    /// appended to the `HANDLER` chain after its hooks. Persisting operations
    /// get the begin step first in `START_TX` and the commit step last in
    /// `END_TX`; `persist = skip` operations get neither and instead start
    /// `PRE_TX_BEGIN` with the step that marks `skip_persist`.
    #[must_use]
    pub fn build_chains(
        &self,
        spec: &OperationSpec,
        sources: &HookSources,
        handler: BoxedStep,
    ) -> PhaseChains {
        let sources = sources.selected(spec.alias());
        let mut chains = PhaseChains::new(
            spec.key(),
            spec.persist(),
            spec.request_schema().cloned(),
            spec.response_schema().cloned(),
        );

        for phase in Phase::all() {
            let steps = self
                .merge_for_phase(phase, &sources)
                .iter()
                .map(ChainStep::from_hook)
                .collect();
            chains.insert(phase, PhaseChain::new(steps));
        }

        chains
            .entry(Phase::Handler)
            .push(ChainStep::system(StepId::handler(spec.target()), handler));

        if spec.persist().persists() {
            chains.entry(Phase::StartTx).prepend(ChainStep::system(
                StepId::system(StepId::BEGIN),
                Arc::new(BeginTransaction),
            ));
            chains.entry(Phase::EndTx).push(ChainStep::system(
                StepId::system(StepId::COMMIT),
                Arc::new(CommitTransaction),
            ));
        } else {
            chains.entry(Phase::PreTxBegin).prepend(ChainStep::system(
                StepId::system(StepId::SKIP_PERSIST),
                Arc::new(MarkSkipPersist),
            ));
        }

        chains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opchain_spec::{StepFn, Target};

    fn hook(name: &str, phase: Phase) -> Hook {
        Hook::new(name, phase, StepFn::sync(name.to_string(), |_| Ok(())))
    }

    fn names(hooks: &[Hook]) -> Vec<&str> {
        hooks.iter().map(Hook::name).collect()
    }

    fn sources() -> HookSources {
        HookSources {
            global: vec![hook("g", Phase::PreHandler), hook("g", Phase::PostHandler)],
            resource: vec![hook("r", Phase::PreHandler), hook("r", Phase::PostHandler)],
            operation: vec![hook("o", Phase::PreHandler), hook("o", Phase::PostHandler)],
            imperative: vec![hook("i", Phase::PreHandler), hook("i", Phase::PostHandler)],
        }
    }

    #[test]
    fn enter_phase_is_broad_to_specific() {
        let merged = HookMerger::new().merge_for_phase(Phase::PreHandler, &sources());
        assert_eq!(names(&merged), vec!["g", "r", "o", "i"]);
    }

    #[test]
    fn exit_phase_is_specific_to_broad() {
        let merged = HookMerger::new().merge_for_phase(Phase::PostHandler, &sources());
        assert_eq!(names(&merged), vec!["i", "o", "r", "g"]);
    }

    #[test]
    fn order_sorts_within_a_source_only() {
        let sources = HookSources {
            resource: vec![
                hook("r_late", Phase::PreCommit).with_order(5),
                hook("r_early", Phase::PreCommit).with_order(-1),
                hook("r_mid", Phase::PreCommit),
            ],
            global: vec![hook("g_late", Phase::PreCommit).with_order(100)],
            ..HookSources::default()
        };
        let merged = HookMerger::new().merge_for_phase(Phase::PreCommit, &sources);
        assert_eq!(names(&merged), vec!["g_late", "r_early", "r_mid", "r_late"]);
    }

    #[test]
    fn unknown_phase_names_never_merge() {
        let sources = HookSources {
            resource: vec![Hook::new("typo", "PRE_HANDLR", StepFn::sync("typo", |_| Ok(())))],
            ..HookSources::default()
        };
        for phase in Phase::all() {
            assert!(HookMerger::new().merge_for_phase(phase, &sources).is_empty());
        }
    }

    #[test]
    fn selector_limits_hooks_to_matching_aliases() {
        let sources = HookSources {
            resource: vec![
                hook("for_create", Phase::PreHandler).for_alias("create"),
                hook("for_read", Phase::PreHandler).for_alias("read"),
            ],
            ..HookSources::default()
        };
        let spec = OperationSpec::canonical("widget", Target::Create);
        let chains = HookMerger::new().build_chains(
            &spec,
            &sources,
            Arc::new(StepFn::sync("h", |_| Ok(()))),
        );
        assert_eq!(chains.get(Phase::PreHandler).ids(), vec![StepId::hook("for_create")]);
    }

    #[test]
    fn handler_runs_after_handler_hooks() {
        let sources = HookSources {
            operation: vec![hook("before", Phase::Handler)],
            ..HookSources::default()
        };
        let spec = OperationSpec::canonical("widget", Target::Create);
        let chains = HookMerger::new().build_chains(
            &spec,
            &sources,
            Arc::new(StepFn::sync("h", |_| Ok(()))),
        );
        assert_eq!(
            chains.get(Phase::Handler).ids(),
            vec![StepId::hook("before"), StepId::handler(Target::Create)]
        );
    }
}
