//! Property tests for hook merging and transaction step injection.
//!
//! Hooks are generated as `(source, order, phase)` triples with unique names
//! so every merged list can be traced back to where each hook came from.

use std::collections::HashMap;
use std::sync::Arc;

use opchain_runtime::{HookMerger, HookSource, HookSources, StepId};
use opchain_spec::{
    Hook, OperationSpec, PersistPolicy, Phase, PhaseDirection, StepFn, Target,
};
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct HookSpec {
    source: HookSource,
    order: i32,
    phase: Phase,
}

fn arb_source() -> impl Strategy<Value = HookSource> {
    prop::sample::select(HookSource::BROAD_TO_SPECIFIC.to_vec())
}

fn arb_phase() -> impl Strategy<Value = Phase> {
    prop::sample::select(Phase::all().collect::<Vec<_>>())
}

fn arb_hooks() -> impl Strategy<Value = Vec<HookSpec>> {
    prop::collection::vec(
        (arb_source(), -2..=2i32, arb_phase()).prop_map(|(source, order, phase)| HookSpec {
            source,
            order,
            phase,
        }),
        0..24,
    )
}

fn arb_persist() -> impl Strategy<Value = PersistPolicy> {
    prop_oneof![
        Just(PersistPolicy::Default),
        Just(PersistPolicy::Always),
        Just(PersistPolicy::Skip),
    ]
}

/// Builds the sources and a name to source lookup.
fn materialize(specs: &[HookSpec]) -> (HookSources, HashMap<String, (HookSource, i32, usize)>) {
    let mut sources = HookSources::default();
    let mut origin = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        let name = format!("h{i}");
        let hook = Hook::new(
            name.clone(),
            spec.phase,
            StepFn::sync(name.clone(), |_| Ok(())),
        )
        .with_order(spec.order);
        origin.insert(name, (spec.source, spec.order, i));
        match spec.source {
            HookSource::Global => sources.global.push(hook),
            HookSource::Resource => sources.resource.push(hook),
            HookSource::Operation => sources.operation.push(hook),
            HookSource::Imperative => sources.imperative.push(hook),
        }
    }
    (sources, origin)
}

fn rank(source: HookSource) -> usize {
    HookSource::BROAD_TO_SPECIFIC
        .iter()
        .position(|s| *s == source)
        .unwrap_or(usize::MAX)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Merged hooks are grouped by source in direction order, and within a
    /// source sorted by order with declaration order breaking ties.
    #[test]
    fn merge_groups_by_source_then_order(specs in arb_hooks(), phase in arb_phase()) {
        let (sources, origin) = materialize(&specs);
        let merged = HookMerger::new().merge_for_phase(phase, &sources);

        let expected_len = specs.iter().filter(|s| s.phase == phase).count();
        prop_assert_eq!(merged.len(), expected_len);

        let keys: Vec<(usize, i32, usize)> = merged
            .iter()
            .map(|h| {
                let (source, order, index) = origin[h.name()];
                let rank = match phase.direction() {
                    PhaseDirection::Enter => rank(source),
                    PhaseDirection::Exit => 3 - rank(source),
                };
                (rank, order, index)
            })
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        prop_assert_eq!(keys, sorted);
    }

    /// Flipping the direction reverses the source groups but keeps each
    /// group's internal order.
    #[test]
    fn exit_reverses_source_groups(specs in arb_hooks(), phase in arb_phase()) {
        let (sources, origin) = materialize(&specs);
        let merger = HookMerger::new();
        let enter = merger.merge_directed(phase, PhaseDirection::Enter, &sources);
        let exit = merger.merge_directed(phase, PhaseDirection::Exit, &sources);

        let groups = |hooks: &[Hook]| {
            let mut groups: Vec<(HookSource, Vec<String>)> = Vec::new();
            for hook in hooks {
                let source = origin[hook.name()].0;
                match groups.last_mut() {
                    Some((last, names)) if *last == source => names.push(hook.name().to_string()),
                    _ => groups.push((source, vec![hook.name().to_string()])),
                }
            }
            groups
        };

        let mut reversed = groups(&exit);
        reversed.reverse();
        prop_assert_eq!(groups(&enter), reversed);
    }

    /// Persisting operations get exactly one begin step at the head of
    /// `START_TX` and one commit step at the tail of `END_TX`. Skipped
    /// operations get neither and start `PRE_TX_BEGIN` with the skip step.
    #[test]
    fn transaction_steps_follow_persist_policy(specs in arb_hooks(), persist in arb_persist()) {
        let (sources, _) = materialize(&specs);
        let spec = OperationSpec::builder("create", Target::Create)
            .persist(persist)
            .build()
            .unwrap();
        let chains = HookMerger::new().build_chains(
            &spec,
            &sources,
            Arc::new(StepFn::sync("handler", |_| Ok(()))),
        );
        let ids = chains.step_ids();
        let count = |id: &str| ids.values().flatten().filter(|s| **s == id).count();

        if persist.persists() {
            prop_assert_eq!(count(StepId::BEGIN), 1);
            prop_assert_eq!(count(StepId::COMMIT), 1);
            prop_assert_eq!(count(StepId::SKIP_PERSIST), 0);
            prop_assert_eq!(
                ids[&Phase::StartTx].first(),
                Some(&StepId::system(StepId::BEGIN))
            );
            prop_assert_eq!(
                ids[&Phase::EndTx].last(),
                Some(&StepId::system(StepId::COMMIT))
            );
        } else {
            prop_assert_eq!(count(StepId::BEGIN), 0);
            prop_assert_eq!(count(StepId::COMMIT), 0);
            prop_assert_eq!(
                ids[&Phase::PreTxBegin].first(),
                Some(&StepId::system(StepId::SKIP_PERSIST))
            );
        }

        prop_assert_eq!(
            ids[&Phase::Handler].last(),
            Some(&StepId::handler(Target::Create))
        );
        let hook_steps = ids.values().flatten().filter(|s| !s.is_system()).count();
        prop_assert_eq!(hook_steps, specs.len());
    }
}
