//! Property tests for spec resolution.
//!
//! Resources are generated with a random canonical wiring and a random list
//! of registered specs drawn from a small alias pool, so key collisions
//! between the layers are frequent.

use std::collections::{BTreeMap, BTreeSet};

use opchain_bind::{DiagnosticLog, ResourceDecl, SpecResolver, WiringPolicy};
use opchain_spec::{OpKey, OperationSpec, PersistPolicy, Target};
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATORS
// ═══════════════════════════════════════════════════════════════════════════════

const ALIASES: [&str; 4] = ["create", "read", "list", "archive"];

fn arb_target() -> impl Strategy<Value = Target> {
    prop::sample::select(vec![Target::Create, Target::Read, Target::List, Target::Delete])
}

fn arb_persist() -> impl Strategy<Value = PersistPolicy> {
    prop_oneof![
        Just(PersistPolicy::Default),
        Just(PersistPolicy::Always),
        Just(PersistPolicy::Skip),
    ]
}

fn arb_registered() -> impl Strategy<Value = Vec<OperationSpec>> {
    prop::collection::vec(
        (prop::sample::select(ALIASES.to_vec()), arb_target(), arb_persist()).prop_map(
            |(alias, target, persist)| {
                OperationSpec::builder(alias, target)
                    .persist(persist)
                    .build()
                    .unwrap()
            },
        ),
        0..12,
    )
}

fn arb_wiring() -> impl Strategy<Value = Vec<Target>> {
    prop::sample::subsequence(Target::CANONICAL.to_vec(), 0..=Target::CANONICAL.len())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn resolution_keeps_one_spec_per_key(
        wired in arb_wiring(),
        registered in arb_registered(),
    ) {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some(wired.iter().copied()))
            .build();
        let resolved = SpecResolver::new().resolve(&decl, &registered, &DiagnosticLog::new());

        let keys: Vec<OpKey> = resolved.iter().map(OperationSpec::key).collect();
        let unique: BTreeSet<&OpKey> = keys.iter().collect();
        prop_assert_eq!(unique.len(), keys.len());

        let expected: BTreeSet<OpKey> = wired
            .iter()
            .map(|t| OpKey::canonical(*t))
            .chain(registered.iter().map(OperationSpec::key))
            .collect();
        prop_assert_eq!(unique.into_iter().cloned().collect::<BTreeSet<_>>(), expected);
        prop_assert!(resolved.iter().all(|s| s.resource() == Some("widget")));
    }

    #[test]
    fn last_registered_spec_wins(
        wired in arb_wiring(),
        registered in arb_registered(),
    ) {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some(wired.iter().copied()))
            .build();
        let resolved = SpecResolver::new().resolve(&decl, &registered, &DiagnosticLog::new());

        let mut winners: BTreeMap<OpKey, PersistPolicy> = BTreeMap::new();
        for spec in &registered {
            winners.insert(spec.key(), spec.persist());
        }
        for spec in &resolved {
            match winners.get(&spec.key()) {
                Some(persist) => prop_assert_eq!(spec.persist(), *persist),
                None => prop_assert_eq!(spec.persist(), PersistPolicy::Default),
            }
        }
    }

    #[test]
    fn canonical_specs_keep_wiring_order(wired in arb_wiring()) {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some(wired.iter().copied()))
            .build();
        let resolved = SpecResolver::new().resolve(&decl, &[], &DiagnosticLog::new());

        let targets: Vec<Target> = resolved.iter().map(OperationSpec::target).collect();
        prop_assert_eq!(targets, wired);
    }
}
