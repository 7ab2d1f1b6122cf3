//! Effective spec resolution.
//!
//! [`SpecResolver::resolve`] merges three layers into one list keyed by
//! [`OpKey`], each layer overwriting the previous on collision:
//!
//! 1. canonical specs for every wired target, with per-target patches and
//!    renames applied
//! 2. specs declared on the resource
//! 3. specs registered at runtime
//!
//! Every returned spec is stamped with the owning resource. Resolution never
//! fails: rejected renames and patches keep the original spec and are
//! reported to the [`DiagnosticLog`].

use indexmap::IndexMap;
use opchain_spec::{Exposure, OpKey, OperationSpec};

use crate::decl::{AliasPolicy, ResourceDecl};
use crate::diagnostics::{DiagnosticKind, DiagnosticLog};

/// Computes a resource's effective specs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecResolver;

impl SpecResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the effective specs of `decl` given the registry's specs.
    ///
    /// The result holds exactly one spec per key: the registry's if present,
    /// else the declared one, else the canonical one. Order is first
    /// appearance across the layers.
    #[must_use]
    pub fn resolve(
        &self,
        decl: &ResourceDecl,
        registered: &[OperationSpec],
        diagnostics: &DiagnosticLog,
    ) -> Vec<OperationSpec> {
        let resource = decl.name();
        let mut merged: IndexMap<OpKey, OperationSpec> = IndexMap::new();

        let canonical = self.canonical(decl, diagnostics);
        let declared = decl.specs().iter().map(|s| s.clone().stamped(resource));
        let registered = registered.iter().map(|s| s.clone().stamped(resource));

        for spec in canonical.into_iter().chain(declared).chain(registered) {
            merged.insert(spec.key(), spec);
        }

        tracing::debug!(resource, specs = merged.len(), "specs resolved");
        merged.into_values().collect()
    }

    /// Canonical layer: wired targets, patched then renamed.
    fn canonical(&self, decl: &ResourceDecl, diagnostics: &DiagnosticLog) -> Vec<OperationSpec> {
        let resource = decl.name();
        let mut specs = Vec::new();

        for target in decl.wiring().targets() {
            let mut spec = OperationSpec::canonical(resource, target);

            if let Some(patch) = decl.canonical_overrides().get(&target) {
                match patch.without_alias().apply(&spec) {
                    Ok(patched) => spec = patched,
                    Err(err) => {
                        diagnostics.record(
                            DiagnosticKind::InvalidOverride,
                            resource,
                            format!("override for {target} rejected, keeping canonical spec: {err}"),
                        );
                    }
                }
            }

            let Some(alias) = decl.renames().get(&target) else {
                specs.push(spec);
                continue;
            };

            match decl.alias_policy() {
                AliasPolicy::CanonicalOnly => {
                    tracing::debug!(resource, %target, alias, "rename ignored by alias policy");
                    specs.push(spec);
                }
                AliasPolicy::Rename => match spec.renamed(alias) {
                    Ok(renamed) => specs.push(renamed),
                    Err(err) => {
                        diagnostics.record(
                            DiagnosticKind::InvalidRename,
                            resource,
                            format!("keeping alias '{}': {err}", spec.alias()),
                        );
                        specs.push(spec);
                    }
                },
                AliasPolicy::Both => {
                    let renamed = spec.renamed(alias);
                    specs.push(spec.clone());
                    match renamed {
                        Ok(renamed) => {
                            let exposure = Exposure {
                                wire_route: false,
                                ..renamed.exposure()
                            };
                            specs.push(renamed.with_exposure(exposure));
                        }
                        Err(err) => {
                            diagnostics.record(
                                DiagnosticKind::InvalidRename,
                                resource,
                                format!("no alias added for {target}: {err}"),
                            );
                        }
                    }
                }
            }
        }

        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::WiringPolicy;
    use opchain_spec::{PersistPolicy, SpecOverride, StepFn, Target};

    fn keys(specs: &[OperationSpec]) -> Vec<String> {
        specs.iter().map(|s| s.key().to_string()).collect()
    }

    #[test]
    fn wiring_controls_canonical_layer() {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Create, Target::Read]))
            .build();
        let specs = SpecResolver::new().resolve(&decl, &[], &DiagnosticLog::new());
        assert_eq!(keys(&specs), vec!["create:create", "read:read"]);
        assert!(specs.iter().all(|s| s.resource() == Some("widget")));
    }

    #[test]
    fn valid_rename_replaces_canonical_alias() {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Create]))
            .rename(Target::Create, "make")
            .build();
        let specs = SpecResolver::new().resolve(&decl, &[], &DiagnosticLog::new());
        assert_eq!(keys(&specs), vec!["make:create"]);
    }

    #[test]
    fn invalid_rename_keeps_alias_and_records_diagnostic() {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Create]))
            .rename(Target::Create, "Make-It")
            .build();
        let log = DiagnosticLog::new();
        let specs = SpecResolver::new().resolve(&decl, &[], &log);

        assert_eq!(keys(&specs), vec!["create:create"]);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DiagnosticKind::InvalidRename);
    }

    #[test]
    fn both_policy_adds_routeless_alias() {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Create]))
            .rename(Target::Create, "make")
            .alias_policy(AliasPolicy::Both)
            .build();
        let specs = SpecResolver::new().resolve(&decl, &[], &DiagnosticLog::new());

        assert_eq!(keys(&specs), vec!["create:create", "make:create"]);
        assert!(specs[0].exposure().wire_route);
        assert!(!specs[1].exposure().wire_route);
        assert!(specs[1].exposure().callable);
    }

    #[test]
    fn canonical_only_ignores_renames() {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Create]))
            .rename(Target::Create, "make")
            .alias_policy(AliasPolicy::CanonicalOnly)
            .build();
        let specs = SpecResolver::new().resolve(&decl, &[], &DiagnosticLog::new());
        assert_eq!(keys(&specs), vec!["create:create"]);
    }

    #[test]
    fn canonical_override_patches_fields_but_not_alias() {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Delete]))
            .canonical_override(
                Target::Delete,
                SpecOverride::new().alias("remove").persist(PersistPolicy::Skip),
            )
            .build();
        let specs = SpecResolver::new().resolve(&decl, &[], &DiagnosticLog::new());
        assert_eq!(keys(&specs), vec!["delete:delete"]);
        assert_eq!(specs[0].persist(), PersistPolicy::Skip);
    }

    #[test]
    fn invalid_canonical_override_is_reported() {
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Read]))
            .canonical_override(
                Target::Read,
                SpecOverride::new().handler(StepFn::sync("nope", |_| Ok(()))),
            )
            .build();
        let log = DiagnosticLog::new();
        let specs = SpecResolver::new().resolve(&decl, &[], &log);
        assert!(specs[0].handler().is_none());
        assert_eq!(log.entries()[0].kind, DiagnosticKind::InvalidOverride);
    }

    #[test]
    fn later_layers_win_on_key_collision() {
        let declared = OperationSpec::builder("create", Target::Create)
            .persist(PersistPolicy::Always)
            .build()
            .unwrap();
        let registered = OperationSpec::builder("create", Target::Create)
            .persist(PersistPolicy::Skip)
            .build()
            .unwrap();
        let decl = ResourceDecl::builder("widget")
            .wiring(WiringPolicy::some([Target::Create, Target::Read]))
            .spec(declared)
            .build();

        let resolver = SpecResolver::new();
        let specs = resolver.resolve(&decl, &[], &DiagnosticLog::new());
        assert_eq!(specs[0].persist(), PersistPolicy::Always);

        let specs = resolver.resolve(&decl, &[registered], &DiagnosticLog::new());
        assert_eq!(keys(&specs), vec!["create:create", "read:read"]);
        assert_eq!(specs[0].persist(), PersistPolicy::Skip);
        assert_eq!(specs[0].resource(), Some("widget"));
    }
}
