//! Resource declarations.
//!
//! A [`ResourceDecl`] is everything the binder knows about a resource before
//! the registry is consulted: which canonical targets to wire, how canonical
//! aliases are renamed, the specs declared alongside the resource, its
//! resource-level hooks and the collaborators its operations run against.
//!
//! ```
//! use opchain_bind::{AliasPolicy, ResourceDecl, WiringPolicy};
//! use opchain_spec::Target;
//!
//! let decl = ResourceDecl::builder("widget")
//!     .wiring(WiringPolicy::all().exclude([Target::Clear]))
//!     .rename(Target::Create, "make")
//!     .alias_policy(AliasPolicy::Both)
//!     .build();
//!
//! assert_eq!(decl.name(), "widget");
//! assert!(!decl.wiring().wires(Target::Clear));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use opchain_spec::{
    CanonicalHandlers, Hook, NoCanonicalHandlers, OperationSpec, PassthroughSchemas,
    SchemaProvider, SpecOverride, Target, TransactionSource,
};

/// Which canonical targets a resource wires by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WiringMode {
    /// Every canonical target, narrowed by the exclude set.
    #[default]
    All,
    /// No canonical target.
    None,
    /// Only the include set, narrowed by the exclude set.
    Some,
}

/// Canonical wiring policy: a mode plus include and exclude sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WiringPolicy {
    mode: WiringMode,
    include: BTreeSet<Target>,
    exclude: BTreeSet<Target>,
}

impl WiringPolicy {
    /// Wires every canonical target.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Wires no canonical target.
    #[must_use]
    pub fn none() -> Self {
        Self {
            mode: WiringMode::None,
            ..Self::default()
        }
    }

    /// Wires exactly `targets`.
    #[must_use]
    pub fn some(targets: impl IntoIterator<Item = Target>) -> Self {
        Self {
            mode: WiringMode::Some,
            ..Self::default()
        }
        .include(targets)
    }

    /// Adds targets to the include set. Only meaningful in `Some` mode.
    #[must_use]
    pub fn include(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.include.extend(targets);
        self
    }

    /// Adds targets to the exclude set.
    #[must_use]
    pub fn exclude(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.exclude.extend(targets);
        self
    }

    /// Returns the mode.
    #[must_use]
    pub fn mode(&self) -> WiringMode {
        self.mode
    }

    /// Returns whether `target` gets a canonical spec.
    #[must_use]
    pub fn wires(&self, target: Target) -> bool {
        if !target.is_canonical() || self.exclude.contains(&target) {
            return false;
        }
        match self.mode {
            WiringMode::All => true,
            WiringMode::None => false,
            WiringMode::Some => self.include.contains(&target),
        }
    }

    /// Returns the wired targets in canonical order.
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        Target::CANONICAL.into_iter().filter(|t| self.wires(*t))
    }
}

/// How declared renames of canonical aliases are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AliasPolicy {
    /// The renamed spec replaces the canonical one.
    #[default]
    Rename,
    /// Both are kept. The renamed clone is callable and RPC-visible but has
    /// no wire route of its own.
    Both,
    /// Renames are ignored.
    CanonicalOnly,
}

/// Everything declared for one resource.
#[derive(Clone)]
pub struct ResourceDecl {
    name: String,
    wiring: WiringPolicy,
    alias_policy: AliasPolicy,
    renames: BTreeMap<Target, String>,
    canonical_overrides: BTreeMap<Target, SpecOverride>,
    specs: Vec<OperationSpec>,
    hooks: Vec<Hook>,
    handlers: Arc<dyn CanonicalHandlers>,
    schemas: Arc<dyn SchemaProvider>,
    transactions: Option<Arc<dyn TransactionSource>>,
}

impl ResourceDecl {
    /// Starts a declaration for `name`.
    pub fn builder(name: impl Into<String>) -> ResourceDeclBuilder {
        ResourceDeclBuilder {
            decl: ResourceDecl {
                name: name.into(),
                wiring: WiringPolicy::all(),
                alias_policy: AliasPolicy::Rename,
                renames: BTreeMap::new(),
                canonical_overrides: BTreeMap::new(),
                specs: Vec::new(),
                hooks: Vec::new(),
                handlers: Arc::new(NoCanonicalHandlers),
                schemas: Arc::new(PassthroughSchemas),
                transactions: None,
            },
        }
    }

    /// Returns the resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the canonical wiring policy.
    #[must_use]
    pub fn wiring(&self) -> &WiringPolicy {
        &self.wiring
    }

    /// Returns the alias policy.
    #[must_use]
    pub fn alias_policy(&self) -> AliasPolicy {
        self.alias_policy
    }

    /// Returns the requested canonical renames.
    #[must_use]
    pub fn renames(&self) -> &BTreeMap<Target, String> {
        &self.renames
    }

    /// Returns the per-target patches applied to canonical specs.
    #[must_use]
    pub fn canonical_overrides(&self) -> &BTreeMap<Target, SpecOverride> {
        &self.canonical_overrides
    }

    /// Returns the declared specs in declaration order.
    #[must_use]
    pub fn specs(&self) -> &[OperationSpec] {
        &self.specs
    }

    /// Returns the resource-level hooks.
    #[must_use]
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// Returns the canonical handler implementation.
    #[must_use]
    pub fn handlers(&self) -> &Arc<dyn CanonicalHandlers> {
        &self.handlers
    }

    /// Returns the schema provider.
    #[must_use]
    pub fn schemas(&self) -> &Arc<dyn SchemaProvider> {
        &self.schemas
    }

    /// Returns the transaction source, if the resource persists anywhere.
    #[must_use]
    pub fn transactions(&self) -> Option<&Arc<dyn TransactionSource>> {
        self.transactions.as_ref()
    }

    pub(crate) fn retain_hooks(&mut self, keep: impl FnMut(&Hook) -> bool) {
        self.hooks.retain(keep);
    }
}

impl core::fmt::Debug for ResourceDecl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceDecl")
            .field("name", &self.name)
            .field("wiring", &self.wiring)
            .field("alias_policy", &self.alias_policy)
            .field("renames", &self.renames)
            .field("specs", &self.specs.iter().map(OperationSpec::key).collect::<Vec<_>>())
            .field("hooks", &self.hooks.iter().map(Hook::name).collect::<Vec<_>>())
            .field("has_transactions", &self.transactions.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResourceDecl`].
#[derive(Debug)]
pub struct ResourceDeclBuilder {
    decl: ResourceDecl,
}

impl ResourceDeclBuilder {
    /// Sets the canonical wiring policy.
    #[must_use]
    pub fn wiring(mut self, wiring: WiringPolicy) -> Self {
        self.decl.wiring = wiring;
        self
    }

    /// Sets the alias policy.
    #[must_use]
    pub fn alias_policy(mut self, policy: AliasPolicy) -> Self {
        self.decl.alias_policy = policy;
        self
    }

    /// Renames the canonical spec of `target`.
    ///
    /// The alias is validated at resolution time. An invalid one keeps the
    /// canonical alias and records a diagnostic.
    #[must_use]
    pub fn rename(mut self, target: Target, alias: impl Into<String>) -> Self {
        self.decl.renames.insert(target, alias.into());
        self
    }

    /// Patches the canonical spec of `target`. The patch's alias, if any, is
    /// ignored; use [`rename`](Self::rename).
    #[must_use]
    pub fn canonical_override(mut self, target: Target, patch: SpecOverride) -> Self {
        self.decl.canonical_overrides.insert(target, patch);
        self
    }

    /// Declares an operation spec.
    #[must_use]
    pub fn spec(mut self, spec: OperationSpec) -> Self {
        self.decl.specs.push(spec);
        self
    }

    /// Declares a resource-level hook.
    #[must_use]
    pub fn hook(mut self, hook: Hook) -> Self {
        self.decl.hooks.push(hook);
        self
    }

    /// Sets the canonical handler implementation.
    #[must_use]
    pub fn handlers(mut self, handlers: impl CanonicalHandlers) -> Self {
        self.decl.handlers = Arc::new(handlers);
        self
    }

    /// Sets the schema provider.
    #[must_use]
    pub fn schemas(mut self, schemas: impl SchemaProvider) -> Self {
        self.decl.schemas = Arc::new(schemas);
        self
    }

    /// Sets the transaction source opened once per invocation.
    #[must_use]
    pub fn transactions(mut self, source: impl TransactionSource) -> Self {
        self.decl.transactions = Some(Arc::new(source));
        self
    }

    /// Finishes the declaration.
    #[must_use]
    pub fn build(self) -> ResourceDecl {
        self.decl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_mode_honors_exclude() {
        let policy = WiringPolicy::all().exclude([Target::Clear, Target::BulkDelete]);
        assert!(policy.wires(Target::Create));
        assert!(!policy.wires(Target::Clear));
        assert_eq!(policy.targets().count(), Target::CANONICAL.len() - 2);
    }

    #[test]
    fn some_mode_is_include_minus_exclude() {
        let policy = WiringPolicy::some([Target::Create, Target::Read, Target::List])
            .exclude([Target::List]);
        assert_eq!(
            policy.targets().collect::<Vec<_>>(),
            vec![Target::Create, Target::Read]
        );
    }

    #[test]
    fn none_mode_ignores_include() {
        let policy = WiringPolicy::none().include([Target::Create]);
        assert_eq!(policy.targets().count(), 0);
    }

    #[test]
    fn custom_is_never_wired() {
        assert!(!WiringPolicy::all().wires(Target::Custom));
        assert!(!WiringPolicy::some([Target::Custom]).wires(Target::Custom));
    }
}
