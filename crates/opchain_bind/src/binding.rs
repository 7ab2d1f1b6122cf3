//! Bound artifacts of one resource.
//!
//! A [`ResourceBinding`] is an immutable snapshot produced by one bind. The
//! binder swaps in a new snapshot on every rebind; invocations already
//! holding the previous one finish with it. Per-operation artifacts are
//! shared through [`Arc`], so a targeted rebind carries untouched operations
//! over without copying them.

use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use opchain_runtime::{Executor, PhaseChains};
use opchain_spec::{BoxedStep, OpKey, OperationSpec, SchemaRef};

use crate::diagnostics::{BindingSnapshot, OperationSnapshot};
use crate::routes::RouteTable;

// ─────────────────────────────────────────────────────────────────────────────
// SpecIndex
// ─────────────────────────────────────────────────────────────────────────────

/// Effective specs of a resource, indexed three ways.
#[derive(Debug, Clone, Default)]
pub struct SpecIndex {
    all: Vec<OperationSpec>,
    by_key: IndexMap<OpKey, usize>,
    by_alias: IndexMap<String, Vec<usize>>,
}

impl SpecIndex {
    /// Indexes `specs`, which must already be unique per key.
    #[must_use]
    pub fn new(specs: Vec<OperationSpec>) -> Self {
        let mut by_key = IndexMap::new();
        let mut by_alias: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (i, spec) in specs.iter().enumerate() {
            by_key.insert(spec.key(), i);
            by_alias.entry(spec.alias().to_string()).or_default().push(i);
        }
        Self {
            all: specs,
            by_key,
            by_alias,
        }
    }

    /// Returns every spec in resolution order.
    #[must_use]
    pub fn all(&self) -> &[OperationSpec] {
        &self.all
    }

    /// Returns the spec for `key`.
    #[must_use]
    pub fn by_key(&self, key: &OpKey) -> Option<&OperationSpec> {
        self.by_key.get(key).map(|i| &self.all[*i])
    }

    /// Returns every spec with `alias`, in resolution order.
    pub fn by_alias(&self, alias: &str) -> impl Iterator<Item = &OperationSpec> + '_ {
        self.by_alias
            .get(alias)
            .into_iter()
            .flatten()
            .map(|i| &self.all[*i])
    }

    /// Returns whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &OpKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Returns the number of specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Returns whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BoundOperation
// ─────────────────────────────────────────────────────────────────────────────

/// Per-key artifacts: the spec, its schemas, its handler entry point and its
/// phase chains.
#[derive(Clone)]
pub struct BoundOperation {
    pub(crate) spec: OperationSpec,
    pub(crate) handler: BoxedStep,
    pub(crate) chains: Arc<PhaseChains>,
}

impl BoundOperation {
    /// Returns the spec the artifacts were built from.
    #[must_use]
    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    /// Returns the request schema reference.
    #[must_use]
    pub fn request_schema(&self) -> Option<&SchemaRef> {
        self.chains.request_schema()
    }

    /// Returns the response schema reference.
    #[must_use]
    pub fn response_schema(&self) -> Option<&SchemaRef> {
        self.chains.response_schema()
    }

    /// Returns the handler entry point.
    #[must_use]
    pub fn handler(&self) -> &BoxedStep {
        &self.handler
    }

    /// Returns the phase chains.
    #[must_use]
    pub fn chains(&self) -> &Arc<PhaseChains> {
        &self.chains
    }
}

impl core::fmt::Debug for BoundOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundOperation")
            .field("key", &self.spec.key())
            .field("handler", &self.handler.name())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceBinding
// ─────────────────────────────────────────────────────────────────────────────

/// Everything bound for one resource.
#[derive(Clone)]
pub struct ResourceBinding {
    pub(crate) resource: String,
    pub(crate) generation: u64,
    pub(crate) index: SpecIndex,
    pub(crate) operations: HashMap<OpKey, Arc<BoundOperation>>,
    pub(crate) callables: IndexMap<String, OpKey>,
    pub(crate) rpc: IndexMap<String, OpKey>,
    pub(crate) routes: Arc<RouteTable>,
    pub(crate) executor: Executor,
}

impl ResourceBinding {
    pub(crate) fn empty(resource: &str, executor: Executor) -> Self {
        Self {
            resource: resource.to_string(),
            generation: 0,
            index: SpecIndex::default(),
            operations: HashMap::new(),
            callables: IndexMap::new(),
            rpc: IndexMap::new(),
            routes: Arc::new(RouteTable::default()),
            executor,
        }
    }

    /// Returns the resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns how many binds produced this snapshot.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the effective spec index.
    #[must_use]
    pub fn specs(&self) -> &SpecIndex {
        &self.index
    }

    /// Returns the artifacts bound for `key`.
    #[must_use]
    pub fn operation(&self, key: &OpKey) -> Option<&Arc<BoundOperation>> {
        self.operations.get(key)
    }

    /// Returns the phase chains bound for `key`.
    #[must_use]
    pub fn chains(&self, key: &OpKey) -> Option<Arc<PhaseChains>> {
        self.operations.get(key).map(|op| Arc::clone(&op.chains))
    }

    /// Returns the callable entry for `alias`, ignoring exposure.
    #[must_use]
    pub fn resolve_alias(&self, alias: &str) -> Option<&Arc<BoundOperation>> {
        self.index
            .by_alias(alias)
            .last()
            .and_then(|spec| self.operations.get(&spec.key()))
    }

    /// Returns the key callable as `alias`.
    #[must_use]
    pub fn callable(&self, alias: &str) -> Option<&OpKey> {
        self.callables.get(alias)
    }

    /// Returns every callable alias.
    pub fn callable_aliases(&self) -> impl Iterator<Item = &str> + '_ {
        self.callables.keys().map(String::as_str)
    }

    /// Returns the key for an RPC `method` (`"{resource}.{alias}"`).
    #[must_use]
    pub fn rpc_method(&self, method: &str) -> Option<&OpKey> {
        self.rpc.get(method)
    }

    /// Returns every RPC method name.
    pub fn rpc_methods(&self) -> impl Iterator<Item = &str> + '_ {
        self.rpc.keys().map(String::as_str)
    }

    /// Returns the wire route table.
    #[must_use]
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Returns the executor operations of this resource run on.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Returns the introspection view of this binding.
    #[must_use]
    pub fn snapshot(&self) -> BindingSnapshot {
        let operations = self
            .index
            .all()
            .iter()
            .filter_map(|spec| self.operations.get(&spec.key()))
            .map(|op| OperationSnapshot {
                key: op.spec.key(),
                arity: op.spec.arity(),
                persist: op.spec.persist(),
                chains: op
                    .chains
                    .step_ids()
                    .into_iter()
                    .map(|(phase, ids)| (phase, ids.iter().map(ToString::to_string).collect()))
                    .collect(),
            })
            .collect();

        BindingSnapshot {
            resource: self.resource.clone(),
            generation: self.generation,
            operations,
            routes: self.routes.routes().iter().map(ToString::to_string).collect(),
            rpc_methods: self.rpc.keys().cloned().collect(),
        }
    }
}

impl core::fmt::Debug for ResourceBinding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceBinding")
            .field("resource", &self.resource)
            .field("generation", &self.generation)
            .field("specs", &self.index.len())
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opchain_spec::Target;

    #[test]
    fn index_by_key_and_alias() {
        let specs = vec![
            OperationSpec::canonical("widget", Target::Create),
            OperationSpec::canonical("widget", Target::Read),
            OperationSpec::canonical("widget", Target::Update)
                .renamed("create")
                .unwrap(),
        ];
        let index = SpecIndex::new(specs);

        assert_eq!(index.len(), 3);
        assert!(index.contains(&OpKey::canonical(Target::Read)));
        assert_eq!(
            index
                .by_key(&OpKey::new("create", Target::Update))
                .map(OperationSpec::target),
            Some(Target::Update)
        );
        let targets: Vec<_> = index.by_alias("create").map(OperationSpec::target).collect();
        assert_eq!(targets, vec![Target::Create, Target::Update]);
        assert_eq!(index.by_alias("missing").count(), 0);
    }
}
