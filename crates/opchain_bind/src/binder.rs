//! The binder: resolution, chain building, rebind and invocation.
//!
//! [`Binder`] owns every included resource. For each one it keeps the
//! declaration, an [`OperationRegistry`], the imperatively registered hooks
//! and the current [`ResourceBinding`] snapshot.
//!
//! # Binding
//!
//! A bind resolves the effective specs, builds per-operation artifacts for
//! the working set, re-indexes the full spec list, rebuilds the RPC surface
//! and the route table in full, offers the candidate to every bind listener
//! and finally swaps it in. A targeted bind (`only_keys`) carries every other
//! operation's artifacts over unchanged, so a caller holding another key's
//! chains keeps the same `Arc`.
//!
//! # Rebind
//!
//! The first bind of a resource subscribes the binder to its registry. Each
//! registry mutation rebinds the changed keys before the mutation returns.
//! Rebind failures, including panics, are logged and recorded as
//! diagnostics; the previous binding keeps serving.
//!
//! # Example
//!
//! ```
//! use opchain_bind::{Binder, CallOptions, ResourceDecl, WiringPolicy};
//! use opchain_spec::{OperationSpec, StepFn, Target};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let binder = Binder::new();
//! binder
//!     .include(
//!         ResourceDecl::builder("health")
//!             .wiring(WiringPolicy::none())
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let ping = OperationSpec::builder("ping", Target::Custom)
//!     .handler(StepFn::sync("ping", |ctx| {
//!         ctx.result = Some(json!("pong"));
//!         Ok(())
//!     }))
//!     .build()
//!     .unwrap();
//! binder.registry("health").unwrap().register(ping);
//!
//! let result = binder
//!     .call("health", "ping", json!({}), CallOptions::new())
//!     .await
//!     .unwrap();
//! assert_eq!(result, json!("pong"));
//! # });
//! ```

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use indexmap::IndexMap;
use opchain_core::{EngineConfig, RouteConfig};
use opchain_runtime::{Executor, HookMerger, HookSources, handler_step};
use opchain_spec::{
    CancelSignal, ChangeSet, Env, ExecutionContext, Hook, OpKey, OperationRegistry,
    OperationSpec, RegistryError, SpecOverride, SubscriptionId, TransactionProvider,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::binding::{BoundOperation, ResourceBinding, SpecIndex};
use crate::decl::ResourceDecl;
use crate::diagnostics::{BindingSnapshot, Diagnostic, DiagnosticKind, DiagnosticLog};
use crate::error::{BindError, CallError};
use crate::resolver::SpecResolver;
use crate::routes::{HttpVerb, RouteMatch, RouteTable};

/// Callback offered every candidate binding before it is published.
///
/// Returning an error (or panicking) aborts the bind and keeps the previous
/// binding.
pub type BindListener = Arc<dyn Fn(&ResourceBinding) -> Result<(), String> + Send + Sync>;

/// Resource name used in diagnostics about global hooks.
const GLOBAL: &str = "*";

// ─────────────────────────────────────────────────────────────────────────────
// CallOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Per-invocation inputs besides the payload.
#[derive(Clone, Default)]
pub struct CallOptions {
    path_params: BTreeMap<String, String>,
    cancel: Option<CancelSignal>,
    transaction: Option<Arc<dyn TransactionProvider>>,
}

impl CallOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one path parameter.
    #[must_use]
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Replaces the path parameters.
    #[must_use]
    pub fn with_path_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    /// Attaches a cancellation signal checked between phases.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Uses `transaction` instead of opening one from the resource's source.
    #[must_use]
    pub fn with_transaction(mut self, transaction: Arc<dyn TransactionProvider>) -> Self {
        self.transaction = Some(transaction);
        self
    }
}

impl core::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallOptions")
            .field("path_params", &self.path_params)
            .field("cancel", &self.cancel)
            .field("has_transaction", &self.transaction.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal state
// ─────────────────────────────────────────────────────────────────────────────

struct ResourceState {
    decl: ResourceDecl,
    registry: Arc<OperationRegistry>,
    imperative: RwLock<Vec<Hook>>,
    binding: RwLock<Arc<ResourceBinding>>,
    subscription: Mutex<Option<SubscriptionId>>,
    bind_lock: Mutex<()>,
}

impl ResourceState {
    fn current(&self) -> Arc<ResourceBinding> {
        Arc::clone(&self.binding.read())
    }
}

struct BinderInner {
    routes: RouteConfig,
    phase_spans: bool,
    resources: RwLock<HashMap<String, Arc<ResourceState>>>,
    global_hooks: RwLock<Vec<Hook>>,
    listeners: RwLock<Vec<BindListener>>,
    diagnostics: DiagnosticLog,
    resolver: SpecResolver,
    merger: HookMerger,
}

// ─────────────────────────────────────────────────────────────────────────────
// Binder
// ─────────────────────────────────────────────────────────────────────────────

/// Binds resources and runs their operations.
///
/// Cloning is cheap; clones share every resource.
#[derive(Clone)]
pub struct Binder {
    inner: Arc<BinderInner>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Binder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Binder")
            .field("resources", &self.resources())
            .field("routes", &self.inner.routes)
            .field("phase_spans", &self.inner.phase_spans)
            .finish_non_exhaustive()
    }
}

impl Binder {
    /// Creates a binder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Creates a binder shaped by `config`.
    ///
    /// Routes follow [`EngineConfig::routes`]; per-phase spans are enabled
    /// when the tracing setup has span events on.
    #[must_use]
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(BinderInner {
                routes: config.routes().clone(),
                phase_spans: config.tracing().span_events(),
                resources: RwLock::new(HashMap::new()),
                global_hooks: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
                diagnostics: DiagnosticLog::new(),
                resolver: SpecResolver::new(),
                merger: HookMerger::new(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    /// Includes a resource and binds it.
    ///
    /// Resource-level hooks naming an unknown phase are dropped with a
    /// diagnostic.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::DuplicateResource`] when the name is taken and
    /// [`BindError::Rejected`] when a bind listener refuses the first
    /// binding. A rejected resource is not included.
    pub fn include(&self, mut decl: ResourceDecl) -> Result<Vec<OperationSpec>, BindError> {
        let name = decl.name().to_string();
        let inner = &self.inner;
        decl.retain_hooks(|hook| inner.admit(&name, "resource", hook));

        let executor = Executor::new()
            .with_schema_provider(Arc::clone(decl.schemas()))
            .with_phase_spans(inner.phase_spans);
        let state = Arc::new(ResourceState {
            registry: Arc::new(OperationRegistry::new(name.clone())),
            imperative: RwLock::new(Vec::new()),
            binding: RwLock::new(Arc::new(ResourceBinding::empty(&name, executor))),
            subscription: Mutex::new(None),
            bind_lock: Mutex::new(()),
            decl,
        });

        {
            let mut resources = inner.resources.write();
            if resources.contains_key(&name) {
                return Err(BindError::DuplicateResource(name));
            }
            resources.insert(name.clone(), Arc::clone(&state));
        }

        tracing::info!(resource = %name, "resource included");
        match inner.bind_state(&state, None) {
            Ok(specs) => Ok(specs),
            Err(err) => {
                inner.resources.write().remove(&name);
                Err(err)
            }
        }
    }

    /// Removes a resource, its binding and its registry subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownResource`] when the resource is unknown.
    pub fn unregister(&self, resource: &str) -> Result<(), BindError> {
        let state = self
            .inner
            .resources
            .write()
            .remove(resource)
            .ok_or_else(|| BindError::unknown_resource(resource))?;
        if let Some(id) = state.subscription.lock().take() {
            state.registry.unsubscribe(id);
        }
        tracing::info!(resource, "resource unregistered");
        Ok(())
    }

    /// Returns the names of every included resource.
    #[must_use]
    pub fn resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.resources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the registry of `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownResource`] when the resource is unknown.
    pub fn registry(&self, resource: &str) -> Result<Arc<OperationRegistry>, BindError> {
        Ok(Arc::clone(&self.inner.state(resource)?.registry))
    }

    /// Returns the current binding of `resource`.
    #[must_use]
    pub fn binding(&self, resource: &str) -> Option<Arc<ResourceBinding>> {
        self.inner.state(resource).ok().map(|s| s.current())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding
    // ─────────────────────────────────────────────────────────────────────────

    /// Binds `resource`, fully or for `only_keys`, and returns its effective
    /// specs.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownResource`] for an unknown resource and
    /// [`BindError::Rejected`] when a bind listener refuses the binding.
    pub fn bind(
        &self,
        resource: &str,
        only_keys: Option<&ChangeSet>,
    ) -> Result<Vec<OperationSpec>, BindError> {
        let state = self.inner.state(resource)?;
        self.inner.bind_state(&state, only_keys)
    }

    /// Adds a listener offered every candidate binding before it is
    /// published.
    pub fn on_bind(&self, listener: impl Fn(&ResourceBinding) -> Result<(), String> + Send + Sync + 'static) {
        self.inner.listeners.write().push(Arc::new(listener));
    }

    /// Patches every effective operation of `resource` with `alias`.
    ///
    /// Operations that live in the registry are patched in place, so a
    /// rename moves them to the new alias.
    ///
    /// Canonical and declared operations cannot be removed. They are
    /// registered in patched form instead, which shadows them under their
    /// own key. A patch that renames one of them does **not** move it: the
    /// old alias stays bound and the renamed copy is added next to it. Use
    /// [`ResourceDeclBuilder::rename`](crate::ResourceDeclBuilder::rename)
    /// to replace a canonical alias.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownAlias`] when no effective operation has
    /// the alias and [`BindError::Spec`] when the patched spec is invalid.
    pub fn override_op(
        &self,
        resource: &str,
        alias: &str,
        patch: &SpecOverride,
    ) -> Result<ChangeSet, BindError> {
        let state = self.inner.state(resource)?;
        let unknown = || BindError::UnknownAlias {
            resource: resource.to_string(),
            alias: alias.to_string(),
        };

        if state.registry.all().iter().any(|s| s.alias() == alias) {
            return state
                .registry
                .override_op(alias, patch)
                .map_err(|err| match err {
                    RegistryError::UnknownAlias(_) => unknown(),
                    RegistryError::Invalid(err) => BindError::Spec(err),
                });
        }

        let binding = state.current();
        let patched = binding
            .specs()
            .by_alias(alias)
            .map(|spec| patch.apply(spec))
            .collect::<Result<Vec<_>, _>>()?;
        if patched.is_empty() {
            return Err(unknown());
        }
        Ok(state.registry.add(patched))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hooks
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a hook against `resource` and rebinds the operations its
    /// selector covers.
    ///
    /// A hook naming an unknown phase is dropped with a diagnostic.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnknownResource`] when the resource is unknown
    /// and [`BindError::Rejected`] when a bind listener refuses the rebind.
    pub fn register_hook(&self, resource: &str, hook: Hook) -> Result<(), BindError> {
        let inner = &self.inner;
        let state = inner.state(resource)?;
        if !inner.admit(resource, "imperative", &hook) {
            return Ok(());
        }
        let keys = covered_keys(&state.current(), &hook);
        state.imperative.write().push(hook);
        inner.bind_state(&state, Some(&keys))?;
        Ok(())
    }

    /// Registers a hook for every resource and rebinds the operations its
    /// selector covers.
    ///
    /// # Errors
    ///
    /// Returns the first rebind failure. Resources after a failing one are
    /// still rebound.
    pub fn register_global_hook(&self, hook: Hook) -> Result<(), BindError> {
        let inner = &self.inner;
        if !inner.admit(GLOBAL, "global", &hook) {
            return Ok(());
        }
        inner.global_hooks.write().push(hook.clone());

        let states: Vec<Arc<ResourceState>> = inner.resources.read().values().cloned().collect();
        let mut first_error = None;
        for state in states {
            let keys = covered_keys(&state.current(), &hook);
            if let Err(err) = inner.bind_state(&state, Some(&keys)) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Surfaces
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolves an RPC method name to `(resource, key)`.
    #[must_use]
    pub fn resolve_rpc(&self, method: &str) -> Option<(String, OpKey)> {
        let (resource, _) = method.split_once('.')?;
        let binding = self.binding(resource)?;
        let key = binding.rpc_method(method)?.clone();
        Some((resource.to_string(), key))
    }

    /// Resolves a wire request to its route across every resource.
    ///
    /// Resources are searched in name order.
    #[must_use]
    pub fn resolve_route(&self, verb: HttpVerb, path: &str) -> Option<RouteMatch> {
        self.resources()
            .iter()
            .filter_map(|name| self.binding(name))
            .find_map(|binding| binding.routes().lookup(verb, path))
    }

    /// Invokes `alias` on `resource` through the callable surface.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnknownResource`] or [`CallError::UnknownAlias`]
    /// when nothing matches, [`CallError::NotCallable`] when the operation is
    /// hidden from the callable surface and [`CallError::Invocation`] when
    /// the invocation fails.
    pub async fn call(
        &self,
        resource: &str,
        alias: &str,
        payload: Value,
        options: CallOptions,
    ) -> Result<Value, CallError> {
        let state = self
            .inner
            .state(resource)
            .map_err(|_| CallError::UnknownResource(resource.to_string()))?;
        let binding = state.current();

        let Some(key) = binding.callable(alias) else {
            return Err(if binding.resolve_alias(alias).is_some() {
                CallError::NotCallable {
                    resource: resource.to_string(),
                    alias: alias.to_string(),
                }
            } else {
                CallError::UnknownAlias {
                    resource: resource.to_string(),
                    alias: alias.to_string(),
                }
            });
        };
        let op = binding
            .operation(key)
            .cloned()
            .ok_or_else(|| CallError::UnknownAlias {
                resource: resource.to_string(),
                alias: alias.to_string(),
            })?;

        invoke(&state, &binding, &op, payload, options).await
    }

    /// Invokes the operation bound for `key`, bypassing exposure.
    ///
    /// Transport adapters use this after [`resolve_rpc`](Self::resolve_rpc)
    /// or [`resolve_route`](Self::resolve_route).
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnknownResource`] or [`CallError::UnknownAlias`]
    /// when nothing matches and [`CallError::Invocation`] when the
    /// invocation fails.
    pub async fn call_key(
        &self,
        resource: &str,
        key: &OpKey,
        payload: Value,
        options: CallOptions,
    ) -> Result<Value, CallError> {
        let state = self
            .inner
            .state(resource)
            .map_err(|_| CallError::UnknownResource(resource.to_string()))?;
        let binding = state.current();
        let op = binding
            .operation(key)
            .cloned()
            .ok_or_else(|| CallError::UnknownAlias {
                resource: resource.to_string(),
                alias: key.alias.clone(),
            })?;

        invoke(&state, &binding, &op, payload, options).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Diagnostics
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns every recorded diagnostic.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.diagnostics.entries()
    }

    /// Returns the introspection snapshot of `resource`.
    #[must_use]
    pub fn snapshot(&self, resource: &str) -> Option<BindingSnapshot> {
        self.binding(resource).map(|b| b.snapshot())
    }
}

async fn invoke(
    state: &ResourceState,
    binding: &ResourceBinding,
    op: &BoundOperation,
    payload: Value,
    options: CallOptions,
) -> Result<Value, CallError> {
    let spec = op.spec();
    let env = Env::new(binding.resource(), spec.alias(), spec.target(), spec.arity());
    let mut ctx = ExecutionContext::new(env, payload).with_path_params(options.path_params);

    let transaction = options
        .transaction
        .or_else(|| state.decl.transactions().map(|source| source.open()));
    if let Some(transaction) = transaction {
        ctx = ctx.with_transaction(transaction);
    }
    if let Some(cancel) = options.cancel {
        ctx = ctx.with_cancel(cancel);
    }

    Ok(binding.executor().run(op.chains(), &mut ctx).await?)
}

/// Keys of the operations whose alias `hook` selects.
fn covered_keys(binding: &ResourceBinding, hook: &Hook) -> ChangeSet {
    binding
        .specs()
        .all()
        .iter()
        .filter(|spec| hook.selector().matches(spec.alias()))
        .map(OperationSpec::key)
        .collect()
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BinderInner
// ─────────────────────────────────────────────────────────────────────────────

impl BinderInner {
    fn state(&self, resource: &str) -> Result<Arc<ResourceState>, BindError> {
        self.resources
            .read()
            .get(resource)
            .cloned()
            .ok_or_else(|| BindError::unknown_resource(resource))
    }

    /// Returns whether `hook` names a known phase, recording a diagnostic
    /// when it does not.
    fn admit(&self, resource: &str, origin: &str, hook: &Hook) -> bool {
        match hook.phase() {
            Ok(_) => true,
            Err(err) => {
                self.diagnostics.record(
                    DiagnosticKind::UnknownHookPhase,
                    resource,
                    format!("{origin} hook '{}' dropped: {err}", hook.name()),
                );
                false
            }
        }
    }

    fn bind_state(
        self: &Arc<Self>,
        state: &ResourceState,
        only_keys: Option<&ChangeSet>,
    ) -> Result<Vec<OperationSpec>, BindError> {
        let _bind = state.bind_lock.lock();
        let resource = state.decl.name();
        let previous = state.current();

        let resolved = self
            .resolver
            .resolve(&state.decl, &state.registry.all(), &self.diagnostics);
        let index = SpecIndex::new(resolved.clone());

        let mut operations = match only_keys {
            Some(keys) => {
                let mut carried = previous.operations.clone();
                for key in keys {
                    carried.remove(key);
                }
                carried
            }
            None => HashMap::new(),
        };
        operations.retain(|key, _| index.contains(key));

        let base = HookSources {
            global: self.global_hooks.read().clone(),
            resource: state.decl.hooks().to_vec(),
            operation: Vec::new(),
            imperative: state.imperative.read().clone(),
        };
        let mut rebuilt = 0usize;
        for spec in index.all() {
            let key = spec.key();
            if operations.contains_key(&key) {
                continue;
            }
            let bound = self.bind_operation(state, spec, &base);
            operations.insert(key, Arc::new(bound));
            rebuilt += 1;
        }

        let mut callables = IndexMap::new();
        let mut rpc = IndexMap::new();
        for spec in index.all() {
            let exposure = spec.exposure();
            if exposure.callable
                && let Some(shadowed) = callables.insert(spec.alias().to_string(), spec.key())
            {
                self.diagnostics.record(
                    DiagnosticKind::AliasShadowed,
                    resource,
                    format!("callable '{}' now runs {} instead of {shadowed}", spec.alias(), spec.key()),
                );
            }
            if exposure.rpc {
                rpc.insert(format!("{resource}.{}", spec.alias()), spec.key());
            }
        }

        let (routes, conflicts) = RouteTable::build(resource, index.all(), &self.routes);
        for conflict in conflicts {
            self.diagnostics
                .record(DiagnosticKind::RouteConflict, resource, conflict);
        }

        let binding = ResourceBinding {
            resource: resource.to_string(),
            generation: previous.generation + 1,
            index,
            operations,
            callables,
            rpc,
            routes: Arc::new(routes),
            executor: previous.executor.clone(),
        };

        let listeners: Vec<BindListener> = self.listeners.read().clone();
        for listener in listeners {
            listener(&binding).map_err(|reason| BindError::Rejected {
                resource: resource.to_string(),
                reason,
            })?;
        }

        *state.binding.write() = Arc::new(binding);
        self.ensure_subscription(state);

        tracing::debug!(
            resource,
            specs = resolved.len(),
            rebuilt,
            targeted = only_keys.is_some(),
            "resource bound"
        );
        Ok(resolved)
    }

    fn bind_operation(
        &self,
        state: &ResourceState,
        spec: &OperationSpec,
        base: &HookSources,
    ) -> BoundOperation {
        let resource = state.decl.name();
        let key = spec.key();
        let origin = format!("operation {key}");
        let mut sources = base.clone();
        sources.operation = spec
            .hooks()
            .iter()
            .filter(|hook| self.admit(resource, &origin, hook))
            .cloned()
            .collect();

        let handler = handler_step(spec, state.decl.handlers());
        let chains = self
            .merger
            .build_chains(spec, &sources, Arc::clone(&handler));
        BoundOperation {
            spec: spec.clone(),
            handler,
            chains: Arc::new(chains),
        }
    }

    /// Subscribes to the resource's registry unless already subscribed.
    fn ensure_subscription(self: &Arc<Self>, state: &ResourceState) {
        let mut slot = state.subscription.lock();
        if (*slot).is_some_and(|id| state.registry.is_subscribed(id)) {
            return;
        }

        let weak: Weak<BinderInner> = Arc::downgrade(self);
        let resource = state.decl.name().to_string();
        let id = state.registry.subscribe(move |changed| {
            if let Some(inner) = weak.upgrade() {
                inner.rebind_on_change(&resource, changed);
            }
        });
        *slot = Some(id);
    }

    /// Registry subscriber body. Never unwinds into the registry mutator.
    fn rebind_on_change(self: &Arc<Self>, resource: &str, changed: &ChangeSet) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let state = self.state(resource)?;
            self.bind_state(&state, Some(changed))
        }));

        let failure = match outcome {
            Ok(Ok(_)) => return,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(&*panic)),
        };
        let keys: Vec<String> = changed.iter().map(ToString::to_string).collect();
        self.diagnostics.record(
            DiagnosticKind::RebindFailed,
            resource,
            format!("rebind of [{}] failed, keeping previous binding: {failure}", keys.join(", ")),
        );
    }
}
