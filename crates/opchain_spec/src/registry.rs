//! Observable per-resource operation registry.
//!
//! The [`OperationRegistry`] is the runtime layer of a resource's operation
//! set: specs added here win over declared and canonical specs on key
//! collision. Every mutation notifies subscribers synchronously with the set
//! of changed [`OpKey`]s before returning.
//!
//! # Locking
//!
//! Mutation and notification are serialized by a single re-entrant writer
//! lock, so a subscriber may itself read or mutate the registry. The spec
//! table has its own lock, released before subscribers run; readers never
//! wait on a notification in progress.
//!
//! # Example
//!
//! ```
//! use opchain_spec::{OperationRegistry, OperationSpec, Target};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let registry = OperationRegistry::new("widget");
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! registry.subscribe(move |changed| {
//!     counter.fetch_add(changed.len(), Ordering::SeqCst);
//! });
//!
//! registry.register(OperationSpec::builder("search", Target::List).build().unwrap());
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use core::fmt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, RwLock};

use crate::error::RegistryError;
use crate::spec::{OpKey, OperationSpec, SpecOverride};

/// Keys touched by one registry mutation.
pub type ChangeSet = BTreeSet<OpKey>;

/// Callback invoked after every registry mutation.
pub type Subscriber = Arc<dyn Fn(&ChangeSet) + Send + Sync>;

/// Handle returned by [`OperationRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Mutable, observable collection of operation specs for one resource.
pub struct OperationRegistry {
    resource: String,
    writer: ReentrantMutex<()>,
    specs: RwLock<IndexMap<OpKey, OperationSpec>>,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("resource", &self.resource)
            .field("specs", &self.keys())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl OperationRegistry {
    /// Creates an empty registry for `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            writer: ReentrantMutex::new(()),
            specs: RwLock::new(IndexMap::new()),
            subscribers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Returns the owning resource.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers one spec, replacing any spec with the same key.
    pub fn register(&self, spec: OperationSpec) -> OpKey {
        let key = spec.key();
        self.add([spec]);
        key
    }

    /// Registers many specs. Later specs win on key collision.
    pub fn add(&self, specs: impl IntoIterator<Item = OperationSpec>) -> ChangeSet {
        let _writer = self.writer.lock();
        let changed = {
            let mut table = self.specs.write();
            let mut changed = ChangeSet::new();
            for spec in specs {
                let key = spec.key();
                table.insert(key.clone(), spec);
                changed.insert(key);
            }
            changed
        };
        self.notify(&changed);
        changed
    }

    /// Replaces the whole spec list.
    ///
    /// The change set covers both the removed and the new keys.
    pub fn set(&self, specs: impl IntoIterator<Item = OperationSpec>) -> ChangeSet {
        let _writer = self.writer.lock();
        let changed = {
            let mut table = self.specs.write();
            let mut changed: ChangeSet = table.keys().cloned().collect();
            table.clear();
            for spec in specs {
                let key = spec.key();
                table.insert(key.clone(), spec);
                changed.insert(key);
            }
            changed
        };
        self.notify(&changed);
        changed
    }

    /// Patches every registered spec whose alias is `alias`.
    ///
    /// A patch that renames the alias moves the spec to its new key; the
    /// change set holds both keys.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAlias`] when no spec carries the alias
    /// and [`RegistryError::Invalid`] when a patched spec is invalid. The
    /// registry is left unchanged on error.
    pub fn override_op(&self, alias: &str, patch: &SpecOverride) -> Result<ChangeSet, RegistryError> {
        let _writer = self.writer.lock();
        let changed = {
            let mut table = self.specs.write();
            let patched = table
                .iter()
                .filter(|(key, _)| key.alias == alias)
                .map(|(key, spec)| Ok((key.clone(), patch.apply(spec)?)))
                .collect::<Result<Vec<_>, RegistryError>>()?;
            if patched.is_empty() {
                return Err(RegistryError::UnknownAlias(alias.to_string()));
            }

            let mut changed = ChangeSet::new();
            for (old_key, spec) in patched {
                let new_key = spec.key();
                if new_key == old_key {
                    table.insert(new_key.clone(), spec);
                } else {
                    table.shift_remove(&old_key);
                    table.insert(new_key.clone(), spec);
                    changed.insert(old_key);
                }
                changed.insert(new_key);
            }
            changed
        };
        self.notify(&changed);
        Ok(changed)
    }

    /// Removes every spec matching `predicate`, returning the removed specs.
    pub fn remove(&self, predicate: impl Fn(&OperationSpec) -> bool) -> Vec<OperationSpec> {
        let _writer = self.writer.lock();
        let (removed, changed) = {
            let mut table = self.specs.write();
            let mut removed = Vec::new();
            table.retain(|_, spec| {
                if predicate(spec) {
                    removed.push(spec.clone());
                    false
                } else {
                    true
                }
            });
            let changed: ChangeSet = removed.iter().map(OperationSpec::key).collect();
            (removed, changed)
        };
        self.notify(&changed);
        removed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns every registered spec in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<OperationSpec> {
        self.specs.read().values().cloned().collect()
    }

    /// Returns the spec registered under `key`.
    #[must_use]
    pub fn get(&self, key: &OpKey) -> Option<OperationSpec> {
        self.specs.read().get(key).cloned()
    }

    /// Returns the registered keys in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<OpKey> {
        self.specs.read().keys().cloned().collect()
    }

    /// Returns the number of registered specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.read().len()
    }

    /// Returns whether no spec is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.read().is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a change subscriber.
    pub fn subscribe(&self, subscriber: impl Fn(&ChangeSet) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(subscriber)));
        id
    }

    /// Removes a subscriber. Returns whether it was present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Returns whether `id` is still subscribed.
    #[must_use]
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscribers.read().iter().any(|(existing, _)| *existing == id)
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn notify(&self, changed: &ChangeSet) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        tracing::debug!(
            resource = %self.resource,
            changed = changed.len(),
            subscribers = subscribers.len(),
            "operation registry changed"
        );

        for subscriber in subscribers {
            subscriber(changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepFn;
    use crate::target::{PersistPolicy, Target};
    use parking_lot::Mutex;

    fn spec(alias: &str, target: Target) -> OperationSpec {
        OperationSpec::builder(alias, target).build().unwrap()
    }

    fn recorder(registry: &OperationRegistry) -> Arc<Mutex<Vec<ChangeSet>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        registry.subscribe(move |changed| sink.lock().push(changed.clone()));
        log
    }

    #[test]
    fn register_replaces_same_key_in_place() {
        let registry = OperationRegistry::new("widget");
        registry.register(spec("search", Target::List));
        registry.register(spec("purge", Target::Clear));
        registry.register(
            OperationSpec::builder("search", Target::List)
                .persist(PersistPolicy::Skip)
                .build()
                .unwrap(),
        );

        let all = registry.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].alias(), "search");
        assert_eq!(all[0].persist(), PersistPolicy::Skip);
    }

    #[test]
    fn every_mutation_notifies_with_changed_keys() {
        let registry = OperationRegistry::new("widget");
        let log = recorder(&registry);

        registry.add([spec("search", Target::List), spec("purge", Target::Clear)]);
        registry.set([spec("search", Target::List)]);
        registry.remove(|s| s.alias() == "search");

        let log = log.lock();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].len(), 2);
        assert_eq!(log[1].len(), 2);
        assert_eq!(
            log[2].iter().cloned().collect::<Vec<_>>(),
            vec![OpKey::new("search", Target::List)]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn override_renames_and_reports_both_keys() {
        let registry = OperationRegistry::new("widget");
        registry.register(spec("search", Target::List));
        let log = recorder(&registry);

        let changed = registry
            .override_op("search", &SpecOverride::new().alias("find"))
            .unwrap();

        assert!(changed.contains(&OpKey::new("search", Target::List)));
        assert!(changed.contains(&OpKey::new("find", Target::List)));
        assert_eq!(registry.keys(), vec![OpKey::new("find", Target::List)]);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn override_unknown_alias_is_an_error_and_silent() {
        let registry = OperationRegistry::new("widget");
        let log = recorder(&registry);
        let err = registry
            .override_op("missing", &SpecOverride::new().persist(PersistPolicy::Skip))
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownAlias("missing".into()));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn invalid_override_leaves_registry_unchanged() {
        let registry = OperationRegistry::new("widget");
        registry.register(spec("search", Target::List));
        let err = registry
            .override_op(
                "search",
                &SpecOverride::new().handler(StepFn::sync("h", |_| Ok(()))),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));
        assert!(registry.get(&OpKey::new("search", Target::List)).unwrap().handler().is_none());
    }

    #[test]
    fn subscriber_may_reenter_registry() {
        let registry = Arc::new(OperationRegistry::new("widget"));
        let inner = Arc::downgrade(&registry);
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        registry.subscribe(move |_| {
            if let Some(registry) = inner.upgrade() {
                *sink.lock() = registry.len();
            }
        });

        registry.register(spec("search", Target::List));
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let registry = OperationRegistry::new("widget");
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = registry.subscribe(move |_| *sink.lock() += 1);

        registry.register(spec("search", Target::List));
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(!registry.is_subscribed(id));
        registry.register(spec("purge", Target::Clear));

        assert_eq!(*count.lock(), 1);
    }
}
