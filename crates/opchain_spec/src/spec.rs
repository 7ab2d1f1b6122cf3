//! Operation specifications.
//!
//! An [`OperationSpec`] is an immutable description of one operation: the
//! public alias, the canonical [`Target`] it implements, its arity, its
//! persistence policy, schema references, local hooks, visibility and (for
//! custom operations) the handler. `(alias, target)` is the dedupe key,
//! exposed as [`OpKey`].

use core::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::OpError;
use crate::hook::Hook;
use crate::step::{BoxedStep, Step};
use crate::target::{Arity, PersistPolicy, Target};

static ALIAS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").ok());

/// Checks that `alias` is a lowercase identifier (`^[a-z][a-z0-9_]*$`).
///
/// # Errors
///
/// Returns [`OpError::SpecConflict`] when the alias does not match.
pub fn validate_alias(alias: &str) -> Result<(), OpError> {
    let valid = ALIAS_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(alias));
    if valid {
        Ok(())
    } else {
        Err(OpError::spec_conflict(format!(
            "invalid alias '{alias}': expected ^[a-z][a-z0-9_]*$"
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Small value types
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque reference resolved by the schema provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRef(String);

impl SchemaRef {
    /// Wraps a reference string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the canonical request schema for an operation.
    #[must_use]
    pub fn request(resource: &str, alias: &str) -> Self {
        Self(format!("{resource}.{alias}.request"))
    }

    /// Returns the canonical response schema for an operation.
    #[must_use]
    pub fn response(resource: &str, alias: &str) -> Self {
        Self(format!("{resource}.{alias}.response"))
    }

    /// Returns the reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Independent visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exposure {
    /// Reachable through the in-process callable surface.
    pub callable: bool,
    /// Reachable through the remote procedure channel.
    pub rpc: bool,
    /// Reachable through a wire route.
    pub wire_route: bool,
}

impl Default for Exposure {
    fn default() -> Self {
        Self::ALL
    }
}

impl Exposure {
    /// Exposed everywhere.
    pub const ALL: Exposure = Exposure {
        callable: true,
        rpc: true,
        wire_route: true,
    };

    /// Exposed nowhere. The spec still resolves and binds.
    pub const NONE: Exposure = Exposure {
        callable: false,
        rpc: false,
        wire_route: false,
    };
}

/// Dedupe key of an operation within one resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OpKey {
    /// Public alias.
    pub alias: String,
    /// Canonical target.
    pub target: Target,
}

impl OpKey {
    /// Creates a key.
    pub fn new(alias: impl Into<String>, target: Target) -> Self {
        Self {
            alias: alias.into(),
            target,
        }
    }

    /// Returns the canonical key for a target (alias equals target name).
    #[must_use]
    pub fn canonical(target: Target) -> Self {
        Self::new(target.as_str(), target)
    }
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.alias, self.target)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OperationSpec
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable description of one operation.
///
/// Build one with [`OperationSpec::builder`]:
///
/// ```
/// use opchain_spec::{OperationSpec, PersistPolicy, StepFn, Target};
///
/// let archive = OperationSpec::builder("archive", Target::Custom)
///     .persist(PersistPolicy::Always)
///     .handler(StepFn::sync("archive", |ctx| {
///         ctx.result = Some(serde_json::json!({"archived": true}));
///         Ok(())
///     }))
///     .build()
///     .expect("valid spec");
///
/// assert_eq!(archive.alias(), "archive");
/// ```
#[derive(Clone)]
pub struct OperationSpec {
    alias: String,
    target: Target,
    arity: Arity,
    persist: PersistPolicy,
    request_schema: Option<SchemaRef>,
    response_schema: Option<SchemaRef>,
    hooks: Vec<Hook>,
    exposure: Exposure,
    handler: Option<BoxedStep>,
    resource: Option<String>,
}

impl OperationSpec {
    /// Starts a builder for `(alias, target)`.
    ///
    /// Arity defaults to the target's natural arity.
    pub fn builder(alias: impl Into<String>, target: Target) -> OperationSpecBuilder {
        OperationSpecBuilder {
            spec: OperationSpec {
                alias: alias.into(),
                target,
                arity: target.default_arity(),
                persist: PersistPolicy::Default,
                request_schema: None,
                response_schema: None,
                hooks: Vec::new(),
                exposure: Exposure::ALL,
                handler: None,
                resource: None,
            },
        }
    }

    /// Returns the canonical spec for `target` on `resource`.
    #[must_use]
    pub fn canonical(resource: &str, target: Target) -> Self {
        let alias = target.as_str();
        OperationSpec {
            alias: alias.to_string(),
            target,
            arity: target.default_arity(),
            persist: PersistPolicy::Default,
            request_schema: Some(SchemaRef::request(resource, alias)),
            response_schema: Some(SchemaRef::response(resource, alias)),
            hooks: Vec::new(),
            exposure: Exposure::ALL,
            handler: None,
            resource: Some(resource.to_string()),
        }
    }

    /// Returns the dedupe key.
    #[must_use]
    pub fn key(&self) -> OpKey {
        OpKey::new(self.alias.clone(), self.target)
    }

    /// Returns the public alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Returns the canonical target.
    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Returns the arity.
    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Returns the persistence policy.
    #[must_use]
    pub fn persist(&self) -> PersistPolicy {
        self.persist
    }

    /// Returns the request schema reference.
    #[must_use]
    pub fn request_schema(&self) -> Option<&SchemaRef> {
        self.request_schema.as_ref()
    }

    /// Returns the response schema reference.
    #[must_use]
    pub fn response_schema(&self) -> Option<&SchemaRef> {
        self.response_schema.as_ref()
    }

    /// Returns the operation-local hooks in declaration order.
    #[must_use]
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// Returns the visibility toggles.
    #[must_use]
    pub fn exposure(&self) -> Exposure {
        self.exposure
    }

    /// Returns the custom handler, if any.
    #[must_use]
    pub fn handler(&self) -> Option<&BoxedStep> {
        self.handler.as_ref()
    }

    /// Returns the owning resource once stamped.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Returns a copy stamped with its owning resource.
    ///
    /// Missing schema references are filled with the resource's canonical
    /// references for this alias.
    #[must_use]
    pub fn stamped(mut self, resource: &str) -> Self {
        if self.request_schema.is_none() {
            self.request_schema = Some(SchemaRef::request(resource, &self.alias));
        }
        if self.response_schema.is_none() {
            self.response_schema = Some(SchemaRef::response(resource, &self.alias));
        }
        self.resource = Some(resource.to_string());
        self
    }

    /// Returns a copy under a new alias.
    ///
    /// Schema references derived from the old alias follow the rename.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::SpecConflict`] when the alias is invalid.
    pub fn renamed(&self, alias: &str) -> Result<Self, OpError> {
        validate_alias(alias)?;
        let mut spec = self.clone();
        if let Some(resource) = self.resource.as_deref() {
            if self.request_schema == Some(SchemaRef::request(resource, &self.alias)) {
                spec.request_schema = Some(SchemaRef::request(resource, alias));
            }
            if self.response_schema == Some(SchemaRef::response(resource, &self.alias)) {
                spec.response_schema = Some(SchemaRef::response(resource, alias));
            }
        }
        spec.alias = alias.to_string();
        Ok(spec)
    }

    /// Returns a copy with different visibility.
    #[must_use]
    pub fn with_exposure(mut self, exposure: Exposure) -> Self {
        self.exposure = exposure;
        self
    }

    fn validate(&self) -> Result<(), OpError> {
        validate_alias(&self.alias)?;
        match (self.target, self.handler.is_some()) {
            (Target::Custom, false) => Err(OpError::spec_conflict(format!(
                "custom operation '{}' requires a handler",
                self.alias
            ))),
            (target, true) if target.is_canonical() => Err(OpError::spec_conflict(format!(
                "operation '{}' targets {target}, which is dispatched canonically and takes no handler",
                self.alias
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSpec")
            .field("alias", &self.alias)
            .field("target", &self.target)
            .field("arity", &self.arity)
            .field("persist", &self.persist)
            .field("request_schema", &self.request_schema)
            .field("response_schema", &self.response_schema)
            .field("hooks", &self.hooks.iter().map(Hook::name).collect::<Vec<_>>())
            .field("exposure", &self.exposure)
            .field("has_handler", &self.handler.is_some())
            .field("resource", &self.resource)
            .finish()
    }
}

/// Builder for [`OperationSpec`].
#[derive(Debug)]
pub struct OperationSpecBuilder {
    spec: OperationSpec,
}

impl OperationSpecBuilder {
    /// Sets the arity.
    #[must_use]
    pub fn arity(mut self, arity: Arity) -> Self {
        self.spec.arity = arity;
        self
    }

    /// Sets the persistence policy.
    #[must_use]
    pub fn persist(mut self, persist: PersistPolicy) -> Self {
        self.spec.persist = persist;
        self
    }

    /// Sets the request schema reference.
    #[must_use]
    pub fn request_schema(mut self, schema: impl Into<String>) -> Self {
        self.spec.request_schema = Some(SchemaRef::new(schema));
        self
    }

    /// Sets the response schema reference.
    #[must_use]
    pub fn response_schema(mut self, schema: impl Into<String>) -> Self {
        self.spec.response_schema = Some(SchemaRef::new(schema));
        self
    }

    /// Appends an operation-local hook.
    #[must_use]
    pub fn hook(mut self, hook: Hook) -> Self {
        self.spec.hooks.push(hook);
        self
    }

    /// Sets the visibility toggles.
    #[must_use]
    pub fn exposure(mut self, exposure: Exposure) -> Self {
        self.spec.exposure = exposure;
        self
    }

    /// Sets the handler of a custom operation.
    #[must_use]
    pub fn handler(mut self, handler: impl Step) -> Self {
        self.spec.handler = Some(Arc::new(handler));
        self
    }

    /// Finishes the spec.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::SpecConflict`] when the alias is not a lowercase
    /// identifier, a custom operation lacks a handler, or a canonical one
    /// carries one.
    pub fn build(self) -> Result<OperationSpec, OpError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SpecOverride
// ─────────────────────────────────────────────────────────────────────────────

/// Field-level patch applied by the registry's override operation.
///
/// Unset fields keep the original value. Hooks are appended.
#[derive(Clone, Default)]
pub struct SpecOverride {
    alias: Option<String>,
    arity: Option<Arity>,
    persist: Option<PersistPolicy>,
    request_schema: Option<SchemaRef>,
    response_schema: Option<SchemaRef>,
    exposure: Option<Exposure>,
    handler: Option<BoxedStep>,
    hooks: Vec<Hook>,
}

impl SpecOverride {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the operation.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Replaces the arity.
    #[must_use]
    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Replaces the persistence policy.
    #[must_use]
    pub fn persist(mut self, persist: PersistPolicy) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Replaces the request schema reference.
    #[must_use]
    pub fn request_schema(mut self, schema: impl Into<String>) -> Self {
        self.request_schema = Some(SchemaRef::new(schema));
        self
    }

    /// Replaces the response schema reference.
    #[must_use]
    pub fn response_schema(mut self, schema: impl Into<String>) -> Self {
        self.response_schema = Some(SchemaRef::new(schema));
        self
    }

    /// Replaces the visibility toggles.
    #[must_use]
    pub fn exposure(mut self, exposure: Exposure) -> Self {
        self.exposure = Some(exposure);
        self
    }

    /// Replaces the custom handler.
    #[must_use]
    pub fn handler(mut self, handler: impl Step) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Appends an operation-local hook.
    #[must_use]
    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Returns a copy of the patch that leaves the alias unchanged.
    #[must_use]
    pub fn without_alias(&self) -> Self {
        Self {
            alias: None,
            ..self.clone()
        }
    }

    /// Returns the new alias, if the patch renames.
    #[must_use]
    pub fn new_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Applies the patch to `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::SpecConflict`] when the patched spec is invalid.
    pub fn apply(&self, spec: &OperationSpec) -> Result<OperationSpec, OpError> {
        let mut patched = match &self.alias {
            Some(alias) => spec.renamed(alias)?,
            None => spec.clone(),
        };
        if let Some(arity) = self.arity {
            patched.arity = arity;
        }
        if let Some(persist) = self.persist {
            patched.persist = persist;
        }
        if let Some(schema) = &self.request_schema {
            patched.request_schema = Some(schema.clone());
        }
        if let Some(schema) = &self.response_schema {
            patched.response_schema = Some(schema.clone());
        }
        if let Some(exposure) = self.exposure {
            patched.exposure = exposure;
        }
        if let Some(handler) = &self.handler {
            patched.handler = Some(Arc::clone(handler));
        }
        patched.hooks.extend(self.hooks.iter().cloned());
        patched.validate()?;
        Ok(patched)
    }
}

impl fmt::Debug for SpecOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecOverride")
            .field("alias", &self.alias)
            .field("arity", &self.arity)
            .field("persist", &self.persist)
            .field("request_schema", &self.request_schema)
            .field("response_schema", &self.response_schema)
            .field("exposure", &self.exposure)
            .field("has_handler", &self.handler.is_some())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
