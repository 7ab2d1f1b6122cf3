//! Hooks: steps bound to a phase and an operation selector.
//!
//! A [`Hook`] names the phase it runs in as a string. The name is checked
//! against the fixed [`Phase`] set when the hook is bound, so declarations
//! with a misspelled phase are dropped with a diagnostic instead of failing
//! at definition time.
//!
//! # Example
//!
//! ```
//! use opchain_spec::{Hook, OpError, Phase, StepFn};
//!
//! let audit = Hook::new(
//!     "audit",
//!     Phase::PostCommit,
//!     StepFn::sync("audit", |ctx| {
//!         tracing::info!(alias = %ctx.env.alias, "committed");
//!         Ok(())
//!     }),
//! )
//! .for_aliases(["create", "update"])
//! .with_order(10);
//!
//! assert!(audit.selector().matches("create"));
//! assert!(!audit.selector().matches("delete"));
//! ```

use core::fmt;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::phase::{Phase, UnknownPhase};
use crate::step::{BoxedStep, Step};

/// Length of generated names for anonymous hooks.
const ANONYMOUS_NAME_LEN: usize = 8;

/// Which operation aliases a hook applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HookSelector {
    /// Every operation of the resource (`"*"`).
    #[default]
    All,
    /// A single alias.
    Alias(String),
    /// A set of aliases.
    Aliases(BTreeSet<String>),
}

impl HookSelector {
    /// Returns whether the selector covers `alias`.
    #[must_use]
    pub fn matches(&self, alias: &str) -> bool {
        match self {
            HookSelector::All => true,
            HookSelector::Alias(a) => a == alias,
            HookSelector::Aliases(set) => set.contains(alias),
        }
    }
}

impl From<&str> for HookSelector {
    fn from(value: &str) -> Self {
        if value == "*" {
            HookSelector::All
        } else {
            HookSelector::Alias(value.to_string())
        }
    }
}

/// Runtime filter evaluated against the invocation payload.
pub type HookPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A step attached to a phase, scoped to one or more operation aliases.
///
/// Hooks are cheap to clone and immutable once attached to a chain.
#[derive(Clone)]
pub struct Hook {
    name: String,
    phase: String,
    selector: HookSelector,
    predicate: Option<HookPredicate>,
    step: BoxedStep,
    order: i32,
}

impl Hook {
    /// Creates a hook that applies to every alias, with order `0`.
    pub fn new(name: impl Into<String>, phase: impl Into<String>, step: impl Step) -> Self {
        Self {
            name: name.into(),
            phase: phase.into(),
            selector: HookSelector::All,
            predicate: None,
            step: Arc::new(step),
            order: 0,
        }
    }

    /// Creates a hook with a generated name.
    pub fn anonymous(phase: impl Into<String>, step: impl Step) -> Self {
        let name = format!("anon-{}", nanoid::nanoid!(ANONYMOUS_NAME_LEN));
        Self::new(name, phase, step)
    }

    /// Creates a hook from an already shared step.
    pub fn from_shared(name: impl Into<String>, phase: impl Into<String>, step: BoxedStep) -> Self {
        Self {
            name: name.into(),
            phase: phase.into(),
            selector: HookSelector::All,
            predicate: None,
            step,
            order: 0,
        }
    }

    /// Restricts the hook to one alias.
    #[must_use]
    pub fn for_alias(mut self, alias: impl Into<String>) -> Self {
        self.selector = HookSelector::Alias(alias.into());
        self
    }

    /// Restricts the hook to a set of aliases.
    #[must_use]
    pub fn for_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector = HookSelector::Aliases(aliases.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the selector directly.
    #[must_use]
    pub fn with_selector(mut self, selector: HookSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Adds a payload predicate. The hook is skipped when it returns `false`.
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets the order within the hook's source. Lower runs first.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Returns the hook's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared phase name, unchecked.
    #[must_use]
    pub fn phase_name(&self) -> &str {
        &self.phase
    }

    /// Parses the declared phase name.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPhase`] when the name is not a known phase.
    pub fn phase(&self) -> Result<Phase, UnknownPhase> {
        self.phase.parse()
    }

    /// Returns the alias selector.
    #[must_use]
    pub fn selector(&self) -> &HookSelector {
        &self.selector
    }

    /// Returns the payload predicate, if any.
    #[must_use]
    pub fn predicate(&self) -> Option<&HookPredicate> {
        self.predicate.as_ref()
    }

    /// Returns whether the hook should run for `payload`.
    #[must_use]
    pub fn accepts(&self, payload: &Value) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(payload))
    }

    /// Returns the step the hook runs.
    #[must_use]
    pub fn step(&self) -> &BoxedStep {
        &self.step
    }

    /// Returns the ordering key.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("selector", &self.selector)
            .field("order", &self.order)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.as_str().to_string()
    }
}
