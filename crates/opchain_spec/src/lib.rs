//! Operation data model for opchain.
//!
//! This crate defines what an operation *is*, independent of how it runs:
//!
//! - [`OperationSpec`] - Immutable description of one operation, keyed by [`OpKey`]
//! - [`Target`], [`Arity`], [`PersistPolicy`], [`Exposure`] - Per-operation policies
//! - [`Phase`] - The fixed invocation lifecycle and its merge direction
//! - [`Step`], [`StepFn`] - Async units of work run inside a phase
//! - [`Hook`] - A step bound to a phase and an alias selector
//! - [`ExecutionContext`] - Mutable per-invocation state
//! - [`OperationRegistry`] - Observable runtime spec collection for one resource
//! - [`OpError`] - Classified failures
//! - Provider traits for the engine's external collaborators
//!
//! # Architecture
//!
//! This crate is part of Layer 1. The executor (`opchain_runtime`) and the
//! binder (`opchain_bind`) build on the types defined here.

mod context;
mod error;
mod hook;
mod phase;
mod provider;
mod registry;
mod spec;
mod step;
mod target;

pub use context::{CancelSignal, Env, ExecutionContext};
pub use error::{OpError, RegistryError};
pub use hook::{Hook, HookPredicate, HookSelector};
pub use phase::{Phase, PhaseDirection, UnknownPhase};
pub use provider::{
    CanonicalHandlers, NoCanonicalHandlers, PassthroughSchemas, SchemaProvider,
    TransactionProvider, TransactionSource,
};
pub use registry::{ChangeSet, OperationRegistry, Subscriber, SubscriptionId};
pub use spec::{
    Exposure, OpKey, OperationSpec, OperationSpecBuilder, SchemaRef, SpecOverride, validate_alias,
};
pub use step::{BoxFuture, BoxedStep, Step, StepFn, StepResult, SyncStep};
pub use target::{Arity, PersistPolicy, Target};
