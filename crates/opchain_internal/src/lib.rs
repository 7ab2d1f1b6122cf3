//! # opchain Internal Library
//!
//! Re-exports the core opchain crates for convenience.

/// Layer 1: Configuration and tracing setup.
pub use opchain_core;

/// Layer 1: Operation specs, phases, hooks and the operation registry.
pub use opchain_spec;

/// Layer 2: Hook merging and the phase executor.
pub use opchain_runtime;

/// Layer 3: Spec resolution, binding and invocation.
pub use opchain_bind;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use opchain_bind::{
        AliasPolicy, BindError, Binder, CallError, CallOptions, HttpVerb, ResourceDecl,
        WiringPolicy,
    };
    pub use opchain_core::{EngineConfig, RouteConfig, TracingSetup};
    pub use opchain_runtime::{Disposition, InvocationError};
    pub use opchain_spec::{
        Arity, CancelSignal, CanonicalHandlers, ExecutionContext, Exposure, Hook, OpError, OpKey,
        OperationSpec, PersistPolicy, Phase, SchemaProvider, SchemaRef, SpecOverride, Step,
        StepFn, Target, TransactionProvider, TransactionSource,
    };
}
