//! Hook merging and phase execution for opchain.
//!
//! This crate turns an [`OperationSpec`](opchain_spec::OperationSpec) plus its
//! hooks into runnable [`PhaseChains`] and runs them:
//!
//! - [`HookMerger`] - Orders hooks from four sources per phase and injects
//!   the engine's transaction steps
//! - [`PhaseChains`] - Immutable per-operation chain snapshot with opaque
//!   [`StepId`]s for introspection
//! - [`Executor`] - The invocation state machine with rollback and
//!   phase-specific error routing
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use opchain_runtime::{Executor, HookMerger, HookSources};
//! use opchain_spec::{
//!     Arity, CanonicalHandlers, Env, ExecutionContext, NoCanonicalHandlers, OperationSpec,
//!     StepFn, Target,
//! };
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let spec = OperationSpec::builder("ping", Target::Custom)
//!     .handler(StepFn::sync("ping", |ctx| {
//!         ctx.result = Some(json!("pong"));
//!         Ok(())
//!     }))
//!     .build()
//!     .unwrap()
//!     .stamped("health");
//!
//! let handlers: Arc<dyn CanonicalHandlers> = Arc::new(NoCanonicalHandlers);
//! let chains = HookMerger::new().build_chains(
//!     &spec,
//!     &HookSources::default(),
//!     opchain_runtime::handler_step(&spec, &handlers),
//! );
//!
//! let mut ctx = ExecutionContext::new(
//!     Env::new("health", "ping", Target::Custom, Arity::Collection),
//!     json!({}),
//! );
//! let result = Executor::new().run(&chains, &mut ctx).await.unwrap();
//! assert_eq!(result, json!("pong"));
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```
//!
//! # Architecture
//!
//! This crate is Layer 2. It depends on `opchain_spec` and is driven by the
//! binder in `opchain_bind`.

mod chain;
mod error;
mod executor;
mod merge;
mod steps;

pub use chain::{ChainStep, PhaseChain, PhaseChains, StepId};
pub use error::{Disposition, InvocationError};
pub use executor::Executor;
pub use merge::{HookMerger, HookSource, HookSources};
pub use steps::{BeginTransaction, CanonicalDispatch, CommitTransaction, MarkSkipPersist, handler_step};
