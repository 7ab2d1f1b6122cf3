//! Executable steps.
//!
//! A [`Step`] is one unit of work inside a phase chain: a hook body, the
//! engine's begin/commit steps, or the core handler. Steps receive the
//! invocation's [`ExecutionContext`] mutably and may suspend.
//!
//! # Example
//!
//! ```
//! use opchain_spec::{OpError, StepFn};
//!
//! let stamp = StepFn::new("stamp", |ctx| {
//!     Box::pin(async move {
//!         ctx.temp.insert("stamped".into(), true.into());
//!         Ok::<(), OpError>(())
//!     })
//! });
//!
//! let reject = StepFn::sync("reject_empty", |ctx| {
//!     if ctx.payload.is_null() {
//!         return Err(OpError::validation("payload is required"));
//!     }
//!     Ok(())
//! });
//! # let _ = (stamp, reject);
//! ```

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::OpError;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of running one step.
pub type StepResult = Result<(), OpError>;

/// One unit of work in a phase chain.
pub trait Step: Send + Sync + 'static {
    /// Runs the step against the invocation context.
    ///
    /// # Errors
    ///
    /// Returns the [`OpError`] that fails the current phase.
    fn run<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, StepResult>;

    /// Returns the step's name for diagnostics and tracing.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

/// Shared, type-erased step.
pub type BoxedStep = Arc<dyn Step>;

/// A step wrapping an async closure.
pub struct StepFn<F> {
    name: String,
    func: F,
}

impl<F> StepFn<F> {
    /// Creates a named step from a closure returning a boxed future.
    pub fn new(name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Step for StepFn<F>
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    fn run<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, StepResult> {
        (self.func)(ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for StepFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFn").field("name", &self.name).finish()
    }
}

/// A step wrapping a synchronous closure.
pub struct SyncStep<F> {
    name: String,
    func: F,
}

impl StepFn<()> {
    /// Creates a named step from a synchronous closure.
    pub fn sync<F>(name: impl Into<String>, func: F) -> SyncStep<F>
    where
        F: Fn(&mut ExecutionContext) -> StepResult + Send + Sync + 'static,
    {
        SyncStep {
            name: name.into(),
            func,
        }
    }
}

impl<F> Step for SyncStep<F>
where
    F: Fn(&mut ExecutionContext) -> StepResult + Send + Sync + 'static,
{
    fn run<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, StepResult> {
        Box::pin(core::future::ready((self.func)(ctx)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for SyncStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStep").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Env;
    use crate::target::{Arity, Target};
    use serde_json::{Value, json};

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            Env::new("widget", "create", Target::Create, Arity::Collection),
            Value::Null,
        )
    }

    #[tokio::test]
    async fn async_step_mutates_context() {
        let step = StepFn::new("fill", |ctx| {
            Box::pin(async move {
                ctx.result = Some(json!(1));
                Ok::<(), OpError>(())
            })
        });
        let mut ctx = ctx();
        step.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.result, Some(json!(1)));
        assert_eq!(step.name(), "fill");
    }

    #[tokio::test]
    async fn sync_step_propagates_error() {
        let step = StepFn::sync("fail", |_| Err(OpError::hook("boom")));
        let mut ctx = ctx();
        assert_eq!(step.run(&mut ctx).await, Err(OpError::hook("boom")));
    }

    #[test]
    fn steps_erase_to_arc() {
        let steps: Vec<BoxedStep> = vec![
            Arc::new(StepFn::sync("a", |_| Ok(()))),
            Arc::new(StepFn::new("b", |_| Box::pin(async { Ok::<(), OpError>(()) }))),
        ];
        let names: Vec<_> = steps.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
