//! Engine-managed steps injected into phase chains.

use std::sync::Arc;

use opchain_spec::{
    BoxFuture, BoxedStep, CanonicalHandlers, ExecutionContext, OpError, OperationSpec, Step,
    StepResult, Target,
};

/// Begins the invocation's transaction.
///
/// Does nothing when persistence was skipped or no transaction handle is
/// attached to the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeginTransaction;

impl Step for BeginTransaction {
    fn run<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            if ctx.skip_persist() {
                return Ok(());
            }
            let Some(tx) = ctx.transaction.clone() else {
                tracing::debug!(alias = %ctx.env.alias, "no transaction handle, begin skipped");
                return Ok(());
            };
            tx.begin().await
        })
    }

    fn name(&self) -> &str {
        "tx_begin"
    }
}

/// Commits the invocation's transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitTransaction;

impl Step for CommitTransaction {
    fn run<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            if ctx.skip_persist() {
                return Ok(());
            }
            let Some(tx) = ctx.transaction.clone() else {
                tracing::debug!(alias = %ctx.env.alias, "no transaction handle, commit skipped");
                return Ok(());
            };
            tx.commit().await
        })
    }

    fn name(&self) -> &str {
        "tx_commit"
    }
}

/// Marks the invocation as non-persisting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkSkipPersist;

impl Step for MarkSkipPersist {
    fn run<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, StepResult> {
        Box::pin(core::future::ready(ctx.mark_skip_persist()))
    }

    fn name(&self) -> &str {
        "skip_persist"
    }
}

/// Runs a canonical target against a resource's [`CanonicalHandlers`] and
/// stores the returned value as the invocation result.
pub struct CanonicalDispatch {
    target: Target,
    handlers: Arc<dyn CanonicalHandlers>,
}

impl CanonicalDispatch {
    /// Creates the dispatcher for `target`.
    pub fn new(target: Target, handlers: Arc<dyn CanonicalHandlers>) -> Self {
        Self { target, handlers }
    }
}

impl core::fmt::Debug for CanonicalDispatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CanonicalDispatch")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Step for CanonicalDispatch {
    fn run<'a>(&'a self, ctx: &'a mut ExecutionContext) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            let h = &self.handlers;
            let value = match self.target {
                Target::Create => h.create(ctx).await?,
                Target::Read => h.read(ctx).await?,
                Target::Update => h.update(ctx).await?,
                Target::Replace => h.replace(ctx).await?,
                Target::Merge => h.merge(ctx).await?,
                Target::Delete => h.delete(ctx).await?,
                Target::List => h.list(ctx).await?,
                Target::Clear => h.clear(ctx).await?,
                Target::BulkCreate => h.bulk_create(ctx).await?,
                Target::BulkUpdate => h.bulk_update(ctx).await?,
                Target::BulkReplace => h.bulk_replace(ctx).await?,
                Target::BulkMerge => h.bulk_merge(ctx).await?,
                Target::BulkDelete => h.bulk_delete(ctx).await?,
                Target::Custom => {
                    return Err(OpError::handler(format!(
                        "custom operation '{}' has no handler",
                        ctx.env.alias
                    )));
                }
            };
            ctx.result = Some(value);
            Ok(())
        })
    }

    fn name(&self) -> &str {
        self.target.as_str()
    }
}

/// Returns the core handler step of `spec`.
///
/// Custom operations run their own handler; every other target dispatches
/// to `handlers`.
#[must_use]
pub fn handler_step(spec: &OperationSpec, handlers: &Arc<dyn CanonicalHandlers>) -> BoxedStep {
    match spec.handler() {
        Some(handler) => Arc::clone(handler),
        None => Arc::new(CanonicalDispatch::new(spec.target(), Arc::clone(handlers))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opchain_spec::{Arity, Env, NoCanonicalHandlers, Phase, StepFn};
    use serde_json::{Value, json};

    struct Echo;

    #[async_trait]
    impl CanonicalHandlers for Echo {
        async fn create(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
            Ok(ctx.payload.clone())
        }
    }

    fn ctx(target: Target) -> ExecutionContext {
        ExecutionContext::new(
            Env::new("widget", target.as_str(), target, Arity::Collection),
            json!({"name": "a"}),
        )
    }

    #[tokio::test]
    async fn dispatch_stores_result() {
        let handlers: Arc<dyn CanonicalHandlers> = Arc::new(Echo);
        let step = CanonicalDispatch::new(Target::Create, handlers);
        let mut ctx = ctx(Target::Create);
        step.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.result, Some(json!({"name": "a"})));
    }

    #[tokio::test]
    async fn dispatch_reports_unsupported_target() {
        let handlers: Arc<dyn CanonicalHandlers> = Arc::new(Echo);
        let step = CanonicalDispatch::new(Target::List, handlers);
        let mut ctx = ctx(Target::List);
        let err = step.run(&mut ctx).await.unwrap_err();
        assert_eq!(err, OpError::handler("list not supported"));
        assert!(ctx.result.is_none());
    }

    #[tokio::test]
    async fn custom_spec_uses_its_own_handler() {
        let spec = OperationSpec::builder("ping", Target::Custom)
            .handler(StepFn::sync("ping", |ctx| {
                ctx.result = Some(json!("pong"));
                Ok(())
            }))
            .build()
            .unwrap();
        let handlers: Arc<dyn CanonicalHandlers> = Arc::new(NoCanonicalHandlers);
        let step = handler_step(&spec, &handlers);
        let mut ctx = ctx(Target::Custom);
        step.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.result, Some(json!("pong")));
    }

    #[tokio::test]
    async fn transaction_steps_without_handle_are_noops() {
        let mut ctx = ctx(Target::Create);
        BeginTransaction.run(&mut ctx).await.unwrap();
        CommitTransaction.run(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn skip_persist_step_respects_phase() {
        let mut ctx = ctx(Target::Create);
        ctx.enter_phase(Phase::PreTxBegin);
        MarkSkipPersist.run(&mut ctx).await.unwrap();
        assert!(ctx.skip_persist());
    }
}
