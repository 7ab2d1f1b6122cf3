//! Phase executor.
//!
//! The [`Executor`] carries one invocation through its [`PhaseChains`]:
//!
//! ```text
//! PRE_TX_BEGIN → START_TX → PRE_HANDLER → HANDLER → POST_HANDLER
//!   → PRE_COMMIT → END_TX → (response build) → POST_COMMIT
//!   → POST_RESPONSE → FINAL
//! ```
//!
//! `START_TX` and `END_TX` hold the engine's begin and commit steps and are
//! skipped entirely once `skip_persist` is set. The request payload is
//! validated on entry to `PRE_HANDLER`, before its hooks run.
//!
//! # Error routing
//!
//! | Failing phase | Rollback | Error phase | Outcome |
//! |---------------|----------|-------------|---------|
//! | `PRE_TX_BEGIN` | no | `ON_PRE_TX_BEGIN_ERROR` or `ON_ERROR` | error |
//! | `START_TX` .. `END_TX` | if active, then `ON_ROLLBACK` | `ON_<PHASE>_ERROR` or `ON_ERROR` | error |
//! | `POST_COMMIT` | no | `ON_POST_COMMIT_ERROR` or `ON_ERROR` | error |
//! | `POST_RESPONSE` | no | `ON_POST_RESPONSE_ERROR` or `ON_ERROR` | pre-phase result |
//!
//! `FINAL` runs last on success and on failure. Failures inside error
//! phases, `ON_ROLLBACK` and `FINAL` are logged and swallowed.
//!
//! # Example
//!
//! ```ignore
//! let executor = Executor::new().with_schema_provider(Arc::new(MySchemas));
//! let mut ctx = ExecutionContext::new(env, payload).with_transaction(tx);
//! let result = executor.run(&chains, &mut ctx).await?;
//! ```

use std::sync::Arc;

use opchain_spec::{ExecutionContext, OpError, PassthroughSchemas, Phase, SchemaProvider};
use serde_json::Value;
use tracing::Instrument;

use crate::chain::{PhaseChain, PhaseChains};
use crate::error::{Disposition, InvocationError};

/// Runs phase chains with transactional semantics and error routing.
#[derive(Clone)]
pub struct Executor {
    schemas: Arc<dyn SchemaProvider>,
    phase_spans: bool,
}

impl core::fmt::Debug for Executor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Executor")
            .field("phase_spans", &self.phase_spans)
            .finish_non_exhaustive()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an executor that accepts payloads and results unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: Arc::new(PassthroughSchemas),
            phase_spans: false,
        }
    }

    /// Sets the schema provider used for validation and response build.
    #[must_use]
    pub fn with_schema_provider(mut self, schemas: Arc<dyn SchemaProvider>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Opens a `tracing` span per phase in addition to the invocation span.
    #[must_use]
    pub fn with_phase_spans(mut self, enabled: bool) -> Self {
        self.phase_spans = enabled;
        self
    }

    /// Runs one invocation to completion.
    ///
    /// On success returns the final result (`null` when the handler produced
    /// none). On failure the original error is also recorded in `ctx.error`.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError`] when any phase other than `POST_RESPONSE`
    /// fails.
    pub async fn run(
        &self,
        chains: &PhaseChains,
        ctx: &mut ExecutionContext,
    ) -> Result<Value, InvocationError> {
        let span = tracing::info_span!(
            "invocation",
            resource = %ctx.env.resource,
            alias = %ctx.env.alias,
            target = %ctx.env.target,
            invocation_id = %ctx.env.invocation_id,
        );

        async move {
            let outcome = self.lifecycle(chains, ctx).await;
            self.run_quietly(Phase::Final, chains, ctx).await;

            match &outcome {
                Ok(_) => tracing::debug!("invocation completed"),
                Err(err) => tracing::debug!(
                    phase = %err.phase,
                    disposition = %err.disposition,
                    "invocation failed"
                ),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn lifecycle(
        &self,
        chains: &PhaseChains,
        ctx: &mut ExecutionContext,
    ) -> Result<Value, InvocationError> {
        for phase in [
            Phase::PreTxBegin,
            Phase::StartTx,
            Phase::PreHandler,
            Phase::Handler,
            Phase::PostHandler,
            Phase::PreCommit,
            Phase::EndTx,
        ] {
            self.advance(phase, chains, ctx).await?;
        }

        self.build_response(chains, ctx);
        self.advance(Phase::PostCommit, chains, ctx).await?;

        let before = ctx.result.clone();
        if let Err(err) = self.enter(Phase::PostResponse, chains, ctx).await {
            let err = match err {
                OpError::ResponseShaping(_) => err,
                other => OpError::response_shaping(other.to_string()),
            };
            tracing::warn!(error = %err, "response shaping failed, keeping previous result");
            ctx.error = Some(err);
            self.run_error_phase(Phase::PostResponse, chains, ctx).await;
            ctx.result = before;
        }

        Ok(ctx.result.clone().unwrap_or(Value::Null))
    }

    /// Runs one lifecycle phase, routing a failure.
    async fn advance(
        &self,
        phase: Phase,
        chains: &PhaseChains,
        ctx: &mut ExecutionContext,
    ) -> Result<(), InvocationError> {
        match self.enter(phase, chains, ctx).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(phase, err, chains, ctx).await),
        }
    }

    /// Runs one lifecycle phase without routing.
    async fn enter(
        &self,
        phase: Phase,
        chains: &PhaseChains,
        ctx: &mut ExecutionContext,
    ) -> Result<(), OpError> {
        if ctx.is_cancelled() {
            return Err(OpError::Cancelled(phase.to_string()));
        }
        if matches!(phase, Phase::StartTx | Phase::EndTx) && ctx.skip_persist() {
            tracing::trace!(%phase, "persistence skipped");
            return Ok(());
        }

        ctx.enter_phase(phase);
        if phase == Phase::PreHandler
            && let Some(schema) = chains.request_schema()
        {
            ctx.payload = self.schemas.validate(schema, &ctx.payload)?;
        }

        self.run_chain(phase, chains.get(phase), ctx).await
    }

    async fn run_chain(
        &self,
        phase: Phase,
        chain: &PhaseChain,
        ctx: &mut ExecutionContext,
    ) -> Result<(), OpError> {
        let steps = async {
            ctx.enter_phase(phase);
            for step in chain.iter() {
                if !step.accepts(&ctx.payload) {
                    tracing::trace!(step = %step.id(), "predicate rejected payload, step skipped");
                    continue;
                }
                tracing::trace!(step = %step.id(), "running step");
                step.step().run(ctx).await?;
            }
            Ok::<(), OpError>(())
        };

        if self.phase_spans {
            steps
                .instrument(tracing::debug_span!("phase", %phase))
                .await
        } else {
            steps.await
        }
    }

    /// Serializes the handler result through the response schema.
    fn build_response(&self, chains: &PhaseChains, ctx: &mut ExecutionContext) {
        let (Some(schema), Some(result)) = (chains.response_schema(), ctx.result.as_ref()) else {
            return;
        };
        match self.schemas.serialize(schema, result) {
            Ok(wire) => ctx.result = Some(wire),
            Err(err) => {
                tracing::warn!(
                    schema = %schema,
                    error = %err,
                    "response serialization failed, keeping raw result"
                );
            }
        }
    }

    /// Routes a lifecycle failure and builds the caller-facing error.
    async fn fail(
        &self,
        phase: Phase,
        err: OpError,
        chains: &PhaseChains,
        ctx: &mut ExecutionContext,
    ) -> InvocationError {
        tracing::warn!(%phase, error = %err, kind = err.kind(), "phase failed");
        ctx.error = Some(err.clone());

        let disposition = if phase.rolls_back() {
            self.roll_back(chains, ctx).await
        } else if phase == Phase::PreTxBegin {
            Disposition::NotStarted
        } else if ctx.skip_persist() || !chains.persist().persists() {
            Disposition::NoTransaction
        } else {
            Disposition::Committed
        };

        self.run_error_phase(phase, chains, ctx).await;

        InvocationError {
            phase,
            disposition,
            source: err,
        }
    }

    /// Rolls back an active transaction, then runs `ON_ROLLBACK`.
    async fn roll_back(&self, chains: &PhaseChains, ctx: &mut ExecutionContext) -> Disposition {
        let Some(tx) = ctx.transaction.clone() else {
            return Disposition::NoTransaction;
        };
        if !tx.in_transaction().await {
            return Disposition::NoTransaction;
        }

        if let Err(err) = tx.rollback().await {
            tracing::error!(error = %err, "rollback failed");
        }
        self.run_quietly(Phase::OnRollback, chains, ctx).await;
        Disposition::RolledBack
    }

    /// Runs the phase-specific error phase if it has steps, else `ON_ERROR`.
    async fn run_error_phase(&self, failed: Phase, chains: &PhaseChains, ctx: &mut ExecutionContext) {
        let target = failed
            .error_phase()
            .filter(|p| chains.has_steps(*p))
            .unwrap_or(Phase::OnError);
        self.run_quietly(target, chains, ctx).await;
    }

    /// Runs a phase whose failures are logged and swallowed.
    async fn run_quietly(&self, phase: Phase, chains: &PhaseChains, ctx: &mut ExecutionContext) {
        let chain = chains.get(phase);
        if chain.is_empty() {
            return;
        }
        if let Err(err) = self.run_chain(phase, chain, ctx).await {
            tracing::warn!(%phase, error = %err, "hook failed, ignored");
        }
    }
}
