//! Contracts the engine requires from its external collaborators.
//!
//! - [`TransactionProvider`] / [`TransactionSource`]: storage transaction API
//! - [`SchemaProvider`]: payload validation and result serialization
//! - [`CanonicalHandlers`]: storage-backed implementations of canonical targets

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::OpError;
use crate::spec::SchemaRef;
use crate::target::Target;

/// Transaction API of the underlying storage engine.
///
/// Every method may suspend; the engine never assumes synchronous semantics.
#[async_trait]
pub trait TransactionProvider: Send + Sync + 'static {
    /// Begins a transaction.
    async fn begin(&self) -> Result<(), OpError>;

    /// Commits the active transaction.
    async fn commit(&self) -> Result<(), OpError>;

    /// Rolls back the active transaction.
    async fn rollback(&self) -> Result<(), OpError>;

    /// Returns whether a transaction is currently active.
    async fn in_transaction(&self) -> bool;
}

/// Produces one transaction handle per invocation.
pub trait TransactionSource: Send + Sync + 'static {
    /// Opens a handle for a new invocation. No transaction is begun yet.
    fn open(&self) -> Arc<dyn TransactionProvider>;
}

/// Validator and serializer lookup keyed by [`SchemaRef`].
pub trait SchemaProvider: Send + Sync + 'static {
    /// Validates an inbound payload, returning the normalized value.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::Validation`] when the payload is rejected.
    fn validate(&self, schema: &SchemaRef, raw: &Value) -> Result<Value, OpError>;

    /// Converts a handler result into its wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error when the result cannot be represented.
    fn serialize(&self, schema: &SchemaRef, result: &Value) -> Result<Value, OpError>;
}

/// Schema provider that accepts every payload unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSchemas;

impl SchemaProvider for PassthroughSchemas {
    fn validate(&self, _schema: &SchemaRef, raw: &Value) -> Result<Value, OpError> {
        Ok(raw.clone())
    }

    fn serialize(&self, _schema: &SchemaRef, result: &Value) -> Result<Value, OpError> {
        Ok(result.clone())
    }
}

fn unsupported(target: Target) -> OpError {
    OpError::handler(format!("{target} not supported"))
}

/// Canonical implementations for one resource.
///
/// The engine dispatches every non-custom target to the matching method. A
/// resource implements only the targets its storage supports; the rest fail
/// with [`OpError::Handler`].
#[async_trait]
pub trait CanonicalHandlers: Send + Sync + 'static {
    /// Creates one instance from `ctx.payload`.
    async fn create(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::Create))
    }

    /// Reads the instance identified by the path parameters.
    async fn read(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::Read))
    }

    /// Partially updates one instance.
    async fn update(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::Update))
    }

    /// Replaces one instance.
    async fn replace(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::Replace))
    }

    /// Merges fields into one instance.
    async fn merge(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::Merge))
    }

    /// Deletes one instance.
    async fn delete(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::Delete))
    }

    /// Lists instances matching the payload filters.
    async fn list(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::List))
    }

    /// Deletes every instance matching the payload filters.
    async fn clear(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::Clear))
    }

    /// Creates many instances.
    async fn bulk_create(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::BulkCreate))
    }

    /// Partially updates many instances.
    async fn bulk_update(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::BulkUpdate))
    }

    /// Replaces many instances.
    async fn bulk_replace(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::BulkReplace))
    }

    /// Merges into many instances.
    async fn bulk_merge(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::BulkMerge))
    }

    /// Deletes many instances.
    async fn bulk_delete(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        Err(unsupported(Target::BulkDelete))
    }
}

/// Handlers for resources that expose no canonical behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCanonicalHandlers;

impl CanonicalHandlers for NoCanonicalHandlers {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Env;
    use crate::target::Arity;
    use serde_json::json;

    #[tokio::test]
    async fn default_handlers_report_unsupported_target() {
        let mut ctx = ExecutionContext::new(
            Env::new("widget", "merge", Target::Merge, Arity::Member),
            json!({}),
        );
        let err = NoCanonicalHandlers.merge(&mut ctx).await.unwrap_err();
        assert_eq!(err, OpError::handler("merge not supported"));
    }

    #[test]
    fn passthrough_returns_input() {
        let schema = SchemaRef::new("widget.create.request");
        let value = json!({"name": "a"});
        assert_eq!(PassthroughSchemas.validate(&schema, &value).unwrap(), value);
        assert_eq!(PassthroughSchemas.serialize(&schema, &value).unwrap(), value);
    }
}
