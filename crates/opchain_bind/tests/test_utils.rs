//! Shared test utilities for `opchain_bind` integration tests.
//!
//! Provides a recording trace, an in-memory widget store, a transaction
//! source and a schema provider. Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use opchain_bind::{ResourceDecl, ResourceDeclBuilder, WiringPolicy};
use opchain_spec::{
    CanonicalHandlers, ExecutionContext, Hook, OpError, Phase, SchemaProvider, SchemaRef, Step,
    StepFn, Target, TransactionProvider, TransactionSource,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

// ═══════════════════════════════════════════════════════════════════════════════
// TRACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered log shared by hooks, handlers and transactions.
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.0.lock().iter().any(|e| e == event)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn step(&self, label: &str) -> impl Step {
        let trace = self.clone();
        let label = label.to_string();
        StepFn::sync(label.clone(), move |_| {
            trace.push(label.clone());
            Ok(())
        })
    }

    /// A hook named `label` in `phase` that records `label`.
    pub fn hook(&self, label: &str, phase: Phase) -> Hook {
        Hook::new(label, phase, self.step(label))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Transaction handle recording `tx:*` events.
#[derive(Debug)]
pub struct RecordingTransaction {
    trace: Trace,
    active: Mutex<bool>,
}

#[async_trait]
impl TransactionProvider for RecordingTransaction {
    async fn begin(&self) -> Result<(), OpError> {
        self.trace.push("tx:begin");
        *self.active.lock() = true;
        Ok(())
    }

    async fn commit(&self) -> Result<(), OpError> {
        self.trace.push("tx:commit");
        *self.active.lock() = false;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), OpError> {
        self.trace.push("tx:rollback");
        *self.active.lock() = false;
        Ok(())
    }

    async fn in_transaction(&self) -> bool {
        *self.active.lock()
    }
}

/// Opens a fresh [`RecordingTransaction`] per invocation.
#[derive(Debug, Clone)]
pub struct RecordingTransactions {
    trace: Trace,
    opened: Arc<AtomicU64>,
}

impl RecordingTransactions {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: trace.clone(),
            opened: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }
}

impl TransactionSource for RecordingTransactions {
    fn open(&self) -> Arc<dyn TransactionProvider> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(RecordingTransaction {
            trace: self.trace.clone(),
            active: Mutex::new(false),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIDGET STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory canonical handlers keyed by the `item_id` path parameter.
#[derive(Debug, Clone, Default)]
pub struct Widgets {
    rows: Arc<Mutex<BTreeMap<String, Value>>>,
    next_id: Arc<AtomicU64>,
    trace: Option<Trace>,
}

impl Widgets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traced(trace: &Trace) -> Self {
        Self {
            trace: Some(trace.clone()),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    fn record(&self, event: &str) {
        if let Some(trace) = &self.trace {
            trace.push(event);
        }
    }

    fn id(ctx: &ExecutionContext) -> Result<String, OpError> {
        ctx.path_param("item_id")
            .map(str::to_string)
            .ok_or_else(|| OpError::handler("missing id"))
    }
}

#[async_trait]
impl CanonicalHandlers for Widgets {
    async fn create(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        self.record("handler:create");
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let mut row = ctx.payload.clone();
        if let Some(fields) = row.as_object_mut() {
            fields.insert("id".to_string(), json!(id));
        }
        self.rows.lock().insert(id, row.clone());
        Ok(row)
    }

    async fn read(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        self.record("handler:read");
        let id = Self::id(ctx)?;
        self.rows
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| OpError::handler(format!("widget {id} not found")))
    }

    async fn delete(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        self.record("handler:delete");
        let id = Self::id(ctx)?;
        self.rows
            .lock()
            .remove(&id)
            .ok_or_else(|| OpError::handler(format!("widget {id} not found")))
    }

    async fn list(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        self.record("handler:list");
        Ok(Value::Array(self.rows.lock().values().cloned().collect()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEMAS
// ═══════════════════════════════════════════════════════════════════════════════

/// Requires a string `name` on `create` requests. Everything else passes
/// through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedCreate;

impl SchemaProvider for NamedCreate {
    fn validate(&self, schema: &SchemaRef, raw: &Value) -> Result<Value, OpError> {
        if !schema.as_str().ends_with(".create.request") {
            return Ok(raw.clone());
        }
        match raw.get("name").and_then(Value::as_str) {
            Some(name) => Ok(json!({ "name": name })),
            None => Err(OpError::validation(format!("{schema}: name is required"))),
        }
    }

    fn serialize(&self, _schema: &SchemaRef, result: &Value) -> Result<Value, OpError> {
        Ok(result.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// A `widget` declaration wiring create, read, delete and list.
pub fn widget_decl(widgets: &Widgets) -> ResourceDeclBuilder {
    ResourceDecl::builder("widget")
        .wiring(WiringPolicy::some([
            Target::Create,
            Target::Read,
            Target::Delete,
            Target::List,
        ]))
        .handlers(widgets.clone())
        .schemas(NamedCreate)
}

/// A custom operation step that sets `result`.
pub fn returning(name: &str, result: Value) -> impl Step {
    StepFn::sync(name.to_string(), move |ctx| {
        ctx.result = Some(result.clone());
        Ok(())
    })
}
