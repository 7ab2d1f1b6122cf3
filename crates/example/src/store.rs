//! In-memory widget storage and its transactions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use opchain_spec::{
    CanonicalHandlers, ExecutionContext, OpError, TransactionProvider, TransactionSource,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::schemas::{NewWidget, Widget, WidgetPatch};

#[derive(Debug, Clone, Default)]
struct Rows {
    next_id: u64,
    widgets: BTreeMap<u64, Widget>,
}

/// Shared in-memory widget table.
///
/// Cloning shares the table. Member operations read the identifier from the
/// configured member path parameter.
#[derive(Debug, Clone)]
pub struct WidgetStore {
    rows: Arc<Mutex<Rows>>,
    member_param: String,
}

impl WidgetStore {
    /// Creates an empty store addressed through `member_param`.
    pub fn new(member_param: impl Into<String>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(Rows::default())),
            member_param: member_param.into(),
        }
    }

    /// Returns the number of stored widgets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().widgets.len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn id(&self, ctx: &ExecutionContext) -> Result<u64, OpError> {
        let raw = ctx
            .path_param(&self.member_param)
            .ok_or_else(|| OpError::handler(format!("missing path parameter '{}'", self.member_param)))?;
        raw.parse()
            .map_err(|_| OpError::handler(format!("invalid widget id '{raw}'")))
    }

    fn snapshot(&self) -> Rows {
        self.rows.lock().clone()
    }

    fn restore(&self, rows: Rows) {
        *self.rows.lock() = rows;
    }
}

fn to_value(widget: &Widget) -> Result<Value, OpError> {
    serde_json::to_value(widget).map_err(|err| OpError::handler(err.to_string()))
}

fn body<T: serde::de::DeserializeOwned>(ctx: &ExecutionContext) -> Result<T, OpError> {
    serde_json::from_value(ctx.payload.clone()).map_err(|err| OpError::validation(err.to_string()))
}

fn not_found(id: u64) -> OpError {
    OpError::handler(format!("widget {id} not found"))
}

#[async_trait]
impl CanonicalHandlers for WidgetStore {
    async fn create(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        let new: NewWidget = body(ctx)?;
        let mut rows = self.rows.lock();
        rows.next_id += 1;
        let widget = Widget {
            id: rows.next_id,
            name: new.name,
            quantity: new.quantity,
        };
        rows.widgets.insert(widget.id, widget.clone());
        to_value(&widget)
    }

    async fn read(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        let id = self.id(ctx)?;
        let rows = self.rows.lock();
        rows.widgets.get(&id).ok_or_else(|| not_found(id)).and_then(to_value)
    }

    async fn update(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        let id = self.id(ctx)?;
        let patch: WidgetPatch = body(ctx)?;
        let mut rows = self.rows.lock();
        let widget = rows.widgets.get_mut(&id).ok_or_else(|| not_found(id))?;
        if let Some(name) = patch.name {
            widget.name = name;
        }
        if let Some(quantity) = patch.quantity {
            widget.quantity = quantity;
        }
        to_value(widget)
    }

    async fn delete(&self, ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        let id = self.id(ctx)?;
        let removed = self.rows.lock().widgets.remove(&id);
        removed.ok_or_else(|| not_found(id)).and_then(|w| to_value(&w))
    }

    async fn list(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        let rows = self.rows.lock();
        let widgets = rows
            .widgets
            .values()
            .map(to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(widgets))
    }

    async fn clear(&self, _ctx: &mut ExecutionContext) -> Result<Value, OpError> {
        let mut rows = self.rows.lock();
        let removed = rows.widgets.len();
        rows.widgets.clear();
        Ok(json!({ "removed": removed }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

/// Opens snapshot transactions over a [`WidgetStore`].
#[derive(Debug, Clone)]
pub struct StoreTransactions {
    store: WidgetStore,
}

impl StoreTransactions {
    /// Creates a source for `store`.
    #[must_use]
    pub fn new(store: &WidgetStore) -> Self {
        Self {
            store: store.clone(),
        }
    }
}

impl TransactionSource for StoreTransactions {
    fn open(&self) -> Arc<dyn TransactionProvider> {
        Arc::new(SnapshotTransaction {
            store: self.store.clone(),
            snapshot: Mutex::new(None),
        })
    }
}

/// Copies the table on begin and puts the copy back on rollback.
///
/// Concurrent writers are not isolated from each other; a rollback discards
/// every change made since its begin.
#[derive(Debug)]
struct SnapshotTransaction {
    store: WidgetStore,
    snapshot: Mutex<Option<Rows>>,
}

#[async_trait]
impl TransactionProvider for SnapshotTransaction {
    async fn begin(&self) -> Result<(), OpError> {
        let mut snapshot = self.snapshot.lock();
        if snapshot.is_some() {
            return Err(OpError::transaction("transaction already active"));
        }
        *snapshot = Some(self.store.snapshot());
        Ok(())
    }

    async fn commit(&self) -> Result<(), OpError> {
        self.snapshot
            .lock()
            .take()
            .map(|_| ())
            .ok_or_else(|| OpError::transaction("no active transaction"))
    }

    async fn rollback(&self) -> Result<(), OpError> {
        let rows = self
            .snapshot
            .lock()
            .take()
            .ok_or_else(|| OpError::transaction("no active transaction"))?;
        self.store.restore(rows);
        tracing::debug!(widgets = self.store.len(), "widget store restored");
        Ok(())
    }

    async fn in_transaction(&self) -> bool {
        self.snapshot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opchain_spec::{Arity, Env, Target};

    fn ctx(target: Target, payload: Value, id: Option<&str>) -> ExecutionContext {
        let env = Env::new("widget", target.as_str(), target, target.default_arity());
        let ctx = ExecutionContext::new(env, payload);
        match id {
            Some(id) => ctx.with_path_params([("item_id".to_string(), id.to_string())].into()),
            None => ctx,
        }
    }

    #[tokio::test]
    async fn create_then_read() {
        let store = WidgetStore::new("item_id");
        let created = store
            .create(&mut ctx(Target::Create, json!({"name": "gear", "quantity": 2}), None))
            .await
            .unwrap();
        assert_eq!(created, json!({"id": 1, "name": "gear", "quantity": 2}));

        let read = store.read(&mut ctx(Target::Read, json!({}), Some("1"))).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(Target::Read.default_arity(), Arity::Member);
    }

    #[tokio::test]
    async fn update_applies_present_fields_only() {
        let store = WidgetStore::new("item_id");
        store
            .create(&mut ctx(Target::Create, json!({"name": "gear", "quantity": 2}), None))
            .await
            .unwrap();

        let updated = store
            .update(&mut ctx(Target::Update, json!({"quantity": 5}), Some("1")))
            .await
            .unwrap();
        assert_eq!(updated, json!({"id": 1, "name": "gear", "quantity": 5}));
    }

    #[tokio::test]
    async fn missing_widget_is_a_handler_error() {
        let store = WidgetStore::new("item_id");
        let err = store
            .delete(&mut ctx(Target::Delete, json!({}), Some("9")))
            .await
            .unwrap_err();
        assert_eq!(err, OpError::handler("widget 9 not found"));

        let err = store
            .read(&mut ctx(Target::Read, json!({}), Some("nine")))
            .await
            .unwrap_err();
        assert!(matches!(err, OpError::Handler(_)));
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let store = WidgetStore::new("item_id");
        let tx = StoreTransactions::new(&store).open();

        tx.begin().await.unwrap();
        store
            .create(&mut ctx(Target::Create, json!({"name": "gear"}), None))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert!(tx.in_transaction().await);

        tx.rollback().await.unwrap();
        assert!(store.is_empty());
        assert!(!tx.in_transaction().await);
        assert!(tx.commit().await.is_err());
    }
}
