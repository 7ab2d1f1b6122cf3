//! Example widget store built with opchain.
//!
//! This example shows how a resource is declared once and then served through
//! every surface the binder offers. Canonical targets dispatch to an
//! in-memory [`WidgetStore`], requests are checked by [`WidgetSchemas`] and
//! every persisting operation runs inside a snapshot transaction.
//!
//! # Lifecycle
//!
//! ```text
//! PRE_TX_BEGIN ─▶ START_TX ─▶ PRE_HANDLER ─▶ HANDLER ─▶ POST_HANDLER
//!                 (begin)     (validate,                    │
//!                              guard)                       ▼
//!  FINAL ◀─ POST_RESPONSE ◀─ POST_COMMIT ◀─ END_TX ◀─ PRE_COMMIT
//!                            (audit)        (commit)
//! ```
//!
//! A failure inside the transactional window rolls the store back to the
//! snapshot taken at begin.

mod schemas;
mod store;

pub use schemas::{NewWidget, Widget, WidgetPatch, WidgetSchemas};
pub use store::{StoreTransactions, WidgetStore};

use opchain_bind::{ResourceDecl, WiringPolicy};
use opchain_spec::{Hook, OpError, OperationSpec, PersistPolicy, Phase, StepFn, Target};
use serde_json::{Value, json};

/// Name of the demo resource.
pub const RESOURCE: &str = "widget";

/// Names the guard hook refuses.
const RESERVED_NAMES: [&str; 2] = ["admin", "root"];

/// Refuses reserved widget names after validation.
fn guard() -> Hook {
    Hook::new(
        "reserved_names",
        Phase::PreHandler,
        StepFn::sync("reserved_names", |ctx| {
            let name = ctx.payload.get("name").and_then(Value::as_str).unwrap_or_default();
            if RESERVED_NAMES.contains(&name) {
                return Err(OpError::hook(format!("'{name}' is a reserved name")));
            }
            Ok(())
        }),
    )
    .for_aliases(["create", "update"])
    .with_predicate(|payload| payload.get("name").is_some())
}

fn audit() -> Hook {
    Hook::new(
        "audit",
        Phase::PostCommit,
        StepFn::sync("audit", |ctx| {
            tracing::info!(
                alias = %ctx.env.alias,
                invocation_id = %ctx.env.invocation_id,
                "widget change committed"
            );
            Ok(())
        }),
    )
    .for_aliases(["create", "update", "delete", "clear"])
}

fn report_rollback() -> Hook {
    Hook::new(
        "report_rollback",
        Phase::OnRollback,
        StepFn::sync("report_rollback", |ctx| {
            let error = ctx.error.as_ref().map(ToString::to_string).unwrap_or_default();
            tracing::warn!(alias = %ctx.env.alias, %error, "widget change rolled back");
            Ok(())
        }),
    )
}

/// A custom read-only operation counting stored widgets.
fn count(store: &WidgetStore) -> Result<OperationSpec, OpError> {
    let store = store.clone();
    OperationSpec::builder("count", Target::Custom)
        .persist(PersistPolicy::Skip)
        .handler(StepFn::sync("count", move |ctx| {
            ctx.result = Some(json!({ "count": store.len() }));
            Ok(())
        }))
        .build()
}

/// Declares the `widget` resource over `store`.
///
/// `list` is exposed as `browse`.
///
/// # Errors
///
/// Returns an error if a declared operation is invalid.
pub fn widget_resource(store: &WidgetStore) -> Result<ResourceDecl, OpError> {
    let decl = ResourceDecl::builder(RESOURCE)
        .wiring(WiringPolicy::some([
            Target::Create,
            Target::Read,
            Target::Update,
            Target::Delete,
            Target::List,
            Target::Clear,
        ]))
        .rename(Target::List, "browse")
        .hook(guard())
        .hook(audit())
        .hook(report_rollback())
        .handlers(store.clone())
        .schemas(WidgetSchemas)
        .transactions(StoreTransactions::new(store))
        .spec(count(store)?)
        .build();
    Ok(decl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opchain_bind::{Binder, CallOptions, HttpVerb};

    fn bound() -> (Binder, WidgetStore) {
        let store = WidgetStore::new("item_id");
        let binder = Binder::new();
        binder.include(widget_resource(&store).unwrap()).unwrap();
        (binder, store)
    }

    #[tokio::test]
    async fn create_browse_and_count() {
        let (binder, _store) = bound();
        binder
            .call(RESOURCE, "create", json!({"name": "gear", "quantity": 4}), CallOptions::new())
            .await
            .unwrap();

        let listed = binder
            .call(RESOURCE, "browse", json!({}), CallOptions::new())
            .await
            .unwrap();
        assert_eq!(listed, json!([{"id": 1, "name": "gear", "quantity": 4}]));

        let count = binder
            .call(RESOURCE, "count", json!({}), CallOptions::new())
            .await
            .unwrap();
        assert_eq!(count, json!({"count": 1}));
    }

    #[tokio::test]
    async fn reserved_name_rolls_back() {
        let (binder, store) = bound();
        let err = binder
            .call(RESOURCE, "create", json!({"name": "admin"}), CallOptions::new())
            .await
            .unwrap_err();

        let err = err.invocation().unwrap();
        assert_eq!(err.phase, Phase::PreHandler);
        assert!(matches!(err.op_error(), OpError::Hook(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_widget_rolls_back_update() {
        let (binder, store) = bound();
        let err = binder
            .call(
                RESOURCE,
                "update",
                json!({"quantity": 1}),
                CallOptions::new().with_path_param("item_id", "7"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.invocation().unwrap().phase, Phase::Handler);
        assert!(store.is_empty());
    }

    #[test]
    fn routes_follow_renames() {
        let (binder, _store) = bound();
        let browse = binder.resolve_route(HttpVerb::Get, "/widget").unwrap();
        assert_eq!(browse.key.alias, "browse");
        let count = binder.resolve_route(HttpVerb::Post, "/widget/count").unwrap();
        assert_eq!(count.key.target, Target::Custom);
    }
}
