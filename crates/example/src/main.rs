//! Example widget store CLI.
//!
//! Declares the `widget` resource, runs a short scripted session against it
//! through the callable, RPC and wire-route surfaces and prints the bound
//! layout.
//!
//! # Usage
//!
//! ```bash
//! OPCHAIN_LOG=opchain=debug widgets
//! ```
//!
//! Configuration is read from the environment (and `.env`):
//! `OPCHAIN_LOG`, `OPCHAIN_LOG_FORMAT`, `OPCHAIN_ROUTE_PREFIX` and
//! `OPCHAIN_MEMBER_PARAM`.

use example::{RESOURCE, WidgetSchemas, WidgetStore, widget_resource};
use opchain_bind::{Binder, CallError, CallOptions, HttpVerb};
use opchain_core::EngineConfig;
use opchain_spec::SchemaRef;
use serde_json::{Value, json};

fn show(label: &str, outcome: Result<Value, CallError>) {
    match outcome {
        Ok(value) => println!("[{label}] {value}"),
        Err(err) => println!("[{label}] error: {err}"),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: invalid configuration: {e}");
        std::process::exit(1);
    });
    config.tracing().init();

    let store = WidgetStore::new(config.routes().member_param());
    let binder = Binder::with_config(&config);
    let included = widget_resource(&store).map_err(|e| e.to_string()).and_then(|decl| {
        binder.include(decl).map_err(|e| e.to_string())
    });
    if let Err(e) = included {
        eprintln!("Error: cannot bind {RESOURCE}: {e}");
        std::process::exit(1);
    }

    // Callable surface
    show(
        "create",
        binder
            .call(RESOURCE, "create", json!({"name": "sprocket", "quantity": 3}), CallOptions::new())
            .await,
    );
    show(
        "create (blank name)",
        binder
            .call(RESOURCE, "create", json!({"name": " "}), CallOptions::new())
            .await,
    );
    show(
        "create (reserved name)",
        binder
            .call(RESOURCE, "create", json!({"name": "admin"}), CallOptions::new())
            .await,
    );

    // RPC surface
    let method = format!("{RESOURCE}.create");
    if let Some((resource, key)) = binder.resolve_rpc(&method) {
        show(
            &method,
            binder
                .call_key(&resource, &key, json!({"name": "gear"}), CallOptions::new())
                .await,
        );
    }

    // Wire routes
    let prefix = config.routes().prefix();
    for (verb, path, body) in [
        (HttpVerb::Patch, format!("{prefix}/{RESOURCE}/1"), json!({"quantity": 10})),
        (HttpVerb::Get, format!("{prefix}/{RESOURCE}/1"), json!({})),
        (HttpVerb::Delete, format!("{prefix}/{RESOURCE}/2"), json!({})),
        (HttpVerb::Get, format!("{prefix}/{RESOURCE}"), json!({})),
    ] {
        let label = format!("{verb} {path}");
        match binder.resolve_route(verb, &path) {
            Some(route) => {
                let options = CallOptions::new().with_path_params(route.path_params.clone());
                let outcome = binder.call_key(&route.resource, &route.key, body, options).await;
                if outcome.is_ok() {
                    println!("[{label}] -> {}", route.status);
                }
                show(&label, outcome);
            }
            None => println!("[{label}] no route"),
        }
    }

    show(
        "count",
        binder
            .call(RESOURCE, "count", json!({}), CallOptions::new())
            .await,
    );

    // Introspection
    if let Some(snapshot) = binder.snapshot(RESOURCE) {
        println!("\n[Routes]");
        for route in &snapshot.routes {
            println!("  {route}");
        }
        println!("[RPC] {}", snapshot.rpc_methods.join(", "));
    }
    if let Some(schema) = WidgetSchemas::json_schema(&SchemaRef::request(RESOURCE, "create")) {
        println!("[Schema widget.create.request] {schema}");
    }
    for diagnostic in binder.diagnostics() {
        println!("[Diagnostic] {:?}: {}", diagnostic.kind, diagnostic.message);
    }
}
