//! Resource binding for opchain.
//!
//! This crate connects resource declarations to runnable operations:
//!
//! - [`ResourceDecl`] - What a resource offers: wiring, renames, declared
//!   specs, resource hooks and its providers
//! - [`SpecResolver`] - Canonical, declared and registered specs merged into
//!   one effective list per resource
//! - [`Binder`] - Builds per-operation chains, keeps them current as the
//!   registry changes and invokes them
//! - [`RouteTable`] - Wire routes derived from the effective specs
//!
//! # Architecture
//!
//! This crate is Layer 3. It depends on `opchain_spec` for the data model,
//! on `opchain_runtime` for chain building and execution and on
//! `opchain_core` for configuration.

mod binder;
mod binding;
mod decl;
mod diagnostics;
mod error;
mod resolver;
mod routes;

pub use binder::{BindListener, Binder, CallOptions};
pub use binding::{BoundOperation, ResourceBinding, SpecIndex};
pub use decl::{AliasPolicy, ResourceDecl, ResourceDeclBuilder, WiringMode, WiringPolicy};
pub use diagnostics::{BindingSnapshot, Diagnostic, DiagnosticKind, DiagnosticLog, OperationSnapshot};
pub use error::{BindError, CallError};
pub use resolver::SpecResolver;
pub use routes::{HttpVerb, Route, RouteMatch, RouteTable, UnknownVerb};
