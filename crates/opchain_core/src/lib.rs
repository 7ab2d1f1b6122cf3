//! Core infrastructure for opchain.
//!
//! This crate provides the ambient pieces most opchain processes need:
//!
//! - [`EngineConfig`] - Engine configuration, built in code or read from the environment
//! - [`RouteConfig`] - Shape of generated wire routes
//! - [`TracingSetup`] - Logging and observability via the `tracing` crate
//!
//! # Example
//!
//! ```no_run
//! use opchain_core::EngineConfig;
//!
//! let config = EngineConfig::from_env().expect("valid configuration");
//! config.tracing().init();
//! ```
//!
//! # Architecture
//!
//! This crate is part of Layer 1 infrastructure:
//!
//! - **Layer 1** (`opchain_core`, `opchain_spec`): Configuration and the operation data model
//! - **Layer 2** (`opchain_runtime`): Hook merging and the phase executor
//! - **Layer 3** (`opchain_bind`): Spec resolution, binding and rebind

mod config;
mod tracing_setup;

pub use config::{
    ConfigError, ENV_LOG, ENV_LOG_FORMAT, ENV_MEMBER_PARAM, ENV_ROUTE_PREFIX, EngineConfig,
    RouteConfig,
};
pub use tracing_setup::{ParseFormatError, TracingFormat, TracingSetup};
