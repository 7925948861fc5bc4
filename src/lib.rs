//! A template for HTTP microservices.
//!
//! The crate is a working service skeleton: layered configuration, a
//! uniform error contract, basic auth, metrics, service registration,
//! and a handful of example endpoints showing each feature in use. A
//! real service keeps the plumbing, deletes the examples, and adds its
//! own endpoints under [`endpoints`].
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Layered YAML configuration, per-environment overrides,
//!   and validation.
//! - [`api_error`] -- The error taxonomy and the JSON error contract
//!   returned to HTTP clients.
//! - [`error`] -- Startup and CLI error types using `thiserror`.
//! - [`validation`] -- The validating JSON extractor used by handlers.
//! - [`security`] -- Basic Auth validation middleware.
//! - [`endpoints`] -- HTTP handlers: healthcheck plus the examples.
//! - [`client`] -- The shared connection-pooled outbound HTTP client.
//! - [`metrics`] -- Per-endpoint request metrics and periodic reporters.
//! - [`app_info`] -- Instance identity (app, data center, environment).
//! - [`registration`] -- Startup/shutdown hooks for service discovery.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Composition of state and router, serving, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `sqlite` | Embedded SQLite database for the database example _(enabled by default)_ |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod api_error;
pub mod app_info;
pub mod cli;
pub mod client;
pub mod cmd;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod registration;
pub mod security;
pub mod server;
pub mod validation;
