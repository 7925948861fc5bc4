//! HTTP endpoint handlers.
//!
//! [`health`] is the only endpoint a real service keeps. Everything
//! else demonstrates one template feature and is meant to be deleted
//! once the service has endpoints of its own:
//!
//! - [`example`] -- payload validation and manually raised errors.
//! - [`basic_auth`] -- a Basic Auth protected endpoint.
//! - [`downstream`] -- an async call to a downstream HTTP service.
//! - [`proxy`] -- request passthrough to another service.
//! - [`database`] -- a query against an embedded database.
//!
//! Route registration lives in [`crate::server::build_router`].

pub mod basic_auth;
pub mod database;
pub mod downstream;
pub mod example;
pub mod health;
pub mod proxy;
