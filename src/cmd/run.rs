//! `service-template run`: start the server.
//!
//! Loads the layered configuration, applies CLI overrides, builds a
//! tokio runtime sized from `server.worker_threads`, and serves until
//! SIGTERM or Ctrl+C.

use std::net::SocketAddr;

use crate::cli::RunArgs;
use crate::config::{self, LoadedConfig};
use crate::error::ServiceError;
use crate::logging;
use crate::server;

pub fn execute(args: RunArgs) -> Result<(), ServiceError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let mut loaded = config::load(
        &args.config.config_dir,
        &args.config.app_id,
        &args.config.environment,
    )?;
    apply_overrides(&mut loaded, &args);

    let runtime = build_runtime(loaded.config.server.worker_threads)?;
    runtime.block_on(serve(loaded))
}

fn apply_overrides(loaded: &mut LoadedConfig, args: &RunArgs) {
    if let Some(port) = args.port {
        loaded.config.endpoints.port = port;
    }
    if let Some(ref host) = args.host {
        loaded.config.endpoints.host.clone_from(host);
    }
}

/// Multi-threaded runtime; `0` workers means one per core.
pub fn build_runtime(worker_threads: usize) -> Result<tokio::runtime::Runtime, ServiceError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }
    Ok(builder.enable_all().build()?)
}

async fn serve(loaded: LoadedConfig) -> Result<(), ServiceError> {
    let endpoints = &loaded.config.endpoints;
    let addr: SocketAddr = format!("{}:{}", endpoints.host, endpoints.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        environment = %loaded.environment,
        worker_threads = loaded.config.server.worker_threads,
        "binding listener"
    );

    server::serve(loaded, listener, server::shutdown_signal()).await
}
