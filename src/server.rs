//! Server composition, shared application state, and graceful shutdown.
//!
//! [`build_components`] turns a [`LoadedConfig`] into everything the
//! server needs: the `Arc`-shared [`AppState`], metrics reporters, and
//! registration hooks. [`build_router`] wires endpoints, security,
//! metrics, and error translation into an axum router. [`serve`] runs
//! the whole thing on a bound listener until the shutdown future fires.

use std::any::Any;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::api_error::{ApiException, CoreApiError};
use crate::app_info::{self, AppInfo};
use crate::client::{self, HttpClient};
use crate::config::model::AppConfig;
use crate::config::LoadedConfig;
use crate::endpoints::database::Database;
use crate::endpoints::{basic_auth, database, downstream, example, health, proxy};
use crate::error::ServiceError;
use crate::metrics::{self, MetricsListener, Reporter};
use crate::registration::{self, ServerHook};
use crate::security::{self, BasicAuthValidator};

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub environment: String,
    pub http_client: HttpClient,
    pub app_info: AppInfo,
    pub auth: Arc<BasicAuthValidator>,
    /// Base URL the example endpoints use to call back into this server.
    pub self_base_url: String,
    pub database: Option<Database>,
    pub metrics: Option<Arc<MetricsListener>>,
    pub start_time: Instant,
}

pub struct Components {
    pub state: Arc<AppState>,
    pub reporters: Vec<Box<dyn Reporter>>,
    pub hooks: Vec<Box<dyn ServerHook>>,
}

/// `http://<addr>`, with an unspecified bind address replaced by loopback.
#[must_use]
pub fn self_base_url(local_addr: SocketAddr) -> String {
    let ip = match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, local_addr.port()))
}

pub async fn build_components(loaded: &LoadedConfig, local_addr: SocketAddr) -> Components {
    let config = Arc::new(loaded.config.clone());
    let http_client = client::build_http_client();
    let app_info = app_info::resolve(&config, &loaded.environment, &http_client).await;

    let reporters = metrics::reporters_from_config(&config.metrics, &app_info);
    let metrics = (!reporters.is_empty())
        .then(|| Arc::new(MetricsListener::new(config.metrics.report_runtime_metrics)));

    let hooks = registration::hooks_from_config(&config, &app_info, &http_client);
    let database = Database::open(&config.database).await;

    let auth = Arc::new(BasicAuthValidator::new(
        &config.example_basic_auth.username,
        &config.example_basic_auth.password,
        &config.app_id,
    ));

    let state = Arc::new(AppState {
        environment: loaded.environment.clone(),
        http_client,
        app_info,
        auth,
        self_base_url: self_base_url(local_addr),
        database,
        metrics,
        start_time: Instant::now(),
        config,
    });

    Components {
        state,
        reporters,
        hooks,
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_layer =
        middleware::from_fn_with_state(state.auth.clone(), security::require_basic_auth);
    let protect_all = state.config.security.protect_all_endpoints;

    let basic_auth_routes = if protect_all {
        get(basic_auth::get_auth_header).post(basic_auth::post_protected)
    } else {
        get(basic_auth::get_auth_header)
            .merge(post(basic_auth::post_protected).route_layer(auth_layer.clone()))
    };

    let mut examples = Router::new()
        .route(
            example::MATCHING_PATH,
            get(example::get_example).post(example::post_example),
        )
        .route(basic_auth::MATCHING_PATH, basic_auth_routes)
        .route(downstream::MATCHING_PATH, any(downstream::call_downstream))
        .route(proxy::MATCHING_PATH, any(proxy::proxy_to_example))
        .route(database::MATCHING_PATH, any(database::query_version));
    if protect_all {
        examples = examples.route_layer(auth_layer);
    }

    let mut router = Router::new()
        .route(health::MATCHING_PATH, any(health::healthcheck))
        .merge(examples)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(panic_response));

    if let Some(listener) = &state.metrics {
        router = router.layer(middleware::from_fn_with_state(
            listener.clone(),
            metrics::track,
        ));
    }

    let max_body = state.config.server.max_request_size_bytes;
    // Checked by `validation::RequestBody`.
    router = if max_body > 0 {
        router.layer(DefaultBodyLimit::max(max_body))
    } else {
        router.layer(DefaultBodyLimit::disable())
    };

    let level = if state.config.debug.request_logging {
        Level::INFO
    } else {
        Level::DEBUG
    };

    router
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(level))
                    .on_response(DefaultOnResponse::new().level(level)),
            ),
        )
        .with_state(state)
}

async fn not_found() -> ApiException {
    ApiException::new(CoreApiError::NotFound)
}

async fn method_not_allowed() -> ApiException {
    ApiException::new(CoreApiError::MethodNotAllowed)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "unknown panic payload".to_string());
    ApiException::new(CoreApiError::GenericServiceError)
        .with_message("request handler panicked")
        .with_log_detail("panic", detail)
        .into_response()
}

/// Run the composed server on `listener` until `shutdown` completes.
///
/// Startup hooks run once the listener is bound; shutdown hooks run
/// after in-flight requests drain.
pub async fn serve<F>(
    loaded: LoadedConfig,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    let Components {
        state,
        reporters,
        hooks,
    } = build_components(&loaded, local_addr).await;

    // Dropping or signalling shutdown_tx stops every background task.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let report_handle = match (&state.metrics, reporters.is_empty()) {
        (Some(listener), false) => {
            let listener = listener.clone();
            let interval = state.config.metrics.report_interval_secs;
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                metrics::report_loop(listener, reporters, interval, rx).await;
            }))
        }
        _ => None,
    };

    registration::run_startup_hooks(&hooks, local_addr).await;

    let router = build_router(state.clone());

    tracing::info!(
        addr = %local_addr,
        app_id = %state.app_info.app_id,
        environment = %state.environment,
        files = ?loaded.files,
        "server started"
    );

    let graceful_shutdown = async move {
        shutdown.await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    registration::run_shutdown_hooks(&hooks).await;

    if let Some(handle) = report_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "metrics reporter task failed");
        }
    }

    if let Some(database) = &state.database {
        database.close().await;
    }

    tracing::info!(
        uptime_secs = state.start_time.elapsed().as_secs(),
        "server stopped"
    );
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
