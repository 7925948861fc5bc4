//! Request metrics collection and periodic reporting.
//!
//! [`MetricsListener`] counts requests per matched route (total, by
//! status class, latency) and is fed by the [`track`] middleware.
//! Reporters implement [`Reporter`] and are driven by [`report_loop`]
//! on a fixed interval. When no reporter is enabled the listener is
//! never built and the middleware is not installed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tokio::io::AsyncWriteExt;

use crate::app_info::AppInfo;
use crate::config::model::MetricsConfig;
use crate::error::ServiceError;

#[derive(Debug, Default, Clone)]
struct EndpointStats {
    requests: u64,
    status_2xx: u64,
    status_3xx: u64,
    status_4xx: u64,
    status_5xx: u64,
    total_latency_micros: u64,
    max_latency_micros: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: f64,
}

impl Metric {
    fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug)]
pub struct MetricsListener {
    endpoints: Mutex<BTreeMap<String, EndpointStats>>,
    inflight: AtomicU64,
    total: AtomicU64,
    start_time: Instant,
    report_runtime: bool,
}

impl MetricsListener {
    #[must_use]
    pub fn new(report_runtime: bool) -> Self {
        Self {
            endpoints: Mutex::new(BTreeMap::new()),
            inflight: AtomicU64::new(0),
            total: AtomicU64::new(0),
            start_time: Instant::now(),
            report_runtime,
        }
    }

    pub fn record(&self, method: &str, route: Option<&str>, status: StatusCode, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let key = metric_key(method, route);
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);

        let Ok(mut endpoints) = self.endpoints.lock() else {
            tracing::warn!("metrics lock poisoned, dropping sample");
            return;
        };
        let stats = endpoints.entry(key).or_default();
        stats.requests += 1;
        match status.as_u16() {
            200..=299 => stats.status_2xx += 1,
            300..=399 => stats.status_3xx += 1,
            400..=499 => stats.status_4xx += 1,
            _ => stats.status_5xx += 1,
        }
        stats.total_latency_micros = stats.total_latency_micros.saturating_add(micros);
        stats.max_latency_micros = stats.max_latency_micros.max(micros);
    }

    /// Flattened view of every metric, sorted by name.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> Vec<Metric> {
        let mut metrics = vec![
            Metric::new(
                "server.requests.total",
                self.total.load(Ordering::Relaxed) as f64,
            ),
            Metric::new(
                "server.requests.inflight",
                self.inflight.load(Ordering::Relaxed) as f64,
            ),
        ];

        if let Ok(endpoints) = self.endpoints.lock() {
            for (key, stats) in endpoints.iter() {
                let avg_ms = if stats.requests == 0 {
                    0.0
                } else {
                    stats.total_latency_micros as f64 / stats.requests as f64 / 1000.0
                };
                metrics.extend([
                    Metric::new(format!("endpoints.{key}.requests"), stats.requests as f64),
                    Metric::new(format!("endpoints.{key}.2xx"), stats.status_2xx as f64),
                    Metric::new(format!("endpoints.{key}.3xx"), stats.status_3xx as f64),
                    Metric::new(format!("endpoints.{key}.4xx"), stats.status_4xx as f64),
                    Metric::new(format!("endpoints.{key}.5xx"), stats.status_5xx as f64),
                    Metric::new(format!("endpoints.{key}.latency_avg_ms"), avg_ms),
                    Metric::new(
                        format!("endpoints.{key}.latency_max_ms"),
                        stats.max_latency_micros as f64 / 1000.0,
                    ),
                ]);
            }
        }

        if self.report_runtime {
            metrics.push(Metric::new(
                "runtime.uptime_seconds",
                self.start_time.elapsed().as_secs_f64(),
            ));
        }

        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        metrics
    }
}

/// `GET` + `/exampleBasicAuth` -> `exampleBasicAuth.GET`.
fn metric_key(method: &str, route: Option<&str>) -> String {
    let path = match route {
        None => "unmatched".to_string(),
        Some(route) => {
            let trimmed = route.trim_matches('/');
            if trimmed.is_empty() {
                "root".to_string()
            } else {
                trimmed
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
                    .collect()
            }
        }
    };
    format!("{path}.{method}")
}

/// Holds one slot of the in-flight gauge until dropped, so a request
/// future cancelled mid-flight still releases it.
struct InflightGuard<'a>(&'a AtomicU64);

impl<'a> InflightGuard<'a> {
    fn enter(gauge: &'a AtomicU64) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(gauge)
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Middleware recording one sample per request.
pub async fn track(
    State(listener): State<Arc<MetricsListener>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());

    let guard = InflightGuard::enter(&listener.inflight);
    let start = Instant::now();
    let response = next.run(request).await;
    drop(guard);

    listener.record(&method, route.as_deref(), response.status(), start.elapsed());
    response
}

// async_trait is required because reporters are held as Box<dyn Reporter>.
#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &'static str;
    async fn report(&self, metrics: &[Metric]) -> Result<(), ServiceError>;
}

/// Writes each snapshot to the log at `info` level.
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn report(&self, metrics: &[Metric]) -> Result<(), ServiceError> {
        for metric in metrics {
            tracing::info!(metric = %metric.name, value = metric.value, "metric");
        }
        Ok(())
    }
}

/// Sends snapshots using the Graphite plaintext protocol.
pub struct GraphiteReporter {
    address: String,
    prefix: String,
}

impl GraphiteReporter {
    #[must_use]
    pub fn new(host: &str, port: u16, prefix: String) -> Self {
        Self {
            address: format!("{host}:{port}"),
            prefix,
        }
    }

    #[must_use]
    pub fn render(&self, metrics: &[Metric], timestamp: u64) -> String {
        metrics
            .iter()
            .map(|m| format!("{}.{} {} {timestamp}\n", self.prefix, m.name, m.value))
            .collect()
    }
}

#[async_trait]
impl Reporter for GraphiteReporter {
    fn name(&self) -> &'static str {
        "graphite"
    }

    async fn report(&self, metrics: &[Metric]) -> Result<(), ServiceError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let payload = self.render(metrics, timestamp);
        let mut stream = tokio::net::TcpStream::connect(&self.address).await?;
        stream.write_all(payload.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Build the enabled reporters. An empty result means metrics are off.
#[must_use]
pub fn reporters_from_config(config: &MetricsConfig, app_info: &AppInfo) -> Vec<Box<dyn Reporter>> {
    let mut reporters: Vec<Box<dyn Reporter>> = Vec::new();

    if config.log_reporting.enabled {
        reporters.push(Box::new(LogReporter));
    }

    if config.graphite.enabled {
        if let Some(ref host) = config.graphite.host {
            reporters.push(Box::new(GraphiteReporter::new(
                host,
                config.graphite.port,
                app_info.metrics_prefix(),
            )));
        }
    }

    if reporters.is_empty() {
        tracing::info!("no metrics reporters enabled, disabling metrics entirely");
    } else {
        let names = reporters.iter().map(|r| r.name()).collect::<Vec<_>>();
        tracing::info!(metric_reporter_types = ?names, "metrics reporters enabled");
    }

    reporters
}

pub async fn report_loop(
    listener: Arc<MetricsListener>,
    reporters: Vec<Box<dyn Reporter>>,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("metrics reporter shutting down");
                return;
            }
        }

        let snapshot = listener.snapshot();
        for reporter in &reporters {
            if let Err(e) = reporter.report(&snapshot).await {
                tracing::warn!(reporter = reporter.name(), error = %e, "metrics report failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::GraphiteConfig;

    fn value(metrics: &[Metric], name: &str) -> f64 {
        metrics
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("missing metric {name}"))
            .value
    }

    #[test]
    fn metric_keys_are_dot_safe() {
        assert_eq!(metric_key("GET", Some("/example")), "example.GET");
        assert_eq!(metric_key("POST", Some("/a/b")), "a_b.POST");
        assert_eq!(metric_key("GET", Some("/")), "root.GET");
        assert_eq!(metric_key("GET", None), "unmatched.GET");
    }

    #[test]
    fn records_status_classes_and_latency() {
        let listener = MetricsListener::new(false);
        listener.record("GET", Some("/example"), StatusCode::OK, Duration::from_millis(4));
        listener.record("GET", Some("/example"), StatusCode::BAD_REQUEST, Duration::from_millis(2));

        let snapshot = listener.snapshot();
        assert_eq!(value(&snapshot, "server.requests.total"), 2.0);
        assert_eq!(value(&snapshot, "endpoints.example.GET.requests"), 2.0);
        assert_eq!(value(&snapshot, "endpoints.example.GET.2xx"), 1.0);
        assert_eq!(value(&snapshot, "endpoints.example.GET.4xx"), 1.0);
        assert_eq!(value(&snapshot, "endpoints.example.GET.latency_avg_ms"), 3.0);
        assert_eq!(value(&snapshot, "endpoints.example.GET.latency_max_ms"), 4.0);
        assert!(snapshot.iter().all(|m| m.name != "runtime.uptime_seconds"));
    }

    #[tokio::test]
    async fn cancelled_request_releases_inflight_slot() {
        use axum::routing::get;
        use axum::Router;
        use tower::ServiceExt;

        let listener = Arc::new(MetricsListener::new(false));
        let app = Router::new()
            .route("/slow", get(|| std::future::pending::<&'static str>()))
            .layer(axum::middleware::from_fn_with_state(listener.clone(), track));

        let request = axum::http::Request::get("/slow")
            .body(axum::body::Body::empty())
            .unwrap();
        let call = tokio::spawn(app.oneshot(request));
        for _ in 0..100 {
            if listener.inflight.load(Ordering::Relaxed) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(listener.inflight.load(Ordering::Relaxed), 1);

        call.abort();
        let _ = call.await;
        assert_eq!(listener.inflight.load(Ordering::Relaxed), 0);
        assert_eq!(listener.total.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn runtime_metrics_are_optional() {
        let listener = MetricsListener::new(true);
        assert!(listener
            .snapshot()
            .iter()
            .any(|m| m.name == "runtime.uptime_seconds"));
    }

    #[test]
    fn graphite_lines_use_prefix() {
        let reporter = GraphiteReporter::new("localhost", 2003, "svc.local.dev.host".into());
        let lines = reporter.render(&[Metric::new("server.requests.total", 5.0)], 1000);
        assert_eq!(lines, "svc.local.dev.host.server.requests.total 5 1000\n");
    }

    #[test]
    fn no_reporters_when_all_disabled() {
        let info = AppInfo::local("svc", "dev");
        assert!(reporters_from_config(&MetricsConfig::default(), &info).is_empty());

        let config = MetricsConfig {
            graphite: GraphiteConfig {
                enabled: true,
                host: Some("graphite".into()),
                port: 2003,
            },
            ..MetricsConfig::default()
        };
        let reporters = reporters_from_config(&config, &info);
        assert_eq!(reporters.len(), 1);
        assert_eq!(reporters[0].name(), "graphite");
    }
}
