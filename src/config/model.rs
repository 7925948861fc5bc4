//! Serde data structures for the service configuration files.
//!
//! [`AppConfig`] is the root. Every section has defaults so an
//! environment override file only needs the keys it changes. All types
//! use `deny_unknown_fields` so typos fail loudly at startup.

use serde::{Deserialize, Serialize};

pub const DEFAULT_APP_ID: &str = "service-template";

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_request_timeout_ms() -> u64 {
    5000
}

const fn default_graphite_port() -> u16 {
    2003
}

const fn default_report_interval_secs() -> u64 {
    60
}

const fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_datacenter_type() -> String {
    "MyOwn".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "default_app_id")]
    pub app_id: String,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub server: ServerTuning,

    #[serde(default)]
    pub debug: DebugConfig,

    pub example_basic_auth: BasicAuthConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub registration: RegistrationConfig,

    #[serde(default)]
    pub app_info: AppInfoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointsConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerTuning {
    /// Tokio worker threads; 0 means one per core.
    #[serde(default)]
    pub worker_threads: usize,

    /// Request body limit in bytes; 0 disables the limit.
    #[serde(default)]
    pub max_request_size_bytes: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerTuning {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_request_size_bytes: 0,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    #[serde(default)]
    pub request_logging: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Protect every endpoint except `/healthcheck` instead of only
    /// `POST /exampleBasicAuth`.
    #[serde(default)]
    pub protect_all_endpoints: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub log_reporting: LogReportingConfig,

    #[serde(default)]
    pub graphite: GraphiteConfig,

    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    #[serde(default)]
    pub report_runtime_metrics: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            log_reporting: LogReportingConfig::default(),
            graphite: GraphiteConfig::default(),
            report_interval_secs: default_report_interval_secs(),
            report_runtime_metrics: false,
        }
    }
}

impl MetricsConfig {
    #[must_use]
    pub const fn any_reporter_enabled(&self) -> bool {
        self.log_reporting.enabled || self.graphite.enabled
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogReportingConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GraphiteConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Carbon host name or IP address, without scheme or port.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_graphite_port")]
    pub port: u16,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: None,
            port: default_graphite_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub disabled: bool,

    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub eureka_url: Option<String>,

    #[serde(default = "default_datacenter_type")]
    pub datacenter_type: String,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            eureka_url: None,
            datacenter_type: default_datacenter_type(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppInfoConfig {
    /// Resolve data center and instance id from the EC2 metadata service.
    #[serde(default)]
    pub aws_lookup: bool,
}
