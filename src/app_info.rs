//! Identity of the running instance.
//!
//! [`AppInfo`] names the application, data center, environment, and
//! instance. It prefixes reported metrics and identifies the instance
//! to service registration. Outside AWS (or with lookup disabled) the
//! local fallback is used.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{self, HttpClient};
use crate::config::model::AppConfig;

const EC2_METADATA_BASE: &str = "http://169.254.169.254/latest/meta-data";
const EC2_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

pub const LOCAL_DATA_CENTER: &str = "local";
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_id: String,
    pub data_center: String,
    pub environment: String,
    pub instance_id: String,
}

impl AppInfo {
    #[must_use]
    pub fn local(app_id: &str, environment: &str) -> Self {
        let instance_id = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            app_id: app_id.to_string(),
            data_center: LOCAL_DATA_CENTER.to_string(),
            environment: environment.to_string(),
            instance_id,
        }
    }

    /// `<app_id>.<data_center>.<environment>.<instance_id>`, with dots
    /// inside each component replaced so the prefix keeps four segments.
    #[must_use]
    pub fn metrics_prefix(&self) -> String {
        [
            &self.app_id,
            &self.data_center,
            &self.environment,
            &self.instance_id,
        ]
        .iter()
        .map(|part| part.replace(['.', ' '], "_"))
        .collect::<Vec<_>>()
        .join(".")
    }
}

/// Resolve app info, consulting the EC2 metadata service when enabled.
pub async fn resolve(config: &AppConfig, environment: &str, client: &HttpClient) -> AppInfo {
    let local = AppInfo::local(&config.app_id, environment);
    if !config.app_info.aws_lookup {
        return local;
    }

    let instance_id = fetch_metadata(client, "instance-id").await;
    let zone = fetch_metadata(client, "placement/availability-zone").await;

    match (instance_id, zone) {
        (Some(instance_id), Some(zone)) => {
            let info = AppInfo {
                data_center: region_from_zone(&zone).to_string(),
                instance_id,
                ..local
            };
            tracing::info!(
                data_center = %info.data_center,
                instance_id = %info.instance_id,
                "resolved app info from EC2 metadata"
            );
            info
        }
        _ => {
            tracing::warn!("EC2 metadata unavailable, using local app info");
            local
        }
    }
}

async fn fetch_metadata(client: &HttpClient, path: &str) -> Option<String> {
    let uri = format!("{EC2_METADATA_BASE}/{path}");
    match client::get_text(client, &uri, &[], EC2_LOOKUP_TIMEOUT).await {
        Ok(Some(text)) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(path, error = %e, "EC2 metadata lookup failed");
            None
        }
    }
}

/// `us-west-2a` -> `us-west-2`.
fn region_from_zone(zone: &str) -> &str {
    zone.trim_end_matches(|c: char| c.is_ascii_alphabetic())
}
