//! Service registration hooks.
//!
//! A [`ServerHook`] runs after the listener is bound and again during
//! graceful shutdown. The only built-in hook is [`EurekaHook`], which
//! registers the instance with a Eureka server, heartbeats while the
//! server runs, and deregisters on shutdown. Registration is off
//! unless `registration.enabled` is set.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use http_body_util::Full;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::app_info::AppInfo;
use crate::client::{self, HttpClient};
use crate::config::model::{AppConfig, RegistrationConfig};
use crate::error::ServiceError;

#[async_trait]
pub trait ServerHook: Send + Sync {
    fn name(&self) -> &'static str;
    async fn on_startup(&self, addr: SocketAddr) -> Result<(), ServiceError>;
    async fn on_shutdown(&self) -> Result<(), ServiceError>;
}

pub struct EurekaHook {
    client: HttpClient,
    base_url: String,
    app_name: String,
    instance_id: String,
    data_center: String,
    datacenter_type: String,
    heartbeat_interval: Duration,
    timeout: Duration,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl EurekaHook {
    #[must_use]
    pub fn new(
        client: HttpClient,
        base_url: &str,
        registration: &RegistrationConfig,
        app_info: &AppInfo,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_name: app_info.app_id.to_uppercase(),
            instance_id: format!("{}:{}", app_info.instance_id, app_info.app_id),
            data_center: app_info.data_center.clone(),
            datacenter_type: registration.datacenter_type.clone(),
            heartbeat_interval: Duration::from_secs(registration.heartbeat_interval_secs),
            timeout,
            heartbeat_task: Mutex::new(None),
        }
    }

    fn app_url(&self) -> String {
        format!("{}/apps/{}", self.base_url, self.app_name)
    }

    fn instance_url(&self) -> String {
        format!("{}/{}", self.app_url(), self.instance_id)
    }

    #[must_use]
    pub fn registration_payload(&self, addr: SocketAddr) -> serde_json::Value {
        let ip = addr.ip().to_string();
        json!({
            "instance": {
                "instanceId": self.instance_id,
                "hostName": ip,
                "app": self.app_name,
                "ipAddr": ip,
                "status": "UP",
                "port": { "$": addr.port(), "@enabled": "true" },
                "healthCheckUrl": format!("http://{addr}/healthcheck"),
                "dataCenterInfo": {
                    "@class": "com.netflix.appinfo.MyDataCenterInfo",
                    "name": self.datacenter_type,
                },
                "metadata": { "dataCenter": self.data_center },
            }
        })
    }

    async fn call(
        client: &HttpClient,
        method: Method,
        url: &str,
        body: Option<String>,
        timeout: Duration,
    ) -> Result<(), ServiceError> {
        let mut builder = hyper::Request::builder()
            .method(method.clone())
            .uri(url)
            .header("accept", "application/json");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(Full::new(body.map(Bytes::from).unwrap_or_default()))
            .map_err(|e| ServiceError::HttpRequest {
                source: Box::new(e),
            })?;

        let response = client::send(client, request, timeout)
            .await
            .map_err(|e| ServiceError::HttpRequest {
                source: Box::new(e),
            })?;

        if response.status.is_success() {
            Ok(())
        } else {
            Err(ServiceError::Registration(format!(
                "{method} {url} returned {}",
                response.status
            )))
        }
    }
}

#[async_trait]
impl ServerHook for EurekaHook {
    fn name(&self) -> &'static str {
        "eureka"
    }

    async fn on_startup(&self, addr: SocketAddr) -> Result<(), ServiceError> {
        let payload = self.registration_payload(addr).to_string();
        Self::call(
            &self.client,
            Method::POST,
            &self.app_url(),
            Some(payload),
            self.timeout,
        )
        .await?;
        tracing::info!(app = %self.app_name, instance_id = %self.instance_id, "registered with eureka");

        let client = self.client.clone();
        let url = self.instance_url();
        let period = self.heartbeat_interval;
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip first immediate tick
            loop {
                interval.tick().await;
                if let Err(e) = Self::call(&client, Method::PUT, &url, None, timeout).await {
                    tracing::warn!(error = %e, "eureka heartbeat failed");
                }
            }
        });

        if let Ok(mut slot) = self.heartbeat_task.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), ServiceError> {
        let heartbeat = self.heartbeat_task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = heartbeat {
            handle.abort();
        }
        Self::call(
            &self.client,
            Method::DELETE,
            &self.instance_url(),
            None,
            self.timeout,
        )
        .await?;
        tracing::info!(app = %self.app_name, instance_id = %self.instance_id, "deregistered from eureka");
        Ok(())
    }
}

#[must_use]
pub fn hooks_from_config(
    config: &AppConfig,
    app_info: &AppInfo,
    client: &HttpClient,
) -> Vec<Box<dyn ServerHook>> {
    let registration = &config.registration;
    match (registration.enabled, registration.eureka_url.as_deref()) {
        (true, Some(url)) => vec![Box::new(EurekaHook::new(
            client.clone(),
            url,
            registration,
            app_info,
            Duration::from_millis(config.server.request_timeout_ms),
        ))],
        _ => Vec::new(),
    }
}

pub async fn run_startup_hooks(hooks: &[Box<dyn ServerHook>], addr: SocketAddr) {
    for hook in hooks {
        if let Err(e) = hook.on_startup(addr).await {
            tracing::error!(hook = hook.name(), error = %e, "startup hook failed");
        }
    }
}

pub async fn run_shutdown_hooks(hooks: &[Box<dyn ServerHook>]) {
    for hook in hooks {
        if let Err(e) = hook.on_shutdown().await {
            tracing::error!(hook = hook.name(), error = %e, "shutdown hook failed");
        }
    }
}
