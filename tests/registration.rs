//! Eureka registration lifecycle against a stub registry on a random port.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use service_template::app_info::AppInfo;
use service_template::client::build_http_client;
use service_template::config::model::RegistrationConfig;
use service_template::error::ServiceError;
use service_template::registration::{EurekaHook, ServerHook};

#[derive(Clone, Default)]
struct Registry {
    calls: Arc<Mutex<Vec<(Method, String, Bytes)>>>,
    status: Arc<Mutex<Option<StatusCode>>>,
}

impl Registry {
    fn calls(&self) -> Vec<(Method, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, path, _)| (method.clone(), path.clone()))
            .collect()
    }
}

async fn record(
    State(registry): State<Registry>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    registry
        .calls
        .lock()
        .unwrap()
        .push((method, uri.path().to_string(), body));
    registry.status.lock().unwrap().unwrap_or(StatusCode::NO_CONTENT)
}

async fn start_registry() -> (String, Registry) {
    let registry = Registry::default();
    let app = Router::new().fallback(record).with_state(registry.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/eureka"), registry)
}

fn hook(base_url: &str) -> EurekaHook {
    let info = AppInfo {
        app_id: "svc".into(),
        data_center: "local".into(),
        environment: "test".into(),
        instance_id: "host1".into(),
    };
    let registration = RegistrationConfig {
        enabled: true,
        eureka_url: Some(base_url.into()),
        heartbeat_interval_secs: 1,
        ..RegistrationConfig::default()
    };
    EurekaHook::new(
        build_http_client(),
        base_url,
        &registration,
        &info,
        Duration::from_secs(2),
    )
}

#[tokio::test]
async fn registers_heartbeats_and_deregisters() {
    let (base_url, registry) = start_registry().await;
    let hook = hook(&base_url);
    let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();

    hook.on_startup(addr).await.unwrap();
    {
        let calls = registry.calls.lock().unwrap();
        let (method, path, body) = &calls[0];
        assert_eq!(*method, Method::POST);
        assert_eq!(path, "/eureka/apps/SVC");
        let payload: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(payload["instance"]["instanceId"], "host1:svc");
        assert_eq!(payload["instance"]["port"]["$"], 8080);
    }

    let heartbeat = (Method::PUT, "/eureka/apps/SVC/host1:svc".to_string());
    for _ in 0..40 {
        if registry.calls().contains(&heartbeat) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(registry.calls().contains(&heartbeat), "no heartbeat sent");

    hook.on_shutdown().await.unwrap();
    let after_shutdown = registry.calls();
    assert_eq!(
        after_shutdown.last(),
        Some(&(Method::DELETE, "/eureka/apps/SVC/host1:svc".to_string()))
    );

    // The heartbeat loop is gone once deregistered.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(registry.calls().len(), after_shutdown.len());
}

#[tokio::test]
async fn rejected_registration_is_an_error() {
    let (base_url, registry) = start_registry().await;
    *registry.status.lock().unwrap() = Some(StatusCode::INTERNAL_SERVER_ERROR);
    let hook = hook(&base_url);

    let err = hook
        .on_startup("127.0.0.1:8080".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Registration(_)), "{err}");
    assert_eq!(registry.calls(), [(Method::POST, "/eureka/apps/SVC".to_string())]);
}
