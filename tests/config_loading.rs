//! Integration tests for layered config loading against the shipped
//! `config/` directory.

use std::path::{Path, PathBuf};

use service_template::config::{self, parse_config_str, validation::validate};
use service_template::error::ServiceError;

const APP_ID: &str = "service-template";

fn config_dir() -> &'static Path {
    Path::new("config")
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "service-template-{name}-{}",
        uuid::Uuid::new_v4()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn every_shipped_environment_loads_and_validates() {
    for environment in ["local", "test", "prod", "compiletimetest"] {
        let loaded = config::load(config_dir(), APP_ID, environment)
            .unwrap_or_else(|e| panic!("{environment} failed to load: {e}"));
        assert_eq!(loaded.environment, environment);
        assert_eq!(loaded.config.app_id, APP_ID);
        assert_eq!(loaded.files.len(), 2, "{environment} should have an override file");
    }
}

#[test]
fn environment_file_overrides_only_its_keys() {
    let loaded = config::load(config_dir(), APP_ID, "compiletimetest").unwrap();
    let config = &loaded.config;

    assert_eq!(config.endpoints.host, "127.0.0.1");
    assert_eq!(config.endpoints.port, 0);
    assert_eq!(config.example_basic_auth.username, "testuser");
    assert_eq!(config.example_basic_auth.password, "testpassword");

    // Untouched keys come from the base file.
    assert_eq!(config.server.request_timeout_ms, 5000);
    assert_eq!(config.database.url, "sqlite::memory:");
    assert!(!config.security.protect_all_endpoints);
}

#[test]
fn missing_environment_file_falls_back_to_base() {
    let loaded = config::load(config_dir(), APP_ID, "no-such-environment").unwrap();
    assert_eq!(loaded.files, vec![config::base_path(config_dir(), APP_ID)]);
    assert_eq!(loaded.config.endpoints.port, 8080);
    assert_eq!(loaded.config.example_basic_auth.username, "pleasechangeme");
}

#[test]
fn missing_base_file_is_reported() {
    let err = config::load(config_dir(), "no-such-app", "local").unwrap_err();
    assert!(matches!(err, ServiceError::ConfigFileNotFound { .. }));
}

#[test]
fn invalid_override_fails_validation() {
    let dir = temp_dir("invalid");
    std::fs::write(
        dir.join("svc.yaml"),
        "app_id: svc\nexample_basic_auth:\n  username: u\n  password: p\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("svc-broken.yaml"),
        "example_basic_auth:\n  password: \"\"\nmetrics:\n  graphite:\n    enabled: true\n",
    )
    .unwrap();

    let err = config::load(&dir, "svc", "broken").unwrap_err();
    let ServiceError::ConfigValidation { errors } = err else {
        panic!("expected validation failure, got {err}");
    };
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"example_basic_auth.password"));
    assert!(fields.contains(&"metrics.graphite.host"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn unknown_keys_are_rejected() {
    let result = parse_config_str(
        "app_id: svc\nexample_basic_auth:\n  username: u\n  password: p\nendpoints:\n  prot: 1\n",
        "inline",
    );
    assert!(matches!(result, Err(ServiceError::ConfigParse { .. })));
}

#[test]
fn basic_auth_credentials_are_required() {
    let result = parse_config_str("app_id: svc\n", "inline");
    assert!(result.is_err());
}

#[test]
fn minimal_config_uses_defaults() {
    let config = parse_config_str(
        "example_basic_auth:\n  username: u\n  password: p\n",
        "inline",
    )
    .unwrap();
    validate(&config).unwrap();
    assert_eq!(config.app_id, APP_ID);
    assert_eq!(config.endpoints.port, 8080);
    assert!(!config.metrics.any_reporter_enabled());
    assert!(!config.registration.enabled);
}
