//! Configuration validation with detailed error reporting.
//!
//! [`validate`] checks a parsed [`AppConfig`] for values that would only
//! fail later at runtime: blank credentials, reporters without a
//! destination, registration without a server URL, and zero intervals.

use url::Url;

use super::model::AppConfig;
use crate::error::ValidationError;

fn error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: message.into(),
        suggestion: None,
    }
}

/// Validate an http(s) URL. Returns `Ok(())` or a human-readable error.
pub fn validate_http_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(format!(
                "unsupported scheme '{scheme}' (expected http or https)"
            )),
        },
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

pub fn validate(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app_id.trim().is_empty() {
        errors.push(error("app_id", "app_id cannot be empty"));
    } else if config.app_id.contains(char::is_whitespace) {
        errors.push(ValidationError {
            field: "app_id".into(),
            message: "app_id cannot contain whitespace".into(),
            suggestion: Some(format!(
                "did you mean '{}'?",
                config.app_id.split_whitespace().collect::<Vec<_>>().join("-")
            )),
        });
    }

    if config.endpoints.host.parse::<std::net::IpAddr>().is_err() {
        errors.push(ValidationError {
            field: "endpoints.host".into(),
            message: format!("'{}' is not an IP address", config.endpoints.host),
            suggestion: Some("use 0.0.0.0 or 127.0.0.1".into()),
        });
    }

    let auth = &config.example_basic_auth;
    if auth.username.is_empty() {
        errors.push(error(
            "example_basic_auth.username",
            "username cannot be empty",
        ));
    } else if auth.username.contains(':') {
        errors.push(error(
            "example_basic_auth.username",
            "username cannot contain ':'",
        ));
    }
    if auth.password.is_empty() {
        errors.push(error(
            "example_basic_auth.password",
            "password cannot be empty",
        ));
    }

    if config.server.request_timeout_ms == 0 {
        errors.push(error(
            "server.request_timeout_ms",
            "request timeout must be greater than zero",
        ));
    }

    let metrics = &config.metrics;
    if metrics.graphite.enabled {
        match metrics.graphite.host.as_deref().map(str::trim) {
            None | Some("") => errors.push(ValidationError {
                field: "metrics.graphite.host".into(),
                message: "host is required when graphite reporting is enabled".into(),
                suggestion: Some("set metrics.graphite.host or disable graphite".into()),
            }),
            Some(host) if host.contains(['/', ':']) => errors.push(ValidationError {
                field: "metrics.graphite.host".into(),
                message: format!("'{host}' is not a bare host name"),
                suggestion: Some(
                    "drop the scheme and put the port in metrics.graphite.port".into(),
                ),
            }),
            Some(_) => {}
        }
    }
    if metrics.any_reporter_enabled() && metrics.report_interval_secs == 0 {
        errors.push(error(
            "metrics.report_interval_secs",
            "report interval must be greater than zero",
        ));
    }

    let registration = &config.registration;
    if registration.enabled {
        match registration.eureka_url.as_deref() {
            None | Some("") => errors.push(error(
                "registration.eureka_url",
                "eureka_url is required when registration is enabled",
            )),
            Some(url) => {
                if let Err(msg) = validate_http_url(url) {
                    errors.push(error("registration.eureka_url", msg));
                }
            }
        }
        if registration.heartbeat_interval_secs == 0 {
            errors.push(error(
                "registration.heartbeat_interval_secs",
                "heartbeat interval must be greater than zero",
            ));
        }
    }

    if !config.database.disabled && !config.database.url.starts_with("sqlite:") {
        errors.push(ValidationError {
            field: "database.url".into(),
            message: format!("'{}' is not a SQLite URL", config.database.url),
            suggestion: Some("use sqlite::memory: or sqlite://path/to/file.db".into()),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(source: &str, config: &AppConfig) -> String {
    let on_off = |b: bool| if b { "enabled" } else { "disabled" };
    let mut reporters = Vec::new();
    if config.metrics.log_reporting.enabled {
        reporters.push("log");
    }
    if config.metrics.graphite.enabled {
        reporters.push("graphite");
    }
    let reporters = if reporters.is_empty() {
        "none".to_string()
    } else {
        reporters.join(", ")
    };
    let workers = match config.server.worker_threads {
        0 => "one per core".to_string(),
        n => n.to_string(),
    };

    let lines = [
        format!("  app_id:        {}", config.app_id),
        format!(
            "  listen:        {}:{}",
            config.endpoints.host, config.endpoints.port
        ),
        format!("  workers:       {workers}"),
        format!(
            "  auth scope:    {}",
            if config.security.protect_all_endpoints {
                "all endpoints except /healthcheck"
            } else {
                "POST /exampleBasicAuth"
            }
        ),
        format!("  metrics:       {reporters}"),
        format!("  database:      {}", on_off(!config.database.disabled)),
        format!("  registration:  {}", on_off(config.registration.enabled)),
    ];

    format!("{source} is valid\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::BasicAuthConfig;

    fn minimal_config() -> AppConfig {
        serde_yml::from_str(
            "example_basic_auth:\n  username: user\n  password: pass\n",
        )
        .unwrap()
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn blank_credentials_fail() {
        let mut config = minimal_config();
        config.example_basic_auth = BasicAuthConfig {
            username: String::new(),
            password: String::new(),
        };
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn colon_in_username_fails() {
        let mut config = minimal_config();
        config.example_basic_auth.username = "a:b".into();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("':'")));
    }

    #[test]
    fn graphite_without_host_fails() {
        let mut config = minimal_config();
        config.metrics.graphite.enabled = true;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "metrics.graphite.host"));
    }

    #[test]
    fn graphite_host_rejects_scheme_and_port() {
        let mut config = minimal_config();
        config.metrics.graphite.enabled = true;
        for host in ["http://graphite:2003", "graphite:2003", "graphite/"] {
            config.metrics.graphite.host = Some(host.into());
            let errors = validate(&config).unwrap_err();
            assert_eq!(errors.len(), 1, "{host}");
            assert_eq!(errors[0].field, "metrics.graphite.host");
            assert!(errors[0].message.contains("bare host name"));
        }

        config.metrics.graphite.host = Some("graphite.internal".into());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn registration_requires_valid_url() {
        let mut config = minimal_config();
        config.registration.enabled = true;
        config.registration.eureka_url = Some("ftp://eureka".into());
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("unsupported scheme")));
    }

    #[test]
    fn whitespace_app_id_suggests_fix() {
        let mut config = minimal_config();
        config.app_id = "my service".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(
            errors[0].suggestion.as_deref(),
            Some("did you mean 'my-service'?")
        );
    }

    #[test]
    fn non_sqlite_database_url_fails_unless_disabled() {
        let mut config = minimal_config();
        config.database.url = "postgres://db".into();
        assert!(validate(&config).is_err());
        config.database.disabled = true;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn report_mentions_auth_scope() {
        let report = format_validation_report("base.yaml", &minimal_config());
        assert!(report.starts_with("base.yaml is valid"));
        assert!(report.contains("POST /exampleBasicAuth"));
    }
}
