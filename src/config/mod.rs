//! Layered configuration loading and validation.
//!
//! Configuration lives in a directory of YAML files named after the
//! application id: `<app_id>.yaml` holds the defaults and
//! `<app_id>-<environment>.yaml` overrides them for one environment.
//! The two documents are deep-merged before deserializing into
//! [`AppConfig`](model::AppConfig), so an override file only carries
//! the keys it changes.

pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ServiceError;
use model::AppConfig;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub environment: String,
    pub files: Vec<PathBuf>,
}

#[must_use]
pub fn base_path(dir: &Path, app_id: &str) -> PathBuf {
    dir.join(format!("{app_id}.yaml"))
}

#[must_use]
pub fn environment_path(dir: &Path, app_id: &str, environment: &str) -> PathBuf {
    dir.join(format!("{app_id}-{environment}.yaml"))
}

/// Load, merge, and validate the configuration for `environment`.
///
/// The base file is required; the environment file is optional.
pub fn load(dir: &Path, app_id: &str, environment: &str) -> Result<LoadedConfig, ServiceError> {
    let base = base_path(dir, app_id);
    let mut merged = read_yaml(&base)?;
    let mut files = vec![base];

    let overlay_path = environment_path(dir, app_id, environment);
    if overlay_path.is_file() {
        let overlay = read_yaml(&overlay_path)?;
        merge(&mut merged, overlay);
        files.push(overlay_path);
    } else {
        tracing::debug!(
            path = %overlay_path.display(),
            environment,
            "no environment override file"
        );
    }

    let label = files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" + ");
    let config = from_value(merged, &label)?;

    if let Err(errors) = validation::validate(&config) {
        return Err(ServiceError::ConfigValidation { errors });
    }

    Ok(LoadedConfig {
        config,
        environment: environment.to_string(),
        files,
    })
}

/// Parse a single YAML document into [`AppConfig`] without validating it.
pub fn parse_config_str(content: &str, label: &str) -> Result<AppConfig, ServiceError> {
    let value = parse_yaml(content, label)?;
    from_value(value, label)
}

fn from_value(value: Value, label: &str) -> Result<AppConfig, ServiceError> {
    serde_json::from_value(value).map_err(|e| ServiceError::ConfigParse {
        path: label.to_string(),
        source: Box::new(e),
    })
}

fn read_yaml(path: &Path) -> Result<Value, ServiceError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ServiceError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ServiceError::Io(e)
        }
    })?;
    parse_yaml(&content, &path.display().to_string())
}

fn parse_yaml(content: &str, label: &str) -> Result<Value, ServiceError> {
    let value: Value = serde_yml::from_str(content).map_err(|e| ServiceError::ConfigParse {
        path: label.to_string(),
        source: Box::new(e),
    })?;
    // An empty document parses as null; treat it as an empty mapping.
    Ok(if value.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        value
    })
}

/// Deep-merge `overlay` into `base`. Mappings merge key by key; any
/// other overlay value replaces the base value.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
