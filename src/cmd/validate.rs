//! `service-template validate`: check the merged configuration.
//!
//! Loads and validates the base and environment files exactly as `run`
//! would, reporting results in either human-readable text or
//! machine-readable JSON.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::{self, validation};
use crate::error::ServiceError;

pub fn execute(args: &ValidateArgs) -> Result<(), ServiceError> {
    let source = format!(
        "{} ({} environment)",
        config::base_path(&args.config.config_dir, &args.config.app_id).display(),
        args.config.environment
    );

    let loaded = match config::load(
        &args.config.config_dir,
        &args.config.app_id,
        &args.config.environment,
    ) {
        Ok(loaded) => loaded,
        Err(ServiceError::ConfigValidation { errors }) => {
            match args.format {
                ValidateFormat::Text => {
                    eprintln!("\u{2717} {source} has {} errors\n", errors.len());
                    for error in &errors {
                        eprintln!("{error}");
                    }
                }
                ValidateFormat::Json => {
                    let json_errors: Vec<serde_json::Value> = errors
                        .iter()
                        .map(|e| {
                            serde_json::json!({
                                "field": e.field,
                                "message": e.message,
                                "suggestion": e.suggestion,
                            })
                        })
                        .collect();
                    println!(
                        "{}",
                        serde_json::json!({
                            "valid": false,
                            "errors": json_errors,
                        })
                    );
                }
            }
            return Err(ServiceError::ConfigValidation { errors });
        }
        Err(e) => return Err(e),
    };

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&source, &loaded.config)
            );
        }
        ValidateFormat::Json => {
            let files: Vec<String> = loaded
                .files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "environment": loaded.environment,
                    "files": files,
                    "app_id": loaded.config.app_id,
                    "listen": format!(
                        "{}:{}",
                        loaded.config.endpoints.host, loaded.config.endpoints.port
                    ),
                })
            );
        }
    }

    Ok(())
}
