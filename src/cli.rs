//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, health), and their associated argument
//! structs. Every flag has an environment variable equivalent for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::model::DEFAULT_APP_ID;

#[derive(Parser)]
#[command(
    name = "service-template",
    version,
    about = "HTTP microservice template",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        service-template run                         Start with ./config, local environment\n  \
        service-template run -e prod                 Start with the prod overrides\n  \
        service-template validate -e test            Check the merged test config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Run(Box<RunArgs>),

    /// Validate the merged configuration without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Directory holding `<app-id>.yaml` and `<app-id>-<environment>.yaml`
    #[arg(short = 'd', long, env = "CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    /// Application id, also the config file name stem
    #[arg(long, env = "APP_ID", default_value = DEFAULT_APP_ID)]
    pub app_id: String,

    /// Deployment environment selecting the override file
    #[arg(short, long, env = "APP_ENVIRONMENT", default_value = "local")]
    pub environment: String,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        service-template run                               Local environment\n  \
        service-template run -e test -p 9090               Test overrides on port 9090\n  \
        service-template run -d /etc/service --pretty      Config from /etc/service")]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Listen port (overrides `endpoints.port`)
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Listen address (overrides `endpoints.host`)
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:8080")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["service-template", "run"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config.config_dir, PathBuf::from("config"));
        assert_eq!(args.config.app_id, DEFAULT_APP_ID);
    }

    #[test]
    fn validate_accepts_environment() {
        let cli =
            Cli::try_parse_from(["service-template", "validate", "-e", "prod", "--format", "json"])
                .unwrap();
        let Some(Commands::Validate(args)) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.config.environment, "prod");
        assert!(matches!(args.format, ValidateFormat::Json));
    }
}
