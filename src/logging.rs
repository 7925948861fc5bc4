//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`.

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Default level for everything, with the noisy connection-level
/// crates held at `warn` unless tracing is requested.
#[must_use]
pub fn filter_for(level: &LogLevel) -> Targets {
    let tracing_level = level.to_tracing_level();
    let dependency_level = if tracing_level == tracing::Level::TRACE {
        tracing::Level::TRACE
    } else {
        tracing_level.min(tracing::Level::WARN)
    };
    Targets::new()
        .with_default(tracing_level)
        .with_target("hyper_util", dependency_level)
        .with_target("sqlx", dependency_level)
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let filter = filter_for(level);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins() {
        assert_eq!(resolve_format(false, true), LogFormat::Json);
        assert_eq!(resolve_format(true, false), LogFormat::Pretty);
    }

    #[test]
    fn dependencies_stay_quiet_at_debug() {
        let filter = filter_for(&LogLevel::Debug);
        assert!(filter.would_enable("service_template", &tracing::Level::DEBUG));
        assert!(!filter.would_enable("sqlx::query", &tracing::Level::INFO));
        assert!(filter.would_enable("sqlx::query", &tracing::Level::WARN));
    }

    #[test]
    fn trace_enables_dependencies_too() {
        let filter = filter_for(&LogLevel::Trace);
        assert!(filter.would_enable("hyper_util::client", &tracing::Level::TRACE));
    }
}
