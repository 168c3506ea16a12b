//! Tracing subscriber setup for the host binary.

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::cli::LogLevel;

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Filter with `level` as the default directive and `directives` (RUST_LOG syntax)
/// layered on top. Unparsable directives are skipped.
fn build_filter(level: LogLevel, directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level.into()).into())
        .parse_lossy(directives)
}

/// Install the global fmt subscriber. The CLI level is the default; `RUST_LOG`
/// directives override it per target.
pub fn configure_logging(level: LogLevel) -> Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level, &directives))
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// [warn on msgpump, info on msgpump, trace on msgpump::pump]
    fn enabled(filter: EnvFilter) -> [bool; 3] {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        tracing::subscriber::with_default(subscriber, || {
            [
                tracing::enabled!(target: "msgpump", Level::WARN),
                tracing::enabled!(target: "msgpump", Level::INFO),
                tracing::enabled!(target: "msgpump::pump", Level::TRACE),
            ]
        })
    }

    #[test]
    fn levels_map_one_to_one() {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn cli_level_is_default_without_directives() {
        assert_eq!(enabled(build_filter(LogLevel::Info, "")), [true, true, false]);
        assert_eq!(enabled(build_filter(LogLevel::Trace, "")), [true, true, true]);
    }

    #[test]
    fn rust_log_off_silences_everything() {
        assert_eq!(enabled(build_filter(LogLevel::Info, "off")), [false, false, false]);
    }

    #[test]
    fn rust_log_target_directive_refines_default() {
        assert_eq!(
            enabled(build_filter(LogLevel::Warn, "msgpump::pump=trace")),
            [true, false, true]
        );
    }

    #[test]
    fn second_install_is_reported() {
        // the first call may lose to another test's subscriber; the second always fails
        let _ = configure_logging(LogLevel::Warn);
        assert!(configure_logging(LogLevel::Warn).is_err());
    }
}
