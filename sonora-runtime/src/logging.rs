//! # Logging Setup
//!
//! Thin adaptor between the pipeline's own log-level vocabulary
//! (`scodefig.jsonc`'s `loglevel` key: `debug|perf|info|success|warn|error|
//! silent`) and `tracing-subscriber`'s `EnvFilter`. `tracing` has no native
//! concept of `perf` or `success`; both are emitted as `info`-level events
//! carrying a `kind` field so a structured log consumer can still tell them
//! apart.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Minimum severity to emit, in the application's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Perf,
    Info,
    Success,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    /// The `tracing` level this maps onto. `Perf` and `Success` are
    /// application-level distinctions layered on top of `Info`.
    fn tracing_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Perf | LogLevel::Success | LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "off",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "perf" => Ok(LogLevel::Perf),
            "info" => Ok(LogLevel::Info),
            "success" => Ok(LogLevel::Success),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(Error::Config(format!("unknown loglevel: {other}"))),
        }
    }
}

/// Initialize the global `tracing` subscriber once for the process.
///
/// Calling this more than once is a no-op after the first call succeeds
/// (mirrors `tracing_subscriber`'s own "already set" semantics, surfaced as
/// `Ok(())` rather than an error since callers — the encoder CLI chiefly —
/// have no recovery action to take either way).
pub fn init(level: LogLevel) -> Result<()> {
    let filter = EnvFilter::try_new(level.tracing_directive())
        .map_err(|e| Error::Config(format!("invalid log filter: {e}")))?;

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
    Ok(())
}

/// Emit a `perf`-kind info event. Thin wrapper so call sites read as intent
/// ("this is a performance note") rather than a bare `tracing::info!`.
#[macro_export]
macro_rules! perf {
    ($($arg:tt)*) => {
        tracing::info!(kind = "perf", $($arg)*);
    };
}

/// Emit a `success`-kind info event.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        tracing::info!(kind = "success", $($arg)*);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_config_levels() {
        for (s, expected) in [
            ("debug", LogLevel::Debug),
            ("perf", LogLevel::Perf),
            ("info", LogLevel::Info),
            ("success", LogLevel::Success),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
            ("silent", LogLevel::Silent),
        ] {
            assert_eq!(LogLevel::from_str(s).unwrap(), expected);
        }
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(LogLevel::from_str("trace").is_err());
    }
}
