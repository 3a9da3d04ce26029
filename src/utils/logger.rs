//! Logging utilities
//!
//! Provides logging configuration and helpers.

use std::io;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// `--verbose` wins, then `GTEST_POOL_LOG`, then warnings only.
    pub fn resolve(verbose: bool, env_level: Option<&str>) -> Self {
        if verbose {
            return LogLevel::Debug;
        }
        env_level.and_then(Self::from_str).unwrap_or(LogLevel::Warn)
    }

    fn directive(self) -> String {
        format!("gtest_pool={}", self.to_tracing_level())
    }
}

/// Initialize the logger with specified level. `RUST_LOG` replaces the
/// crate-scoped filter when set.
pub fn init_logger(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("unknown"), None);
    }

    #[test]
    fn test_resolve() {
        assert_eq!(LogLevel::resolve(true, Some("error")), LogLevel::Debug);
        assert_eq!(LogLevel::resolve(false, Some("info")), LogLevel::Info);
        assert_eq!(LogLevel::resolve(false, Some("loud")), LogLevel::Warn);
        assert_eq!(LogLevel::resolve(false, None), LogLevel::Warn);
    }

    #[test]
    fn test_directive() {
        assert_eq!(LogLevel::Info.directive(), "gtest_pool=INFO");
    }
}
