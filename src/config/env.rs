//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "GTEST_POOL";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Binary from GTEST_POOL_BINARY
    pub binary: Option<String>,
    /// Filter from GTEST_POOL_FILTER
    pub filter: Option<String>,
    /// Workers from GTEST_POOL_JOBS
    pub jobs: Option<usize>,
    /// Timeout from GTEST_POOL_TIMEOUT
    pub timeout: Option<u64>,
    /// Batch size from GTEST_POOL_BATCH_SIZE
    pub batch_size: Option<usize>,
    /// Attempt cap from GTEST_POOL_MAX_ATTEMPTS
    pub max_attempts: Option<u32>,
    /// Crash retry from GTEST_POOL_RETRY_INTERRUPTED
    pub retry_interrupted: Option<bool>,
    /// Output directory from GTEST_POOL_OUTPUT_DIR
    pub output_dir: Option<String>,
    /// Config file from GTEST_POOL_CONFIG
    pub config_file: Option<String>,
    /// Log level from GTEST_POOL_LOG
    pub log: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            binary: get_env("BINARY"),
            filter: get_env("FILTER"),
            jobs: get_env_parse("JOBS"),
            timeout: get_env_parse("TIMEOUT"),
            batch_size: get_env_parse("BATCH_SIZE"),
            max_attempts: get_env_parse("MAX_ATTEMPTS"),
            retry_interrupted: get_env_bool("RETRY_INTERRUPTED"),
            output_dir: get_env("OUTPUT_DIR"),
            config_file: get_env("CONFIG"),
            log: get_env("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.binary.is_some()
            || self.filter.is_some()
            || self.jobs.is_some()
            || self.timeout.is_some()
            || self.batch_size.is_some()
            || self.max_attempts.is_some()
            || self.retry_interrupted.is_some()
            || self.output_dir.is_some()
            || self.config_file.is_some()
            || self.log.is_some()
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all GTEST_POOL environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_BINARY             Test binary to run");
    println!("  {ENV_PREFIX}_FILTER             Wildcard filter (e.g. 'Foo*:Bar*')");
    println!("  {ENV_PREFIX}_JOBS               Number of worker processes");
    println!("  {ENV_PREFIX}_TIMEOUT            Per-test timeout in seconds");
    println!("  {ENV_PREFIX}_BATCH_SIZE         Tests per initial batch");
    println!("  {ENV_PREFIX}_MAX_ATTEMPTS       Attempts without progress before failing a test");
    println!("  {ENV_PREFIX}_RETRY_INTERRUPTED  Rerun tests that crash the binary (true/false)");
    println!("  {ENV_PREFIX}_OUTPUT_DIR         Directory for result.txt and run records");
    println!("  {ENV_PREFIX}_CONFIG             Path to configuration file");
    println!("  {ENV_PREFIX}_LOG                Log level (trace, debug, info, warn, error)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_BINARY=./build/unit_tests");
    println!("  export {ENV_PREFIX}_JOBS=8");
    println!("  gtest-pool run");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module share the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets prefixed variables for the lifetime of the returned guard
    struct EnvBuilder {
        vars: Vec<(String, String)>,
    }

    impl EnvBuilder {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(mut self, name: &str, value: impl Into<String>) -> Self {
            self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
            self
        }

        fn binary(self, binary: &str) -> Self {
            self.set("BINARY", binary)
        }

        fn filter(self, filter: &str) -> Self {
            self.set("FILTER", filter)
        }

        fn jobs(self, jobs: usize) -> Self {
            self.set("JOBS", jobs.to_string())
        }

        fn timeout(self, timeout: u64) -> Self {
            self.set("TIMEOUT", timeout.to_string())
        }

        fn retry_interrupted(self, retry: bool) -> Self {
            self.set("RETRY_INTERRUPTED", retry.to_string())
        }

        fn output_dir(self, dir: &str) -> Self {
            self.set("OUTPUT_DIR", dir)
        }

        fn apply_scoped(self) -> EnvGuard {
            let previous = self
                .vars
                .iter()
                .map(|(k, _)| (k.clone(), env::var(k).ok()))
                .collect();
            for (key, value) in self.vars {
                env::set_var(key, value);
            }
            EnvGuard { previous }
        }
    }

    /// Restores the previous values on drop
    struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.binary.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_builder() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvBuilder::new()
            .binary("/opt/unit_tests")
            .jobs(6)
            .timeout(60)
            .filter("Net*")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.binary, Some("/opt/unit_tests".to_string()));
        assert_eq!(config.jobs, Some(6));
        assert_eq!(config.timeout, Some(60));
        assert_eq!(config.filter, Some("Net*".to_string()));
        assert!(config.has_any());
    }

    #[test]
    fn test_env_bool_and_bad_numbers() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvBuilder::new()
            .retry_interrupted(true)
            .set("MAX_ATTEMPTS", "lots")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.retry_interrupted, Some(true));
        assert_eq!(config.max_attempts, None);
    }

    #[test]
    fn test_guard_restores() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        {
            let _guard = EnvBuilder::new().output_dir("/tmp/gtest-out").apply_scoped();
            assert_eq!(
                EnvConfig::load().output_dir,
                Some("/tmp/gtest-out".to_string())
            );
        }
        assert_eq!(EnvConfig::load().output_dir, None);
    }
}
