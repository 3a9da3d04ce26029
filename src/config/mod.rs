//! Configuration module
//!
//! Handles loading and managing configuration. Values come from a config
//! file, then `GTEST_POOL_*` environment variables, then command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{config_locations, load_default};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::{MarkerSet, RetryPolicy, RunnerSettings};
use file::is_yaml_file;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// GoogleTest-style binary to shard
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,

    /// Extra arguments placed before the filter flag
    pub args: Vec<String>,

    /// Wildcard filter applied to the discovered tests
    pub filter: String,

    /// Worker threads, one process each
    pub jobs: usize,

    /// Per-test timeout in seconds
    pub timeout_secs: u64,

    /// Silence allowed while no test is running; defaults to `timeout_secs`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,

    /// Output poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Initial batch size; defaults to spreading tests evenly over jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Attempts without progress before a test is failed
    pub max_attempts: u32,

    /// Rerun tests that crashed the binary
    pub retry_interrupted: bool,

    /// Directory for result.txt and run records; defaults to
    /// `<binary dir>/output`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Output markers of the target binary
    pub markers: MarkerSet,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binary: None,
            args: Vec::new(),
            filter: "*".to_string(),
            jobs: num_cpus::get(),
            timeout_secs: 30,
            idle_timeout_secs: None,
            poll_interval_ms: 100,
            batch_size: None,
            max_attempts: 3,
            retry_interrupted: false,
            output_dir: None,
            markers: MarkerSet::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }
        if self.idle_timeout_secs == Some(0) {
            bail!("idle_timeout_secs must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be at least 1");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.batch_size == Some(0) {
            bail!("batch_size must be at least 1");
        }
        if !self.markers.is_valid() {
            bail!("markers must not be empty");
        }
        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(binary) = &env.binary {
            self.binary = Some(PathBuf::from(binary));
        }
        if let Some(filter) = &env.filter {
            self.filter = filter.clone();
        }
        if let Some(jobs) = env.jobs {
            self.jobs = jobs;
        }
        if let Some(timeout) = env.timeout {
            self.timeout_secs = timeout;
        }
        if let Some(batch_size) = env.batch_size {
            self.batch_size = Some(batch_size);
        }
        if let Some(max_attempts) = env.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(retry) = env.retry_interrupted {
            self.retry_interrupted = retry;
        }
        if let Some(dir) = &env.output_dir {
            self.output_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.unwrap_or(self.timeout_secs)),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..RunnerSettings::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            retry_interrupted: self.retry_interrupted,
        }
    }

    /// Where result.txt and run records go
    pub fn output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        self.binary
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.join("output"))
            .unwrap_or_else(|| PathBuf::from("output"))
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            binary: Some(PathBuf::from("./build/unit_tests")),
            args: vec!["--gtest_color=no".to_string()],
            filter: "*".to_string(),
            jobs: 8,
            timeout_secs: 60,
            idle_timeout_secs: Some(120),
            batch_size: Some(50),
            output_dir: Some(PathBuf::from("./build/output")),
            ..Self::default()
        }
    }
}
