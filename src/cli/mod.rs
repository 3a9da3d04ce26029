//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Parallel runner for GoogleTest-style test binaries
#[derive(Parser, Debug)]
#[command(name = "gtest-pool")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Shard a GoogleTest binary across parallel worker processes")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./gtest-pool.yaml and friends)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the tests of a binary in parallel
    Run(RunArgs),

    /// List the tests a filter selects
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Test binary
    pub binary: Option<PathBuf>,

    /// Wildcard filter, ':'-separated (e.g. 'Foo*:Bar.?')
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Number of worker processes
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-test timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Seconds without output before an idle process is killed
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Output poll interval in milliseconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Tests per initial batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Attempts without progress before a test is failed
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Rerun tests that crash the binary
    #[arg(long)]
    pub retry_interrupted: bool,

    /// Directory for result.txt and run records
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Summary format (table, json, json-pretty, csv, summary)
    #[arg(long, default_value = "summary")]
    pub format: String,

    /// Also export records to a .json or .csv file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Extra arguments passed to the binary before the filter
    #[arg(last = true)]
    pub extra: Vec<String>,
}

impl RunArgs {
    /// Apply flags on top of `config`
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(binary) = &self.binary {
            config.binary = Some(binary.clone());
        }
        if let Some(filter) = &self.filter {
            config.filter = filter.clone();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(idle) = self.idle_timeout {
            config.idle_timeout_secs = Some(idle);
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval_ms = interval;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = Some(batch_size);
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if self.retry_interrupted {
            config.retry_interrupted = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if !self.extra.is_empty() {
            config.args = self.extra.clone();
        }
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Test binary
    pub binary: Option<PathBuf>,

    /// Wildcard filter, ':'-separated
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Write the ids to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write an example configuration file
    Init {
        /// Destination (default ./gtest-pool.yaml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Describe the supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "gtest-pool",
            "run",
            "./unit_tests",
            "--filter",
            "Foo*:Bar*",
            "-j",
            "8",
            "--timeout",
            "10",
            "--retry-interrupted",
            "--",
            "--gtest_color=no",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.binary, Some(PathBuf::from("./unit_tests")));
                assert_eq!(run.filter.as_deref(), Some("Foo*:Bar*"));
                assert_eq!(run.jobs, Some(8));
                assert_eq!(run.timeout, Some(10));
                assert!(run.retry_interrupted);
                assert_eq!(run.format, "summary");
                assert_eq!(run.extra, vec!["--gtest_color=no".to_string()]);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::parse_from(["gtest-pool", "list", "bin", "--verbose", "-c", "cfg.yaml"]);
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("cfg.yaml")));
        assert!(matches!(args.command, Command::List(_)));
    }

    #[test]
    fn test_config_init() {
        let args = Args::parse_from(["gtest-pool", "config", "init", "out.yaml", "--force"]);
        match args.command {
            Command::Config(ConfigArgs {
                command: ConfigCommand::Init { path, force },
            }) => {
                assert_eq!(path, Some(PathBuf::from("out.yaml")));
                assert!(force);
            }
            _ => panic!("Expected config init"),
        }
    }

    #[test]
    fn test_apply_to_config() {
        let run = RunArgs {
            binary: Some(PathBuf::from("/opt/tests")),
            jobs: Some(2),
            batch_size: Some(10),
            extra: vec!["--gtest_also_run_disabled_tests".to_string()],
            ..RunArgs::default()
        };
        let mut config = AppConfig {
            filter: "Net*".to_string(),
            ..AppConfig::default()
        };
        run.apply_to(&mut config);

        assert_eq!(config.binary, Some(PathBuf::from("/opt/tests")));
        assert_eq!(config.jobs, 2);
        assert_eq!(config.batch_size, Some(10));
        assert_eq!(config.filter, "Net*");
        assert_eq!(config.args.len(), 1);
    }
}
