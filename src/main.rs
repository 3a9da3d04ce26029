//! gtest-pool - parallel runner for GoogleTest-style test binaries
//!
//! Discovers the tests of a binary, shards them into batches and runs each
//! batch as its own process on a fixed pool of workers. Output markers are
//! followed live so a hung test is killed at its timeout and a crash only
//! costs the test that was running; everything not yet started is rerun.
//!
//! ## Usage
//!
//! ```bash
//! # Run every test on all CPUs
//! gtest-pool run ./build/unit_tests
//!
//! # Run a subset on 8 workers with a 10 second per-test timeout
//! gtest-pool run ./build/unit_tests -f 'Net*:Io.*' -j 8 -t 10
//!
//! # Pass extra arguments to the binary
//! gtest-pool run ./build/unit_tests -- --gtest_also_run_disabled_tests
//!
//! # Show what a filter selects
//! gtest-pool list ./build/unit_tests -f 'Net*'
//!
//! # Write an example configuration file
//! gtest-pool config init
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod discovery;
mod executor;
mod models;
mod output;
mod process;
mod results;
mod utils;

use cli::{Args, ConfigCommand, ListArgs, RunArgs};
use config::{AppConfig, EnvConfig};
use discovery::{discover, TestFilter};
use executor::{BatchRunner, CommandTemplate, Scheduler};
use models::TestId;
use output::{OutputFormat, ProgressReporter, ResultFormatter};
use process::ChildLauncher;
use results::{ExportFormat, ResultSink, ResultsStorage, RunConfigInfo, StoredRun};
use utils::{init_logger, LogLevel, Stopwatch};

fn main() -> ExitCode {
    let args = Args::parse();
    let env = EnvConfig::load();
    init_logger(LogLevel::resolve(args.verbose, env.log.as_deref()));

    match dispatch(args, &env) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn dispatch(args: Args, env: &EnvConfig) -> Result<ExitCode> {
    let explicit = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    match args.command {
        cli::Command::Run(run_args) => {
            let config = effective_config(explicit.as_deref(), env)?;
            run_tests(config, &run_args)
        }
        cli::Command::List(list_args) => {
            let config = effective_config(explicit.as_deref(), env)?;
            list_tests(config, &list_args)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args.command, explicit.as_deref(), env)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Config file (if any) with environment overrides applied
fn effective_config(explicit: Option<&Path>, env: &EnvConfig) -> Result<AppConfig> {
    let (mut config, source) = config::load_default(explicit)?;
    if let Some(source) = source {
        info!("Using configuration from {}", source.display());
    }
    if env.has_any() {
        debug!("Applying GTEST_POOL_* environment overrides");
    }
    config.apply_env(env);
    Ok(config)
}

fn require_binary(config: &AppConfig) -> Result<PathBuf> {
    config.binary.clone().ok_or_else(|| {
        anyhow!("No test binary given. Pass it as an argument, set GTEST_POOL_BINARY or add `binary:` to the config file.")
    })
}

/// Discover the binary's tests and keep those the filter selects
fn select_tests(template: &CommandTemplate, filter: &str) -> Result<Vec<TestId>> {
    let filter = TestFilter::parse(filter)?;
    let all = discover(template)
        .with_context(|| format!("Failed to discover tests in {}", template.program().display()))?;
    let discovered = all.len();
    let selected = filter.apply(all);
    info!(
        "Filter '{}' selected {} of {} tests",
        filter,
        selected.len(),
        discovered
    );
    Ok(selected)
}

fn run_tests(mut config: AppConfig, args: &RunArgs) -> Result<ExitCode> {
    args.apply_to(&mut config);
    config.validate()?;

    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow!("Unknown output format: {}", args.format))?;
    let export = match &args.export {
        Some(path) => {
            let format = ExportFormat::from_extension(path).ok_or_else(|| {
                anyhow!("Cannot export to {}: use a .json or .csv file", path.display())
            })?;
            Some((path.clone(), format))
        }
        None => None,
    };

    let binary = require_binary(&config)?;
    let template = CommandTemplate::new(&binary).with_args(config.args.iter().cloned());

    let mut stopwatch = Stopwatch::new();
    let selected = select_tests(&template, &config.filter)?;
    stopwatch.lap("discover");

    if selected.is_empty() {
        warn!("No tests match filter '{}'", config.filter);
        println!("No tests match filter '{}'", config.filter);
        return Ok(ExitCode::SUCCESS);
    }

    let total = selected.len();
    let output_dir = config.output_dir();
    let sink = Arc::new(ResultSink::open(output_dir.join("result.txt"), total)?);

    let runner = BatchRunner::new(Arc::new(ChildLauncher::new()), template)
        .with_markers(config.markers.clone())
        .with_settings(config.runner_settings());
    let scheduler = Scheduler::new(runner, config.jobs)
        .with_policy(config.retry_policy())
        .with_batch_size(config.batch_size);

    let mut run = StoredRun::new(&binary).with_config(RunConfigInfo {
        filter: config.filter.clone(),
        jobs: scheduler.jobs(),
        batch_size: scheduler.batch_size_for(total),
        timeout_secs: config.timeout_secs,
        max_attempts: config.max_attempts,
        retry_interrupted: config.retry_interrupted,
    });

    let mut progress = ProgressReporter::new(total, !args.no_progress);
    let report = scheduler.run_with_progress(selected, sink, |state| progress.update(state))?;
    progress.finish();
    stopwatch.lap("run");

    let mut formatter = ResultFormatter::new(format);
    if args.no_color {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_report(&report));

    run.finish(&report);
    let storage = ResultsStorage::new(&output_dir);
    storage.save(&run)?;
    if let Some((path, format)) = export {
        ResultsStorage::export(&run, &path, format)?;
    }
    stopwatch.lap("report");
    debug!("Timing: {}", stopwatch.format());

    if report.stalled {
        warn!(
            "Run stalled at {}; see {}",
            report.state,
            output_dir.join("result.txt").display()
        );
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list_tests(mut config: AppConfig, args: &ListArgs) -> Result<()> {
    if let Some(binary) = &args.binary {
        config.binary = Some(binary.clone());
    }
    if let Some(filter) = &args.filter {
        config.filter = filter.clone();
    }

    let binary = require_binary(&config)?;
    let template = CommandTemplate::new(&binary).with_args(config.args.iter().cloned());
    let selected = select_tests(&template, &config.filter)?;

    let mut listing = String::new();
    for id in &selected {
        listing.push_str(id.as_str());
        listing.push('\n');
    }

    match &args.output {
        Some(path) => {
            std::fs::write(path, listing)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {} test names to {}", selected.len(), path.display());
        }
        None => print!("{listing}"),
    }
    Ok(())
}

fn manage_config(command: ConfigCommand, explicit: Option<&Path>, env: &EnvConfig) -> Result<()> {
    match command {
        ConfigCommand::Init { path, force } => {
            let path = path.unwrap_or_else(|| PathBuf::from("./gtest-pool.yaml"));
            if path.exists() && !force {
                bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            AppConfig::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        ConfigCommand::Show => {
            let (mut config, source) = config::load_default(explicit)?;
            config.apply_env(env);
            match source {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => {
                    println!("# No configuration file found; searched:");
                    for location in config::config_locations() {
                        println!("#   {}", location.display());
                    }
                }
            }
            print!("{}", serde_yaml::to_string(&config)?);
        }

        ConfigCommand::Env => config::print_env_help(),
    }
    Ok(())
}
