//! Results storage and retrieval
//!
//! Provides persistent storage for run results in JSON format and export to
//! JSON or CSV.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::executor::RunReport;
use crate::models::{ResultRecord, Verdict};

/// Stored run containing every verdict
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    /// Test binary that was sharded
    pub binary: String,

    /// Timestamp when the run started
    pub started_at: DateTime<Utc>,

    /// Timestamp when the run completed
    pub completed_at: DateTime<Utc>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Whether the pool went idle before every test had a verdict
    pub stalled: bool,

    /// Per-verdict counts
    pub counts: VerdictCounts,

    /// Individual records in arrival order
    pub records: Vec<ResultRecord>,

    /// Run configuration
    pub config: RunConfigInfo,

    /// Environment info
    pub environment: EnvironmentInfo,
}

/// Number of records per verdict
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
    pub interrupted: usize,
}

impl VerdictCounts {
    pub fn from_records(records: &[ResultRecord]) -> Self {
        let mut counts = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.verdict {
                Verdict::Passed => counts.passed += 1,
                Verdict::Failed => counts.failed += 1,
                Verdict::Skipped => counts.skipped += 1,
                Verdict::TimedOut => counts.timed_out += 1,
                Verdict::Interrupted => counts.interrupted += 1,
            }
        }
        counts
    }

    /// Fraction of records that passed (0.0 - 1.0)
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Settings the run was executed with
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfigInfo {
    pub filter: String,
    pub jobs: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_interrupted: bool,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system
    pub os: String,

    /// Architecture
    pub arch: String,

    /// Logical CPUs on the host
    pub cpus: usize,

    /// Tool version
    pub tool_version: String,
}

impl Default for RunConfigInfo {
    fn default() -> Self {
        Self {
            filter: "*".to_string(),
            jobs: 1,
            batch_size: 1,
            timeout_secs: 30,
            max_attempts: 3,
            retry_interrupted: false,
        }
    }
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: num_cpus::get(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    /// Start a stored run for `binary`
    pub fn new(binary: &Path) -> Self {
        Self {
            id: generate_run_id(),
            binary: binary.display().to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms: 0,
            stalled: false,
            counts: VerdictCounts::default(),
            records: Vec::new(),
            config: RunConfigInfo::default(),
            environment: EnvironmentInfo::default(),
        }
    }

    /// Set configuration
    pub fn with_config(mut self, config: RunConfigInfo) -> Self {
        self.config = config;
        self
    }

    /// Fill in the outcome of a finished run
    pub fn finish(&mut self, report: &RunReport) {
        self.records = report.records.clone();
        self.counts = VerdictCounts::from_records(&self.records);
        self.duration_ms = report.elapsed.as_millis() as u64;
        self.stalled = report.stalled;
        self.completed_at = Utc::now();
    }

    pub fn file_name(&self) -> String {
        format!("run-{}.json", self.id)
    }
}

/// Generate unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Results storage manager
pub struct ResultsStorage {
    /// Base directory for results
    base_dir: PathBuf,
}

impl ResultsStorage {
    /// Create a new results storage
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Save a run as `run-<id>.json`
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create directory: {}", self.base_dir.display())
        })?;

        let path = self.base_dir.join(run.file_name());
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, run).context("Failed to write results")?;

        info!("Saved run record to {}", path.display());
        Ok(path)
    }

    /// Export run to a file
    pub fn export(run: &StoredRun, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let writer = BufWriter::new(file);
                serde_json::to_writer_pretty(writer, run)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;

                writer.write_record(["test", "suite", "verdict", "reason"])?;
                for record in &run.records {
                    writer.write_record([
                        record.id.as_str(),
                        record.id.suite(),
                        record.verdict.label(),
                        record.reason.as_deref().unwrap_or_default(),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}
