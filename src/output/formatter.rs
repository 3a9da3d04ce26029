//! Output formatters for run results
//!
//! Provides JSON, Table, CSV and summary output formats.

use serde::Serialize;

use crate::executor::RunReport;
use crate::models::{ResultRecord, Verdict};
use crate::results::VerdictCounts;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    completed: usize,
    total: usize,
    stalled: bool,
    elapsed_secs: f64,
    counts: VerdictCounts,
    records: &'a [ResultRecord],
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn paint(&self, verdict: Verdict, text: &str) -> String {
        if !self.colorize {
            return text.to_string();
        }
        let code = match verdict {
            Verdict::Passed => "32",
            Verdict::Skipped | Verdict::TimedOut => "33",
            Verdict::Failed | Verdict::Interrupted => "31",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    /// Format one record
    pub fn format_record(&self, record: &ResultRecord) -> String {
        let status = self.paint(
            record.verdict,
            &format!("{} {:<11}", record.verdict.symbol(), record.verdict.label()),
        );
        match &record.reason {
            Some(reason) => format!("{status} {} ({reason})", record.id),
            None => format!("{status} {}", record.id),
        }
    }

    /// Format the end-of-run report
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_report_table(report),
            OutputFormat::Json => serde_json::to_string(&self.report_json(report)).unwrap_or_default(),
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(&self.report_json(report)).unwrap_or_default()
            }
            OutputFormat::Csv => self.format_report_csv(report),
            OutputFormat::Summary => self.format_report_brief(report),
        }
    }

    fn report_json<'a>(&self, report: &'a RunReport) -> ReportJson<'a> {
        ReportJson {
            completed: report.state.completed,
            total: report.state.total,
            stalled: report.stalled,
            elapsed_secs: report.elapsed.as_secs_f64(),
            counts: VerdictCounts::from_records(&report.records),
            records: &report.records,
        }
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let counts = VerdictCounts::from_records(&report.records);
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Test Run: {} in {:.2}s\n",
            report.state,
            report.elapsed.as_secs_f64()
        ));
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        for verdict in Verdict::all() {
            let count = report.count(verdict);
            let line = format!(" {} {:<12} {:>6}", verdict.symbol(), verdict.label(), count);
            if count > 0 && !verdict.is_success() {
                output.push_str(&self.paint(verdict, &line));
            } else {
                output.push_str(&line);
            }
            output.push('\n');
        }
        output.push_str(&format!(
            " Pass Rate: {:5.1}%\n",
            counts.pass_rate() * 100.0
        ));

        let mut problems: Vec<&ResultRecord> = report
            .records
            .iter()
            .filter(|r| !r.verdict.is_success())
            .collect();
        if !problems.is_empty() {
            problems.sort_by(|a, b| a.id.cmp(&b.id));
            output.push_str(" ───────────────────────────────────────────────────────────\n");
            for record in problems {
                output.push_str(&format!("   {}\n", self.format_record(record)));
            }
        }

        if report.stalled {
            output.push_str(&format!(
                " {} tests never received a verdict\n",
                report.state.total - report.state.completed.min(report.state.total)
            ));
        }
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output
    }

    fn format_report_csv(&self, report: &RunReport) -> String {
        Self::write_csv(report).unwrap_or_default()
    }

    fn write_csv(report: &RunReport) -> anyhow::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["test", "verdict", "reason"])?;
        for record in &report.records {
            writer.write_record([
                record.id.as_str(),
                record.verdict.label(),
                record.reason.as_deref().unwrap_or_default(),
            ])?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }

    fn format_report_brief(&self, report: &RunReport) -> String {
        let failed = report.records.len() - report.count(Verdict::Passed) - report.count(Verdict::Skipped);
        let mut line = format!(
            "{}/{} tests: {} passed, {} skipped, {} failed in {:.2}s",
            report.state.completed,
            report.state.total,
            report.count(Verdict::Passed),
            report.count(Verdict::Skipped),
            failed,
            report.elapsed.as_secs_f64()
        );
        if report.stalled {
            line.push_str(" (stalled)");
        }
        line
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}
