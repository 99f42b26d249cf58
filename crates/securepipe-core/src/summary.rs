use crate::report::SeverityCounts;
use crate::scanners::ScannerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a summary row's count is based on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum RowStatus {
    /// Counted from the scanner's report.
    Reported,
    /// The scanner ran but wrote no report.
    NoReport,
    /// Checkov found nothing it knows how to scan.
    NoApplicableArtifacts,
    /// A report was written but could not be parsed.
    ReportUnreadable(String),
    /// The scanner failed to start, timed out or was cancelled.
    ScannerFailed(String),
}

impl RowStatus {
    pub fn is_reported(&self) -> bool {
        matches!(self, RowStatus::Reported)
    }

    pub fn label(&self) -> &str {
        match self {
            RowStatus::Reported => "reported",
            RowStatus::NoReport => "no report",
            RowStatus::NoApplicableArtifacts => "no applicable artifacts",
            RowStatus::ReportUnreadable(_) => "report unreadable",
            RowStatus::ScannerFailed(_) => "scanner failed",
        }
    }
}

/// One line of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub scanner: ScannerKind,
    /// Checkov framework (`terraform`, `dockerfile`, ...), if any.
    pub framework: Option<String>,
    pub issues: u64,
    pub report_path: PathBuf,
    pub status: RowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<SeverityCounts>,
}

impl SummaryRow {
    /// `Bandit` or `Checkov (terraform)`.
    pub fn tool_label(&self) -> String {
        match &self.framework {
            Some(framework) => format!("{} ({})", self.scanner.display_name(), framework),
            None => self.scanner.display_name().to_string(),
        }
    }
}

/// A non-fatal problem surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub scanner: ScannerKind,
    pub message: String,
}

/// The unified result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub target: PathBuf,
    pub reports_dir: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<SummaryRow>,
    pub warnings: Vec<ScanWarning>,
}

impl ScanSummary {
    pub fn new(target: PathBuf, reports_dir: PathBuf) -> Self {
        Self {
            target,
            reports_dir,
            generated_at: Utc::now(),
            rows: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn total_issues(&self) -> u64 {
        self.rows.iter().map(|row| row.issues).sum()
    }

    pub fn rows_for(&self, scanner: ScannerKind) -> impl Iterator<Item = &SummaryRow> {
        self.rows.iter().filter(move |row| row.scanner == scanner)
    }

    pub fn issues_for(&self, scanner: ScannerKind) -> u64 {
        self.rows_for(scanner).map(|row| row.issues).sum()
    }

    /// True when `scanner` ran but found no files it applies to.
    pub fn no_applicable_artifacts(&self, scanner: ScannerKind) -> bool {
        self.rows_for(scanner)
            .any(|row| row.status == RowStatus::NoApplicableArtifacts)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
