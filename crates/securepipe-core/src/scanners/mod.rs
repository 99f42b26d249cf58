//! Scanner adapters.
//!
//! An adapter turns "scan this directory" into one scanner's argument vector
//! and knows where that scanner leaves its report and console log.

pub mod bandit;
pub mod checkov;

pub use bandit::BanditAdapter;
pub use checkov::CheckovAdapter;

use crate::config::Config;
use crate::report::{ParseOutcome, ScanReport};
use crate::runner::Invocation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The scanners SecurePipe knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerKind {
    Bandit,
    Checkov,
}

impl ScannerKind {
    /// Identifier used in file names and machine output.
    pub fn id(&self) -> &'static str {
        match self {
            ScannerKind::Bandit => "bandit",
            ScannerKind::Checkov => "checkov",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ScannerKind::Bandit => "Bandit",
            ScannerKind::Checkov => "Checkov",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScannerKind::Bandit => "Python security scan",
            ScannerKind::Checkov => "IaC / config scan",
        }
    }
}

impl std::fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where a scanner writes its native report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLocation {
    /// The adapter chooses the exact file.
    File(PathBuf),
    /// The scanner chooses the file name inside this directory.
    Directory(PathBuf),
}

impl ReportLocation {
    pub fn path(&self) -> &Path {
        match self {
            ReportLocation::File(path) | ReportLocation::Directory(path) => path,
        }
    }
}

/// Static description of one configured scanner.
#[derive(Debug, Clone)]
pub struct ScannerSpec {
    pub kind: ScannerKind,
    pub program: String,
    pub base_args: Vec<String>,
    pub report: ReportLocation,
    pub log_path: PathBuf,
    /// Non-zero exit codes that mean "ran fine, found issues".
    pub finding_exit_codes: &'static [i32],
}

impl ScannerSpec {
    pub fn name(&self) -> &'static str {
        self.kind.id()
    }

    /// Whether `exit_code` is an expected outcome rather than a tool error.
    pub fn is_expected_exit(&self, exit_code: i32) -> bool {
        exit_code == 0 || self.finding_exit_codes.contains(&exit_code)
    }
}

/// One scanner's invocation contract and report knowledge.
pub trait ScannerAdapter: Send + Sync {
    fn spec(&self) -> &ScannerSpec;

    /// Make sure the output location exists and drop the previous run's report.
    fn prepare(&self) -> std::io::Result<()>;

    /// Build the argument vector that scans `target`.
    fn invocation(&self, target: &Path) -> Invocation;

    /// Path of the report to show to users.
    fn report_path(&self) -> PathBuf;

    fn parse_report(&self) -> ParseOutcome<ScanReport>;

    fn kind(&self) -> ScannerKind {
        self.spec().kind
    }
}

/// Adapters for every scanner enabled in `config`, in run order.
pub fn adapters_from_config(config: &Config) -> Vec<Arc<dyn ScannerAdapter>> {
    let mut adapters: Vec<Arc<dyn ScannerAdapter>> = Vec::new();
    if config.bandit.enabled {
        adapters.push(Arc::new(BanditAdapter::new(
            &config.reports_dir,
            &config.bandit,
        )));
    }
    if config.checkov.enabled {
        adapters.push(Arc::new(CheckovAdapter::new(
            &config.reports_dir,
            &config.checkov,
        )));
    }
    adapters
}

/// `<reports>/<scanner>_console.log`
pub(crate) fn console_log_path(reports_dir: &Path, kind: ScannerKind) -> PathBuf {
    reports_dir.join(format!("{}_console.log", kind.id()))
}

/// `path` as a command-line value that cannot be read as an option.
///
/// Relative paths starting with `-` get a `./` prefix; everything else is
/// passed through untouched.
pub(crate) fn path_arg(path: &Path) -> PathBuf {
    if path.is_relative() && path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

/// Remove `path` if it exists.
pub(crate) fn remove_stale(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed stale report");
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}
