use crate::report::{ParseOutcome, ScanReport};
use crate::runner::{ExecutionResult, ExecutionStatus};
use crate::scanners::ScannerKind;
use crate::summary::{RowStatus, ScanSummary, ScanWarning, SummaryRow};
use std::path::PathBuf;

/// Everything one scanner contributed to a run.
#[derive(Debug, Clone)]
pub struct ScannerRun {
    pub kind: ScannerKind,
    pub execution: ExecutionResult,
    /// Whether the exit code is one the scanner uses for "clean" or "issues found".
    pub expected_exit: bool,
    pub report_path: PathBuf,
    pub log_path: PathBuf,
    pub report: ParseOutcome<ScanReport>,
}

impl ScannerRun {
    /// Why this scanner produced no usable data, if it failed rather than
    /// finding nothing. A completed run with an unexpected exit code counts.
    fn failure_reason(&self) -> Option<String> {
        if self.execution.completed() && self.expected_exit {
            return None;
        }
        Some(first_line(&self.execution.stderr).unwrap_or_else(|| {
            if self.execution.completed() {
                format!("exited with code {}", self.execution.exit_code)
            } else {
                self.execution.status.label().to_string()
            }
        }))
    }
}

/// Fold every scanner's outcome into one summary.
pub fn aggregate(summary: &mut ScanSummary, runs: &[ScannerRun]) {
    for run in runs {
        summary.warnings.extend(warnings_for(run));
        match run.kind {
            ScannerKind::Bandit => summary.rows.push(bandit_row(run)),
            ScannerKind::Checkov => summary.rows.extend(checkov_rows(run)),
        }
    }
}

fn bandit_row(run: &ScannerRun) -> SummaryRow {
    let mut row = SummaryRow {
        scanner: ScannerKind::Bandit,
        framework: None,
        issues: 0,
        report_path: run.report_path.clone(),
        status: RowStatus::NoReport,
        severity: None,
    };

    match &run.report {
        ParseOutcome::Parsed(ScanReport::Bandit(report)) => {
            row.issues = report.issue_count();
            row.severity = Some(report.severity_counts());
            row.status = RowStatus::Reported;
        }
        ParseOutcome::Malformed(reason) => row.status = RowStatus::ReportUnreadable(reason.clone()),
        ParseOutcome::Parsed(other) => {
            row.status = RowStatus::ReportUnreadable(format!("unexpected report type: {other:?}"))
        }
        ParseOutcome::Empty => {
            if let Some(reason) = run.failure_reason() {
                row.status = RowStatus::ScannerFailed(reason);
            }
        }
    }
    row
}

fn checkov_rows(run: &ScannerRun) -> Vec<SummaryRow> {
    let single = |status: RowStatus| SummaryRow {
        scanner: ScannerKind::Checkov,
        framework: None,
        issues: 0,
        report_path: run.report_path.clone(),
        status,
        severity: None,
    };

    match &run.report {
        ParseOutcome::Parsed(ScanReport::Checkov(report)) if !report.is_empty() => report
            .frameworks
            .iter()
            .map(|framework| SummaryRow {
                scanner: ScannerKind::Checkov,
                framework: Some(framework.check_type.clone()),
                issues: framework.failed,
                report_path: run.report_path.clone(),
                status: RowStatus::Reported,
                severity: None,
            })
            .collect(),
        ParseOutcome::Malformed(reason) => vec![single(RowStatus::ReportUnreadable(reason.clone()))],
        ParseOutcome::Parsed(ScanReport::Bandit(_)) => vec![single(RowStatus::ReportUnreadable(
            "unexpected report type".to_string(),
        ))],
        ParseOutcome::Parsed(ScanReport::Checkov(_)) | ParseOutcome::Empty => {
            match run.failure_reason() {
                Some(reason) => vec![single(RowStatus::ScannerFailed(reason))],
                None => vec![single(RowStatus::NoApplicableArtifacts)],
            }
        }
    }
}

fn warnings_for(run: &ScannerRun) -> Vec<ScanWarning> {
    let name = run.kind.display_name();
    let mut warnings = Vec::new();
    let mut push = |message: String| {
        warnings.push(ScanWarning {
            scanner: run.kind,
            message,
        })
    };

    match run.execution.status {
        ExecutionStatus::Exited if !run.expected_exit => push(format!(
            "{name} exited with code {}: {}",
            run.execution.exit_code,
            first_line(&run.execution.stderr).unwrap_or_else(|| {
                format!("see {}", run.log_path.display())
            })
        )),
        ExecutionStatus::Exited => {}
        ExecutionStatus::FailedToStart | ExecutionStatus::TimedOut | ExecutionStatus::Cancelled => {
            push(format!(
                "{name} {}: {}",
                run.execution.status.label(),
                first_line(&run.execution.stderr).unwrap_or_default()
            ))
        }
    }

    if let ParseOutcome::Malformed(reason) = &run.report {
        push(format!("{name} report unreadable: {reason}"));
    }

    warnings
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
