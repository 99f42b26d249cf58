use colored::*;
use securepipe_core::summary::{RowStatus, ScanSummary, SummaryRow};
use securepipe_core::ScannerKind;
use std::fmt::Write as _;

const HEADERS: [&str; 3] = ["Tool", "Issues Found", "Report Path"];

/// Print the scan summary table to the terminal.
pub fn print_scan_summary(summary: &ScanSummary) {
    print!("{}", render_scan_summary(summary));
}

/// Print the scan summary as pretty JSON.
pub fn print_scan_summary_json(summary: &ScanSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Render the summary table, notices and warnings.
pub fn render_scan_summary(summary: &ScanSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{}",
        format!(
            " SecurePipe v{} — Scan Summary for {}",
            env!("CARGO_PKG_VERSION"),
            summary.target.display()
        )
        .bold()
    );
    let _ = writeln!(out);

    let rows: Vec<[String; 3]> = summary
        .rows
        .iter()
        .filter(|row| row.status != RowStatus::NoApplicableArtifacts)
        .map(|row| [row.tool_label(), issues_cell(row), row.report_path.display().to_string()])
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = format!(
        " +{}+",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let _ = writeln!(out, "{}", separator.dimmed());
    let header = HEADERS
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!(" {} ", pad(cell, *width).magenta().bold()))
        .collect::<Vec<_>>()
        .join("|");
    let _ = writeln!(out, " |{}|", header);
    let _ = writeln!(out, "{}", separator.dimmed());

    for (row, cells) in summary
        .rows
        .iter()
        .filter(|row| row.status != RowStatus::NoApplicableArtifacts)
        .zip(rows.iter())
    {
        let line = cells
            .iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(column, (cell, width))| {
                let padded = pad(cell, *width);
                let styled = match (column, &row.status) {
                    (1, RowStatus::Reported) if row.issues > 0 => padded.red().bold(),
                    (1, RowStatus::Reported) => padded.green(),
                    (1, _) => padded.yellow(),
                    (2, _) => padded.dimmed(),
                    _ => padded.normal(),
                };
                format!(" {} ", styled)
            })
            .collect::<Vec<_>>()
            .join("|");
        let _ = writeln!(out, " |{}|", line);
    }
    let _ = writeln!(out, "{}", separator.dimmed());
    let _ = writeln!(out);

    if summary.no_applicable_artifacts(ScannerKind::Checkov) {
        let _ = writeln!(
            out,
            " {} No IaC files detected for Checkov. Add Terraform, YAML, or Docker files to scan.",
            "NOTE".yellow().bold()
        );
    }

    for row in &summary.rows {
        if let RowStatus::ReportUnreadable(reason) | RowStatus::ScannerFailed(reason) = &row.status {
            let _ = writeln!(
                out,
                " {} {} {}: {}",
                "|-".dimmed(),
                row.tool_label(),
                row.status.label(),
                reason.dimmed()
            );
        }
    }

    for warning in &summary.warnings {
        let _ = writeln!(out, " {} {}", "WARN".red().bold(), warning.message);
    }

    if summary.no_applicable_artifacts(ScannerKind::Checkov) || summary.has_warnings() {
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        " {} Scanning complete! {} issue(s) found. Reports saved in {}",
        "OK".green().bold(),
        summary.total_issues(),
        summary.reports_dir.display().to_string().cyan()
    );
    let _ = writeln!(out);
    out
}

fn issues_cell(row: &SummaryRow) -> String {
    match &row.status {
        RowStatus::Reported => match &row.severity {
            Some(severity) if row.issues > 0 => format!(
                "{} (H:{} M:{} L:{})",
                row.issues, severity.high, severity.medium, severity.low
            ),
            _ => row.issues.to_string(),
        },
        RowStatus::NoReport => "0".to_string(),
        RowStatus::NoApplicableArtifacts => "-".to_string(),
        RowStatus::ReportUnreadable(_) | RowStatus::ScannerFailed(_) => "n/a".to_string(),
    }
}

fn pad(cell: &str, width: usize) -> String {
    format!("{:<width$}", cell, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use securepipe_core::report::SeverityCounts;
    use std::path::PathBuf;

    fn summary_with(rows: Vec<SummaryRow>) -> ScanSummary {
        let mut summary = ScanSummary::new(PathBuf::from("./app"), PathBuf::from("reports"));
        summary.rows = rows;
        summary
    }

    fn row(scanner: ScannerKind, framework: Option<&str>, issues: u64, status: RowStatus) -> SummaryRow {
        SummaryRow {
            scanner,
            framework: framework.map(str::to_string),
            issues,
            report_path: PathBuf::from(match scanner {
                ScannerKind::Bandit => "reports/bandit_report.json",
                ScannerKind::Checkov => "reports/results_json.json",
            }),
            status,
            severity: None,
        }
    }

    #[test]
    fn test_renders_one_line_per_row() {
        colored::control::set_override(false);
        let mut bandit = row(ScannerKind::Bandit, None, 2, RowStatus::Reported);
        bandit.severity = Some(SeverityCounts { high: 1, medium: 0, low: 1, other: 0 });
        let summary = summary_with(vec![
            bandit,
            row(ScannerKind::Checkov, Some("terraform"), 4, RowStatus::Reported),
        ]);

        let rendered = render_scan_summary(&summary);
        assert!(rendered.contains("| Bandit "));
        assert!(rendered.contains("2 (H:1 M:0 L:1)"));
        assert!(rendered.contains("| Checkov (terraform) "));
        assert!(rendered.contains("reports/results_json.json"));
        assert!(rendered.contains("6 issue(s) found"));
        assert!(!rendered.contains("No IaC files detected"));
    }

    #[test]
    fn test_no_applicable_artifacts_prints_notice_instead_of_row() {
        colored::control::set_override(false);
        let summary = summary_with(vec![
            row(ScannerKind::Bandit, None, 0, RowStatus::Reported),
            row(ScannerKind::Checkov, None, 0, RowStatus::NoApplicableArtifacts),
        ]);

        let rendered = render_scan_summary(&summary);
        assert!(rendered.contains("No IaC files detected for Checkov"));
        assert!(!rendered.contains("| Checkov"));
    }

    #[test]
    fn test_failed_scanner_shows_reason() {
        colored::control::set_override(false);
        let summary = summary_with(vec![row(
            ScannerKind::Bandit,
            None,
            0,
            RowStatus::ScannerFailed("Failed to start 'python'".into()),
        )]);

        let rendered = render_scan_summary(&summary);
        assert!(rendered.contains("n/a"));
        assert!(rendered.contains("Bandit scanner failed: Failed to start 'python'"));
    }
}
