use super::{read_report, ParseOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The subset of Bandit's JSON report the summary needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BanditReport {
    #[serde(default, rename = "results")]
    pub findings: Vec<BanditFinding>,
}

/// A single Bandit issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditFinding {
    pub filename: Option<String>,
    pub line_number: Option<u64>,
    pub test_id: Option<String>,
    pub test_name: Option<String>,
    pub issue_severity: Option<String>,
    pub issue_confidence: Option<String>,
    pub issue_text: Option<String>,
}

/// Findings bucketed by Bandit's `issue_severity`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub other: u64,
}

impl BanditReport {
    pub fn issue_count(&self) -> u64 {
        self.findings.len() as u64
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for finding in &self.findings {
            let severity = finding
                .issue_severity
                .as_deref()
                .unwrap_or("")
                .to_ascii_uppercase();
            match severity.as_str() {
                "HIGH" => counts.high += 1,
                "MEDIUM" => counts.medium += 1,
                "LOW" => counts.low += 1,
                _ => counts.other += 1,
            }
        }
        counts
    }
}

/// Parse Bandit JSON text.
pub fn parse_str(content: &str) -> ParseOutcome<BanditReport> {
    match serde_json::from_str::<BanditReport>(content) {
        Ok(report) => ParseOutcome::Parsed(report),
        Err(error) => ParseOutcome::Malformed(format!("Invalid Bandit report JSON: {error}")),
    }
}

/// Parse the Bandit report at `path`.
pub fn parse_file(path: &Path) -> ParseOutcome<BanditReport> {
    let content = match read_report(path) {
        Ok(content) => content,
        Err(outcome) => return outcome.map(|_| BanditReport::default()),
    };

    let outcome = parse_str(&content);
    if let ParseOutcome::Malformed(reason) = &outcome {
        tracing::warn!(path = %path.display(), %reason, "could not parse Bandit report");
    }
    outcome
}
