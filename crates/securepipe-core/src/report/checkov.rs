use super::{read_report, ParseOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// File name Checkov uses for JSON output written with `--output-file-path`.
pub const PREFERRED_REPORT_NAME: &str = "results_json.json";

/// Pattern matched when the preferred file is not present.
pub const REPORT_GLOB: &str = "results_*.json";

/// Bucket used when a single-object report carries no `check_type`.
pub const GENERIC_CHECK_TYPE: &str = "generic";

/// Bucket used when an entry of a list report carries no `check_type`.
pub const UNKNOWN_CHECK_TYPE: &str = "unknown";

/// Failed-check counts per Checkov framework, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckovReport {
    pub frameworks: Vec<FrameworkResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkResult {
    pub check_type: String,
    pub failed: u64,
}

impl CheckovReport {
    /// Add `failed` to `check_type`, creating the entry on first sight.
    fn record(&mut self, check_type: &str, failed: u64) {
        match self
            .frameworks
            .iter_mut()
            .find(|framework| framework.check_type == check_type)
        {
            Some(framework) => framework.failed += failed,
            None => self.frameworks.push(FrameworkResult {
                check_type: check_type.to_string(),
                failed,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
    }

    pub fn total_failed(&self) -> u64 {
        self.frameworks.iter().map(|framework| framework.failed).sum()
    }

    pub fn failed_for(&self, check_type: &str) -> Option<u64> {
        self.frameworks
            .iter()
            .find(|framework| framework.check_type == check_type)
            .map(|framework| framework.failed)
    }
}

/// Find the report Checkov wrote into `dir`.
///
/// Checkov picks the file name itself, so the conventional name is tried first
/// and any `results_*.json` is accepted after that.
pub fn locate_report(dir: &Path) -> Option<PathBuf> {
    let preferred = dir.join(PREFERRED_REPORT_NAME);
    if preferred.is_file() {
        return Some(preferred);
    }

    let mut candidates: Vec<PathBuf> = glob::glob(&report_pattern(dir))
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Glob matching Checkov reports in `dir`, with `dir` itself escaped.
pub fn report_pattern(dir: &Path) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    format!("{}/{}", escaped.trim_end_matches('/'), REPORT_GLOB)
}

/// Parse Checkov JSON text, accepting a list of framework reports or a single one.
pub fn parse_str(content: &str) -> ParseOutcome<CheckovReport> {
    let value: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(error) => {
            return ParseOutcome::Malformed(format!("Invalid Checkov report JSON: {error}"))
        }
    };

    let mut report = CheckovReport::default();
    match &value {
        Value::Array(items) => {
            for item in items {
                let check_type = check_type_of(item).unwrap_or(UNKNOWN_CHECK_TYPE);
                report.record(check_type, failed_of(item));
            }
        }
        Value::Object(_) => {
            let check_type = check_type_of(&value).unwrap_or(GENERIC_CHECK_TYPE);
            report.record(check_type, failed_of(&value));
        }
        other => {
            return ParseOutcome::Malformed(format!(
                "Unexpected Checkov report shape: expected a list or an object, found {}",
                json_kind(other)
            ))
        }
    }

    ParseOutcome::Parsed(report)
}

/// Parse the Checkov report found in `dir`; no report is `Empty`.
pub fn parse_dir(dir: &Path) -> ParseOutcome<CheckovReport> {
    match locate_report(dir) {
        Some(path) => parse_file(&path),
        None => {
            tracing::debug!(dir = %dir.display(), "no Checkov report found");
            ParseOutcome::Empty
        }
    }
}

pub fn parse_file(path: &Path) -> ParseOutcome<CheckovReport> {
    let content = match read_report(path) {
        Ok(content) => content,
        Err(outcome) => return outcome.map(|_| CheckovReport::default()),
    };

    let outcome = parse_str(&content);
    if let ParseOutcome::Malformed(reason) = &outcome {
        tracing::warn!(path = %path.display(), %reason, "could not parse Checkov report");
    }
    outcome
}

fn check_type_of(item: &Value) -> Option<&str> {
    item.get("check_type")
        .and_then(Value::as_str)
        .filter(|check_type| !check_type.is_empty())
}

fn failed_of(item: &Value) -> u64 {
    item.get("summary")
        .and_then(|summary| summary.get("failed"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
