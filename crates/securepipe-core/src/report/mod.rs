//! Readers for the scanners' native report files.
//!
//! Parsers never fail. A missing file is [`ParseOutcome::Empty`] (the scanner
//! had nothing to report on), while an unreadable or unexpected file is
//! [`ParseOutcome::Malformed`], so callers can tell "no data" from "corrupt data".

pub mod bandit;
pub mod checkov;

use serde::Serialize;
use std::path::Path;

pub use bandit::{BanditFinding, BanditReport, SeverityCounts};
pub use checkov::{CheckovReport, FrameworkResult};

/// Result of reading one report file.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    /// No report file was written.
    Empty,
    /// A report exists but could not be understood.
    Malformed(String),
}

impl<T> ParseOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Parsed(value) => ParseOutcome::Parsed(f(value)),
            ParseOutcome::Empty => ParseOutcome::Empty,
            ParseOutcome::Malformed(reason) => ParseOutcome::Malformed(reason),
        }
    }

    pub fn parsed(&self) -> Option<&T> {
        match self {
            ParseOutcome::Parsed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ParseOutcome::Empty)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ParseOutcome::Malformed(_))
    }
}

/// A parsed report, tagged by the scanner that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scanner", rename_all = "snake_case")]
pub enum ScanReport {
    Bandit(BanditReport),
    Checkov(CheckovReport),
}

/// Read a report file, mapping "not there" to `Empty` and any other I/O
/// failure to `Malformed`.
pub(crate) fn read_report(path: &Path) -> Result<String, ParseOutcome<()>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no report file");
            Err(ParseOutcome::Empty)
        }
        Err(error) => {
            let reason = format!("Failed to read '{}': {}", path.display(), error);
            tracing::warn!(path = %path.display(), %error, "report unreadable");
            Err(ParseOutcome::Malformed(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_non_parsed_variants() {
        let empty: ParseOutcome<u32> = ParseOutcome::Empty;
        assert!(empty.map(|n| n + 1).is_empty());

        let malformed: ParseOutcome<u32> = ParseOutcome::Malformed("bad".into());
        assert_eq!(malformed.map(|n| n + 1), ParseOutcome::Malformed("bad".into()));

        assert_eq!(ParseOutcome::Parsed(1).map(|n| n + 1), ParseOutcome::Parsed(2));
    }

    #[test]
    fn test_read_report_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = read_report(&dir.path().join("nope.json")).unwrap_err();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_read_report_directory_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = read_report(dir.path()).unwrap_err();
        assert!(outcome.is_malformed());
    }
}
