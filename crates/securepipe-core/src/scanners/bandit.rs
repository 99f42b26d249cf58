use super::{console_log_path, path_arg, remove_stale, ReportLocation, ScannerAdapter, ScannerKind, ScannerSpec};
use crate::config::ScannerConfig;
use crate::report::{self, ParseOutcome, ScanReport};
use crate::runner::Invocation;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "bandit_report.json";

/// Runs `bandit -r <target> -f json -o <reports>/bandit_report.json`.
#[derive(Debug, Clone)]
pub struct BanditAdapter {
    spec: ScannerSpec,
}

impl BanditAdapter {
    pub fn new(reports_dir: &Path, config: &ScannerConfig) -> Self {
        Self {
            spec: ScannerSpec {
                kind: ScannerKind::Bandit,
                program: config.program.clone(),
                base_args: config.args.clone(),
                report: ReportLocation::File(reports_dir.join(REPORT_FILE)),
                log_path: console_log_path(reports_dir, ScannerKind::Bandit),
                // 1: issues found
                finding_exit_codes: &[1],
            },
        }
    }
}

impl ScannerAdapter for BanditAdapter {
    fn spec(&self) -> &ScannerSpec {
        &self.spec
    }

    fn prepare(&self) -> std::io::Result<()> {
        let report = self.spec.report.path();
        if let Some(parent) = report.parent() {
            std::fs::create_dir_all(parent)?;
        }
        remove_stale(report)
    }

    fn invocation(&self, target: &Path) -> Invocation {
        Invocation::new(&self.spec.program)
            .args(&self.spec.base_args)
            .arg("-r")
            .arg(path_arg(target))
            .args(["-f", "json", "-o"])
            .arg(path_arg(self.spec.report.path()))
    }

    fn report_path(&self) -> PathBuf {
        self.spec.report.path().to_path_buf()
    }

    fn parse_report(&self) -> ParseOutcome<ScanReport> {
        report::bandit::parse_file(self.spec.report.path()).map(ScanReport::Bandit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_invocation_targets_fixed_report_path() {
        let adapter = BanditAdapter::new(Path::new("reports"), &ScannerConfig::bandit());
        let invocation = adapter.invocation(Path::new("my repo"));

        assert_eq!(invocation.program, OsString::from("python"));
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-m",
                "bandit",
                "-r",
                "my repo",
                "-f",
                "json",
                "-o",
                "reports/bandit_report.json"
            ]
        );
    }

    #[test]
    fn test_dash_prefixed_target_stays_a_path() {
        let adapter = BanditAdapter::new(Path::new("reports"), &ScannerConfig::bandit());
        let invocation = adapter.invocation(Path::new("--version"));

        assert_eq!(invocation.args[3], OsString::from("./--version"));
    }

    #[test]
    fn test_prepare_creates_dir_and_clears_old_report() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let adapter = BanditAdapter::new(&reports, &ScannerConfig::bandit());

        adapter.prepare().unwrap();
        assert!(reports.is_dir());

        std::fs::write(reports.join(REPORT_FILE), r#"{"results":[{}]}"#).unwrap();
        adapter.prepare().unwrap();
        assert!(!reports.join(REPORT_FILE).exists());
        assert!(adapter.parse_report().is_empty());
    }

    #[test]
    fn test_parse_report_wraps_bandit_report() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = BanditAdapter::new(dir.path(), &ScannerConfig::bandit());
        std::fs::write(dir.path().join(REPORT_FILE), r#"{"results":[{},{}]}"#).unwrap();

        match adapter.parse_report() {
            ParseOutcome::Parsed(ScanReport::Bandit(report)) => assert_eq!(report.issue_count(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_finding_exit_code() {
        let adapter = BanditAdapter::new(Path::new("reports"), &ScannerConfig::bandit());
        assert!(adapter.spec().is_expected_exit(0));
        assert!(adapter.spec().is_expected_exit(1));
        assert!(!adapter.spec().is_expected_exit(2));
    }
}
