use super::{console_log_path, path_arg, remove_stale, ReportLocation, ScannerAdapter, ScannerKind, ScannerSpec};
use crate::config::ScannerConfig;
use crate::report::checkov::PREFERRED_REPORT_NAME;
use crate::report::{self, ParseOutcome, ScanReport};
use crate::runner::Invocation;
use std::path::{Path, PathBuf};

/// Runs `checkov -d <target> -o json --output-file-path <reports>`.
///
/// Checkov names the report file itself, usually `results_json.json`.
#[derive(Debug, Clone)]
pub struct CheckovAdapter {
    spec: ScannerSpec,
}

impl CheckovAdapter {
    pub fn new(reports_dir: &Path, config: &ScannerConfig) -> Self {
        Self {
            spec: ScannerSpec {
                kind: ScannerKind::Checkov,
                program: config.program.clone(),
                base_args: config.args.clone(),
                report: ReportLocation::Directory(reports_dir.to_path_buf()),
                log_path: console_log_path(reports_dir, ScannerKind::Checkov),
                // 1: failed checks
                finding_exit_codes: &[1],
            },
        }
    }

    fn output_dir(&self) -> &Path {
        self.spec.report.path()
    }
}

impl ScannerAdapter for CheckovAdapter {
    fn spec(&self) -> &ScannerSpec {
        &self.spec
    }

    fn prepare(&self) -> std::io::Result<()> {
        let dir = self.output_dir();
        std::fs::create_dir_all(dir)?;

        let stale = glob::glob(&report::checkov::report_pattern(dir))
            .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidInput, error))?;
        for path in stale.filter_map(|entry| entry.ok()) {
            remove_stale(&path)?;
        }
        Ok(())
    }

    fn invocation(&self, target: &Path) -> Invocation {
        Invocation::new(&self.spec.program)
            .args(&self.spec.base_args)
            .arg("-d")
            .arg(path_arg(target))
            .args(["-o", "json", "--output-file-path"])
            .arg(path_arg(self.output_dir()))
    }

    fn report_path(&self) -> PathBuf {
        report::checkov::locate_report(self.output_dir())
            .unwrap_or_else(|| self.output_dir().join(PREFERRED_REPORT_NAME))
    }

    fn parse_report(&self) -> ParseOutcome<ScanReport> {
        report::checkov::parse_dir(self.output_dir()).map(ScanReport::Checkov)
    }
}
