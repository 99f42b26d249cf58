use crate::aggregate::{aggregate, ScannerRun};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::PipelineError;
use crate::runner::{ExecutionResult, ProcessRunner};
use crate::scanners::{adapters_from_config, ScannerAdapter};
use crate::summary::{ScanSummary, ScanWarning};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Drives every configured scanner against one target and summarizes the results.
pub struct Pipeline {
    reports_dir: PathBuf,
    parallel: bool,
    runner: ProcessRunner,
    adapters: Vec<Arc<dyn ScannerAdapter>>,
}

impl Pipeline {
    pub fn from_config(config: &Config) -> Self {
        Self::with_adapters(config, adapters_from_config(config))
    }

    pub fn with_adapters(config: &Config, adapters: Vec<Arc<dyn ScannerAdapter>>) -> Self {
        Self {
            reports_dir: config.reports_dir.clone(),
            parallel: config.parallel,
            runner: ProcessRunner::new(config.timeout()),
            adapters,
        }
    }

    pub fn adapters(&self) -> &[Arc<dyn ScannerAdapter>] {
        &self.adapters
    }

    /// Run the whole pipeline.
    ///
    /// Only a reports directory that cannot be prepared is an error. Scanner
    /// failures, missing reports and bad reports all end up on the summary.
    pub async fn run(&self, target: &Path, cancel: &CancelToken) -> Result<ScanSummary, PipelineError> {
        let mut summary = ScanSummary::new(target.to_path_buf(), self.reports_dir.clone());

        if !target.exists() {
            tracing::warn!(path = %target.display(), "scan target does not exist; scanners will report it");
        }

        self.prepare()?;

        let executions = if self.parallel {
            self.execute_parallel(target, cancel).await?
        } else {
            self.execute_sequential(target, cancel).await
        };

        let mut runs = Vec::with_capacity(executions.len());
        for (adapter, (execution, log_warning)) in self.adapters.iter().zip(executions) {
            summary.warnings.extend(log_warning);
            let report = adapter.parse_report();
            runs.push(ScannerRun {
                kind: adapter.kind(),
                expected_exit: execution.completed()
                    && adapter.spec().is_expected_exit(execution.exit_code),
                execution,
                report_path: adapter.report_path(),
                log_path: adapter.spec().log_path.clone(),
                report,
            });
        }

        aggregate(&mut summary, &runs);
        tracing::info!(
            scanners = runs.len(),
            issues = summary.total_issues(),
            warnings = summary.warnings.len(),
            "scan complete"
        );
        Ok(summary)
    }

    fn prepare(&self) -> Result<(), PipelineError> {
        let reports_error = |source: std::io::Error| PipelineError::ReportsDir {
            path: self.reports_dir.clone(),
            source,
        };

        std::fs::create_dir_all(&self.reports_dir).map_err(reports_error)?;
        for adapter in &self.adapters {
            adapter.prepare().map_err(reports_error)?;
        }
        Ok(())
    }

    async fn execute_sequential(&self, target: &Path, cancel: &CancelToken) -> Vec<Executed> {
        let mut executions = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            executions.push(execute_one(&self.runner, adapter.as_ref(), target, cancel).await);
        }
        executions
    }

    async fn execute_parallel(
        &self,
        target: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<Executed>, PipelineError> {
        let handles: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let runner = self.runner.clone();
                let target = target.to_path_buf();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    execute_one(&runner, adapter.as_ref(), &target, &cancel).await
                })
            })
            .collect();

        let mut executions = Vec::with_capacity(handles.len());
        for (adapter, handle) in self.adapters.iter().zip(handles) {
            let executed = handle.await.map_err(|error| PipelineError::Worker {
                scanner: adapter.spec().name().to_string(),
                message: error.to_string(),
            })?;
            executions.push(executed);
        }
        Ok(executions)
    }
}

/// A scanner's execution plus the warning raised if its console log could not be written.
type Executed = (ExecutionResult, Option<ScanWarning>);

/// Run one scanner and write its console log as soon as it finishes.
async fn execute_one(
    runner: &ProcessRunner,
    adapter: &dyn ScannerAdapter,
    target: &Path,
    cancel: &CancelToken,
) -> Executed {
    let kind = adapter.kind();
    let execution = if cancel.is_cancelled() {
        tracing::info!(scanner = kind.id(), "skipping scanner, run cancelled");
        ExecutionResult::skipped(format!("{} skipped: run cancelled", kind.display_name()))
    } else {
        tracing::info!(scanner = kind.id(), "running {} ({})", kind.display_name(), kind.description());
        let invocation = adapter.invocation(target);
        runner.execute(&invocation, cancel).await
    };

    let log_warning = persist_log(adapter, &execution);
    (execution, log_warning)
}

/// Write stdout then stderr to the scanner's console log, replacing any old log.
fn persist_log(adapter: &dyn ScannerAdapter, execution: &ExecutionResult) -> Option<ScanWarning> {
    let log_path = &adapter.spec().log_path;
    match std::fs::write(log_path, execution.combined_output()) {
        Ok(()) => {
            tracing::debug!(path = %log_path.display(), "wrote console log");
            None
        }
        Err(error) => {
            tracing::warn!(path = %log_path.display(), %error, "failed to write console log");
            Some(ScanWarning {
                scanner: adapter.kind(),
                message: format!(
                    "Failed to write {} console log '{}': {}",
                    adapter.kind().display_name(),
                    log_path.display(),
                    error
                ),
            })
        }
    }
}

/// Run the configured scanners against `target` with a fresh cancel token.
pub async fn run_pipeline(config: &Config, target: &Path) -> Result<ScanSummary, PipelineError> {
    Pipeline::from_config(config)
        .run(target, &CancelToken::new())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::runner::ExecutionStatus;
    use crate::scanners::ScannerKind;
    use crate::summary::RowStatus;

    fn missing_binaries(reports_dir: &Path) -> Config {
        Config {
            reports_dir: reports_dir.to_path_buf(),
            bandit: ScannerConfig {
                enabled: true,
                program: "/nonexistent/bandit".to_string(),
                args: Vec::new(),
            },
            checkov: ScannerConfig {
                enabled: true,
                program: "/nonexistent/checkov".to_string(),
                args: Vec::new(),
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_missing_scanners_still_produce_summary() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let config = missing_binaries(&reports);

        let summary = run_pipeline(&config, dir.path()).await.unwrap();

        assert_eq!(summary.rows.len(), 2);
        assert!(summary.rows.iter().all(|row| row.issues == 0));
        assert!(summary
            .rows
            .iter()
            .all(|row| matches!(row.status, RowStatus::ScannerFailed(_))));
        assert_eq!(summary.warnings.len(), 2);

        let log = std::fs::read_to_string(reports.join("bandit_console.log")).unwrap();
        assert!(log.contains("/nonexistent/bandit"));
        assert!(reports.join("checkov_console.log").is_file());
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_every_scanner() {
        let dir = tempfile::tempdir().unwrap();
        let config = missing_binaries(&dir.path().join("reports"));
        let cancel = CancelToken::new();
        cancel.cancel();

        let pipeline = Pipeline::from_config(&config);
        let summary = pipeline.run(dir.path(), &cancel).await.unwrap();

        assert_eq!(summary.warnings.len(), 2);
        assert!(summary.warnings.iter().all(|w| w.message.contains("cancelled")));
    }

    #[tokio::test]
    async fn test_unwritable_reports_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, "a file, not a directory").unwrap();
        let config = missing_binaries(&blocker);

        let err = run_pipeline(&config, dir.path()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ReportsDir { .. }));
    }

    #[tokio::test]
    async fn test_disabled_scanners_are_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = missing_binaries(&dir.path().join("reports"));
        config.checkov.enabled = false;

        let summary = run_pipeline(&config, dir.path()).await.unwrap();
        assert_eq!(summary.rows.len(), 1);
        assert_eq!(summary.rows[0].scanner, ScannerKind::Bandit);
    }

    #[tokio::test]
    async fn test_execute_one_respects_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let config = missing_binaries(dir.path());
        let pipeline = Pipeline::from_config(&config);
        let cancel = CancelToken::new();
        cancel.cancel();

        let (execution, log_warning) = execute_one(
            &pipeline.runner,
            pipeline.adapters()[0].as_ref(),
            dir.path(),
            &cancel,
        )
        .await;
        assert_eq!(execution.status, ExecutionStatus::Cancelled);
        assert!(log_warning.is_none());
        let log = std::fs::read_to_string(dir.path().join("bandit_console.log")).unwrap();
        assert!(log.contains("run cancelled"));
    }
}
