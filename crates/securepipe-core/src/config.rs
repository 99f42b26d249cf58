use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".securepipe.toml";

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SECUREPIPE_CONFIG";

/// Pipeline configuration, usually loaded from `.securepipe.toml`.
///
/// Every field has a default so an empty (or absent) file yields a working
/// setup that mirrors the stock `reports/` layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving scanner reports and console logs.
    pub reports_dir: PathBuf,

    /// Per-scanner deadline in seconds. `0` waits forever.
    pub timeout_secs: u64,

    /// Run scanners concurrently, one task per scanner.
    pub parallel: bool,

    pub bandit: ScannerConfig,
    pub checkov: ScannerConfig,
}

/// How to launch one scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Executable to spawn. Left out, the scanner's stock command is used.
    #[serde(default)]
    pub program: String,

    /// Arguments placed before the scanner-specific ones.
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ScannerConfig {
    pub fn bandit() -> Self {
        Self {
            enabled: true,
            program: "python".to_string(),
            args: vec!["-m".to_string(), "bandit".to_string()],
        }
    }

    pub fn checkov() -> Self {
        Self {
            enabled: true,
            program: "checkov".to_string(),
            args: Vec::new(),
        }
    }

    /// Fill in `stock`'s command when no `program` was given; any `args` from
    /// the file follow the stock ones.
    fn fill_program(&mut self, stock: ScannerConfig) {
        if !self.program.is_empty() {
            return;
        }
        let extra = std::mem::take(&mut self.args);
        self.program = stock.program;
        self.args = stock.args;
        self.args.extend(extra);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            timeout_secs: 600,
            parallel: false,
            bandit: ScannerConfig::bandit(),
            checkov: ScannerConfig::checkov(),
        }
    }
}

impl Config {
    /// Deadline handed to the process runner, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        config.bandit.fill_program(ScannerConfig::bandit());
        config.checkov.fill_program(ScannerConfig::checkov());
        Ok(config)
    }

    /// Resolve the configuration the CLI should use.
    ///
    /// An explicit path must exist. Otherwise `SECUREPIPE_CONFIG` is consulted,
    /// then `.securepipe.toml` in the working directory, then defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Self::load(Path::new(&path));
            }
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            tracing::debug!(path = %local.display(), "loading local config file");
            return Self::load(local);
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.reports_dir, PathBuf::from("reports"));
        assert_eq!(config.timeout_secs, 600);
        assert!(!config.parallel);
        assert_eq!(config.bandit.program, "python");
        assert_eq!(config.bandit.args, vec!["-m", "bandit"]);
        assert_eq!(config.checkov.program, "checkov");
        assert!(config.checkov.enabled);
    }

    #[test]
    fn test_partial_scanner_table() {
        let config = Config::from_toml(
            r#"
            reports_dir = "out"
            timeout_secs = 0
            parallel = true

            [checkov]
            program = "/opt/checkov/bin/checkov"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.reports_dir, PathBuf::from("out"));
        assert!(config.timeout().is_none());
        assert!(config.parallel);
        assert_eq!(config.checkov.program, "/opt/checkov/bin/checkov");
        assert!(!config.checkov.enabled);
        assert!(config.checkov.args.is_empty());
        assert_eq!(config.bandit.program, "python");
    }

    #[test]
    fn test_scanner_table_without_program_keeps_stock_command() {
        let config = Config::from_toml(
            r#"
            [checkov]
            enabled = false

            [bandit]
            args = ["--skip", "B101"]
            "#,
        )
        .unwrap();

        assert!(!config.checkov.enabled);
        assert_eq!(config.checkov.program, "checkov");
        assert!(config.bandit.enabled);
        assert_eq!(config.bandit.program, "python");
        assert_eq!(config.bandit.args, vec!["-m", "bandit", "--skip", "B101"]);
    }

    #[test]
    fn test_load_reports_parse_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::discover(Some(Path::new("/this/does/not/exist.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
