use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a pipeline run.
///
/// Anything a single scanner does wrong is contained inside the run and shows
/// up as a warning on the summary; only conditions that prevent capturing any
/// scanner output at all end up here.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The reports directory could not be created or cleaned.
    #[error("Failed to prepare reports directory '{path}': {source}")]
    ReportsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A per-scanner worker task panicked or was aborted.
    #[error("Scanner task for {scanner} did not complete: {message}")]
    Worker { scanner: String, message: String },
}

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
