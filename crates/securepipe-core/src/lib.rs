pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod scanners;
pub mod summary;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{ConfigError, PipelineError};
pub use pipeline::{run_pipeline, Pipeline};
pub use report::{ParseOutcome, ScanReport};
pub use runner::{ExecutionResult, ExecutionStatus, Invocation, ProcessRunner};
pub use scanners::{ScannerAdapter, ScannerKind, ScannerSpec};
pub use summary::{RowStatus, ScanSummary, ScanWarning, SummaryRow};
