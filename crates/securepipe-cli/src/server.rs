use anyhow::{Context, Result};
use axum::extract::{Path as UrlPath, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use securepipe_core::{CancelToken, ExecutionResult, Invocation, ProcessRunner};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared by every request.
struct TriggerState {
    exe: PathBuf,
    config: Option<PathBuf>,
    verbose: bool,
    runner: ProcessRunner,
}

/// Body returned by `GET /scan/<path>`.
#[derive(Debug, Serialize)]
struct ScanResponse {
    stdout: String,
    stderr: String,
    returncode: i32,
}

impl From<ExecutionResult> for ScanResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            stdout: result.stdout,
            stderr: result.stderr,
            returncode: result.exit_code,
        }
    }
}

pub async fn serve(host: &str, port: u16, config: Option<PathBuf>, verbose: bool) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the securepipe executable")?;
    let state = Arc::new(TriggerState {
        exe,
        config,
        verbose,
        runner: ProcessRunner::default(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/scan/*repo_path", get(run_scan))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address '{host}:{port}'"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

/// Run the scan CLI as a child process and hand back its captured streams.
async fn run_scan(
    State(state): State<Arc<TriggerState>>,
    UrlPath(repo_path): UrlPath<String>,
) -> Json<ScanResponse> {
    let invocation = scan_invocation(&state.exe, Path::new(&repo_path), state.config.as_deref(), state.verbose);
    tracing::info!(repo = %repo_path, "scan requested");

    let result = state.runner.execute(&invocation, &CancelToken::new()).await;
    Json(result.into())
}

/// `securepipe scan --repo <path> --no-color`, with the path as a single argument.
fn scan_invocation(exe: &Path, repo: &Path, config: Option<&Path>, verbose: bool) -> Invocation {
    let mut invocation = Invocation::new(exe)
        .arg("scan")
        .arg("--repo")
        .arg(repo)
        .arg("--no-color");
    if let Some(config) = config {
        invocation = invocation.arg("--config").arg(config);
    }
    if verbose {
        invocation = invocation.arg("--verbose");
    }
    invocation
}
