//! Python execution sandbox.
//!
//! Every invocation gets a fresh temporary directory holding `solution.py`
//! (and `tests.py` for suite runs). The interpreter runs as a child process
//! with its own working directory, so nothing the candidate does leaks into
//! the caller. Children are killed when the timeout drops their future.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use aoc_core::{ExecutionError, ExecutionSandbox, GeneratedImplementation, GeneratedUnitTests};

pub const DEFAULT_INTERPRETER: &str = "python3";

/// Imports the entrypoint from `solution` and feeds it stdin.
///
/// argv: `<dir> <entrypoint>`. Prints `str(result)` with no trailing newline.
const HARNESS: &str = r#"
import importlib
import sys

sys.path.insert(0, sys.argv[1])
module = importlib.import_module("solution")
entry = getattr(module, sys.argv[2])
result = entry(sys.stdin.read())
sys.stdout.write(str(result))
sys.stdout.flush()
"#;

/// Runs candidates with a local Python interpreter.
#[derive(Debug, Clone)]
pub struct PythonSandbox {
    interpreter: PathBuf,
}

impl Default for PythonSandbox {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}

impl PythonSandbox {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    async fn stage(
        &self,
        files: &[(&str, &str)],
    ) -> Result<tempfile::TempDir, ExecutionError> {
        let dir = tempfile::Builder::new()
            .prefix("aoc-sandbox-")
            .tempdir()
            .map_err(|e| ExecutionError::Setup(format!("Failed to create temp directory: {}", e)))?;

        for (name, content) in files {
            tokio::fs::write(dir.path().join(name), content)
                .await
                .map_err(|e| ExecutionError::Setup(format!("Failed to write {}: {}", name, e)))?;
        }
        Ok(dir)
    }
}

#[async_trait]
impl ExecutionSandbox for PythonSandbox {
    async fn run(
        &self,
        implementation: &GeneratedImplementation,
        input: &str,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        let dir = self
            .stage(&[("solution.py", implementation.source.as_str())])
            .await?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c")
            .arg(HARNESS)
            .arg(dir.path())
            .arg(&implementation.entrypoint.function)
            .current_dir(dir.path())
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let output = execute(cmd, Some(input), timeout).await?;
        debug!(
            event = "sandbox.run",
            entrypoint = %implementation.entrypoint.function,
            elapsed_ms = start.elapsed().as_millis() as u64,
        );
        Ok(output)
    }

    async fn run_suite(
        &self,
        implementation: &GeneratedImplementation,
        tests: &GeneratedUnitTests,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        let dir = self
            .stage(&[
                ("solution.py", implementation.source.as_str()),
                ("tests.py", tests.source.as_str()),
            ])
            .await?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.args(["-m", "pytest", "-q", "-p", "no:cacheprovider", "tests.py"])
            .current_dir(dir.path())
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // pytest reports failures on stdout, which execute() folds into the error.
        execute(cmd, None, timeout).await
    }
}

/// Spawn, feed stdin, wait under `timeout`.
///
/// On failure the error text is stdout followed by stderr.
async fn execute(
    mut cmd: Command,
    input: Option<&str>,
    timeout: Duration,
) -> Result<String, ExecutionError> {
    let mut child = cmd
        .spawn()
        .map_err(|e| ExecutionError::Setup(format!("Failed to spawn interpreter: {}", e)))?;

    let run = async move {
        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            // A candidate that never reads stdin closes the pipe early.
            let _ = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
        }
        child.wait_with_output().await
    };

    let output = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(ExecutionError::Setup(format!("Failed to wait for interpreter: {}", e))),
        Err(_) => return Err(ExecutionError::Timeout(timeout)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        return Ok(stdout);
    }

    let combined = if stdout.trim().is_empty() {
        stderr
    } else {
        format!("{}\n{}", stdout, stderr)
    };
    match output.status.code() {
        Some(status) => Err(ExecutionError::Failed {
            status,
            stderr: tail(&combined),
        }),
        None => Err(ExecutionError::Killed { stderr: combined }),
    }
}

/// Last lines of a traceback; the final one names the exception.
fn tail(output: &str) -> String {
    const KEEP: usize = 20;
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(KEEP);
    lines[start..].join("\n")
}
