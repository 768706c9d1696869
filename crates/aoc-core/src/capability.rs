//! External collaborators, declared at their interface boundary.
//!
//! The loop only ever talks to these traits. Real implementations live in
//! [`crate::fetch`], `aoc-evaluators` and `aoc-generator`; deterministic
//! fakes live in `aoc-sim`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CapabilityError, ExecutionError, FetchError, PersistenceError};
use crate::model::{CommitBatch, CommitId, GeneratedImplementation, GeneratedUnitTests};

/// Turns a puzzle URL into raw statement markup.
///
/// Retries and backoff are the fetcher's own business.
#[async_trait]
pub trait StatementFetcher: Send + Sync {
    async fn fetch_statement(&self, url: &str) -> Result<String, FetchError>;
}

/// Opaque text-in, text-out generator.
#[async_trait]
pub trait GenerativeCapability: Send + Sync {
    async fn invoke(&self, system: &str, prompt: &str) -> Result<String, CapabilityError>;
}

/// Runs candidate code without touching the caller's process state.
#[async_trait]
pub trait ExecutionSandbox: Send + Sync {
    /// Invoke the implementation's entrypoint on `input`, returning its output.
    async fn run(
        &self,
        implementation: &GeneratedImplementation,
        input: &str,
        timeout: Duration,
    ) -> Result<String, ExecutionError>;

    /// Run a test artifact against the implementation.
    ///
    /// `Ok` carries the runner output of a passing suite; a failing suite is
    /// `ExecutionError::Failed` with the runner output in `stderr`.
    async fn run_suite(
        &self,
        implementation: &GeneratedImplementation,
        tests: &GeneratedUnitTests,
        timeout: Duration,
    ) -> Result<String, ExecutionError>;
}

/// Persists a whole batch or nothing.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn commit(&self, batch: &CommitBatch) -> Result<CommitId, PersistenceError>;
}
