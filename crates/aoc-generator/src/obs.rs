//! Structured observability hooks for run lifecycle events.
//!
//! Events are emitted at `info!` level (filter with the `AOC_LOG` env var).
//! For JSON output, set `AOC_LOG_FORMAT=json`.

use aoc_core::ProblemIdentity;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::controller::ControllerState;

pub const LOG_ENV: &str = "AOC_LOG";
pub const LOG_FORMAT_ENV: &str = "AOC_LOG_FORMAT";

/// Initialise the global subscriber.
///
/// Filter comes from `AOC_LOG`, falling back to `level`. JSON lines when
/// `json` is set. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Whether `AOC_LOG_FORMAT=json` is set.
pub fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Span tagging every event of one run with its identity.
///
/// Attach with `tracing::Instrument::instrument`; runs suspend across
/// awaits, so the span must not be held as an entered guard.
pub fn run_span(identity: &ProblemIdentity) -> tracing::Span {
    tracing::info_span!("aoc.run", identity = %identity)
}

pub fn emit_run_started(identity: &ProblemIdentity) {
    info!(event = "run.started", identity = %identity);
}

pub fn emit_examples_ready(identity: &ProblemIdentity, examples: usize, notes: usize) {
    info!(event = "run.examples_ready", identity = %identity, examples = examples, notes = notes);
}

pub fn emit_attempt_started(identity: &ProblemIdentity, attempt: u32, max_attempts: u32) {
    info!(
        event = "attempt.started",
        identity = %identity,
        attempt = attempt,
        max_attempts = max_attempts,
    );
}

pub fn emit_attempt_validated(identity: &ProblemIdentity, attempt: u32, passed: bool, failures: usize) {
    info!(
        event = "attempt.validated",
        identity = %identity,
        attempt = attempt,
        passed = passed,
        failures = failures,
    );
}

pub fn emit_synthesis_failed(identity: &ProblemIdentity, attempt: u32, error: &dyn std::fmt::Display) {
    warn!(event = "attempt.synthesis_failed", identity = %identity, attempt = attempt, error = %error);
}

pub fn emit_transition(identity: &ProblemIdentity, from: ControllerState, to: ControllerState) {
    debug!(event = "controller.transition", identity = %identity, from = ?from, to = ?to);
}

pub fn emit_tests_rejected(identity: &ProblemIdentity, output: &str) {
    warn!(event = "tests.rejected", identity = %identity, output = %output);
}

pub fn emit_committed(identity: &ProblemIdentity, commit_id: &str, files: usize) {
    info!(event = "run.committed", identity = %identity, commit_id = %commit_id, files = files);
}

pub fn emit_run_finished(identity: &ProblemIdentity, duration_ms: u64, attempts: usize, success: bool) {
    info!(
        event = "run.finished",
        identity = %identity,
        duration_ms = duration_ms,
        attempts = attempts,
        success = success,
    );
}

pub fn emit_run_aborted(identity: &ProblemIdentity, reason: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", identity = %identity, reason = %reason);
}
