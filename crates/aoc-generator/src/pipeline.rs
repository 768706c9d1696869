//! One problem identity in, one commit (or a reasoned abort) out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{warn, Instrument};

use aoc_core::{
    AoCProblem, CatalogError, CommitId, ExampleContextualizer, ExampleExtractor, ExamplesContext,
    ExecutionSandbox, FileToCommit, GeneratedImplementation, GeneratedUnitTests, Persistence,
    PersistenceError, ProblemCatalog, ProblemIdentity,
};
use aoc_evaluators::Validator;

use crate::config::{PipelineConfig, TestFailurePolicy};
use crate::controller::{
    AttemptOutcome, AttemptRecord, CancellationFlag, ControllerAbort, ControllerOutcome,
    RetryController,
};
use crate::obs;
use crate::stager::CommitStager;
use crate::synthesizer::{
    ExampleTestSynthesizer, ImplementationSynthesizer, SynthesisError, TestSynthesizer,
};

/// Why a run ended without a commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    #[error("problem not found: {0}")]
    NotFound(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("synthesis failed: {0}")]
    SynthesisFailed(SynthesisError),

    #[error("no passing candidate after {0} attempts")]
    AttemptsExhausted(u32),

    #[error("tests rejected: {0}")]
    TestsRejected(String),

    #[error("persistence failed: {0}")]
    Persistence(PersistenceError),

    #[error("cancelled")]
    Cancelled,
}

impl From<CatalogError> for AbortReason {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound { .. } => AbortReason::NotFound(e.to_string()),
            CatalogError::Transport(reason) => AbortReason::Transport(reason),
        }
    }
}

impl From<ControllerAbort> for AbortReason {
    fn from(abort: ControllerAbort) -> Self {
        match abort {
            ControllerAbort::EmptyContext => AbortReason::PreconditionFailed(abort.to_string()),
            ControllerAbort::SynthesisFailed(e) => AbortReason::SynthesisFailed(e),
            ControllerAbort::AttemptsExhausted(n) => AbortReason::AttemptsExhausted(n),
            ControllerAbort::Cancelled => AbortReason::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded {
        commit_id: CommitId,
        files: Vec<FileToCommit>,
    },
    Aborted {
        reason: AbortReason,
    },
}

/// Result of one run, with the full attempt history.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub identity: ProblemIdentity,
    pub outcome: RunOutcome,
    pub history: Vec<AttemptRecord>,
    pub duration: Duration,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded { .. })
    }

    pub fn format_summary(&self) -> String {
        let mut summary = format!(
            "{}: {} after {} attempt(s) in {:.2}s\n",
            self.identity,
            if self.succeeded() { "SUCCEEDED" } else { "ABORTED" },
            self.history.len(),
            self.duration.as_secs_f64()
        );
        match &self.outcome {
            RunOutcome::Succeeded { commit_id, files } => {
                summary.push_str(&format!("  commit {}\n", commit_id.0));
                for file in files {
                    summary.push_str(&format!("  + {}\n", file.path));
                }
            }
            RunOutcome::Aborted { reason } => {
                summary.push_str(&format!("  reason: {}\n", reason));
            }
        }
        for record in &self.history {
            let line = match &record.outcome {
                AttemptOutcome::Validated(result) => format!(
                    "{}/{} examples passed",
                    result.outcomes().iter().filter(|o| o.passed).count(),
                    result.outcomes().len()
                ),
                AttemptOutcome::SynthesisFailed(e) => e.to_string(),
                AttemptOutcome::NotValidated => "cancelled before validation".to_string(),
            };
            summary.push_str(&format!("  attempt #{}: {}\n", record.attempt, line));
        }
        summary
    }

    /// Serializable view for `--report-json`.
    pub fn summary(&self) -> ReportSummary {
        let (commit_id, files, reason) = match &self.outcome {
            RunOutcome::Succeeded { commit_id, files } => (
                Some(commit_id.0.clone()),
                files.iter().map(|f| f.path.clone()).collect(),
                None,
            ),
            RunOutcome::Aborted { reason } => (None, Vec::new(), Some(reason.to_string())),
        };
        ReportSummary {
            identity: self.identity.to_string(),
            succeeded: self.succeeded(),
            commit_id,
            files,
            reason,
            duration_ms: self.duration.as_millis() as u64,
            attempts: self
                .history
                .iter()
                .map(|record| match &record.outcome {
                    AttemptOutcome::Validated(result) => AttemptSummary {
                        attempt: record.attempt,
                        passed: result.passed(),
                        failures: result.failures().count(),
                        error: None,
                        duration_ms: record.duration.as_millis() as u64,
                    },
                    AttemptOutcome::SynthesisFailed(e) => AttemptSummary {
                        attempt: record.attempt,
                        passed: false,
                        failures: 0,
                        error: Some(e.to_string()),
                        duration_ms: record.duration.as_millis() as u64,
                    },
                    AttemptOutcome::NotValidated => AttemptSummary {
                        attempt: record.attempt,
                        passed: false,
                        failures: 0,
                        error: Some("cancelled before validation".into()),
                        duration_ms: record.duration.as_millis() as u64,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub identity: String,
    pub succeeded: bool,
    pub commit_id: Option<String>,
    pub files: Vec<String>,
    pub reason: Option<String>,
    pub duration_ms: u64,
    pub attempts: Vec<AttemptSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    pub attempt: u32,
    pub passed: bool,
    pub failures: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Fetch → extract → contextualize → retry loop → tests → commit.
pub struct Pipeline {
    catalog: ProblemCatalog,
    extractor: ExampleExtractor,
    contextualizer: ExampleContextualizer,
    tests: Arc<dyn TestSynthesizer>,
    validator: Arc<Validator>,
    controller: RetryController,
    stager: CommitStager,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        catalog: ProblemCatalog,
        implementation: Arc<dyn ImplementationSynthesizer>,
        tests: Arc<dyn TestSynthesizer>,
        sandbox: Arc<dyn ExecutionSandbox>,
        persistence: Arc<dyn Persistence>,
        config: PipelineConfig,
    ) -> Self {
        let validator = Arc::new(Validator::new(sandbox, config.validator.clone()));
        let controller =
            RetryController::new(implementation, validator.clone(), config.controller.clone());
        let stager = CommitStager::new(persistence).with_overwrite(config.overwrite);
        Self {
            catalog,
            extractor: ExampleExtractor::new(),
            contextualizer: ExampleContextualizer::new(),
            tests,
            validator,
            controller,
            stager,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Drive one identity to `Succeeded` or `Aborted`.
    pub async fn run(&self, identity: ProblemIdentity, cancel: &CancellationFlag) -> RunReport {
        self.run_inner(identity, cancel)
            .instrument(obs::run_span(&identity))
            .await
    }

    /// Run many identities concurrently, `config.concurrency` at a time.
    ///
    /// Reports come back ordered by identity.
    pub async fn run_many(
        &self,
        identities: Vec<ProblemIdentity>,
        cancel: &CancellationFlag,
    ) -> Vec<RunReport> {
        let mut reports: Vec<RunReport> = stream::iter(identities)
            .map(|identity| self.run(identity, cancel))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        reports.sort_by_key(|r| r.identity);
        reports
    }

    async fn run_inner(&self, identity: ProblemIdentity, cancel: &CancellationFlag) -> RunReport {
        let start = Instant::now();
        obs::emit_run_started(&identity);

        let mut history = Vec::new();
        let outcome = match self.execute(identity, cancel, &mut history).await {
            Ok((commit_id, files)) => {
                obs::emit_committed(&identity, &commit_id.0, files.len());
                RunOutcome::Succeeded { commit_id, files }
            }
            Err(reason) => {
                obs::emit_run_aborted(&identity, &reason);
                RunOutcome::Aborted { reason }
            }
        };

        let report = RunReport {
            identity,
            outcome,
            history,
            duration: start.elapsed(),
        };
        obs::emit_run_finished(
            &identity,
            report.duration.as_millis() as u64,
            report.history.len(),
            report.succeeded(),
        );
        report
    }

    async fn execute(
        &self,
        identity: ProblemIdentity,
        cancel: &CancellationFlag,
        history: &mut Vec<AttemptRecord>,
    ) -> Result<(CommitId, Vec<FileToCommit>), AbortReason> {
        check(cancel)?;
        let problem = self.catalog.fetch(identity).await?;

        check(cancel)?;
        let context = self.context_for(&problem);

        let run = self.controller.run(&problem, &context, cancel).await;
        *history = run.history;
        let implementation = match run.outcome {
            ControllerOutcome::Succeeded { implementation, .. } => implementation,
            ControllerOutcome::Aborted(abort) => return Err(abort.into()),
        };

        check(cancel)?;
        let tests = self.accepted_tests(&problem, &context, &implementation).await?;

        check(cancel)?;
        let batch = self.stager.stage(&problem, &implementation, &tests);
        let commit_id = self
            .stager
            .commit(&batch)
            .await
            .map_err(AbortReason::Persistence)?;
        Ok((commit_id, batch.files))
    }

    /// An extraction failure yields an empty context, which the controller
    /// rejects before any attempt.
    fn context_for(&self, problem: &AoCProblem) -> ExamplesContext {
        let examples = match self.extractor.extract(problem) {
            Ok(examples) => examples,
            Err(e) => {
                warn!(event = "run.no_examples", identity = %problem.identity, error = %e);
                Vec::new()
            }
        };
        let context = self.contextualizer.contextualize(problem, examples);
        obs::emit_examples_ready(&problem.identity, context.len(), context.notes.len());
        context
    }

    /// A suite that passes against the accepted implementation.
    async fn accepted_tests(
        &self,
        problem: &AoCProblem,
        context: &ExamplesContext,
        implementation: &GeneratedImplementation,
    ) -> Result<GeneratedUnitTests, AbortReason> {
        let rejection = match self
            .tests
            .synthesize_tests(problem, context, implementation)
            .await
        {
            Ok(tests) => {
                let verdict = self.validator.validate_tests(implementation, &tests).await;
                if verdict.passed {
                    return Ok(tests);
                }
                verdict.output
            }
            Err(e) => e.to_string(),
        };
        obs::emit_tests_rejected(&problem.identity, &rejection);

        match self.config.test_failure_policy {
            TestFailurePolicy::Abort => Err(AbortReason::TestsRejected(rejection)),
            TestFailurePolicy::FallbackToExampleTests => {
                let tests = ExampleTestSynthesizer::render(problem, context, implementation);
                let verdict = self.validator.validate_tests(implementation, &tests).await;
                if verdict.passed {
                    Ok(tests)
                } else {
                    Err(AbortReason::TestsRejected(verdict.output))
                }
            }
        }
    }
}

fn check(cancel: &CancellationFlag) -> Result<(), AbortReason> {
    if cancel.is_cancelled() {
        Err(AbortReason::Cancelled)
    } else {
        Ok(())
    }
}
