//! The synthesize → validate → retry state machine.
//!
//! ```text
//!   Init ──(non-empty context)──▶ Synthesizing ──(candidate)──▶ Validating
//!     │                            │      ▲                      │   │   │
//!     │ (empty context)            │      └──── Retrying ◀───────┘   │   │
//!     ▼                            ▼              (failed, budget    │   │
//!   Aborted ◀───────(synthesis error / exhausted)   left)            │   │
//!     ▲                                                              │   │
//!     └─────────────────────(failed, budget spent)───────────────────┘   │
//!                                                                        ▼
//!                                                                   Succeeded
//! ```
//!
//! `Succeeded` and `Aborted` are terminal. Every attempt is recorded, and the
//! only thing carried from one attempt to the next is the explicit
//! [`Feedback`] built from the attempt just validated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use aoc_core::{AoCProblem, CapabilityError, ExamplesContext, GeneratedImplementation, ValidationResult};
use aoc_evaluators::Validator;

use crate::obs;
use crate::synthesizer::{Feedback, ImplementationSynthesizer, SynthesisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControllerState {
    Init,
    Synthesizing,
    Validating,
    Retrying,
    Succeeded,
    Aborted,
}

impl ControllerState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ControllerState::Succeeded | ControllerState::Aborted)
    }

    /// Whether the edge `self -> next` exists.
    #[must_use]
    pub fn can_transition_to(self, next: ControllerState) -> bool {
        use ControllerState::*;
        matches!(
            (self, next),
            (Init, Synthesizing)
                | (Init, Aborted)
                | (Synthesizing, Validating)
                | (Synthesizing, Retrying)
                | (Synthesizing, Aborted)
                | (Validating, Succeeded)
                | (Validating, Retrying)
                | (Validating, Aborted)
                | (Retrying, Synthesizing)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: ControllerState,
    pub to: ControllerState,
}

/// Current state plus every transition taken.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: ControllerState,
    transitions: Vec<(ControllerState, ControllerState)>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: ControllerState::Init,
            transitions: Vec::new(),
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn transitions(&self) -> &[(ControllerState, ControllerState)] {
        &self.transitions
    }

    /// Move to `next`. Nothing leaves a terminal state.
    pub fn try_transition(&mut self, next: ControllerState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.transitions.push((self.state, next));
        self.state = next;
        Ok(())
    }
}

/// What to do when the generator itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SynthesisErrorPolicy {
    /// Spend one attempt and retry with the same feedback.
    #[default]
    CountAttempt,
    /// End the run immediately.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Attempt budget; an attempt is one synthesis plus its validation
    pub max_attempts: u32,
    /// Bound on a single synthesis call
    pub synthesis_timeout: Duration,
    pub synthesis_error_policy: SynthesisErrorPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            synthesis_timeout: Duration::from_secs(300),
            synthesis_error_policy: SynthesisErrorPolicy::CountAttempt,
        }
    }
}

impl ControllerConfig {
    /// Quick config for fast iteration.
    pub fn quick() -> Self {
        Self {
            max_attempts: 3,
            synthesis_timeout: Duration::from_secs(120),
            ..Default::default()
        }
    }

    /// Thorough config for production.
    pub fn thorough() -> Self {
        Self {
            max_attempts: 10,
            synthesis_timeout: Duration::from_secs(600),
            ..Default::default()
        }
    }
}

/// Cooperative cancellation, checked between stages.
///
/// An external call already in flight runs to completion or its timeout.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Validated(ValidationResult),
    SynthesisFailed(SynthesisError),
    /// Synthesized, then cancelled before validation ran
    NotValidated,
}

/// Record of a single attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// Attempt number (1-indexed)
    pub attempt: u32,
    /// The candidate, when synthesis produced one
    pub implementation: Option<GeneratedImplementation>,
    pub outcome: AttemptOutcome,
    pub duration: Duration,
}

impl AttemptRecord {
    pub fn validation(&self) -> Option<&ValidationResult> {
        match &self.outcome {
            AttemptOutcome::Validated(result) => Some(result),
            AttemptOutcome::SynthesisFailed(_) | AttemptOutcome::NotValidated => None,
        }
    }
}

/// Why the controller gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerAbort {
    #[error("no examples to validate against")]
    EmptyContext,

    #[error("synthesis failed: {0}")]
    SynthesisFailed(SynthesisError),

    #[error("all {0} attempts failed")]
    AttemptsExhausted(u32),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum ControllerOutcome {
    Succeeded {
        implementation: GeneratedImplementation,
        result: ValidationResult,
    },
    Aborted(ControllerAbort),
}

/// Everything one controller run produced.
#[derive(Debug, Clone)]
pub struct ControllerRun {
    pub outcome: ControllerOutcome,
    pub history: Vec<AttemptRecord>,
    pub machine: StateMachine,
    pub duration: Duration,
}

impl ControllerRun {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ControllerOutcome::Succeeded { .. })
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.history.len()
    }

    /// Format as a summary string.
    pub fn format_summary(&self) -> String {
        let status = if self.succeeded() { "SUCCESS" } else { "FAILED" };
        let mut summary = format!(
            "[{}] Synthesis completed in {:.2}s\n  Attempts: {}\n",
            status,
            self.duration.as_secs_f64(),
            self.attempts(),
        );

        match &self.outcome {
            ControllerOutcome::Succeeded { implementation, result } => {
                summary.push_str(&result.format_report());
                summary.push_str(&format!(
                    "\nEntrypoint `{}`, {} lines of code.\n",
                    implementation.entrypoint.function,
                    implementation.source.lines().count()
                ));
            }
            ControllerOutcome::Aborted(reason) => {
                summary.push_str(&format!("\nAborted: {}\n", reason));
                for record in &self.history {
                    match &record.outcome {
                        AttemptOutcome::Validated(result) => {
                            let failed = result.failures().count();
                            summary.push_str(&format!(
                                "  attempt #{}: {} of {} examples failed\n",
                                record.attempt,
                                failed,
                                result.outcomes().len()
                            ));
                        }
                        AttemptOutcome::SynthesisFailed(e) => {
                            summary.push_str(&format!("  attempt #{}: {}\n", record.attempt, e));
                        }
                        AttemptOutcome::NotValidated => {
                            summary.push_str(&format!(
                                "  attempt #{}: cancelled before validation\n",
                                record.attempt
                            ));
                        }
                    }
                }
            }
        }
        summary
    }
}

/// Drives one synthesizer against one validator under a bounded budget.
pub struct RetryController {
    synthesizer: Arc<dyn ImplementationSynthesizer>,
    validator: Arc<Validator>,
    config: ControllerConfig,
}

impl RetryController {
    pub fn new(
        synthesizer: Arc<dyn ImplementationSynthesizer>,
        validator: Arc<Validator>,
        config: ControllerConfig,
    ) -> Self {
        debug_assert!(config.max_attempts >= 1, "Attempt budget must be at least 1");
        Self {
            synthesizer,
            validator,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run to a terminal state.
    pub async fn run(
        &self,
        problem: &AoCProblem,
        context: &ExamplesContext,
        cancel: &CancellationFlag,
    ) -> ControllerRun {
        let start = Instant::now();
        let identity = problem.identity;
        let max_attempts = self.config.max_attempts.max(1);

        let mut machine = StateMachine::new();
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut feedback: Option<Feedback> = None;

        let finish = |outcome, history, machine| ControllerRun {
            outcome,
            history,
            machine,
            duration: start.elapsed(),
        };

        if context.is_empty() {
            advance(&mut machine, &identity, ControllerState::Aborted);
            return finish(
                ControllerOutcome::Aborted(ControllerAbort::EmptyContext),
                history,
                machine,
            );
        }
        advance(&mut machine, &identity, ControllerState::Synthesizing);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                advance(&mut machine, &identity, ControllerState::Aborted);
                return finish(ControllerOutcome::Aborted(ControllerAbort::Cancelled), history, machine);
            }

            obs::emit_attempt_started(&identity, attempt, max_attempts);
            let attempt_start = Instant::now();

            let synthesized = match tokio::time::timeout(
                self.config.synthesis_timeout,
                self.synthesizer.synthesize(problem, context, feedback.as_ref()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SynthesisError::Capability(CapabilityError::Timeout(
                    self.config.synthesis_timeout,
                ))),
            };

            let implementation = match synthesized {
                Ok(implementation) => implementation,
                Err(error) => {
                    obs::emit_synthesis_failed(&identity, attempt, &error);
                    history.push(AttemptRecord {
                        attempt,
                        implementation: None,
                        outcome: AttemptOutcome::SynthesisFailed(error.clone()),
                        duration: attempt_start.elapsed(),
                    });

                    if self.config.synthesis_error_policy == SynthesisErrorPolicy::Abort {
                        advance(&mut machine, &identity, ControllerState::Aborted);
                        return finish(
                            ControllerOutcome::Aborted(ControllerAbort::SynthesisFailed(error)),
                            history,
                            machine,
                        );
                    }
                    if attempt < max_attempts {
                        advance(&mut machine, &identity, ControllerState::Retrying);
                        advance(&mut machine, &identity, ControllerState::Synthesizing);
                    }
                    continue;
                }
            };

            if cancel.is_cancelled() {
                history.push(AttemptRecord {
                    attempt,
                    implementation: Some(implementation),
                    outcome: AttemptOutcome::NotValidated,
                    duration: attempt_start.elapsed(),
                });
                advance(&mut machine, &identity, ControllerState::Aborted);
                return finish(ControllerOutcome::Aborted(ControllerAbort::Cancelled), history, machine);
            }

            advance(&mut machine, &identity, ControllerState::Validating);
            let result = self.validator.validate(&implementation, context).await;
            obs::emit_attempt_validated(&identity, attempt, result.passed(), result.failures().count());

            history.push(AttemptRecord {
                attempt,
                implementation: Some(implementation.clone()),
                outcome: AttemptOutcome::Validated(result.clone()),
                duration: attempt_start.elapsed(),
            });

            if result.passed() {
                advance(&mut machine, &identity, ControllerState::Succeeded);
                return finish(
                    ControllerOutcome::Succeeded {
                        implementation,
                        result,
                    },
                    history,
                    machine,
                );
            }

            if attempt < max_attempts {
                advance(&mut machine, &identity, ControllerState::Retrying);
                feedback = Some(Feedback::new(implementation, result));
                advance(&mut machine, &identity, ControllerState::Synthesizing);
            }
        }

        advance(&mut machine, &identity, ControllerState::Aborted);
        finish(
            ControllerOutcome::Aborted(ControllerAbort::AttemptsExhausted(max_attempts)),
            history,
            machine,
        )
    }
}

/// Take an edge the loop knows to be legal.
fn advance(machine: &mut StateMachine, identity: &aoc_core::ProblemIdentity, next: ControllerState) {
    let from = machine.state();
    let moved = machine.try_transition(next);
    debug_assert!(moved.is_ok(), "{:?}", moved);
    if moved.is_ok() {
        obs::emit_transition(identity, from, next);
    }
}
