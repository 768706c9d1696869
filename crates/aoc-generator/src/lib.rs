//! # aoc-generator
//!
//! Generate-validate-retry synthesis of puzzle solutions.
//!
//! ## Approach
//!
//! - **Examples are the oracle**: a candidate is accepted only when every
//!   example from the statement reproduces exactly
//! - **Feedback is explicit**: each retry sees the previous candidate and the
//!   per-example diff, nothing else
//! - **Bounded**: a fixed attempt budget, timeouts on every external call
//! - **All or nothing**: implementation and tests are committed together, or
//!   not at all
//!
//! # Usage
//!
//! ```bash
//! # Solve 2024 day 6, part 1
//! ANTHROPIC_API_KEY=sk-... cargo run -p aoc-generator -- 2024 6 --part 1
//!
//! # Several days at once, without committing
//! cargo run -p aoc-generator -- 2024 --days 1..=5 --dry-run
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Identity   │ ──> │   Catalog   │ ──> │  Examples   │
//! │ (Y, D, P)   │     │   (fetch)   │     │  Context    │
//! └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                │
//!                     ┌──────────────────────────┘
//!                     ▼
//!              ┌─────────────┐   (fails)   ┌─────────────┐
//!              │ Synthesizer │ <────────── │    Fix      │
//!              │  (Claude)   │             │   Prompt    │
//!              └──────┬──────┘             └──────▲──────┘
//!                     ▼                           │
//!              ┌─────────────┐                    │
//!              │  Validator  │ ───────────────────┘
//!              └──────┬──────┘
//!                     │ (passes)
//!                     ▼
//! ┌─────────────┐     ┌─────────────┐
//! │    Test     │ ──> │   Commit    │
//! │ Synthesizer │     │   Stager    │
//! └─────────────┘     └─────────────┘
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod obs;
pub mod pipeline;
pub mod prompt;
pub mod stager;
pub mod synthesizer;

pub use client::{ClaudeClient, ClaudeConfig, ClientError, Message, Role};
pub use config::{PipelineConfig, TestFailurePolicy};
pub use controller::{
    AttemptOutcome, AttemptRecord, CancellationFlag, ControllerAbort, ControllerConfig,
    ControllerOutcome, ControllerRun, ControllerState, RetryController, StateMachine,
    SynthesisErrorPolicy,
};
pub use pipeline::{AbortReason, Pipeline, ReportSummary, RunOutcome, RunReport};
pub use prompt::{extract_code_block, resolve_entrypoint, PromptBuilder};
pub use stager::{CommitStager, DryRunPersistence, GitPersistence};
pub use synthesizer::{
    ExampleTestSynthesizer, Feedback, ImplementationSynthesizer, LlmImplementationSynthesizer,
    LlmTestSynthesizer, SynthesisError, TestSynthesizer,
};
