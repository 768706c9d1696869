//! # aoc-evaluators
//!
//! Decides whether a candidate reproduces the puzzle's examples.
//!
//! ```text
//!   GeneratedImplementation + ExamplesContext
//!                  │
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │ Validator                     │  one isolated run per example,
//!   │   normalize(actual)           │  in order, never stopping early
//!   │     == normalize(expected)    │
//!   └──────────────┬───────────────┘
//!                  │ ExecutionSandbox::run
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │ PythonSandbox                 │  temp dir, python3 harness,
//!   │                               │  bounded by a timeout
//!   └──────────────────────────────┘
//! ```
//!
//! The validator only talks to [`aoc_core::ExecutionSandbox`], so tests drive
//! it with the scripted sandbox from `aoc-sim`.

pub mod sandbox;
pub mod validator;

pub use sandbox::{PythonSandbox, DEFAULT_INTERPRETER};
pub use validator::{normalize_output, Validator, ValidatorConfig};
