//! Implementation and test synthesis.
//!
//! Both synthesizers are traits so the retry loop can be driven by scripted
//! fakes. Feedback flows only through the explicit [`Feedback`] argument.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use aoc_core::{
    AoCProblem, CapabilityError, ExamplesContext, GeneratedImplementation, GeneratedUnitTests,
    GenerativeCapability, ValidationResult,
};

use crate::prompt::{extract_code_block, resolve_entrypoint, PromptBuilder};

/// The immediately preceding validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    /// The candidate that was validated
    pub previous: GeneratedImplementation,
    /// What happened when it was validated
    pub result: ValidationResult,
}

impl Feedback {
    pub fn new(previous: GeneratedImplementation, result: ValidationResult) -> Self {
        Self { previous, result }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("generator failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("no python code block in response")]
    NoCodeInResponse,

    #[error("no entrypoint function found in generated code")]
    MissingEntrypoint,

    #[error("generated tests rejected: {0}")]
    TestsRejected(String),
}

#[async_trait]
pub trait ImplementationSynthesizer: Send + Sync {
    /// Produce a candidate. `feedback` is `None` on the first attempt.
    async fn synthesize(
        &self,
        problem: &AoCProblem,
        context: &ExamplesContext,
        feedback: Option<&Feedback>,
    ) -> Result<GeneratedImplementation, SynthesisError>;
}

#[async_trait]
pub trait TestSynthesizer: Send + Sync {
    /// Produce a test artifact for an implementation that already passed.
    async fn synthesize_tests(
        &self,
        problem: &AoCProblem,
        context: &ExamplesContext,
        implementation: &GeneratedImplementation,
    ) -> Result<GeneratedUnitTests, SynthesisError>;
}

// ---------------------------------------------------------------------------
// Generative implementations
// ---------------------------------------------------------------------------

pub struct LlmImplementationSynthesizer {
    capability: Arc<dyn GenerativeCapability>,
}

impl LlmImplementationSynthesizer {
    pub fn new(capability: Arc<dyn GenerativeCapability>) -> Self {
        Self { capability }
    }
}

#[async_trait]
impl ImplementationSynthesizer for LlmImplementationSynthesizer {
    async fn synthesize(
        &self,
        problem: &AoCProblem,
        context: &ExamplesContext,
        feedback: Option<&Feedback>,
    ) -> Result<GeneratedImplementation, SynthesisError> {
        let prompt = match feedback {
            Some(feedback) => PromptBuilder::build_fix_prompt(problem, context, feedback),
            None => PromptBuilder::build_generation_prompt(problem, context),
        };

        let response = self
            .capability
            .invoke(PromptBuilder::system_prompt(), &prompt)
            .await?;

        let source = extract_code_block(&response).ok_or(SynthesisError::NoCodeInResponse)?;
        let entrypoint = resolve_entrypoint(&source).ok_or(SynthesisError::MissingEntrypoint)?;

        debug!(
            event = "synthesis.candidate",
            identity = %problem.identity,
            entrypoint = %entrypoint.function,
            lines = source.lines().count(),
            fix = feedback.is_some(),
        );

        Ok(GeneratedImplementation::new(source, entrypoint))
    }
}

/// Asks the generator for a pytest suite.
pub struct LlmTestSynthesizer {
    capability: Arc<dyn GenerativeCapability>,
}

impl LlmTestSynthesizer {
    pub fn new(capability: Arc<dyn GenerativeCapability>) -> Self {
        Self { capability }
    }
}

#[async_trait]
impl TestSynthesizer for LlmTestSynthesizer {
    async fn synthesize_tests(
        &self,
        problem: &AoCProblem,
        context: &ExamplesContext,
        implementation: &GeneratedImplementation,
    ) -> Result<GeneratedUnitTests, SynthesisError> {
        let prompt = PromptBuilder::build_test_prompt(problem, context, implementation);
        let response = self
            .capability
            .invoke(PromptBuilder::system_prompt(), &prompt)
            .await?;

        let source = extract_code_block(&response).ok_or(SynthesisError::NoCodeInResponse)?;
        if !source.contains(&implementation.entrypoint.function) {
            return Err(SynthesisError::TestsRejected(format!(
                "suite never references `{}`",
                implementation.entrypoint.function
            )));
        }
        Ok(GeneratedUnitTests { source })
    }
}

// ---------------------------------------------------------------------------
// Deterministic tests from examples
// ---------------------------------------------------------------------------

/// Renders one pytest case per example. Same inputs, same module.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleTestSynthesizer;

impl ExampleTestSynthesizer {
    pub fn render(
        problem: &AoCProblem,
        context: &ExamplesContext,
        implementation: &GeneratedImplementation,
    ) -> GeneratedUnitTests {
        let entry = &implementation.entrypoint.function;
        let mut out = String::new();

        out.push_str(&format!(
            "\"\"\"Tests for `{}` ({}: {}).\n\nEach case is an example from the puzzle statement.\n",
            entry,
            problem.identity,
            docstring_safe(&problem.title)
        ));
        if !context.notes.is_empty() {
            out.push_str("\nNotes:\n");
            for note in &context.notes {
                out.push_str(&format!("- {}\n", docstring_safe(&note.text)));
            }
        }
        out.push_str("\"\"\"\n\n");

        out.push_str(&format!("from solution import {}\n\n\n", entry));
        out.push_str(
            "def _normalize(text):\n    \
             lines = [line.rstrip() for line in str(text).splitlines()]\n    \
             while lines and not lines[-1]:\n        \
             lines.pop()\n    \
             return \"\\n\".join(lines)\n",
        );

        for (i, example) in context.examples.iter().enumerate() {
            let label = example
                .label
                .clone()
                .unwrap_or_else(|| format!("example {}", i + 1));
            out.push_str(&format!(
                "\n\ndef test_example_{n}():\n    \
                 \"\"\"{label}\"\"\"\n    \
                 data = {input}\n    \
                 expected = {expected}\n    \
                 result = {entry}(data)\n    \
                 assert _normalize(result) == _normalize(expected), \\\n        \
                 f\"expected {{expected!r}} but got {{result!r}}\"\n",
                n = i + 1,
                label = docstring_safe(&label),
                input = py_string(&example.input),
                expected = py_string(&example.expected),
                entry = entry,
            ));
        }

        GeneratedUnitTests { source: out }
    }
}

#[async_trait]
impl TestSynthesizer for ExampleTestSynthesizer {
    async fn synthesize_tests(
        &self,
        problem: &AoCProblem,
        context: &ExamplesContext,
        implementation: &GeneratedImplementation,
    ) -> Result<GeneratedUnitTests, SynthesisError> {
        Ok(Self::render(problem, context, implementation))
    }
}

/// A double-quoted Python string literal.
fn py_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn docstring_safe(s: &str) -> String {
    s.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}
