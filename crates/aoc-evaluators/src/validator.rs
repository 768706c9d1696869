//! Example validation.
//!
//! Runs the candidate once per example, in order, through the execution
//! sandbox. A failing example never stops the ones after it, so a single
//! result always reports every example.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use aoc_core::{
    Actual, ExampleOutcome, ExamplesContext, ExecutionError, ExecutionSandbox,
    GeneratedImplementation, GeneratedUnitTests, SuiteVerdict, ValidationResult,
};

/// Timeouts for sandbox invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Bound on a single example run
    pub example_timeout: Duration,
    /// Bound on a whole test-suite run
    pub suite_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            example_timeout: Duration::from_secs(10),
            suite_timeout: Duration::from_secs(60),
        }
    }
}

impl ValidatorConfig {
    /// Fast config for quick iteration.
    pub fn quick() -> Self {
        Self {
            example_timeout: Duration::from_secs(5),
            suite_timeout: Duration::from_secs(30),
        }
    }

    /// Generous bounds for slow puzzles.
    pub fn thorough() -> Self {
        Self {
            example_timeout: Duration::from_secs(30),
            suite_timeout: Duration::from_secs(180),
        }
    }
}

/// Trailing whitespace off every line, trailing blank lines dropped.
///
/// Blank lines at the end count as trailing whitespace of the output as a
/// whole, so `print(answer)` matches an expected answer written without a
/// final newline. Everything else is compared exactly, leading whitespace
/// and interior blank lines included.
#[must_use]
pub fn normalize_output(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

pub struct Validator {
    sandbox: Arc<dyn ExecutionSandbox>,
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(sandbox: Arc<dyn ExecutionSandbox>, config: ValidatorConfig) -> Self {
        Self { sandbox, config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Check the candidate against every example.
    ///
    /// Never fails: execution errors become failed outcomes. An empty
    /// context yields a result that did not pass.
    pub async fn validate(
        &self,
        implementation: &GeneratedImplementation,
        context: &ExamplesContext,
    ) -> ValidationResult {
        let mut outcomes = Vec::with_capacity(context.len());

        for (index, example) in context.examples.iter().enumerate() {
            let actual = match self
                .sandbox
                .run(implementation, &example.input, self.config.example_timeout)
                .await
            {
                Ok(output) => Actual::Output(output),
                Err(e) => Actual::Error(describe(&e)),
            };

            let passed = match &actual {
                Actual::Output(output) => {
                    normalize_output(output) == normalize_output(&example.expected)
                }
                Actual::Error(_) => false,
            };

            debug!(
                event = "validator.example",
                index,
                passed,
                label = example.label.as_deref().unwrap_or(""),
            );

            outcomes.push(ExampleOutcome {
                example_index: index,
                label: example.label.clone(),
                expected: example.expected.clone(),
                actual,
                passed,
            });
        }

        ValidationResult::from_outcomes(outcomes)
    }

    /// Run a test artifact against the implementation.
    pub async fn validate_tests(
        &self,
        implementation: &GeneratedImplementation,
        tests: &GeneratedUnitTests,
    ) -> SuiteVerdict {
        match self
            .sandbox
            .run_suite(implementation, tests, self.config.suite_timeout)
            .await
        {
            Ok(output) => SuiteVerdict {
                passed: true,
                output,
            },
            Err(e) => SuiteVerdict {
                passed: false,
                output: describe(&e),
            },
        }
    }
}

fn describe(error: &ExecutionError) -> String {
    match error {
        ExecutionError::Timeout(t) => format!("timed out after {:?}", t),
        ExecutionError::Failed { status, stderr } => {
            format!("exit status {}\n{}", status, stderr.trim_end())
        }
        ExecutionError::Killed { stderr } => format!("killed\n{}", stderr.trim_end()),
        ExecutionError::Setup(reason) => format!("sandbox setup failed: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_core::{Entrypoint, ExamplePair};
    use aoc_sim::{Behavior, ScriptedSandbox};
    use proptest::prelude::*;

    fn implementation(source: &str) -> GeneratedImplementation {
        GeneratedImplementation::new(source, Entrypoint::new("solve"))
    }

    fn context(pairs: &[(&str, &str)]) -> ExamplesContext {
        ExamplesContext::new(pairs.iter().map(|(i, o)| ExamplePair::new(*i, *o)).collect())
    }

    fn validator(sandbox: ScriptedSandbox) -> Validator {
        Validator::new(Arc::new(sandbox), ValidatorConfig::quick())
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("12  \n\n\n"), "12");
        assert_eq!(normalize_output("a \nb\t\n"), "a\nb");
        assert_eq!(normalize_output("  lead"), "  lead");
        assert_eq!(normalize_output(""), "");
    }

    #[test]
    fn test_normalize_output_is_otherwise_exact() {
        assert_ne!(normalize_output("a\n\nb"), normalize_output("a\nb"));
        assert_ne!(normalize_output(" 5"), normalize_output("5"));
        assert_ne!(normalize_output("\n5"), normalize_output("5"));
        assert_ne!(normalize_output("Abc"), normalize_output("abc"));
        assert_eq!(normalize_output("5\n"), normalize_output("5"));
    }

    #[test]
    fn test_config_presets() {
        assert!(ValidatorConfig::quick().example_timeout < ValidatorConfig::default().example_timeout);
        assert!(ValidatorConfig::thorough().suite_timeout > ValidatorConfig::default().suite_timeout);
    }

    #[tokio::test]
    async fn test_all_examples_pass() {
        let sandbox = ScriptedSandbox::new()
            .with_program("p", Behavior::table(&[("1 2", "3\n"), ("4 5", "9")]));
        let result = validator(sandbox)
            .validate(&implementation("p"), &context(&[("1 2", "3"), ("4 5", "9")]))
            .await;
        assert!(result.passed());
        assert_eq!(result.outcomes().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_examples() {
        let sandbox = ScriptedSandbox::new().with_program("p", Behavior::constant("7"));
        let result = validator(sandbox)
            .validate(&implementation("p"), &context(&[("a", "1"), ("b", "7"), ("c", "2")]))
            .await;

        assert!(!result.passed());
        let passed: Vec<bool> = result.outcomes().iter().map(|o| o.passed).collect();
        assert_eq!(passed, vec![false, true, false]);
        assert_eq!(result.failures().count(), 2);
    }

    #[tokio::test]
    async fn test_execution_errors_are_recorded() {
        let sandbox = ScriptedSandbox::new()
            .with_program("crash", Behavior::Crash("ValueError: bad".into()))
            .with_program("hang", Behavior::Hang);
        let v = validator(sandbox);
        let ctx = context(&[("x", "1"), ("y", "2")]);

        let crashed = v.validate(&implementation("crash"), &ctx).await;
        assert_eq!(crashed.outcomes().len(), 2);
        assert!(matches!(
            &crashed.outcomes()[0].actual,
            Actual::Error(msg) if msg.contains("ValueError")
        ));

        let hung = v.validate(&implementation("hang"), &ctx).await;
        assert!(hung.outcomes().iter().all(|o| !o.passed));
        assert!(hung.outcomes()[1].actual.render().contains("timed out"));
    }

    #[tokio::test]
    async fn test_validation_is_deterministic() {
        let sandbox = ScriptedSandbox::new()
            .with_program("p", Behavior::table(&[("a", "1"), ("b", "3")]));
        let v = validator(sandbox);
        let ctx = context(&[("a", "1"), ("b", "2")]);
        let imp = implementation("p");
        assert_eq!(v.validate(&imp, &ctx).await, v.validate(&imp, &ctx).await);
    }

    #[tokio::test]
    async fn test_empty_context_does_not_pass() {
        let v = validator(ScriptedSandbox::new().with_program("p", Behavior::constant("1")));
        let result = v.validate(&implementation("p"), &ExamplesContext::default()).await;
        assert!(!result.passed());
        assert!(result.outcomes().is_empty());
    }

    #[tokio::test]
    async fn test_validate_tests_verdict() {
        let sandbox = ScriptedSandbox::new()
            .with_program("p", Behavior::constant("1"))
            .with_failing_suite("bad");
        let v = validator(sandbox);
        let good = GeneratedUnitTests { source: "good".into() };
        let bad = GeneratedUnitTests { source: "bad".into() };

        assert!(v.validate_tests(&implementation("p"), &good).await.passed);
        let verdict = v.validate_tests(&implementation("p"), &bad).await;
        assert!(!verdict.passed);
        assert!(verdict.output.contains("1 failed"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(text in "[a-z0-9 \t\n]{0,40}") {
            let once = normalize_output(&text);
            prop_assert_eq!(normalize_output(&once), once.clone());
        }

        /// Passed iff every example's output matches, whatever the order.
        #[test]
        fn passed_iff_every_output_matches(
            answers in prop::collection::vec((0u32..5, 0u32..5), 1..6),
        ) {
            let table: Vec<(String, String)> = answers
                .iter()
                .enumerate()
                .map(|(i, (got, _))| (format!("in{}", i), got.to_string()))
                .collect();
            let refs: Vec<(&str, &str)> = table.iter().map(|(i, o)| (i.as_str(), o.as_str())).collect();
            let sandbox = ScriptedSandbox::new().with_program("p", Behavior::table(&refs));

            let ctx = ExamplesContext::new(
                answers
                    .iter()
                    .enumerate()
                    .map(|(i, (_, want))| ExamplePair::new(format!("in{}", i), want.to_string()))
                    .collect(),
            );

            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(validator(sandbox).validate(&implementation("p"), &ctx));

            let expected = answers.iter().all(|(got, want)| got == want);
            prop_assert_eq!(result.passed(), expected);
            prop_assert_eq!(result.outcomes().len(), answers.len());
        }
    }
}
