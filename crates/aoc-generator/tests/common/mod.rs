//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use aoc_core::{
    AoCProblem, ExamplePair, ExamplesContext, Persistence, ProblemCatalog, ProblemIdentity,
    ProblemPart,
};
use aoc_evaluators::{Validator, ValidatorConfig};
use aoc_generator::{
    ControllerConfig, ExampleTestSynthesizer, LlmImplementationSynthesizer, Pipeline,
    PipelineConfig, RetryController, TestSynthesizer,
};
use aoc_sim::{Behavior, ScriptedCapability, ScriptedSandbox, StaticFetcher};

pub const BASE_URL: &str = "https://puzzles.test";

pub const RIGHT: &str = "def solve(data):\n    return 5\n";
pub const WRONG: &str = "def solve(data):\n    return 6\n";
pub const OFF_BY_TWO: &str = "def solve(data):\n    return 7\n";

/// A statement with one example: input `2\n3`, answer `5`.
pub fn page(day: u8) -> String {
    format!(
        r#"<main>
<article class="day-desc"><h2>--- Day {day}: Adding Up ---</h2>
<p>Add the numbers on each line. For example:</p>
<pre><code>2
3
</code></pre>
<p>In this example, the total is <code><em>5</em></code>.</p>
</article>
</main>"#
    )
}

pub const PAGE_WITHOUT_EXAMPLES: &str = r#"<main>
<article class="day-desc"><h2>--- Day 9: Silence ---</h2>
<p>There is nothing to see here.</p>
</article>
</main>"#;

pub fn identity(day: u8) -> ProblemIdentity {
    ProblemIdentity::new(2024, day, ProblemPart::One).unwrap()
}

pub fn url(day: u8) -> String {
    format!("{}/2024/day/{}", BASE_URL, day)
}

pub fn problem() -> AoCProblem {
    AoCProblem {
        identity: identity(1),
        title: "Adding Up".into(),
        statement: String::new(),
        preamble: String::new(),
        url: url(1),
    }
}

pub fn sum_context() -> ExamplesContext {
    ExamplesContext::new(vec![ExamplePair::new("2\n3", "5")])
}

/// Sandbox that knows the three canned candidates.
pub fn sandbox() -> ScriptedSandbox {
    ScriptedSandbox::new()
        .with_program(RIGHT, Behavior::constant("5"))
        .with_program(WRONG, Behavior::constant("6"))
        .with_program(OFF_BY_TWO, Behavior::constant("7"))
}

pub fn controller(capability: Arc<ScriptedCapability>, max_attempts: u32) -> RetryController {
    RetryController::new(
        Arc::new(LlmImplementationSynthesizer::new(capability)),
        Arc::new(Validator::new(Arc::new(sandbox()), ValidatorConfig::quick())),
        ControllerConfig {
            max_attempts,
            ..ControllerConfig::quick()
        },
    )
}

pub fn fetcher(days: &[u8]) -> StaticFetcher {
    days.iter()
        .fold(StaticFetcher::new(), |f, day| f.with_page(url(*day), page(*day)))
}

pub struct PipelineParts {
    pub fetcher: StaticFetcher,
    pub capability: Arc<ScriptedCapability>,
    pub sandbox: ScriptedSandbox,
    pub tests: Arc<dyn TestSynthesizer>,
    pub persistence: Arc<dyn Persistence>,
    pub config: PipelineConfig,
}

impl PipelineParts {
    pub fn new(capability: Arc<ScriptedCapability>, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            fetcher: fetcher(&[1]),
            capability,
            sandbox: sandbox(),
            tests: Arc::new(ExampleTestSynthesizer),
            persistence,
            config: PipelineConfig {
                concurrency: 4,
                ..PipelineConfig::quick()
            },
        }
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(
            ProblemCatalog::with_base_url(Arc::new(self.fetcher), BASE_URL),
            Arc::new(LlmImplementationSynthesizer::new(self.capability)),
            self.tests,
            Arc::new(self.sandbox),
            self.persistence,
            self.config,
        )
    }
}
