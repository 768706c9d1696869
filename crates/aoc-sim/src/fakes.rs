//! Fixed-response fakes for every external collaborator.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use aoc_core::{
    CapabilityError, CommitBatch, CommitId, ExecutionError, ExecutionSandbox, FetchError,
    GeneratedImplementation, GeneratedUnitTests, GenerativeCapability, Persistence,
    PersistenceError, ProblemIdentity, StatementFetcher,
};

use crate::fault::{Fault, FaultInjector, FaultStats};

/// Wrap source in a fenced python block, the way a generator replies.
#[must_use]
pub fn python_response(source: &str) -> String {
    format!("Here is the solution:\n\n```python\n{}\n```\n", source.trim_end())
}

// ---------------------------------------------------------------------------
// ScriptedCapability
// ---------------------------------------------------------------------------

/// Generator that replays scripted responses in order.
///
/// Every prompt is recorded so tests can check what feedback was sent.
/// Once the script runs out, further calls are refused.
#[derive(Default)]
pub struct ScriptedCapability {
    responses: Mutex<VecDeque<Result<String, CapabilityError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCapability {
    pub fn new(responses: Vec<Result<String, CapabilityError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeCapability for ScriptedCapability {
    async fn invoke(&self, _system: &str, prompt: &str) -> Result<String, CapabilityError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CapabilityError::Refused("script exhausted".into())))
    }
}

// ---------------------------------------------------------------------------
// ScriptedSandbox
// ---------------------------------------------------------------------------

type AnswerFn = dyn Fn(&str) -> String + Send + Sync;

/// How a registered program behaves when invoked.
#[derive(Clone)]
pub enum Behavior {
    /// Produce output from the input.
    Answer(Arc<AnswerFn>),
    /// Exit non-zero with this stderr.
    Crash(String),
    /// Never finish; reported as a timeout.
    Hang,
}

impl Behavior {
    pub fn answer(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Behavior::Answer(Arc::new(f))
    }

    /// Same output for every input.
    pub fn constant(output: impl Into<String>) -> Self {
        let output = output.into();
        Behavior::answer(move |_| output.clone())
    }

    /// Outputs looked up by input; unknown inputs print nothing.
    pub fn table(pairs: &[(&str, &str)]) -> Self {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(i, o)| (i.to_string(), o.to_string()))
            .collect();
        Behavior::answer(move |input| map.get(input).cloned().unwrap_or_default())
    }
}

/// Sandbox that looks programs up by their exact source text.
///
/// Unregistered source behaves like a program that fails to parse, which is
/// how a malformed candidate surfaces in the real sandbox.
#[derive(Default)]
pub struct ScriptedSandbox {
    programs: HashMap<String, Behavior>,
    failing_suites: HashSet<String>,
    runs: AtomicUsize,
    suite_runs: AtomicUsize,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_program(mut self, source: impl Into<String>, behavior: Behavior) -> Self {
        self.programs.insert(source.into(), behavior);
        self
    }

    /// Mark a test suite source as failing when run.
    #[must_use]
    pub fn with_failing_suite(mut self, tests_source: impl Into<String>) -> Self {
        self.failing_suites.insert(tests_source.into());
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn suite_runs(&self) -> usize {
        self.suite_runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionSandbox for ScriptedSandbox {
    async fn run(
        &self,
        implementation: &GeneratedImplementation,
        input: &str,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.programs.get(&implementation.source) {
            Some(Behavior::Answer(f)) => Ok(f(input)),
            Some(Behavior::Crash(stderr)) => Err(ExecutionError::Failed {
                status: 1,
                stderr: stderr.clone(),
            }),
            Some(Behavior::Hang) => Err(ExecutionError::Timeout(timeout)),
            None => Err(ExecutionError::Failed {
                status: 1,
                stderr: "SyntaxError: invalid syntax".into(),
            }),
        }
    }

    async fn run_suite(
        &self,
        implementation: &GeneratedImplementation,
        tests: &GeneratedUnitTests,
        _timeout: Duration,
    ) -> Result<String, ExecutionError> {
        self.suite_runs.fetch_add(1, Ordering::SeqCst);
        if !self.programs.contains_key(&implementation.source) {
            return Err(ExecutionError::Failed {
                status: 2,
                stderr: "ImportError: cannot import solution".into(),
            });
        }
        if self.failing_suites.contains(&tests.source) {
            return Err(ExecutionError::Failed {
                status: 1,
                stderr: "1 failed".into(),
            });
        }
        Ok("all tests passed".into())
    }
}

// ---------------------------------------------------------------------------
// FaultySandbox
// ---------------------------------------------------------------------------

/// Wraps a sandbox and injects seeded timeouts and crashes into `run`.
pub struct FaultySandbox<S> {
    inner: S,
    injector: Mutex<FaultInjector>,
}

impl<S: ExecutionSandbox> FaultySandbox<S> {
    pub fn new(inner: S, injector: FaultInjector) -> Self {
        Self {
            inner,
            injector: Mutex::new(injector),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> FaultStats {
        self.injector.lock().unwrap().stats()
    }
}

#[async_trait]
impl<S: ExecutionSandbox> ExecutionSandbox for FaultySandbox<S> {
    async fn run(
        &self,
        implementation: &GeneratedImplementation,
        input: &str,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        let fault = self.injector.lock().unwrap().next_fault();
        match fault {
            Some(Fault::Timeout) => Err(ExecutionError::Timeout(timeout)),
            Some(Fault::Crash) => Err(ExecutionError::Killed {
                stderr: "injected crash".into(),
            }),
            None => self.inner.run(implementation, input, timeout).await,
        }
    }

    async fn run_suite(
        &self,
        implementation: &GeneratedImplementation,
        tests: &GeneratedUnitTests,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        self.inner.run_suite(implementation, tests, timeout).await
    }
}

// ---------------------------------------------------------------------------
// MemoryPersistence
// ---------------------------------------------------------------------------

/// Records committed batches in memory.
///
/// Tracks how many commits per identity were in flight at once so tests can
/// check that commits for one identity are serialized.
#[derive(Default)]
pub struct MemoryPersistence {
    batches: Mutex<Vec<CommitBatch>>,
    fail_with: Option<PersistenceError>,
    delay: Option<Duration>,
    in_flight: Mutex<HashMap<ProblemIdentity, usize>>,
    max_in_flight_same_identity: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every commit fails with `error`.
    #[must_use]
    pub fn failing(error: PersistenceError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    /// Hold each commit open for `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn batches(&self) -> Vec<CommitBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// Highest number of simultaneous commits seen for any single identity.
    pub fn max_in_flight_same_identity(&self) -> usize {
        self.max_in_flight_same_identity.load(Ordering::SeqCst)
    }

    fn enter(&self, identity: ProblemIdentity) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(identity).or_insert(0);
        *count += 1;
        self.max_in_flight_same_identity
            .fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, identity: ProblemIdentity) {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(count) = in_flight.get_mut(&identity) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn commit(&self, batch: &CommitBatch) -> Result<CommitId, PersistenceError> {
        self.enter(batch.identity);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.leave(batch.identity);

        if let Some(ref error) = self.fail_with {
            return Err(error.clone());
        }

        let mut batches = self.batches.lock().unwrap();
        batches.push(batch.clone());
        Ok(CommitId(format!("mem-{}", batches.len())))
    }
}

// ---------------------------------------------------------------------------
// StaticFetcher
// ---------------------------------------------------------------------------

/// Scraper that serves fixed pages by URL; unknown URLs are not found.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, markup: impl Into<String>) -> Self {
        self.pages.insert(url.into(), markup.into());
        self
    }
}

#[async_trait]
impl StatementFetcher for StaticFetcher {
    async fn fetch_statement(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            })
    }
}
