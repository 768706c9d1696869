//! Run configuration.

use serde::Serialize;

use aoc_evaluators::ValidatorConfig;

use crate::controller::ControllerConfig;

/// What to do when a synthesized test suite fails against the accepted
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TestFailurePolicy {
    /// Abort the run; nothing is committed.
    Abort,
    /// Render the deterministic example suite instead and re-validate it.
    #[default]
    FallbackToExampleTests,
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub controller: ControllerConfig,
    pub validator: ValidatorConfig,
    pub test_failure_policy: TestFailurePolicy,
    /// Allow replacing artifacts already committed for an identity
    pub overwrite: bool,
    /// Identities run at once by `run_many`
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            validator: ValidatorConfig::default(),
            test_failure_policy: TestFailurePolicy::default(),
            overwrite: false,
            concurrency: num_cpus::get().max(1),
        }
    }
}

impl PipelineConfig {
    /// Quick config for fast iteration.
    pub fn quick() -> Self {
        Self {
            controller: ControllerConfig::quick(),
            validator: ValidatorConfig::quick(),
            ..Default::default()
        }
    }

    /// Thorough config for production.
    pub fn thorough() -> Self {
        Self {
            controller: ControllerConfig::thorough(),
            validator: ValidatorConfig::thorough(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let quick = PipelineConfig::quick();
        let thorough = PipelineConfig::thorough();
        assert!(quick.controller.max_attempts < thorough.controller.max_attempts);
        assert!(quick.validator.example_timeout < thorough.validator.example_timeout);
        assert!(PipelineConfig::default().concurrency >= 1);
        assert_eq!(
            PipelineConfig::default().test_failure_policy,
            TestFailurePolicy::FallbackToExampleTests
        );
        assert!(!PipelineConfig::default().overwrite);
    }
}
