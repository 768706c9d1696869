//! Deterministic fault injection for sandbox runs.
//!
//! Simulates the ways a candidate execution goes wrong in practice:
//! - Timeouts (a candidate that never terminates)
//! - Crashes (an interpreter that dies with a non-zero status)

use crate::random::DeterministicRng;

#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Probability that a run exceeds its timeout (0.0 to 1.0)
    pub timeout_probability: f64,
    /// Probability that a run crashes
    pub crash_probability: f64,
    /// Whether fault injection is enabled
    pub enabled: bool,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            timeout_probability: 0.05,
            crash_probability: 0.05,
            enabled: true,
        }
    }
}

impl FaultConfig {
    /// No faults - useful for baseline testing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            timeout_probability: 0.0,
            crash_probability: 0.0,
            enabled: false,
        }
    }

    /// Aggressive faults for stress testing.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            timeout_probability: 0.3,
            crash_probability: 0.3,
            enabled: true,
        }
    }
}

/// The fault drawn for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Timeout,
    Crash,
}

/// Deterministic fault injector. The same seed produces the same faults.
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    timeouts_injected_count: u64,
    crashes_injected_count: u64,
}

impl FaultInjector {
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&config.timeout_probability),
            "Timeout probability must be in [0.0, 1.0]"
        );
        debug_assert!(
            (0.0..=1.0).contains(&config.crash_probability),
            "Crash probability must be in [0.0, 1.0]"
        );

        Self {
            rng,
            config,
            timeouts_injected_count: 0,
            crashes_injected_count: 0,
        }
    }

    /// Draw the fault (if any) for the next run.
    ///
    /// Always consumes two draws so the sequence does not depend on outcomes.
    pub fn next_fault(&mut self) -> Option<Fault> {
        if !self.config.enabled {
            return None;
        }

        let timeout = self.rng.gen_bool(self.config.timeout_probability);
        let crash = self.rng.gen_bool(self.config.crash_probability);

        if timeout {
            self.timeouts_injected_count += 1;
            Some(Fault::Timeout)
        } else if crash {
            self.crashes_injected_count += 1;
            Some(Fault::Crash)
        } else {
            None
        }
    }

    #[must_use]
    pub fn stats(&self) -> FaultStats {
        FaultStats {
            timeouts_count: self.timeouts_injected_count,
            crashes_count: self.crashes_injected_count,
        }
    }

    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }
}

/// Faults injected so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultStats {
    pub timeouts_count: u64,
    pub crashes_count: u64,
}
