//! Simulation environment combining RNG and fault injector under one seed.

use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;

/// Complete simulation environment.
///
/// # Usage
///
/// ```rust
/// use aoc_sim::{get_or_generate_seed, SimEnv};
///
/// let mut env = SimEnv::new(get_or_generate_seed());
/// let examples = env.rng().gen_range(1..=4usize);
/// let _fault = env.fault().next_fault();
/// assert!(examples >= 1);
/// ```
pub struct SimEnv {
    seed: u64,
    rng: DeterministicRng,
    fault_seed: u64,
    fault: FaultInjector,
}

impl SimEnv {
    /// Create an environment with default faults.
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    pub fn with_fault_config(seed: u64, fault_config: FaultConfig) -> Self {
        debug_assert!(seed != 0, "Seed should not be zero");

        let mut master_rng = DeterministicRng::new(seed);
        let rng_seed = master_rng.gen::<u64>().max(1);
        let fault_seed = master_rng.gen::<u64>().max(1);

        Self {
            seed,
            rng: DeterministicRng::new(rng_seed),
            fault_seed,
            fault: FaultInjector::new(DeterministicRng::new(fault_seed), fault_config),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn fault(&mut self) -> &mut FaultInjector {
        &mut self.fault
    }

    /// A fresh injector replaying this environment's fault sequence.
    ///
    /// Sandboxes own their injector; this hands one out without giving up
    /// the environment's own.
    pub fn fault_injector(&self) -> FaultInjector {
        FaultInjector::new(
            DeterministicRng::new(self.fault_seed),
            self.fault.config().clone(),
        )
    }
}
