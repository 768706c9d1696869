//! # aoc-sim
//!
//! Deterministic stand-ins for the synthesis loop's external collaborators.
//!
//! The generator, the execution sandbox, the scraper and the persistence
//! layer are all non-deterministic or slow in production. This crate
//! replaces them with scripted fakes and seeded fault injection so every
//! loop property can be checked reproducibly.
//!
//! ## Usage
//!
//! ```rust
//! use aoc_sim::{python_response, ScriptedCapability, SimEnv};
//!
//! let seed = 12345;
//! let mut env = SimEnv::new(seed);
//!
//! // Deterministic randomness
//! let attempts = env.rng().gen_range(1..=5u32);
//! assert!((1..=5).contains(&attempts));
//!
//! // Fixed generator responses, consumed in order
//! let generator = ScriptedCapability::new(vec![Ok(python_response("def solve(s):\n    return 5\n"))]);
//! assert_eq!(generator.calls(), 0);
//! ```
//!
//! ## Reproducibility
//!
//! Property tests print their seed. To reproduce a failing run:
//! ```bash
//! AOC_SIM_SEED=12345 cargo test
//! ```

pub mod env;
pub mod fakes;
pub mod fault;
pub mod random;

pub use env::SimEnv;
pub use fakes::{
    python_response, Behavior, FaultySandbox, MemoryPersistence, ScriptedCapability,
    ScriptedSandbox, StaticFetcher,
};
pub use fault::{Fault, FaultConfig, FaultInjector, FaultStats};
pub use random::DeterministicRng;

/// Environment variable that pins the simulation seed.
pub const SEED_ENV: &str = "AOC_SIM_SEED";

/// Get the simulation seed from `AOC_SIM_SEED` or generate a random one.
///
/// Prints the seed for reproduction.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var(SEED_ENV).ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(seed) => {
            println!("{}={} (from environment)", SEED_ENV, seed);
            seed
        }
        None => {
            let seed = rand::random::<u64>().max(1);
            println!("{}={} (randomly generated)", SEED_ENV, seed);
            seed
        }
    }
}
