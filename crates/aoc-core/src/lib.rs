//! # aoc-core
//!
//! Problem model and the deterministic front half of the synthesis pipeline.
//!
//! ```text
//! ProblemIdentity ──> ProblemCatalog ──> AoCProblem
//!                                            │
//!                                            ▼
//!                     ExampleExtractor ──> Vec<ExamplePair>
//!                                            │
//!                                            ▼
//!                 ExampleContextualizer ──> ExamplesContext
//! ```
//!
//! Everything after the context (synthesis, validation, commit) lives in
//! `aoc-evaluators` and `aoc-generator`. The external collaborators those
//! crates talk to are declared here, in [`capability`], so fakes and real
//! implementations can be swapped without touching the loop.

pub mod capability;
pub mod catalog;
pub mod contextualize;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod markup;
pub mod model;

pub use capability::{ExecutionSandbox, GenerativeCapability, Persistence, StatementFetcher};
pub use catalog::{ProblemCatalog, DEFAULT_BASE_URL};
pub use contextualize::ExampleContextualizer;
pub use error::{
    CapabilityError, CatalogError, ExecutionError, ExtractionError, FetchError, IdentityError,
    PersistenceError,
};
pub use extract::ExampleExtractor;
pub use fetch::{FetcherConfig, HttpStatementFetcher};
pub use model::{
    Actual, AoCProblem, CommitBatch, CommitId, ContextNote, Entrypoint, ExampleOutcome,
    ExamplePair, ExamplesContext, FileMode, FileToCommit, GeneratedImplementation,
    GeneratedUnitTests, NoteKind, ProblemIdentity, ProblemPart, SuiteVerdict, ValidationResult,
};
