//! Error types for the problem model and external collaborators.

use std::time::Duration;

use crate::model::ProblemIdentity;

/// An identity that can never name a published puzzle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("year {0} predates the first puzzle year")]
    Year(u16),

    #[error("day {0} is outside 1..=25")]
    Day(u8),

    #[error("part {0} is not 1 or 2")]
    Part(u8),
}

/// Scraping collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("no statement at {url}")]
    NotFound { url: String },

    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },
}

/// Catalog failures. Neither variant is retried by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("problem {identity} is not published: {reason}")]
    NotFound {
        identity: ProblemIdentity,
        reason: String,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no examples found in statement for {identity}")]
    NoExamples { identity: ProblemIdentity },
}

/// Generative capability failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("generator request failed: {0}")]
    Request(String),

    #[error("generator refused: {0}")]
    Refused(String),

    #[error("generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator returned an unreadable response: {0}")]
    Malformed(String),
}

/// Execution sandbox failures for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("terminated by signal: {stderr}")]
    Killed { stderr: String },

    #[error("sandbox setup failed: {0}")]
    Setup(String),
}

/// Persistence collaborator failures. Never retried by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("refusing to overwrite existing file {0}")]
    AlreadyExists(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("rejected batch: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e.to_string())
    }
}
