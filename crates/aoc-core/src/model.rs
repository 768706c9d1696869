//! In-memory contracts shared by every pipeline stage.
//!
//! These types are the only formats the pipeline owns. Wire and on-disk
//! formats belong to the external collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// First year a puzzle was published.
pub const YEAR_MIN: u16 = 2015;

/// Puzzles per year.
pub const DAY_MAX: u8 = 25;

/// Which half of a daily puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProblemPart {
    One,
    Two,
}

impl ProblemPart {
    /// Part number as shown on the puzzle page (1 or 2).
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            ProblemPart::One => 1,
            ProblemPart::Two => 2,
        }
    }

    /// Parse a part number.
    pub fn from_number(n: u8) -> Result<Self, IdentityError> {
        match n {
            1 => Ok(ProblemPart::One),
            2 => Ok(ProblemPart::Two),
            other => Err(IdentityError::Part(other)),
        }
    }
}

/// Unique identity of one puzzle half.
///
/// Fields are private so an identity cannot change after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemIdentity {
    year: u16,
    day: u8,
    part: ProblemPart,
}

impl ProblemIdentity {
    /// Create an identity, rejecting years and days that can never be published.
    pub fn new(year: u16, day: u8, part: ProblemPart) -> Result<Self, IdentityError> {
        if year < YEAR_MIN {
            return Err(IdentityError::Year(year));
        }
        if day == 0 || day > DAY_MAX {
            return Err(IdentityError::Day(day));
        }
        Ok(Self { year, day, part })
    }

    #[must_use]
    pub fn year(&self) -> u16 {
        self.year
    }

    #[must_use]
    pub fn day(&self) -> u8 {
        self.day
    }

    #[must_use]
    pub fn part(&self) -> ProblemPart {
        self.part
    }

    /// Repository directory that holds this identity's artifacts.
    #[must_use]
    pub fn artifact_dir(&self) -> String {
        format!(
            "advent_of_code/year{}/day{}/part{}",
            self.year,
            self.day,
            self.part.number()
        )
    }
}

impl fmt::Display for ProblemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/day{:02}/part{}", self.year, self.day, self.part.number())
    }
}

/// A fetched puzzle statement. Read-only after the catalog creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoCProblem {
    pub identity: ProblemIdentity,
    pub title: String,
    /// Markup of the article for the requested part.
    pub statement: String,
    /// Markup of the earlier part's article (part two only, empty otherwise).
    pub preamble: String,
    pub url: String,
}

/// A known-correct (input, expected output) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePair {
    pub input: String,
    pub expected: String,
    pub label: Option<String>,
}

impl ExamplePair {
    pub fn new(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected: expected.into(),
            label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    /// A property every answer satisfies (e.g. "answers are integers").
    Constraint,
    /// Free text from the statement useful when writing the solution.
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNote {
    pub kind: NoteKind,
    pub text: String,
}

impl ContextNote {
    pub fn constraint(text: impl Into<String>) -> Self {
        Self {
            kind: NoteKind::Constraint,
            text: text.into(),
        }
    }

    pub fn hint(text: impl Into<String>) -> Self {
        Self {
            kind: NoteKind::Hint,
            text: text.into(),
        }
    }
}

/// Ordered examples plus notes, ready for synthesis.
///
/// An empty context is a precondition failure: no synthesis is attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplesContext {
    pub examples: Vec<ExamplePair>,
    pub notes: Vec<ContextNote>,
}

impl ExamplesContext {
    pub fn new(examples: Vec<ExamplePair>) -> Self {
        Self {
            examples,
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: ContextNote) -> Self {
        self.notes.push(note);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }
}

/// The single callable boundary of a candidate.
///
/// A top-level function that takes the raw puzzle input as one string and
/// returns the answer. The validator invokes every candidate through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entrypoint {
    pub function: String,
}

impl Entrypoint {
    pub fn new(function: impl Into<String>) -> Self {
        let function = function.into();
        debug_assert!(!function.is_empty(), "Entrypoint name must not be empty");
        Self { function }
    }
}

/// A candidate implementation, not yet proven correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImplementation {
    pub source: String,
    pub entrypoint: Entrypoint,
}

impl GeneratedImplementation {
    pub fn new(source: impl Into<String>, entrypoint: Entrypoint) -> Self {
        Self {
            source: source.into(),
            entrypoint,
        }
    }
}

/// A pytest module that imports the entrypoint from `solution`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedUnitTests {
    pub source: String,
}

/// What the candidate produced for one example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actual {
    Output(String),
    Error(String),
}

impl Actual {
    /// Text to show in diagnostics.
    #[must_use]
    pub fn render(&self) -> &str {
        match self {
            Actual::Output(s) | Actual::Error(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleOutcome {
    pub example_index: usize,
    pub label: Option<String>,
    pub expected: String,
    pub actual: Actual,
    pub passed: bool,
}

/// Verdict of one validation run.
///
/// Holds no timings, so validating the same candidate twice yields equal
/// results. There is no mutating API and no deserializer; the only way in
/// is `from_outcomes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    passed: bool,
    outcomes: Vec<ExampleOutcome>,
}

impl ValidationResult {
    /// Build from per-example outcomes. `passed` is derived, never supplied.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<ExampleOutcome>) -> Self {
        let passed = !outcomes.is_empty() && outcomes.iter().all(|o| o.passed);
        Self { passed, outcomes }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn outcomes(&self) -> &[ExampleOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExampleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// One line per outcome.
    #[must_use]
    pub fn format_report(&self) -> String {
        let mut report = String::new();
        for outcome in &self.outcomes {
            let status = if outcome.passed { "PASS" } else { "FAIL" };
            let label = outcome.label.as_deref().unwrap_or("example");
            report.push_str(&format!(
                "  [{}] #{} ({}): expected {:?}, got {:?}\n",
                status,
                outcome.example_index,
                label,
                outcome.expected,
                outcome.actual.render()
            ));
        }
        report
    }
}

/// Result of running a test artifact against an implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteVerdict {
    pub passed: bool,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    /// Fail if the destination already exists.
    Create,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileToCommit {
    /// Path relative to the repository root.
    pub path: String,
    pub content: String,
    pub mode: FileMode,
}

/// Files persisted together as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBatch {
    pub identity: ProblemIdentity,
    pub message: String,
    pub files: Vec<FileToCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, passed: bool) -> ExampleOutcome {
        ExampleOutcome {
            example_index: index,
            label: None,
            expected: "5".into(),
            actual: Actual::Output(if passed { "5" } else { "6" }.into()),
            passed,
        }
    }

    #[test]
    fn test_identity_bounds() {
        assert!(ProblemIdentity::new(2024, 6, ProblemPart::One).is_ok());
        assert_eq!(
            ProblemIdentity::new(2014, 1, ProblemPart::One),
            Err(IdentityError::Year(2014))
        );
        assert_eq!(
            ProblemIdentity::new(2024, 0, ProblemPart::One),
            Err(IdentityError::Day(0))
        );
        assert_eq!(
            ProblemIdentity::new(2024, 26, ProblemPart::Two),
            Err(IdentityError::Day(26))
        );
    }

    #[test]
    fn test_identity_display_and_dir() {
        let id = ProblemIdentity::new(2024, 6, ProblemPart::Two).unwrap();
        assert_eq!(id.to_string(), "2024/day06/part2");
        assert_eq!(id.artifact_dir(), "advent_of_code/year2024/day6/part2");
    }

    #[test]
    fn test_part_numbers() {
        assert_eq!(ProblemPart::from_number(1), Ok(ProblemPart::One));
        assert_eq!(ProblemPart::from_number(2), Ok(ProblemPart::Two));
        assert_eq!(ProblemPart::from_number(3), Err(IdentityError::Part(3)));
        assert_eq!(ProblemPart::Two.number(), 2);
    }

    #[test]
    fn test_validation_result_passed_is_derived() {
        let all = ValidationResult::from_outcomes(vec![outcome(0, true), outcome(1, true)]);
        assert!(all.passed());

        let one_bad = ValidationResult::from_outcomes(vec![outcome(0, true), outcome(1, false)]);
        assert!(!one_bad.passed());
        assert_eq!(one_bad.failures().count(), 1);

        // No outcomes means nothing was checked.
        assert!(!ValidationResult::from_outcomes(Vec::new()).passed());
    }

    #[test]
    fn test_serialized_passed_matches_outcomes() {
        let result = ValidationResult::from_outcomes(vec![outcome(0, true), outcome(1, false)]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["outcomes"].as_array().unwrap().len(), 2);
        assert_eq!(json["outcomes"][1]["actual"]["Output"], "6");
    }

    #[test]
    fn test_format_report() {
        let result = ValidationResult::from_outcomes(vec![outcome(0, false)]);
        let report = result.format_report();
        assert!(report.contains("[FAIL] #0"));
        assert!(report.contains("\"6\""));
    }
}
