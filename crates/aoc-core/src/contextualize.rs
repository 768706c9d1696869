//! Normalize extracted examples and attach statement-derived notes.
//!
//! Pure: no I/O, output depends only on the problem and the examples.

use crate::markup;
use crate::model::{AoCProblem, ContextNote, ExamplePair, ExamplesContext, ProblemPart};

/// Phrases that mark a sentence as carrying example-specific parameters.
const HINT_MARKERS: &[&str] = &[
    "in this example",
    "in the example",
    "for example",
    "note that",
    "assume",
];

#[derive(Debug, Clone)]
pub struct ExampleContextualizer {
    /// Maximum number of hint sentences kept.
    pub max_hints: usize,
}

impl Default for ExampleContextualizer {
    fn default() -> Self {
        Self { max_hints: 8 }
    }
}

impl ExampleContextualizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contextualize(&self, problem: &AoCProblem, examples: Vec<ExamplePair>) -> ExamplesContext {
        let examples: Vec<ExamplePair> = examples
            .into_iter()
            .map(|e| ExamplePair {
                input: normalize_input(&e.input),
                expected: normalize_expected(&e.expected),
                label: e.label,
            })
            .collect();

        let mut context = ExamplesContext::new(examples);

        if !context.is_empty() && context.examples.iter().all(|e| is_integer(&e.expected)) {
            context = context.with_note(ContextNote::constraint(
                "Every example answer is an integer; return the answer as a number.",
            ));
        }

        if problem.identity.part() == ProblemPart::Two && !problem.preamble.is_empty() {
            context = context.with_note(ContextNote::hint(
                "This is part two: the part one rules still apply unless the part two text changes them.",
            ));
        }

        for sentence in self.hints(&problem.statement) {
            context = context.with_note(ContextNote::hint(sentence));
        }

        context
    }

    fn hints(&self, statement: &str) -> Vec<String> {
        let mut hints: Vec<String> = Vec::new();
        for sentence in markup::sentences(&markup::plain_text(statement)) {
            if hints.len() >= self.max_hints {
                break;
            }
            let lower = sentence.to_lowercase();
            if HINT_MARKERS.iter().any(|m| lower.contains(m)) && !hints.contains(&sentence) {
                hints.push(sentence);
            }
        }
        hints
    }
}

/// CRLF to LF, trailing whitespace off every line, no blank lines at either end.
///
/// Leading whitespace inside a line is kept; grids depend on it.
#[must_use]
pub fn normalize_input(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();

    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map_or(start, |i| i + 1);

    lines[start..end].join("\n")
}

/// Input normalization, then trimmed, then canonical integers.
#[must_use]
pub fn normalize_expected(raw: &str) -> String {
    let text = normalize_input(raw);
    let text = text.trim();
    canonical_integer(text).unwrap_or_else(|| text.to_string())
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `+007` -> `7`, `-0` -> `0`. `None` when `s` is not an integer literal.
fn canonical_integer(s: &str) -> Option<String> {
    let (negative, digits) = match s.as_bytes().first()? {
        b'+' => (false, &s[1..]),
        b'-' => (true, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Some("0".to_string());
    }
    Some(if negative {
        format!("-{trimmed}")
    } else {
        trimmed.to_string()
    })
}
