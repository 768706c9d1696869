//! Deterministic example extraction from statement markup.
//!
//! Puzzle pages show an example input in a `<pre><code>` block and state the
//! example's answer as an emphasized code span somewhere after it, often
//! after a few diagram blocks. Extraction groups blocks into examples:
//!
//! - a block opens a new example when the prose since the previous block or
//!   answer mentions "example" (the first block of part one always opens one);
//! - other blocks are diagrams of the current example;
//! - the last answer span inside a group is that example's expected output.
//!
//! Part two statements usually reuse part one's example. Answers that appear
//! before any example opens in part two are paired with the first example
//! input from the part one article.
//!
//! When a statement has no `<pre>` blocks at all, labeled plain-text
//! sections (`Input:` / `Output:`) are read instead.

use tracing::debug;

use crate::error::ExtractionError;
use crate::markup::{self, Token};
use crate::model::{AoCProblem, ExamplePair, ProblemPart};

#[derive(Debug, Default, Clone, Copy)]
pub struct ExampleExtractor;

/// Examples and unattached answers found in one article.
#[derive(Debug, Default)]
struct Scan {
    groups: Vec<Group>,
    /// Answers seen before any example opened.
    orphan_answers: Vec<String>,
}

#[derive(Debug)]
struct Group {
    input: String,
    answer: Option<String>,
}

impl ExampleExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Ordered examples for the problem's part.
    ///
    /// Identical markup always yields an identical list.
    pub fn extract(&self, problem: &AoCProblem) -> Result<Vec<ExamplePair>, ExtractionError> {
        let raw = if problem.statement.contains("<pre") || problem.preamble.contains("<pre") {
            extract_html(problem)
        } else {
            extract_labeled(&markup::strip_tags(&problem.statement))
        };

        let examples: Vec<ExamplePair> = raw
            .into_iter()
            .enumerate()
            .map(|(i, (input, expected))| {
                ExamplePair::new(input, expected).with_label(format!("example {}", i + 1))
            })
            .collect();

        debug!(
            event = "extract.done",
            identity = %problem.identity,
            examples = examples.len(),
        );

        if examples.is_empty() {
            return Err(ExtractionError::NoExamples {
                identity: problem.identity,
            });
        }
        Ok(examples)
    }
}

fn extract_html(problem: &AoCProblem) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    match problem.identity.part() {
        ProblemPart::One => {
            pairs.extend(completed(scan(&problem.statement, true).groups));
        }
        ProblemPart::Two => {
            let current = scan(&problem.statement, false);
            if let Some(answer) = current.orphan_answers.last() {
                let preamble = scan(&problem.preamble, true);
                if let Some(first) = preamble.groups.first() {
                    pairs.push((first.input.clone(), answer.clone()));
                }
            }
            pairs.extend(completed(current.groups));
        }
    }

    pairs
}

fn completed(groups: Vec<Group>) -> impl Iterator<Item = (String, String)> {
    groups
        .into_iter()
        .filter_map(|g| g.answer.map(|answer| (g.input, answer)))
}

fn scan(html: &str, first_block_opens: bool) -> Scan {
    let mut out = Scan::default();
    let mut prose_since_block = String::new();

    for token in markup::tokenize(html) {
        match token {
            Token::Prose(text) => prose_since_block.push_str(&text),
            Token::Block(block) => {
                let opens = mentions_example(&prose_since_block)
                    || (first_block_opens && out.groups.is_empty());
                if opens {
                    out.groups.push(Group {
                        input: block,
                        answer: None,
                    });
                }
                prose_since_block.clear();
            }
            Token::Answer(answer) => {
                match out.groups.last_mut() {
                    Some(group) => group.answer = Some(answer),
                    None => out.orphan_answers.push(answer),
                }
                // Only prose after the latest answer can introduce a new example.
                prose_since_block.clear();
            }
        }
    }

    out
}

fn mentions_example(prose: &str) -> bool {
    prose.to_lowercase().contains("example")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Input,
    Output,
}

/// Read `Input:` / `Output:` labeled sections from plain text.
fn extract_labeled(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut section = Section::None;
    let mut input: Vec<&str> = Vec::new();
    let mut output: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();

        if let Some(rest) = label_rest(&lower, trimmed, &["example input:", "input:"]) {
            flush(&mut pairs, &mut input, &mut output);
            section = Section::Input;
            if !rest.is_empty() {
                input.push(rest);
            }
            continue;
        }
        if let Some(rest) = label_rest(
            &lower,
            trimmed,
            &["expected output:", "example output:", "output:"],
        ) {
            section = Section::Output;
            if !rest.is_empty() {
                output.push(rest);
            }
            continue;
        }

        match section {
            Section::Input => {
                if !trimmed.is_empty() || !input.is_empty() {
                    input.push(line);
                }
            }
            Section::Output => {
                if trimmed.is_empty() {
                    if !output.is_empty() {
                        flush(&mut pairs, &mut input, &mut output);
                        section = Section::None;
                    }
                } else {
                    output.push(trimmed);
                }
            }
            Section::None => {}
        }
    }
    flush(&mut pairs, &mut input, &mut output);

    pairs
}

fn flush(pairs: &mut Vec<(String, String)>, input: &mut Vec<&str>, output: &mut Vec<&str>) {
    if !input.is_empty() && !output.is_empty() {
        pairs.push((input.join("\n"), output.join("\n")));
    }
    input.clear();
    output.clear();
}

/// If `lower` starts with one of `labels`, the original-case remainder.
fn label_rest<'a>(lower: &str, original: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels
        .iter()
        .find(|label| lower.starts_with(*label))
        .map(|label| original[label.len()..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProblemIdentity;

    fn problem(part: ProblemPart, statement: &str, preamble: &str) -> AoCProblem {
        AoCProblem {
            identity: ProblemIdentity::new(2024, 6, part).unwrap(),
            title: "Guard Gallivant".into(),
            statement: statement.into(),
            preamble: preamble.into(),
            url: "https://adventofcode.com/2024/day/6".into(),
        }
    }

    const GUARD_PART_ONE: &str = r#"<h2>--- Day 6: Guard Gallivant ---</h2>
<p>For example, suppose you start with the following map:</p>
<pre><code>....#.....
....^....#
</code></pre>
<p>The guard moves upward until it hits an obstacle:</p>
<pre><code>....#.....
....X....#
</code></pre>
<p>In this example, the guard will visit <code><em>41</em></code> distinct positions on your map.</p>"#;

    #[test]
    fn test_diagrams_do_not_open_examples() {
        let examples = ExampleExtractor::new()
            .extract(&problem(ProblemPart::One, GUARD_PART_ONE, ""))
            .unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].input, "....#.....\n....^....#\n");
        assert_eq!(examples[0].expected, "41");
        assert_eq!(examples[0].label.as_deref(), Some("example 1"));
    }

    #[test]
    fn test_multiple_examples_in_order() {
        let html = r#"<p>For example:</p><pre><code>1abc2
</code></pre><p>Adding these gives <code><em>12</em></code>.</p>
<p>Here is a second example:</p><pre><code>two1nine
</code></pre><p>which yields <code><em>29</em></code>.</p>
<p>Another example without a stated answer:</p><pre><code>zzz
</code></pre>"#;
        let examples = ExampleExtractor::new()
            .extract(&problem(ProblemPart::One, html, ""))
            .unwrap();
        let got: Vec<(&str, &str)> = examples
            .iter()
            .map(|e| (e.input.as_str(), e.expected.as_str()))
            .collect();
        assert_eq!(got, vec![("1abc2\n", "12"), ("two1nine\n", "29")]);
    }

    #[test]
    fn test_last_answer_in_group_wins() {
        let html = r#"<p>For example:</p><pre><code>3 4
</code></pre><p>The first pair is <code><em>2</em></code> apart,
so the total is <code><em>11</em></code>.</p>"#;
        let examples = ExampleExtractor::new()
            .extract(&problem(ProblemPart::One, html, ""))
            .unwrap();
        assert_eq!(examples[0].expected, "11");
    }

    #[test]
    fn test_part_two_reuses_part_one_input() {
        let part_two = r#"<h2 id="part2">--- Part Two ---</h2>
<p>Option one, put a printing press here:</p>
<pre><code>....#.....
....^O...#
</code></pre>
<p>In the above example, there are only <code><em>6</em></code> different positions.</p>"#;
        let examples = ExampleExtractor::new()
            .extract(&problem(ProblemPart::Two, part_two, GUARD_PART_ONE))
            .unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].input, "....#.....\n....^....#\n");
        assert_eq!(examples[0].expected, "6");
    }

    #[test]
    fn test_part_two_with_its_own_example() {
        let part_two = r#"<p>For example:</p><pre><code>two1nine
</code></pre><p>Adding these produces <code><em>281</em></code>.</p>"#;
        let examples = ExampleExtractor::new()
            .extract(&problem(ProblemPart::Two, part_two, GUARD_PART_ONE))
            .unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].input, "two1nine\n");
        assert_eq!(examples[0].expected, "281");
    }

    #[test]
    fn test_labeled_plain_text() {
        let text = "Sum two numbers.\n\nInput:\n2\n3\nOutput:\n5\n\nExample input: 10 20\nExpected output: 30\n";
        let examples = ExampleExtractor::new()
            .extract(&problem(ProblemPart::One, text, ""))
            .unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].input, "2\n3");
        assert_eq!(examples[0].expected, "5");
        assert_eq!(examples[1].input, "10 20");
        assert_eq!(examples[1].expected, "30");
    }

    #[test]
    fn test_no_examples_is_error() {
        let err = ExampleExtractor::new()
            .extract(&problem(ProblemPart::One, "<p>No examples here.</p>", ""))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoExamples { .. }));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let p = problem(ProblemPart::One, GUARD_PART_ONE, "");
        let extractor = ExampleExtractor::new();
        let first = extractor.extract(&p).unwrap();
        for _ in 0..10 {
            assert_eq!(extractor.extract(&p).unwrap(), first);
        }
    }
}
