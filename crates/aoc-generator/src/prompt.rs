//! Prompt generation from the problem and its examples.
//!
//! Prompts state WHAT must hold (the examples reproduce), never HOW to solve
//! the puzzle. Fix prompts are diagnostic: which examples failed and what
//! the candidate produced.

use aoc_core::{AoCProblem, Entrypoint, ExamplesContext, GeneratedImplementation, NoteKind};

use crate::synthesizer::Feedback;

/// Longest example input quoted verbatim in a fix prompt.
const MAX_QUOTED_INPUT: usize = 2_000;

/// Generic prompt builder.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn system_prompt() -> &'static str {
        r#"You are a Python programmer solving Advent of Code puzzles.

Write a single self-contained Python 3 module (standard library only).

Contract:
- Define one top-level function with a descriptive name that takes the full
  puzzle input as a single string and returns the answer.
- Mark it with a comment line `# entrypoint: <function name>`.
- Also define `solution()` that reads all of stdin and prints the result of
  the entrypoint function.
- Do not read files or run anything at import time.

The examples from the puzzle statement define correctness. Your function must
reproduce every example answer exactly.

Return ONLY Python code in a ```python code block."#
    }

    /// First attempt: statement, examples, notes.
    pub fn build_generation_prompt(problem: &AoCProblem, context: &ExamplesContext) -> String {
        format!(
            r#"Solve {identity}: {title}.

## PUZZLE STATEMENT
{preamble}{statement}

## EXAMPLES

Your function must return exactly these answers for these inputs:

{examples}
## NOTES

{notes}

Return ONLY the Python code in a ```python code block."#,
            identity = problem.identity,
            title = problem.title,
            preamble = Self::format_preamble(problem),
            statement = problem.statement,
            examples = Self::format_examples(context),
            notes = Self::format_notes(context),
        )
    }

    /// Retry: the previous code and exactly what went wrong with it.
    pub fn build_fix_prompt(
        problem: &AoCProblem,
        context: &ExamplesContext,
        feedback: &Feedback,
    ) -> String {
        format!(
            r#"Your solution to {identity}: {title} failed validation.

## PUZZLE STATEMENT
{preamble}{statement}

## NOTES

{notes}

## PREVIOUS CODE

```python
{previous}
```

## VALIDATION FAILURE

{diagnostic}
## TASK

Fix the code so that every example reproduces. Keep the entrypoint contract.

Return ONLY the fixed Python code in a ```python code block."#,
            identity = problem.identity,
            title = problem.title,
            preamble = Self::format_preamble(problem),
            statement = problem.statement,
            notes = Self::format_notes(context),
            previous = feedback.previous.source.trim_end(),
            diagnostic = Self::format_failures(feedback, context),
        )
    }

    /// Ask for a pytest module covering the examples and stated edge cases.
    pub fn build_test_prompt(
        problem: &AoCProblem,
        context: &ExamplesContext,
        implementation: &GeneratedImplementation,
    ) -> String {
        format!(
            r#"Write a pytest module for this solution to {identity}: {title}.

## SOLUTION (saved as solution.py)

```python
{source}
```

## EXAMPLES

{examples}
## NOTES

{notes}

## RULES

1. Import with `from solution import {entrypoint}`.
2. One test per example asserting the exact expected answer.
3. Add tests only for edge cases the notes state explicitly.
4. Start the module with a docstring summarising what is covered.

Return ONLY the Python code in a ```python code block."#,
            identity = problem.identity,
            title = problem.title,
            source = implementation.source.trim_end(),
            examples = Self::format_examples(context),
            notes = Self::format_notes(context),
            entrypoint = implementation.entrypoint.function,
        )
    }

    fn format_preamble(problem: &AoCProblem) -> String {
        if problem.preamble.is_empty() {
            String::new()
        } else {
            format!("\n### Part one\n{}\n\n### Part two\n", problem.preamble)
        }
    }

    fn format_examples(context: &ExamplesContext) -> String {
        let mut out = String::new();
        for (i, example) in context.examples.iter().enumerate() {
            let label = example.label.as_deref().unwrap_or("example");
            out.push_str(&format!(
                "### #{} ({})\nInput:\n```\n{}\n```\nExpected answer: `{}`\n\n",
                i, label, example.input, example.expected
            ));
        }
        out
    }

    fn format_notes(context: &ExamplesContext) -> String {
        if context.notes.is_empty() {
            return "None.".to_string();
        }
        context
            .notes
            .iter()
            .map(|n| {
                let kind = match n.kind {
                    NoteKind::Constraint => "constraint",
                    NoteKind::Hint => "hint",
                };
                format!("- ({}) {}", kind, n.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// What failed, not how to fix it.
    fn format_failures(feedback: &Feedback, context: &ExamplesContext) -> String {
        let result = &feedback.result;
        let failures: Vec<_> = result.failures().collect();
        let mut info = format!(
            "{} of {} examples failed.\n\n",
            failures.len(),
            result.outcomes().len()
        );

        for outcome in failures {
            let label = outcome.label.as_deref().unwrap_or("example");
            info.push_str(&format!("### #{} ({})\n", outcome.example_index, label));
            if let Some(example) = context.examples.get(outcome.example_index) {
                info.push_str(&format!("Input:\n```\n{}\n```\n", quote(&example.input)));
            }
            info.push_str(&format!("Expected: `{}`\n", outcome.expected));
            match &outcome.actual {
                aoc_core::Actual::Output(out) => {
                    info.push_str(&format!("Got: `{}`\n\n", out.trim_end()));
                }
                aoc_core::Actual::Error(err) => {
                    info.push_str(&format!("Error:\n```\n{}\n```\n\n", err.trim_end()));
                }
            }
        }
        info
    }
}

fn quote(input: &str) -> String {
    if input.len() <= MAX_QUOTED_INPUT {
        return input.to_string();
    }
    let mut end = MAX_QUOTED_INPUT;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... ({} more bytes)", &input[..end], input.len() - end)
}

/// Extract code from the first ```python (or ```py) block.
pub fn extract_code_block(response: &str) -> Option<String> {
    let (fence, tag_len) = ["```python", "```py"]
        .iter()
        .filter_map(|tag| response.find(tag).map(|i| (i, tag.len())))
        .min_by_key(|(i, _)| *i)?;

    let after_tag = fence + tag_len;
    // Skip to the end of the fence line.
    let code_start = response[after_tag..]
        .find('\n')
        .map(|i| after_tag + i + 1)?;
    let code_end = response[code_start..].find("```")?;

    let code = response[code_start..code_start + code_end].trim_matches('\n');
    if code.trim().is_empty() {
        None
    } else {
        Some(format!("{}\n", code.trim_end()))
    }
}

/// Find the single callable boundary of a generated module.
///
/// In order: an explicit `# entrypoint: name` marker naming a defined
/// function, a top-level `solve`, then the last top-level one-argument
/// function other than `solution`/`main`.
pub fn resolve_entrypoint(source: &str) -> Option<Entrypoint> {
    let defs: Vec<(&str, usize)> = source.lines().filter_map(top_level_def).collect();
    let defined = |name: &str| defs.iter().any(|(n, _)| *n == name);

    let marked = source.lines().find_map(|line| {
        line.trim()
            .strip_prefix("# entrypoint:")
            .map(str::trim)
            .filter(|name| is_identifier(name))
    });
    if let Some(name) = marked {
        if defined(name) {
            return Some(Entrypoint::new(name));
        }
    }

    if defs.iter().any(|(n, arity)| *n == "solve" && *arity == 1) {
        return Some(Entrypoint::new("solve"));
    }

    defs.iter()
        .rev()
        .find(|(name, arity)| {
            *arity == 1 && !matches!(*name, "solution" | "main") && !name.starts_with('_')
        })
        .map(|(name, _)| Entrypoint::new(*name))
}

/// `def name(a, b=1):` at column zero -> `(name, 2)`.
fn top_level_def(line: &str) -> Option<(&str, usize)> {
    let rest = line.strip_prefix("def ")?;
    let open = rest.find('(')?;
    let name = rest[..open].trim();
    if !is_identifier(name) {
        return None;
    }
    let close = rest[open..].find(')')? + open;
    let params = &rest[open + 1..close];
    let arity = params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "/" && *p != "*")
        .count();
    Some((name, arity))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
