// ============================================================
// Layer 4 — Example Splitter
// ============================================================
// Projects fine-tuning records into parallel columns:
//
//   [{prompt, target, answer}, ...]
//        │
//        ├── prompts:  [p0, p1, ...]
//        ├── targets:  [t0, t1, ...]
//        └── answers:  [a0, a1, ...]   (triple mode only)
//
// Position i in every column comes from record i, so the
// columns can be zipped back together later (e.g. to pair a
// generated target with its gold answer during evaluation).
//
// A record missing a required field fails the whole split;
// a half-built column set is never returned.

use crate::domain::error::DataResult;
use crate::domain::example::{text_field, Example, ANSWER, PROMPT, TARGET};

/// Split records into `(prompts, targets)`.
pub fn qa_split(examples: &[Example]) -> DataResult<(Vec<String>, Vec<String>)> {
    let mut prompts = Vec::with_capacity(examples.len());
    let mut targets = Vec::with_capacity(examples.len());

    for (i, example) in examples.iter().enumerate() {
        prompts.push(text_field(example, i, PROMPT)?);
        targets.push(text_field(example, i, TARGET)?);
    }

    Ok((prompts, targets))
}

/// Split records into `(prompts, targets, answers)`.
/// Every record must carry an `answer` in this mode.
pub fn qa_split_with_answers(
    examples: &[Example],
) -> DataResult<(Vec<String>, Vec<String>, Vec<String>)> {
    let (prompts, targets) = qa_split(examples)?;

    let answers = examples
        .iter()
        .enumerate()
        .map(|(i, example)| text_field(example, i, ANSWER))
        .collect::<DataResult<Vec<_>>>()?;

    Ok((prompts, targets, answers))
}
