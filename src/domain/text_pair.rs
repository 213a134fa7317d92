// ============================================================
// Layer 3 — TextPair Domain Type
// ============================================================
// A (prompt, target) pair is the unit the batch encoder works
// on. The prompt goes through the encoder side of the model;
// the target is what the decoder is taught to produce, and in
// the fine-tuning data it ends with "... answer is <X>."
//
// Pairs live for one batch only: the data generator builds
// them from a slice of records and hands them straight to the
// encoder.

use crate::domain::error::DataResult;
use crate::domain::example::{text_field, Example, PROMPT, TARGET};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPair {
    pub prompt: String,
    pub target: String,
}

impl TextPair {
    pub fn new(prompt: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            target: target.into(),
        }
    }

    /// Build a pair from a fine-tuning record. `index` is only used
    /// to name the record in a missing-field error.
    pub fn from_example(example: &Example, index: usize) -> DataResult<Self> {
        Ok(Self::new(
            text_field(example, index, PROMPT)?,
            text_field(example, index, TARGET)?,
        ))
    }
}
