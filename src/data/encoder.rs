// ============================================================
// Layer 4 — Batch Encoder
// ============================================================
// Turns a list of (prompt, target) text pairs into the four
// fixed-width integer arrays one training step consumes:
//
//   input_ids          ← tokenizer(prompts)       [batch, max_len]
//   attention_mask     ← tokenizer(prompts)       [batch, max_len]
//   labels             ← tokenizer(targets)       [batch, max_len]
//   decoder_input_ids  ← shift_right(labels)      [batch, max_len]
//
// Teacher forcing: the decoder sees the true target shifted one
// position right, and is trained to predict the unshifted one.
//
//   labels:            [ The  answer  is  Paris  .   </s> ]
//   decoder_input_ids: [<s>  The  answer  is  Paris  .   ]
//
// Padding and truncation are the tokenizer's job. The encoder
// only checks that what comes back really is max_len wide.
//
// Arrays are stored flat in row-major order so the tensor
// batcher can hand them to burn without another copy.

use anyhow::{ensure, Result};

use crate::domain::text_pair::TextPair;
use crate::domain::traits::{LabelShifter, TextTokenizer};

/// One encoded batch, all arrays row-major `[batch_size, max_length]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub input_ids:         Vec<i32>,
    pub attention_mask:    Vec<i32>,
    pub decoder_input_ids: Vec<i32>,
    pub labels:            Vec<i32>,
    pub batch_size:        usize,
    pub max_length:        usize,
}

#[cfg(test)]
impl EncodedBatch {
    pub fn shape(&self) -> [usize; 2] {
        [self.batch_size, self.max_length]
    }

    /// Row `i` of `array`, which must be one of this batch's fields.
    pub fn row<'a>(&self, array: &'a [i32], i: usize) -> &'a [i32] {
        &array[i * self.max_length..(i + 1) * self.max_length]
    }
}

/// Encode `pairs` for one training step.
pub fn preprocess_data(
    pairs:      &[TextPair],
    tokenizer:  &dyn TextTokenizer,
    shifter:    &dyn LabelShifter,
    max_length: usize,
) -> Result<EncodedBatch> {
    let prompts: Vec<String> = pairs.iter().map(|p| p.prompt.clone()).collect();
    let targets: Vec<String> = pairs.iter().map(|p| p.target.clone()).collect();

    let prompt_enc = tokenizer.batch_encode(&prompts, max_length)?;
    let target_enc = tokenizer.batch_encode(&targets, max_length)?;

    let input_ids      = flatten(&prompt_enc.input_ids, max_length, "prompt ids")?;
    let attention_mask = flatten(&prompt_enc.attention_mask, max_length, "prompt mask")?;
    let labels         = flatten(&target_enc.input_ids, max_length, "target ids")?;

    let decoder_input_ids: Vec<i32> = labels
        .chunks(max_length.max(1))
        .flat_map(|row| shifter.shift_right(row))
        .collect();

    Ok(EncodedBatch {
        input_ids,
        attention_mask,
        decoder_input_ids,
        labels,
        batch_size: pairs.len(),
        max_length,
    })
}

fn flatten(rows: &[Vec<u32>], max_length: usize, what: &str) -> Result<Vec<i32>> {
    let mut flat = Vec::with_capacity(rows.len() * max_length);
    for (i, row) in rows.iter().enumerate() {
        ensure!(
            row.len() == max_length,
            "tokenizer returned {} {what} for row {i}, expected {max_length}",
            row.len()
        );
        flat.extend(row.iter().map(|&id| id as i32));
    }
    Ok(flat)
}
