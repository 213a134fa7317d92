// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The glue in this crate talks to two outside capabilities
// that are not ours to implement: a tokenizer and a pretrained
// generation model. Each sits behind a narrow trait here so the
// splitting, batching and filtering logic can be tested with a
// handful of lines of fake implementation and no ML framework.
//
//   TextTokenizer → infra::tokenizer_store::HfTokenizer
//                   (HuggingFace `tokenizers`)
//   LabelShifter  → ml::model::Seq2SeqConfig
//                   (teacher-forcing shift of the model)
//
// The third capability, the training loop itself, is the
// ml layer and depends on burn directly.

use anyhow::Result;

/// Token ids and attention masks for a batch of texts.
/// Every row has exactly `max_length` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedText {
    pub input_ids:      Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u32>>,
}

// ─── TextTokenizer ────────────────────────────────────────────────────────────
/// Batch-encode text with fixed-length padding and truncation.
///
/// Padding and truncation policy belong to the implementation;
/// callers only rely on every returned row being `max_length` long.
pub trait TextTokenizer {
    fn batch_encode(&self, texts: &[String], max_length: usize) -> Result<TokenizedText>;

    /// Id used for padding positions.
    fn pad_token_id(&self) -> u32;

    /// Number of ids the tokenizer can emit.
    fn vocab_size(&self) -> usize;
}

// ─── LabelShifter ─────────────────────────────────────────────────────────────
/// The model-side half of teacher forcing: turn a row of label ids
/// into decoder input ids by shifting one position to the right.
pub trait LabelShifter {
    /// First decoder input of every sequence.
    fn decoder_start_token_id(&self) -> i32;

    fn pad_token_id(&self) -> i32;

    /// `[start, l0, l1, ..., l(n-2)]`, with any ignore-index (-100)
    /// replaced by the pad id. Output length equals input length.
    fn shift_right(&self, labels: &[i32]) -> Vec<i32> {
        if labels.is_empty() {
            return Vec::new();
        }

        let mut shifted = Vec::with_capacity(labels.len());
        shifted.push(self.decoder_start_token_id());
        shifted.extend_from_slice(&labels[..labels.len() - 1]);

        for id in shifted.iter_mut() {
            if *id == IGNORE_INDEX {
                *id = self.pad_token_id();
            }
        }
        shifted
    }
}

/// Label value that loss functions skip.
pub const IGNORE_INDEX: i32 = -100;

#[cfg(test)]
mod tests {
    use super::*;

    struct T5Shift;

    impl LabelShifter for T5Shift {
        fn decoder_start_token_id(&self) -> i32 { 0 }
        fn pad_token_id(&self) -> i32 { 0 }
    }

    struct StartSeven;

    impl LabelShifter for StartSeven {
        fn decoder_start_token_id(&self) -> i32 { 7 }
        fn pad_token_id(&self) -> i32 { 3 }
    }

    #[test]
    fn test_shift_right_prepends_start_and_drops_last() {
        assert_eq!(T5Shift.shift_right(&[5, 6, 1, 0]), vec![0, 5, 6, 1]);
    }

    #[test]
    fn test_shift_right_replaces_ignore_index() {
        assert_eq!(StartSeven.shift_right(&[4, -100, 9]), vec![7, 4, 3]);
    }

    #[test]
    fn test_shift_right_empty() {
        assert!(T5Shift.shift_right(&[]).is_empty());
    }
}
