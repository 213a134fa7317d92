// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Moves an EncodedBatch from host memory onto a Burn device.
//
// The encoder already produced fixed-width rows, so every array
// is a flat Vec<i32> of batch_size * max_length values and only
// needs reshaping:
//
//   [r0_t0, r0_t1, ..., r0_tL, r1_t0, ..., rB_tL] → [B, L]
//
// Several encoded batches of the same width can be stacked into
// one device batch; their rows are concatenated in order.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::TensorData};

use crate::data::encoder::EncodedBatch;

/// One batch on device. Every tensor is `[batch_size, max_length]`.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    pub input_ids:         Tensor<B, 2, Int>,
    pub attention_mask:    Tensor<B, 2, Int>,
    pub decoder_input_ids: Tensor<B, 2, Int>,
    pub labels:            Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn tensor(&self, values: &[i32], shape: [usize; 2]) -> Tensor<B, 2, Int> {
        Tensor::from_data(TensorData::new(values.to_vec(), shape), &self.device)
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<EncodedBatch, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    /// Stack `items` row-wise. Every item must have the same `max_length`.
    fn batch(&self, items: Vec<EncodedBatch>) -> Seq2SeqBatch<B> {
        let max_length = items.first().map_or(0, |e| e.max_length);
        let batch_size = items.iter().map(|e| e.batch_size).sum();
        let shape      = [batch_size, max_length];

        Seq2SeqBatch {
            input_ids:         self.tensor(&stack(&items, |e| e.input_ids.as_slice()), shape),
            attention_mask:    self.tensor(&stack(&items, |e| e.attention_mask.as_slice()), shape),
            decoder_input_ids: self.tensor(&stack(&items, |e| e.decoder_input_ids.as_slice()), shape),
            labels:            self.tensor(&stack(&items, |e| e.labels.as_slice()), shape),
        }
    }
}

fn stack<F>(items: &[EncodedBatch], field: F) -> Vec<i32>
where
    F: Fn(&EncodedBatch) -> &[i32],
{
    items.iter().flat_map(|e| field(e).iter().copied()).collect()
}
