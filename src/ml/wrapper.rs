// ============================================================
// Layer 5 — Training Wrapper
// ============================================================
// Wraps a pretrained seq2seq model into something trainable:
//
//   inputs (all Int, shape [max_length] per example):
//     input_ids        ┐
//     attention_mask   ├──► model ──► logits [batch, max_length, vocab]
//     labels           ┘    (decoder input ids, teacher forcing)
//
//   "compiled" with:
//     optimizer  Adam (adaptive moments, Kingma & Ba 2015)
//     loss       sparse categorical cross-entropy from logits
//     metric     token accuracy
//
// Padding positions of the target are skipped by both the loss
// and the accuracy. The loss is the mean negative log-likelihood
// over real target tokens only:
//
//   loss = Σ_real −log p(label) / count(real)
//
// so a batch of short answers padded to max_length weighs the
// same per token as a batch of long ones.
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation::log_softmax, backend::AutodiffBackend},
};

use crate::data::batcher::Seq2SeqBatcher;
use crate::data::encoder::EncodedBatch;
use crate::ml::model::Seq2SeqModel;

/// Names of the three model inputs, in call order. The decoder
/// input ids travel under the name `labels`.
pub const INPUT_NAMES: [&str; 3] = ["input_ids", "attention_mask", "labels"];

/// Optimizer and loss settings used when building a wrapper.
#[derive(Config, Debug)]
pub struct CompileSettings {
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 1e-7)]
    pub epsilon:       f32,
    #[config(default = 0)]
    pub pad_token_id:  usize,
}

// ─── StepMetrics ──────────────────────────────────────────────────────────────
/// Loss and accuracy over one or more batches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepMetrics {
    pub loss_sum: f64,
    pub batches:  usize,
    pub correct:  usize,
    pub total:    usize,
}

impl StepMetrics {
    pub fn merge(&mut self, other: StepMetrics) {
        self.loss_sum += other.loss_sum;
        self.batches  += other.batches;
        self.correct  += other.correct;
        self.total    += other.total;
    }

    /// Mean batch loss; NaN when no batch was seen.
    pub fn loss(&self) -> f64 {
        if self.batches > 0 { self.loss_sum / self.batches as f64 } else { f64::NAN }
    }

    /// Fraction of non-pad target tokens predicted exactly.
    pub fn accuracy(&self) -> f64 {
        if self.total > 0 { self.correct as f64 / self.total as f64 } else { 0.0 }
    }
}

// ─── TrainingWrapper ──────────────────────────────────────────────────────────
pub struct TrainingWrapper<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    model:      M,
    optim:      O,
    settings:   CompileSettings,
    max_length: usize,
    batcher:    Seq2SeqBatcher<B>,
}

/// Assemble a trainable wrapper around `model` for inputs of width
/// `max_length`.
pub fn build_training_wrapper<B, M>(
    model:      M,
    max_length: usize,
    settings:   CompileSettings,
    device:     B::Device,
) -> Result<TrainingWrapper<B, M, impl Optimizer<M, B>>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Seq2SeqModel<B>,
    M::InnerModule: Seq2SeqModel<B::InnerBackend>,
{
    ensure!(max_length > 0, "max_length must be at least 1");
    ensure!(
        max_length <= model.max_positions(),
        "max_length {} exceeds the model's {} positions",
        max_length,
        model.max_positions()
    );

    let optim = AdamConfig::new().with_epsilon(settings.epsilon).init::<B, M>();

    tracing::info!(
        "Training wrapper ready: inputs {:?} of width {}, Adam lr={}",
        INPUT_NAMES,
        max_length,
        settings.learning_rate
    );

    Ok(TrainingWrapper {
        model,
        optim,
        settings,
        max_length,
        batcher: Seq2SeqBatcher::new(device),
    })
}

impl<B, M, O> TrainingWrapper<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Seq2SeqModel<B>,
    M::InnerModule: Seq2SeqModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Replace the weights, e.g. after restoring a checkpoint.
    pub fn set_model(&mut self, model: M) {
        self.model = model;
    }

    /// Forward, backward and one Adam update.
    pub fn train_step(&mut self, encoded: EncodedBatch) -> Result<StepMetrics> {
        self.check_width(&encoded)?;
        let batch = self.batcher.batch(vec![encoded]);

        let logits = self.model.forward_logits(batch.input_ids, batch.attention_mask, batch.decoder_input_ids);
        let (loss, metrics) = loss_and_accuracy(logits, batch.labels, self.settings.pad_token_id);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.settings.learning_rate, self.model.clone(), grads);

        Ok(metrics)
    }

    /// Loss and accuracy without updating weights (dropout off).
    pub fn evaluate<I>(&self, batches: I) -> Result<StepMetrics>
    where
        I: IntoIterator<Item = Result<EncodedBatch>>,
    {
        let model   = self.model.valid();
        let batcher = Seq2SeqBatcher::<B::InnerBackend>::new(self.batcher.device.clone());

        let mut total = StepMetrics::default();
        for encoded in batches {
            let encoded = encoded?;
            self.check_width(&encoded)?;
            let batch = batcher.batch(vec![encoded]);

            let logits = model.forward_logits(batch.input_ids, batch.attention_mask, batch.decoder_input_ids);
            let (_, metrics) = loss_and_accuracy(logits, batch.labels, self.settings.pad_token_id);
            total.merge(metrics);
        }
        Ok(total)
    }

    fn check_width(&self, encoded: &EncodedBatch) -> Result<()> {
        ensure!(
            encoded.max_length == self.max_length,
            "batch width {} does not match wrapper input width {}",
            encoded.max_length,
            self.max_length
        );
        Ok(())
    }
}

/// Cross-entropy from logits plus token accuracy, pad targets excluded.
fn loss_and_accuracy<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
    pad_id: usize,
) -> (Tensor<B, 1>, StepMetrics) {
    let [batch_size, seq_len, vocab] = logits.dims();
    let rows = batch_size * seq_len;

    let logits  = logits.reshape([rows, vocab]);
    let targets = labels.reshape([rows]);

    let real = targets.clone().equal_elem(pad_id as i64).bool_not().int();

    // log p(label) for every row, [rows]
    let picked = log_softmax(logits.clone(), 1)
        .gather(1, targets.clone().reshape([rows, 1]))
        .reshape([rows]);
    let mask = real.clone().float();
    // An all-pad batch has no real tokens; its loss is 0, not NaN.
    let loss = picked
        .mul(mask.clone())
        .sum()
        .neg()
        .div(mask.sum().clamp_min(1.0));

    // argmax(1) returns [rows, 1], flatten before comparing with [rows]
    let predicted = logits.argmax(1).flatten::<1>(0, 1);

    let correct: i64 = predicted
        .equal(targets)
        .int()
        .mul(real.clone())
        .sum()
        .into_scalar()
        .elem::<i64>();
    let total: i64 = real.sum().into_scalar().elem::<i64>();

    let metrics = StepMetrics {
        loss_sum: loss.clone().into_scalar().elem::<f64>(),
        batches:  1,
        correct:  correct as usize,
        total:    total as usize,
    };
    (loss, metrics)
}
