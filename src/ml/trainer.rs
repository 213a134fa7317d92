// ============================================================
// Layer 5 — Fit Loop
// ============================================================
// Runs a TrainingWrapper over two data generators:
//
//   for epoch in 1..=epochs:
//     for batch in train.epoch():        (reshuffles at the end)
//       train_step(batch)
//       checkpoint.on_batch_end(step)    (Steps(n) frequency)
//     evaluate(valid.epoch())            (dropout off)
//     checkpoint.on_epoch_end(epoch)     (Epoch frequency)
//     metrics.log(epoch row)
//     note a new best val_loss
//
// Global step numbering starts at 1 and keeps counting across
// epochs, so `--save-freq 1000` saves at steps 1000, 2000, ...
// regardless of where epoch boundaries fall.
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::Result;
use burn::{module::AutodiffModule, optim::Optimizer, tensor::backend::AutodiffBackend};

use crate::data::generator::MultihopQaDataGenerator;
use crate::infra::checkpoint::ModelCheckpoint;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::Seq2SeqModel;
use crate::ml::wrapper::{StepMetrics, TrainingWrapper};

/// How often to log a running loss inside an epoch.
const LOG_EVERY: usize = 100;

pub fn fit<B, M, O>(
    wrapper:    &mut TrainingWrapper<B, M, O>,
    train:      &mut MultihopQaDataGenerator<'_>,
    valid:      &mut MultihopQaDataGenerator<'_>,
    epochs:     usize,
    checkpoint: &ModelCheckpoint,
    metrics:    Option<&MetricsLogger>,
) -> Result<Vec<EpochMetrics>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Seq2SeqModel<B>,
    M::InnerModule: Seq2SeqModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    tracing::info!(
        "Fitting for {} epochs: {} train batches, {} validation batches per epoch",
        epochs,
        train.len(),
        valid.len()
    );
    if train.is_empty() {
        tracing::warn!(
            "'{}' has fewer records than one batch; no training steps will run",
            train.data_file().display()
        );
    }

    let mut history       = Vec::with_capacity(epochs);
    let mut global_step   = 0usize;
    let mut best_val_loss = f64::INFINITY;

    for epoch in 1..=epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_metrics = StepMetrics::default();
        for batch in train.epoch() {
            let step = wrapper.train_step(batch?)?;
            train_metrics.merge(step);
            global_step += 1;

            if global_step % LOG_EVERY == 0 {
                tracing::info!(
                    "epoch {} step {}: running loss {:.4}",
                    epoch,
                    global_step,
                    train_metrics.loss()
                );
            }
            checkpoint.on_batch_end(wrapper.model(), epoch, global_step)?;
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let val_metrics = wrapper.evaluate(valid.epoch())?;

        checkpoint.on_epoch_end(wrapper.model(), epoch, global_step)?;

        let row = EpochMetrics::new(
            epoch,
            train_metrics.loss(),
            train_metrics.accuracy(),
            val_metrics.loss(),
            val_metrics.accuracy(),
        );

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.1}% | val_loss={:.4} | val_acc={:.1}%",
            epoch,
            epochs,
            row.train_loss,
            row.train_acc * 100.0,
            row.val_loss,
            row.val_acc * 100.0,
        );

        if let Some(logger) = metrics {
            logger.log(&row)?;
        }
        if row.is_improvement(best_val_loss) {
            best_val_loss = row.val_loss;
            tracing::info!("New best val_loss {:.4} at epoch {}", row.val_loss, epoch);
        }
        history.push(row);
    }

    tracing::info!("Fit complete after {} steps", global_step);
    Ok(history)
}
