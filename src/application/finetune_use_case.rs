// ============================================================
// Layer 2 — FinetuneUseCase
// ============================================================
// Fine-tunes a pretrained seq2seq model on a pair of
// prompt/target files:
//
//   Step 1: Load tokenizer + model from the model directory   (Layer 6)
//   Step 2: Count records in the train and validation files   (Layer 4)
//   Step 3: Build one data generator per file                 (Layer 4)
//   Step 4: Build the training wrapper (Adam + CE + accuracy) (Layer 5)
//   Step 5: Restore previous weights, if given, and report    (Layer 6)
//           where that run stopped
//   Step 6: Save the run config, register the checkpointer    (Layer 6)
//   Step 7: Fit, validating after every epoch                 (Layer 5)
//   Step 8: Save a final checkpoint                           (Layer 6)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use burn::{optim::Optimizer, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::generator::{GeneratorConfig, MultihopQaDataGenerator};
use crate::data::loader::count_examples;
use crate::infra::{
    checkpoint::{load_weights, CheckpointManager, CheckpointPoint, ModelCheckpoint, SaveFrequency},
    metrics::{best_epoch, MetricsLogger},
    pretrained::{from_pretrained, LoadOptions, PretrainedModel},
};
use crate::ml::model::Seq2SeqTransformer;
use crate::ml::trainer::fit;
use crate::ml::wrapper::{build_training_wrapper, CompileSettings, TrainingWrapper};

// ─── Fine-tuning Configuration ───────────────────────────────────────────────
// Serialisable so the run can be saved next to its checkpoint and
// repeated with the same hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinetuneConfig {
    /// Model directory (config.json, tokenizer.json, optional model.mpk)
    pub model_name:          String,
    pub train_file:          String,
    pub valid_file:          String,
    /// Checkpoint file stem, e.g. `checkpoints/self_ask`
    pub checkpoint_path:     String,
    pub max_length:          usize,
    pub batch_size:          usize,
    pub epochs:              usize,
    pub load_in_8bit:        bool,
    /// Weights to start from instead of the model directory's
    pub previous_checkpoint: Option<String>,
    pub save_freq:           SaveFrequency,
    pub learning_rate:       f64,
    pub shuffle:             bool,
    pub cache_rows:          bool,
    pub seed:                Option<u64>,
}

impl Default for FinetuneConfig {
    fn default() -> Self {
        Self {
            model_name:          "models/t5-small".to_string(),
            train_file:          "data/FinetuningData/self_ask_train.json".to_string(),
            valid_file:          "data/FinetuningData/self_ask_dev.json".to_string(),
            checkpoint_path:     "checkpoints/self_ask".to_string(),
            max_length:          128,
            batch_size:          16,
            epochs:              2,
            load_in_8bit:        false,
            previous_checkpoint: None,
            save_freq:           SaveFrequency::default(),
            learning_rate:       1e-3,
            shuffle:             true,
            cache_rows:          false,
            seed:                None,
        }
    }
}

// ─── Previous run ─────────────────────────────────────────────────────────────
/// What the side files next to a previous checkpoint say about its run.
/// Either part is `None` when its file is missing or unreadable.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousRun {
    pub point:  Option<CheckpointPoint>,
    pub config: Option<FinetuneConfig>,
}

/// Read `latest.json` and `train_config.json` for the checkpoint stem `previous`.
pub fn inspect_previous_run(previous: &Path) -> Result<PreviousRun> {
    let manager = CheckpointManager::new(previous)?;
    let point   = manager.latest().ok();
    let config  = manager.load_config::<FinetuneConfig>().ok();
    Ok(PreviousRun { point, config })
}

// ─── FinetuneUseCase ──────────────────────────────────────────────────────────
pub struct FinetuneUseCase {
    config: FinetuneConfig,
}

impl FinetuneUseCase {
    pub fn new(config: FinetuneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FinetuneConfig {
        &self.config
    }

    /// Run the whole fine-tuning pipeline and hand back the trained wrapper.
    pub fn execute<B: AutodiffBackend>(
        &self,
        device: B::Device,
    ) -> Result<TrainingWrapper<B, Seq2SeqTransformer<B>, impl Optimizer<Seq2SeqTransformer<B>, B>>> {
        let cfg = &self.config;
        ensure!(cfg.batch_size > 0, "batch_size must be at least 1");
        ensure!(cfg.epochs > 0, "epochs must be at least 1");

        // ── Step 1: Tokenizer + pretrained model ─────────────────────────────
        let options = LoadOptions { load_in_8bit: cfg.load_in_8bit };
        let PretrainedModel { config: model_config, model, tokenizer } =
            from_pretrained::<B>(Path::new(&cfg.model_name), options, &device)?;

        // ── Step 2: Record counts ─────────────────────────────────────────────
        let train_file  = Path::new(&cfg.train_file);
        let valid_file  = Path::new(&cfg.valid_file);
        let train_count = count_examples(train_file)?;
        let valid_count = count_examples(valid_file)?;
        tracing::info!("{} training records, {} validation records", train_count, valid_count);

        // ── Step 3: Data generators ───────────────────────────────────────────
        let gen_config = GeneratorConfig {
            max_length: cfg.max_length,
            batch_size: cfg.batch_size,
            shuffle:    cfg.shuffle,
            cache_rows: cfg.cache_rows,
            seed:       cfg.seed,
        };
        let valid_config = GeneratorConfig {
            seed: cfg.seed.map(|s| s.wrapping_add(1)),
            ..gen_config.clone()
        };
        let mut train_gen =
            MultihopQaDataGenerator::new(&tokenizer, &model_config, train_count, train_file, gen_config)?;
        let mut valid_gen =
            MultihopQaDataGenerator::new(&tokenizer, &model_config, valid_count, valid_file, valid_config)?;

        // ── Step 4: Training wrapper ──────────────────────────────────────────
        let settings = CompileSettings::new()
            .with_learning_rate(cfg.learning_rate)
            .with_pad_token_id(model_config.pad_token_id);
        let mut wrapper = build_training_wrapper::<B, _>(model, cfg.max_length, settings, device.clone())?;

        // ── Step 5: Previous weights ──────────────────────────────────────────
        if let Some(previous) = &cfg.previous_checkpoint {
            let restored = load_weights(wrapper.model().clone(), Path::new(previous), &device)?;
            wrapper.set_model(restored);

            let run = inspect_previous_run(Path::new(previous))?;
            match run.point {
                Some(p) => tracing::info!("Previous run stopped at epoch {} step {}", p.epoch, p.global_step),
                None    => tracing::info!("No latest.json next to '{}'", previous),
            }
            if let Some(prev) = run.config {
                if prev.model_name != cfg.model_name || prev.max_length != cfg.max_length {
                    tracing::warn!(
                        "Previous run used model '{}' at max_length {}; this run uses '{}' at {}",
                        prev.model_name,
                        prev.max_length,
                        cfg.model_name,
                        cfg.max_length
                    );
                }
            }
        }

        // ── Step 6: Run config + checkpoint callback ──────────────────────────
        let manager = CheckpointManager::new(&cfg.checkpoint_path)?;
        manager.save_config(cfg)?;
        let logger     = MetricsLogger::new(manager.dir())?;
        tracing::info!("Logging epoch metrics to '{}'", logger.csv_path().display());
        let checkpoint = ModelCheckpoint::new(manager, cfg.save_freq);

        // ── Step 7: Fit ───────────────────────────────────────────────────────
        let history = fit(&mut wrapper, &mut train_gen, &mut valid_gen, cfg.epochs, &checkpoint, Some(&logger))?;

        // ── Step 8: Final checkpoint ──────────────────────────────────────────
        let point = CheckpointPoint { epoch: cfg.epochs, global_step: train_gen.len() * cfg.epochs };
        checkpoint.manager().save(wrapper.model(), point)?;

        if let Some(last) = history.last() {
            tracing::info!(
                "Fine-tuning finished: val_loss={:.4}, val_acc={:.1}%, weights at '{}'",
                last.val_loss,
                last.val_acc * 100.0,
                checkpoint.manager().path().display()
            );
        }
        if let Some(best) = best_epoch(&history) {
            tracing::info!("Best val_loss {:.4} at epoch {}", best.val_loss, best.epoch);
        }

        Ok(wrapper)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::init_model_use_case::{InitModelConfig, InitModelUseCase};
    use burn::backend::{Autodiff, NdArray};
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn write_records(dir: &Path, name: &str, n: usize) -> String {
        let records: Vec<_> = (0..n)
            .map(|i| json!({
                "prompt": format!("Who directed film {i}?"),
                "target": format!("So the final answer is person{i}."),
                "answer": format!("person{i}"),
                "num_prompt_tokens": 5,
            }))
            .collect();
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn setup(dir: &TempDir) -> FinetuneConfig {
        let train_file = write_records(dir.path(), "self_ask_train.json", 6);
        let valid_file = write_records(dir.path(), "self_ask_dev.json", 4);
        let model_dir  = dir.path().join("model");

        InitModelUseCase::new(InitModelConfig {
            model_dir:   model_dir.to_string_lossy().into_owned(),
            train_file:  train_file.clone(),
            vocab_size:  200,
            max_seq_len: 16,
            d_model:     16,
            num_heads:   2,
            num_layers:  1,
            d_ff:        32,
            dropout:     0.0,
        })
        .execute()
        .unwrap();

        FinetuneConfig {
            model_name:      model_dir.to_string_lossy().into_owned(),
            train_file,
            valid_file,
            checkpoint_path: dir.path().join("ckpt/self_ask").to_string_lossy().into_owned(),
            max_length:      12,
            batch_size:      2,
            epochs:          1,
            save_freq:       SaveFrequency::Epoch,
            seed:            Some(1),
            ..FinetuneConfig::default()
        }
    }

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let cfg = FinetuneConfig::default();
        assert_eq!((cfg.max_length, cfg.batch_size, cfg.epochs), (128, 16, 2));
        assert_eq!(cfg.save_freq, SaveFrequency::Steps(1000));
        assert_eq!(cfg.learning_rate, 1e-3);
        assert!(cfg.shuffle && !cfg.cache_rows && !cfg.load_in_8bit);
    }

    #[test]
    fn test_finetune_writes_checkpoint_config_and_metrics() {
        let dir = TempDir::new().unwrap();
        let cfg = setup(&dir);

        let use_case = FinetuneUseCase::new(cfg.clone());
        use_case.execute::<TestBackend>(Default::default()).unwrap();

        let ckpt_dir = dir.path().join("ckpt");
        assert!(ckpt_dir.join("self_ask.mpk").exists());
        assert!(ckpt_dir.join("metrics.csv").exists());

        let manager = CheckpointManager::new(PathBuf::from(&cfg.checkpoint_path)).unwrap();
        let saved: FinetuneConfig = manager.load_config().unwrap();
        assert_eq!(saved.train_file, cfg.train_file);
        assert_eq!(saved.save_freq, SaveFrequency::Epoch);
        assert_eq!(saved.seed, Some(1));
        // 6 records / batch 2 → 3 steps in the single epoch
        assert_eq!(manager.latest().unwrap().global_step, 3);
    }

    #[test]
    fn test_finetune_resumes_from_previous_checkpoint() {
        let dir = TempDir::new().unwrap();
        let cfg = setup(&dir);
        FinetuneUseCase::new(cfg.clone()).execute::<TestBackend>(Default::default()).unwrap();

        let resumed = FinetuneConfig {
            previous_checkpoint: Some(cfg.checkpoint_path.clone()),
            checkpoint_path:     dir.path().join("ckpt2/run").to_string_lossy().into_owned(),
            ..cfg
        };
        FinetuneUseCase::new(resumed).execute::<TestBackend>(Default::default()).unwrap();
        assert!(dir.path().join("ckpt2/run.mpk").exists());
    }

    #[test]
    fn test_inspect_previous_run_reads_side_files() {
        let dir = TempDir::new().unwrap();
        let cfg = setup(&dir);
        FinetuneUseCase::new(cfg.clone()).execute::<TestBackend>(Default::default()).unwrap();

        let run = inspect_previous_run(Path::new(&cfg.checkpoint_path)).unwrap();
        assert_eq!(run.point, Some(CheckpointPoint { epoch: 1, global_step: 3 }));
        assert_eq!(run.config.unwrap().model_name, cfg.model_name);
    }

    #[test]
    fn test_inspect_previous_run_without_side_files() {
        let dir = TempDir::new().unwrap();
        let run = inspect_previous_run(&dir.path().join("bare/weights")).unwrap();
        assert_eq!(run, PreviousRun { point: None, config: None });
    }

    #[test]
    fn test_missing_train_file_fails() {
        let dir = TempDir::new().unwrap();
        let cfg = FinetuneConfig {
            train_file: dir.path().join("absent.json").to_string_lossy().into_owned(),
            ..setup(&dir)
        };
        assert!(FinetuneUseCase::new(cfg).execute::<TestBackend>(Default::default()).is_err());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let cfg = FinetuneConfig { batch_size: 0, ..FinetuneConfig::default() };
        assert!(FinetuneUseCase::new(cfg).execute::<TestBackend>(Default::default()).is_err());
    }
}
