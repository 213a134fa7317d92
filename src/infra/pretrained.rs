// ============================================================
// Layer 6 — Pretrained Model Store
// ============================================================
// A model name is a directory:
//
//   models/t5-small-local/
//     config.json       ← Seq2SeqConfig (required)
//     tokenizer.json    ← HuggingFace tokenizer (required)
//     model.mpk         ← CompactRecorder weights (optional)
//
// Without model.mpk the model starts from fresh initialization,
// which is what `init-model` produces.
//
// Reference: Burn Book §5 (Records)

use anyhow::{ensure, Context, Result};
use burn::prelude::*;
use std::{fs, path::Path};

use crate::domain::traits::TextTokenizer;
use crate::infra::checkpoint::load_weights;
use crate::infra::tokenizer_store::{HfTokenizer, TokenizerStore};
use crate::ml::model::{Seq2SeqConfig, Seq2SeqTransformer};

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_STEM: &str = "model";

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Accepted for compatibility. Weights always load in full precision.
    pub load_in_8bit: bool,
}

pub struct PretrainedModel<B: Backend> {
    pub config:    Seq2SeqConfig,
    pub model:     Seq2SeqTransformer<B>,
    pub tokenizer: HfTokenizer,
}

pub fn from_pretrained<B: Backend>(
    model_dir: &Path,
    options:   LoadOptions,
    device:    &B::Device,
) -> Result<PretrainedModel<B>> {
    ensure!(model_dir.is_dir(), "Model directory '{}' does not exist", model_dir.display());

    let config    = load_config(model_dir)?;
    let tokenizer = TokenizerStore::new(model_dir).load()?;
    ensure!(
        tokenizer.vocab_size() <= config.vocab_size,
        "Tokenizer has {} entries but the model only embeds {}",
        tokenizer.vocab_size(),
        config.vocab_size
    );

    if options.load_in_8bit {
        tracing::warn!("8-bit loading is not supported by this backend; loading full precision");
    }

    let model   = config.init::<B>(device);
    let weights = model_dir.join(WEIGHTS_STEM);
    let model = if model_dir.join(format!("{WEIGHTS_STEM}.mpk")).exists() {
        load_weights(model, &weights, device)?
    } else {
        tracing::warn!("No weights in '{}'; starting from fresh initialization", model_dir.display());
        model
    };

    tracing::info!(
        "Loaded model '{}': {} layers, d_model={}, vocab={}",
        model_dir.display(),
        config.num_layers,
        config.d_model,
        config.vocab_size
    );

    Ok(PretrainedModel { config, model, tokenizer })
}

pub fn load_config(model_dir: &Path) -> Result<Seq2SeqConfig> {
    let path = model_dir.join(CONFIG_FILE);
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed model config '{}'", path.display()))
}

pub fn save_config(model_dir: &Path, config: &Seq2SeqConfig) -> Result<()> {
    fs::create_dir_all(model_dir)
        .with_context(|| format!("Cannot create '{}'", model_dir.display()))?;
    let path = model_dir.join(CONFIG_FILE);
    fs::write(&path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("Cannot write model config '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::{CheckpointManager, CheckpointPoint};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn model_dir(vocab_size: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        TokenizerStore::new(dir.path())
            .build_and_save(&["the answer is here".to_string()], 100)
            .unwrap();
        let config = Seq2SeqConfig::new(vocab_size, 8)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(16);
        save_config(dir.path(), &config).unwrap();
        dir
    }

    #[test]
    fn test_loads_without_weights() {
        let dir    = model_dir(32);
        let loaded = from_pretrained::<TestBackend>(dir.path(), LoadOptions::default(), &Default::default()).unwrap();
        assert_eq!(loaded.config.vocab_size, 32);
        assert_eq!(loaded.tokenizer.pad_token_id(), 0);
    }

    #[test]
    fn test_loads_saved_weights() {
        let dir    = model_dir(32);
        let first  = from_pretrained::<TestBackend>(dir.path(), LoadOptions::default(), &Default::default()).unwrap();
        CheckpointManager::new(dir.path().join(WEIGHTS_STEM))
            .unwrap()
            .save(&first.model, CheckpointPoint { epoch: 0, global_step: 0 })
            .unwrap();

        let options = LoadOptions { load_in_8bit: true };
        let second  = from_pretrained::<TestBackend>(dir.path(), options, &Default::default()).unwrap();

        let weights = |m: &Seq2SeqTransformer<TestBackend>| {
            m.lm_head.weight.val().into_data().convert::<f32>().to_vec::<f32>().unwrap()
        };
        assert_eq!(weights(&first.model), weights(&second.model));
    }

    #[test]
    fn test_rejects_tokenizer_larger_than_embedding() {
        // tokenizer has 3 specials + 4 words
        let dir = model_dir(5);
        assert!(from_pretrained::<TestBackend>(dir.path(), LoadOptions::default(), &Default::default()).is_err());
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(from_pretrained::<TestBackend>(&missing, LoadOptions::default(), &Default::default()).is_err());
    }
}
