// ============================================================
// Layer 2 — InitModelUseCase
// ============================================================
// Creates a model directory that `finetune --model-name` can
// load when no pretrained checkpoint is at hand:
//
//   Step 1: Read prompts and targets of a fine-tuning file   (Layer 4)
//   Step 2: Build or reuse a word-level tokenizer            (Layer 6)
//   Step 3: Write config.json sized to the tokenizer         (Layer 6)
//
// No weights are written. The first load initializes them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::loader::load_test_data;
use crate::data::splitter::qa_split;
use crate::domain::traits::TextTokenizer;
use crate::infra::{pretrained::save_config, tokenizer_store::TokenizerStore};
use crate::ml::model::Seq2SeqConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitModelConfig {
    pub model_dir:   String,
    /// Fine-tuning file whose prompts and targets seed the vocabulary
    pub train_file:  String,
    /// Upper bound on tokenizer entries, specials included
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl Default for InitModelConfig {
    fn default() -> Self {
        Self {
            model_dir:   "models/t5-small".to_string(),
            train_file:  "data/FinetuningData/self_ask_train.json".to_string(),
            vocab_size:  32000,
            max_seq_len: 512,
            d_model:     256,
            num_heads:   4,
            num_layers:  3,
            d_ff:        1024,
            dropout:     0.1,
        }
    }
}

pub struct InitModelUseCase {
    config: InitModelConfig,
}

impl InitModelUseCase {
    pub fn new(config: InitModelConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Seq2SeqConfig> {
        let cfg = &self.config;

        // ── Step 1: Corpus ────────────────────────────────────────────────────
        let examples = load_test_data(&cfg.train_file, None)?;
        let (prompts, targets) = qa_split(&examples)?;
        tracing::info!("Building vocabulary from {} records of '{}'", examples.len(), cfg.train_file);

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let texts: Vec<String> = prompts.into_iter().chain(targets).collect();
        let tokenizer = TokenizerStore::new(&cfg.model_dir).load_or_build(&texts, cfg.vocab_size)?;

        // ── Step 3: Model config ──────────────────────────────────────────────
        let model_config = Seq2SeqConfig::new(tokenizer.vocab_size(), cfg.max_seq_len)
            .with_d_model(cfg.d_model)
            .with_num_heads(cfg.num_heads)
            .with_num_layers(cfg.num_layers)
            .with_d_ff(cfg.d_ff)
            .with_dropout(cfg.dropout)
            .with_pad_token_id(tokenizer.pad_token_id() as usize)
            .with_decoder_start_token_id(tokenizer.pad_token_id() as usize);
        save_config(Path::new(&cfg.model_dir), &model_config)?;

        tracing::info!(
            "Initialized model directory '{}' (vocab={}, max_seq_len={})",
            cfg.model_dir,
            model_config.vocab_size,
            model_config.max_seq_len
        );
        Ok(model_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::pretrained::load_config;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_config_sized_to_tokenizer() {
        let dir   = TempDir::new().unwrap();
        let train = dir.path().join("train.json");
        std::fs::write(
            &train,
            json!([{"prompt": "Who is it?", "target": "So the answer is Ann."}]).to_string(),
        )
        .unwrap();

        let model_dir = dir.path().join("model");
        let config = InitModelUseCase::new(InitModelConfig {
            model_dir:  model_dir.to_string_lossy().into_owned(),
            train_file: train.to_string_lossy().into_owned(),
            ..InitModelConfig::default()
        })
        .execute()
        .unwrap();

        // specials + who, is, it, ?, so, the, answer, ann, .
        assert_eq!(config.vocab_size, 12);
        assert_eq!(config.pad_token_id, 0);
        assert_eq!(load_config(&model_dir).unwrap().vocab_size, 12);
        assert!(model_dir.join("tokenizer.json").exists());
    }

    #[test]
    fn test_records_without_prompt_are_rejected() {
        let dir   = TempDir::new().unwrap();
        let train = dir.path().join("train.json");
        std::fs::write(&train, json!([{"question": "q"}]).to_string()).unwrap();

        let result = InitModelUseCase::new(InitModelConfig {
            model_dir:  dir.path().join("model").to_string_lossy().into_owned(),
            train_file: train.to_string_lossy().into_owned(),
            ..InitModelConfig::default()
        })
        .execute();
        assert!(result.is_err());
    }
}
