// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the HuggingFace `tokenizer.json` of a model directory,
// or builds a word-level one from fine-tuning texts.
//
// tokenizers 0.15 can't train a WordLevel model through the
// generic trainer API without a ModelWrapper mismatch, so the
// vocabulary is counted here and the tokenizer JSON is written
// out directly, then loaded back.
//
// Built tokenizers follow the T5 layout:
//
//   <pad> = 0    padding, and the decoder start token
//   </s>  = 1    appended to every encoded sequence
//   <unk> = 2    out-of-vocabulary words
//   3..          corpus words, most frequent first
//
// Reference: HuggingFace tokenizers, tokenizer.json format

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::{collections::HashMap, fs, path::PathBuf};
use tokenizers::{
    PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams,
};

use crate::domain::traits::{TextTokenizer, TokenizedText};

pub const TOKENIZER_FILE: &str = "tokenizer.json";

const PAD: &str = "<pad>";
const EOS: &str = "</s>";
const UNK: &str = "<unk>";
const SPECIALS: [&str; 3] = [PAD, EOS, UNK];

// ─── HfTokenizer ──────────────────────────────────────────────────────────────
/// `TextTokenizer` over a HuggingFace tokenizer.
#[derive(Clone)]
pub struct HfTokenizer {
    inner:     Tokenizer,
    pad_id:    u32,
    pad_token: String,
}

impl HfTokenizer {
    /// Padding uses `<pad>`, else `[PAD]`, else id 0.
    pub fn new(inner: Tokenizer) -> Self {
        let (pad_id, pad_token) = ["<pad>", "[PAD]"]
            .iter()
            .find_map(|t| inner.token_to_id(t).map(|id| (id, t.to_string())))
            .unwrap_or((0, PAD.to_string()));
        Self { inner, pad_id, pad_token }
    }
}

#[cfg(test)]
impl HfTokenizer {
    pub fn inner(&self) -> &Tokenizer {
        &self.inner
    }
}

impl TextTokenizer for HfTokenizer {
    fn batch_encode(&self, texts: &[String], max_length: usize) -> Result<TokenizedText> {
        let mut tok = self.inner.clone();
        tok.with_padding(Some(PaddingParams {
            strategy:  PaddingStrategy::Fixed(max_length),
            direction: PaddingDirection::Right,
            pad_id:    self.pad_id,
            pad_token: self.pad_token.clone(),
            ..Default::default()
        }));
        tok.with_truncation(Some(TruncationParams { max_length, ..Default::default() }))
            .map_err(|e| anyhow!("Invalid truncation length {max_length}: {e}"))?;

        let encodings = tok
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("Tokenization failed: {e}"))?;

        Ok(TokenizedText {
            input_ids:      encodings.iter().map(|e| e.get_ids().to_vec()).collect(),
            attention_mask: encodings.iter().map(|e| e.get_attention_mask().to_vec()).collect(),
        })
    }

    fn pad_token_id(&self) -> u32 {
        self.pad_id
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Reuse a tokenizer already in the directory, else build one.
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<HfTokenizer> {
        if self.exists() {
            tracing::info!("Reusing existing tokenizer in '{}'", self.dir.display());
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<HfTokenizer> {
        let path = self.path();
        let tok = Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))?;
        tracing::info!("Loaded tokenizer from '{}'", path.display());
        Ok(HfTokenizer::new(tok))
    }

    /// Count words over `texts`, keep the `vocab_size - 3` most frequent,
    /// write `tokenizer.json` and load it back.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<HfTokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let words = top_words(texts, vocab_size.saturating_sub(SPECIALS.len()));

        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIALS.iter().enumerate() {
            vocab.insert(token.to_string(), id.into());
        }
        for word in &words {
            let id = vocab.len();
            vocab.entry(word.clone()).or_insert_with(|| id.into());
        }
        let size = vocab.len();

        let added_tokens: Vec<_> = SPECIALS
            .iter()
            .enumerate()
            .map(|(id, token)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let eos_piece = serde_json::json!({"SpecialToken": {"id": EOS, "type_id": 0}});
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": {
                "type": "TemplateProcessing",
                "single": [{"Sequence": {"id": "A", "type_id": 0}}, eos_piece.clone()],
                "pair": [
                    {"Sequence": {"id": "A", "type_id": 0}}, eos_piece.clone(),
                    {"Sequence": {"id": "B", "type_id": 0}}, eos_piece
                ],
                "special_tokens": {
                    EOS: {"id": EOS, "ids": [1], "tokens": [EOS]}
                }
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK
            }
        });

        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!("Tokenizer built with {} entries, saved to '{}'", size, path.display());
        self.load()
    }
}

/// Split like the `Whitespace` pre-tokenizer after lowercasing, then
/// rank by frequency. Ties break alphabetically so builds are repeatable.
fn top_words(texts: &[String], limit: usize) -> Vec<String> {
    let splitter = word_pattern();
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        let lower = text.to_lowercase();
        for m in splitter.find_iter(&lower) {
            *freq.entry(m.as_str().to_string()).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(limit);
    words.into_iter().map(|(w, _)| w).collect()
}

fn word_pattern() -> Regex {
    // same split as tokenizers' Whitespace pre-tokenizer
    Regex::new(r"\w+|[^\w\s]+").expect("word pattern is valid")
}
