// ============================================================
// Layer 4 — Multi-hop QA Data Generator
// ============================================================
// An indexable, finite sequence of encoded batches backed by a
// JSON file of fine-tuning records.
//
//   len()          = n_examples / batch_size   (tail is dropped)
//   item(i)        = encode(rows[order[i*bs .. (i+1)*bs]])
//   on_epoch_end() = reshuffle `order` if shuffling is enabled
//   epoch()        = item(0), item(1), ..., then on_epoch_end()
//
// Example: 50 records, batch_size 16 → 3 batches per epoch,
// records at positions 48 and 49 of the row order never appear
// in that epoch. With shuffling on, a different pair is left
// out next epoch.
//
// The backing file is read again on every item() call unless
// `cache_rows` is set. Re-reading keeps memory flat for large
// files; caching trades that for speed. Both produce the same
// batches in the same order.
//
// Reference: Rust Book §13 (Iterators)
//            rand crate documentation (SliceRandom)

use anyhow::{ensure, Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::{Path, PathBuf};

use crate::data::encoder::{preprocess_data, EncodedBatch};
use crate::data::loader::read_examples;
use crate::domain::error::DataError;
use crate::domain::example::Example;
use crate::domain::text_pair::TextPair;
use crate::domain::traits::{LabelShifter, TextTokenizer};

/// Knobs for one generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub max_length: usize,
    pub batch_size: usize,
    pub shuffle:    bool,
    /// Keep the parsed file in memory after the first read.
    pub cache_rows: bool,
    /// Seed for the row-order RNG; `None` seeds from the OS.
    pub seed:       Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_length: 512,
            batch_size: 16,
            shuffle:    true,
            cache_rows: false,
            seed:       None,
        }
    }
}

pub struct MultihopQaDataGenerator<'a> {
    tokenizer:  &'a dyn TextTokenizer,
    shifter:    &'a dyn LabelShifter,
    n_examples: usize,
    data_file:  PathBuf,
    config:     GeneratorConfig,
    row_order:  Vec<usize>,
    rng:        StdRng,
    cached:     Option<Vec<Example>>,
}

impl<'a> MultihopQaDataGenerator<'a> {
    /// `n_examples` is how many records of `data_file` take part;
    /// callers count them once up front (see `loader::count_examples`).
    pub fn new(
        tokenizer:  &'a dyn TextTokenizer,
        shifter:    &'a dyn LabelShifter,
        n_examples: usize,
        data_file:  impl Into<PathBuf>,
        config:     GeneratorConfig,
    ) -> Result<Self> {
        ensure!(config.batch_size > 0, "batch_size must be at least 1");

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };

        let mut generator = Self {
            tokenizer,
            shifter,
            n_examples,
            data_file: data_file.into(),
            config,
            row_order: (0..n_examples).collect(),
            rng,
            cached: None,
        };
        // Start the first epoch with a shuffled order, same as every later one
        generator.on_epoch_end();
        Ok(generator)
    }

    /// Number of full batches per epoch.
    pub fn len(&self) -> usize {
        self.n_examples / self.config.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Encode batch `index` of the current epoch.
    pub fn item(&mut self, index: usize) -> Result<EncodedBatch> {
        let len = self.len();
        if index >= len {
            return Err(DataError::BatchOutOfRange { index, len }.into());
        }

        let batch_start = index * self.config.batch_size;
        let batch_end   = batch_start + self.config.batch_size;

        if self.config.cache_rows && self.cached.is_none() {
            self.cached = Some(read_examples(&self.data_file)?);
        }

        let fresh;
        let rows: &[Example] = match &self.cached {
            Some(rows) => rows,
            None => {
                fresh = read_examples(&self.data_file)?;
                &fresh
            }
        };

        let pairs = self.row_order[batch_start..batch_end]
            .iter()
            .map(|&row| {
                let example = rows.get(row).with_context(|| {
                    format!(
                        "'{}' has {} records but the generator expects {}",
                        self.data_file.display(),
                        rows.len(),
                        self.n_examples
                    )
                })?;
                Ok(TextPair::from_example(example, row)?)
            })
            .collect::<Result<Vec<_>>>()?;

        preprocess_data(&pairs, self.tokenizer, self.shifter, self.config.max_length)
    }

    /// Reshuffle the row order if shuffling is enabled.
    pub fn on_epoch_end(&mut self) {
        if self.config.shuffle {
            self.row_order.shuffle(&mut self.rng);
        }
    }

    /// Iterate one epoch of batches. `on_epoch_end` runs once the last
    /// batch has been taken and the iterator is polled again.
    pub fn epoch(&mut self) -> EpochIter<'_, 'a> {
        EpochIter { generator: self, next: 0, finished: false }
    }
}

#[cfg(test)]
impl MultihopQaDataGenerator<'_> {
    /// Current permutation of record indices.
    pub fn row_order(&self) -> &[usize] {
        &self.row_order
    }
}

/// Batches of one epoch; see [`MultihopQaDataGenerator::epoch`].
pub struct EpochIter<'g, 'a> {
    generator: &'g mut MultihopQaDataGenerator<'a>,
    next:      usize,
    finished:  bool,
}

impl Iterator for EpochIter<'_, '_> {
    type Item = Result<EncodedBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.generator.len();

        if self.next < len {
            let batch = self.generator.item(self.next);
            self.next += 1;
            return Some(batch);
        }

        if !self.finished {
            self.finished = true;
            if len > 0 {
                self.generator.on_epoch_end();
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.generator.len().saturating_sub(self.next);
        (left, Some(left))
    }
}
