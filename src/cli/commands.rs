// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Five subcommands:
//
//   show            print a summary of one dataset split
//   finetune        fine-tune a model directory on prompt/target files
//   init-model      create a model directory from a fine-tuning file
//   verify-answers  keep records whose answer appears in the prompt
//   filter-tokens   keep records under a prompt token budget
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{finetune_use_case::FinetuneConfig, init_model_use_case::InitModelConfig};
use crate::data::loader::{DatasetKind, DEFAULT_DATA_ROOT};
use crate::domain::example::Split;
use crate::infra::checkpoint::SaveFrequency;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a dataset split and print a summary of it
    Show(ShowArgs),

    /// Fine-tune a seq2seq model on prompt/target JSON files
    Finetune(FinetuneArgs),

    /// Create a model directory (config + tokenizer) from a fine-tuning file
    InitModel(InitModelArgs),

    /// Keep records whose extracted target answer appears in the prompt
    VerifyAnswers(FilterFilesArgs),

    /// Keep records with at most N prompt tokens
    FilterTokens(FilterTokensArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// 2wiki, hotpotqa, compositional-celebrities, finetuning[:direct|:self_ask], strategyqa
    #[arg(long)]
    pub dataset: DatasetKind,

    #[arg(long, default_value = "train")]
    pub split: Split,

    /// Keep only the first N records (0 keeps all)
    #[arg(long)]
    pub n_examples: Option<usize>,

    /// Root directory holding the dataset folders
    #[arg(long, default_value = DEFAULT_DATA_ROOT)]
    pub data_root: String,
}

#[derive(Args, Debug)]
pub struct FinetuneArgs {
    /// Model directory with config.json and tokenizer.json
    #[arg(long)]
    pub model_name: String,

    #[arg(long, default_value = "data/FinetuningData/self_ask_train.json")]
    pub train_file: String,

    #[arg(long, default_value = "data/FinetuningData/self_ask_dev.json")]
    pub valid_file: String,

    /// Checkpoint file stem; side files go in its directory
    #[arg(long, default_value = "checkpoints/self_ask")]
    pub checkpoint_path: String,

    /// Token width of prompts and targets
    #[arg(long, default_value_t = 128)]
    pub max_length: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 2)]
    pub epochs: usize,

    /// Accepted for compatibility; weights always load in full precision
    #[arg(long)]
    pub load_in_8bit: bool,

    /// Checkpoint stem to restore weights from before training
    #[arg(long)]
    pub previous_checkpoint: Option<String>,

    /// `epoch`, or a number of optimizer steps between saves
    #[arg(long, default_value = "1000")]
    pub save_freq: SaveFrequency,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Keep the file order instead of reshuffling every epoch
    #[arg(long)]
    pub no_shuffle: bool,

    /// Keep parsed records in memory instead of re-reading per batch
    #[arg(long)]
    pub cache_rows: bool,

    /// Seed for the shuffling RNG
    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<FinetuneArgs> for FinetuneConfig {
    fn from(a: FinetuneArgs) -> Self {
        FinetuneConfig {
            model_name:          a.model_name,
            train_file:          a.train_file,
            valid_file:          a.valid_file,
            checkpoint_path:     a.checkpoint_path,
            max_length:          a.max_length,
            batch_size:          a.batch_size,
            epochs:              a.epochs,
            load_in_8bit:        a.load_in_8bit,
            previous_checkpoint: a.previous_checkpoint,
            save_freq:           a.save_freq,
            learning_rate:       a.learning_rate,
            shuffle:             !a.no_shuffle,
            cache_rows:          a.cache_rows,
            seed:                a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct InitModelArgs {
    /// Directory to create
    #[arg(long)]
    pub model_dir: String,

    #[arg(long, default_value = "data/FinetuningData/self_ask_train.json")]
    pub train_file: String,

    #[arg(long, default_value_t = 32000)]
    pub vocab_size: usize,

    /// Longest sequence the position embeddings cover
    #[arg(long, default_value_t = 512)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    /// Layers in each of the encoder and decoder stacks
    #[arg(long, default_value_t = 3)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

impl From<InitModelArgs> for InitModelConfig {
    fn from(a: InitModelArgs) -> Self {
        InitModelConfig {
            model_dir:   a.model_dir,
            train_file:  a.train_file,
            vocab_size:  a.vocab_size,
            max_seq_len: a.max_seq_len,
            d_model:     a.d_model,
            num_heads:   a.num_heads,
            num_layers:  a.num_layers,
            d_ff:        a.d_ff,
            dropout:     a.dropout,
        }
    }
}

#[derive(Args, Debug)]
pub struct FilterFilesArgs {
    #[arg(long)]
    pub train_file: String,

    #[arg(long)]
    pub valid_file: String,
}

#[derive(Args, Debug)]
pub struct FilterTokensArgs {
    #[command(flatten)]
    pub files: FilterFilesArgs,

    /// Largest `num_prompt_tokens` to keep
    #[arg(long)]
    pub token_size: u64,
}
