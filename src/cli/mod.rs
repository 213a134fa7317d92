// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to a
// use case in Layer 2. Printing results happens here; the use
// cases only return them.
//
// Training runs on Autodiff<Wgpu>. Everything else is plain
// file processing and needs no device.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};
use clap::Parser;
use commands::{Commands, FilterFilesArgs, FilterTokensArgs, FinetuneArgs, InitModelArgs, ShowArgs};

use crate::application::{
    dataset_use_case::DatasetUseCase, finetune_use_case::FinetuneUseCase,
    init_model_use_case::InitModelUseCase,
};
use crate::data::filters::FilterReport;
use crate::data::loader::{DatasetLoader, DatasetPaths, DEFAULT_DATA_ROOT};

type TrainBackend = Autodiff<Wgpu>;

#[derive(Parser, Debug)]
#[command(
    name = "multihop-qa",
    version = "0.1.0",
    about = "Load multi-hop QA datasets, fine-tune seq2seq models on them, and filter fine-tuning data."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Show(args)          => run_show(args),
            Commands::Finetune(args)      => run_finetune(args),
            Commands::InitModel(args)     => run_init_model(args),
            Commands::VerifyAnswers(args) => run_verify(args),
            Commands::FilterTokens(args)  => run_filter_tokens(args),
        }
    }
}

// verify-answers and filter-tokens take explicit file paths, so only
// `show` needs a data root.
fn dataset_use_case(data_root: &str) -> DatasetUseCase {
    DatasetUseCase::new(DatasetLoader::new(DatasetPaths::new(data_root)))
}

fn run_show(args: ShowArgs) -> Result<()> {
    let summary = dataset_use_case(&args.data_root).show(args.dataset, args.split, args.n_examples)?;

    println!("Dataset: {} ({})", summary.kind, summary.split);
    println!("File:    {}", summary.path.display());
    println!("Records: {}", summary.count);
    println!("Keys:    {}", summary.keys.join(", "));
    if !summary.answers.is_empty() {
        println!("Answers: {}", summary.answers.join(" | "));
    }
    if let Some(first) = summary.first {
        println!("\nFirst record:\n{}", serde_json::to_string_pretty(&first)?);
    }
    Ok(())
}

fn run_finetune(args: FinetuneArgs) -> Result<()> {
    tracing::info!("Fine-tuning '{}' on '{}'", args.model_name, args.train_file);

    let use_case = FinetuneUseCase::new(args.into());
    let device   = WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    use_case.execute::<TrainBackend>(device)?;

    println!("Fine-tuning complete. Checkpoint saved to '{}'.", use_case.config().checkpoint_path);
    Ok(())
}

fn run_init_model(args: InitModelArgs) -> Result<()> {
    let model_dir = args.model_dir.clone();
    let config    = InitModelUseCase::new(args.into()).execute()?;
    println!(
        "Model directory '{}' ready (vocab {}, max length {}).",
        model_dir, config.vocab_size, config.max_seq_len
    );
    Ok(())
}

fn run_verify(args: FilterFilesArgs) -> Result<()> {
    let reports = dataset_use_case(DEFAULT_DATA_ROOT).verify_answers(&args.train_file, &args.valid_file)?;
    print_reports(&reports);
    Ok(())
}

fn run_filter_tokens(args: FilterTokensArgs) -> Result<()> {
    let reports = dataset_use_case(DEFAULT_DATA_ROOT).filter_tokens(
        &args.files.train_file,
        &args.files.valid_file,
        args.token_size,
    )?;
    print_reports(&reports);
    Ok(())
}

fn print_reports(reports: &[FilterReport]) {
    for r in reports {
        println!(
            "{} → {}: kept {}/{} ({} dropped)",
            r.input.display(),
            r.output.display(),
            r.kept,
            r.total,
            r.dropped()
        );
    }
}
