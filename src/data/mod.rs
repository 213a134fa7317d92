// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between JSON files on disk and device-ready
// tensor batches:
//
//   dataset JSON files
//       │
//       ▼
//   loader          → parses records, optional first-N cap
//       │
//       ├──► splitter   → (prompts, targets[, answers]) columns
//       ├──► filters    → answer-verified / token-budget subsets
//       │
//       ▼
//   generator       → row order, shuffling, one batch at a time
//       │
//       ▼
//   encoder         → tokenize + shift labels (teacher forcing)
//       │
//       ▼
//   batcher         → Int tensors on the training device
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads dataset splits from a data root
pub mod loader;

/// Column extraction from fine-tuning records
pub mod splitter;

/// Post-processing filters over generated fine-tuning files
pub mod filters;

/// Text pairs → fixed-width encoded arrays
pub mod encoder;

/// Batched, shuffled access to a fine-tuning file
pub mod generator;

/// Encoded arrays → Burn tensors
pub mod batcher;
