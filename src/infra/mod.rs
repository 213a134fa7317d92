// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence used by several layers:
//
//   pretrained.rs      — model directories: config.json,
//                        tokenizer.json and optional weights
//
//   tokenizer_store.rs — loads a HuggingFace tokenizer or builds
//                        a word-level one from fine-tuning text
//
//   checkpoint.rs      — CompactRecorder weights, a pointer to
//                        the latest save, the run config, and
//                        the step/epoch checkpoint callback
//
//   metrics.rs         — per-epoch loss/accuracy CSV
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

pub mod checkpoint;

pub mod metrics;

pub mod pretrained;

pub mod tokenizer_store;
