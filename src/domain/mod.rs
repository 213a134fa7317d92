// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer:
//
//   example.rs    — a dataset record, splits and strategies
//   text_pair.rs  — one (prompt, target) training pair
//   error.rs      — typed errors of the data layer
//   traits.rs     — the tokenizer and label-shift seams
//
// Rules for this layer:
//   - No Burn types, no clap
//   - No file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod error;

pub mod example;

pub mod text_pair;

// Core abstractions (traits) that other layers implement
pub mod traits;
