// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model math lives here.
//
//   model.rs    — encoder-decoder transformer and its config;
//                 the config also supplies the decoder shift
//
//   wrapper.rs  — model + Adam + cross-entropy + token accuracy,
//                 one train_step / evaluate at a time
//
//   trainer.rs  — the fit loop over two data generators, with
//                 checkpoint and metrics callbacks
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

/// Seq2seq transformer architecture
pub mod model;

/// Trainable wrapper with optimizer, loss and metric
pub mod wrapper;

/// Epoch loop with validation and checkpointing
pub mod trainer;
