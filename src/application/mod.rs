// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Each use case wires the lower layers together for one
// command. No model math and no printing here.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Fine-tuning a model directory on prompt/target files
pub mod finetune_use_case;

/// Creating a model directory from a fine-tuning file
pub mod init_model_use_case;

/// Dataset inspection and post-processing filters
pub mod dataset_use_case;
