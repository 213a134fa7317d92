// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// A checkpoint path names a file stem; the recorder adds its
// own extension:
//
//   checkpoints/
//     self_ask.mpk            ← weights (overwritten on each save)
//     self_ask.latest.json    ← {"epoch": 2, "global_step": 4000}
//     train_config.json       ← hyper-parameters of the run
//     metrics.csv             ← see metrics.rs
//
// Only weights are saved, never optimizer state. Resuming a run
// means building a fresh wrapper and restoring weights into it
// (`--previous-checkpoint`), so a resumed run restarts Adam's
// moment estimates.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Where in training a checkpoint was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointPoint {
    pub epoch:       usize,
    pub global_step: usize,
}

pub struct CheckpointManager {
    /// File stem for the weights, e.g. `checkpoints/self_ask`
    path: PathBuf,
}

impl CheckpointManager {
    /// Creates the parent directory if it doesn't already exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dir  = run_dir(&path);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the checkpoint and its side files.
    pub fn dir(&self) -> PathBuf {
        run_dir(&self.path)
    }

    /// Save weights and point `latest` at them.
    pub fn save<B: Backend, M: Module<B>>(&self, model: &M, point: CheckpointPoint) -> Result<()> {
        Recorder::<B>::record(&CompactRecorder::new(), model.clone().into_record(), self.path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", self.path.display()))?;

        let latest = self.latest_path();
        fs::write(&latest, serde_json::to_string(&point)?)
            .with_context(|| format!("Failed to write '{}'", latest.display()))?;

        tracing::debug!("Saved checkpoint at epoch {} step {}", point.epoch, point.global_step);
        Ok(())
    }

    /// Where the most recent save happened.
    pub fn latest(&self) -> Result<CheckpointPoint> {
        let latest = self.latest_path();
        let s = fs::read_to_string(&latest)
            .with_context(|| format!("Cannot find '{}'. Has a checkpoint been saved yet?", latest.display()))?;
        Ok(serde_json::from_str(&s)?)
    }

    /// Save the run configuration next to the checkpoint.
    pub fn save_config<C: Serialize>(&self, cfg: &C) -> Result<()> {
        let path = self.dir().join("train_config.json");
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<C: for<'de> Deserialize<'de>>(&self) -> Result<C> {
        let path = self.dir().join("train_config.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn latest_path(&self) -> PathBuf {
        self.path.with_extension("latest.json")
    }
}

/// Restore weights saved at `path` (stem or full `.mpk` path) into `model`.
/// The architecture must match the one that was saved.
pub fn load_weights<B: Backend, M: Module<B>>(model: M, path: &Path, device: &B::Device) -> Result<M> {
    let record: M::Record = Recorder::<B>::load(&CompactRecorder::new(), path.to_path_buf(), device)
        .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;

    tracing::info!("Restored weights from '{}'", path.display());
    Ok(model.load_record(record))
}

fn run_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// ─── Save frequency ───────────────────────────────────────────────────────────
/// How often the checkpoint callback writes weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveFrequency {
    /// At the end of every epoch.
    Epoch,
    /// Every N optimizer steps.
    Steps(usize),
}

impl Default for SaveFrequency {
    fn default() -> Self {
        SaveFrequency::Steps(1000)
    }
}

impl fmt::Display for SaveFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveFrequency::Epoch    => f.write_str("epoch"),
            SaveFrequency::Steps(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for SaveFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "epoch" {
            return Ok(SaveFrequency::Epoch);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(SaveFrequency::Steps(n)),
            _ => Err(format!("invalid save frequency '{s}' (expected 'epoch' or a positive step count)")),
        }
    }
}

// ─── ModelCheckpoint callback ─────────────────────────────────────────────────
/// Called by the fit loop after every step and every epoch.
pub struct ModelCheckpoint {
    manager:   CheckpointManager,
    frequency: SaveFrequency,
}

impl ModelCheckpoint {
    pub fn new(manager: CheckpointManager, frequency: SaveFrequency) -> Self {
        Self { manager, frequency }
    }

    pub fn manager(&self) -> &CheckpointManager {
        &self.manager
    }

    /// `global_step` counts optimizer steps from 1.
    pub fn on_batch_end<B: Backend, M: Module<B>>(
        &self,
        model:       &M,
        epoch:       usize,
        global_step: usize,
    ) -> Result<bool> {
        match self.frequency {
            SaveFrequency::Steps(n) if global_step % n == 0 => {
                self.manager.save(model, CheckpointPoint { epoch, global_step })?;
                tracing::info!("Checkpoint saved at step {}", global_step);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn on_epoch_end<B: Backend, M: Module<B>>(
        &self,
        model:       &M,
        epoch:       usize,
        global_step: usize,
    ) -> Result<bool> {
        if self.frequency == SaveFrequency::Epoch {
            self.manager.save(model, CheckpointPoint { epoch, global_step })?;
            tracing::info!("Checkpoint saved for epoch {}", epoch);
            return Ok(true);
        }
        Ok(false)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{Seq2SeqConfig, Seq2SeqTransformer};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn tiny_model() -> Seq2SeqTransformer<TestBackend> {
        Seq2SeqConfig::new(16, 4)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(16)
            .init(&Default::default())
    }

    fn lm_head_weights(model: &Seq2SeqTransformer<TestBackend>) -> Vec<f32> {
        model.lm_head.weight.val().into_data().convert::<f32>().to_vec().unwrap()
    }

    #[test]
    fn test_save_frequency_parsing() {
        assert_eq!("epoch".parse::<SaveFrequency>().unwrap(), SaveFrequency::Epoch);
        assert_eq!("1000".parse::<SaveFrequency>().unwrap(), SaveFrequency::Steps(1000));
        assert!("0".parse::<SaveFrequency>().is_err());
        assert!("often".parse::<SaveFrequency>().is_err());
    }

    #[test]
    fn test_save_then_restore_weights() {
        let dir     = TempDir::new().unwrap();
        let manager = CheckpointManager::new(dir.path().join("run/model")).unwrap();
        let saved   = tiny_model();

        manager.save(&saved, CheckpointPoint { epoch: 1, global_step: 10 }).unwrap();
        assert_eq!(manager.latest().unwrap(), CheckpointPoint { epoch: 1, global_step: 10 });

        let fresh    = tiny_model();
        let restored = load_weights(fresh, manager.path(), &Default::default()).unwrap();
        assert_eq!(lm_head_weights(&restored), lm_head_weights(&saved));
    }

    #[test]
    fn test_step_callback_saves_on_multiples() {
        let dir      = TempDir::new().unwrap();
        let callback = ModelCheckpoint::new(
            CheckpointManager::new(dir.path().join("ckpt")).unwrap(),
            SaveFrequency::Steps(3),
        );
        let model = tiny_model();

        let saved: Vec<bool> = (1..=6)
            .map(|step| callback.on_batch_end(&model, 1, step).unwrap())
            .collect();
        assert_eq!(saved, vec![false, false, true, false, false, true]);
        assert!(!callback.on_epoch_end(&model, 1, 6).unwrap());
        assert_eq!(callback.manager().latest().unwrap().global_step, 6);
    }

    #[test]
    fn test_epoch_callback_ignores_steps() {
        let dir      = TempDir::new().unwrap();
        let callback = ModelCheckpoint::new(
            CheckpointManager::new(dir.path().join("ckpt")).unwrap(),
            SaveFrequency::Epoch,
        );
        let model = tiny_model();

        assert!(!callback.on_batch_end(&model, 1, 1000).unwrap());
        assert!(callback.on_epoch_end(&model, 2, 1234).unwrap());
        assert_eq!(callback.manager().latest().unwrap().epoch, 2);
    }

    #[test]
    fn test_missing_latest_is_error() {
        let dir     = TempDir::new().unwrap();
        let manager = CheckpointManager::new(dir.path().join("never_saved")).unwrap();
        assert!(manager.latest().is_err());
    }

    #[test]
    fn test_config_saved_next_to_checkpoint() {
        let dir     = TempDir::new().unwrap();
        let manager = CheckpointManager::new(dir.path().join("ckpt")).unwrap();
        manager.save_config(&serde_json::json!({"epochs": 2})).unwrap();

        let back: serde_json::Value = manager.load_config().unwrap();
        assert_eq!(back["epochs"], 2);
        assert!(dir.path().join("train_config.json").exists());
    }
}
