// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the gloss model with Burn's CompactRecorder.
//
// One checkpoint is two files next to each other:
//
//   checkpoints/
//     gloss_model.mpk    ← model weights (recorder adds the extension)
//     gloss_model.json   ← GlossModelConfig, to rebuild the model
//
// The pipeline only gates on the weights file:
//   - decode / evaluate: load it if present, otherwise start from a
//     freshly initialised model (logged as a warning)
//   - segmentation:      it must exist, the run aborts otherwise
//
// A stored config whose feature dim or vocabulary size disagrees
// with the current data is a configuration mismatch and fails
// the load.

use anyhow::{bail, ensure, Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{fs, path::{Path, PathBuf}};

use crate::ml::model::{GlossModel, GlossModelConfig};

pub struct CheckpointManager {
    /// Checkpoint path without extension
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn weights_path(&self) -> PathBuf {
        self.path.with_extension("mpk")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.with_extension("json")
    }

    /// Whether a trained model is available.
    pub fn exists(&self) -> bool {
        self.weights_path().exists()
    }

    /// Write weights and config.
    #[cfg(test)]
    pub fn save<B: Backend>(&self, model: &GlossModel<B>, cfg: &GlossModelConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        CompactRecorder::new()
            .record(model.clone().into_record(), self.path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", self.path.display())
            })?;

        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(self.config_path(), json)
            .with_context(|| format!("Cannot write '{}'", self.config_path().display()))?;

        tracing::debug!("Saved checkpoint '{}'", self.path.display());
        Ok(())
    }

    /// Read the stored model config.
    pub fn load_config(&self) -> Result<GlossModelConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Load the stored model, checking it fits `expected`'s data shape.
    pub fn load<B: Backend>(
        &self,
        expected: &GlossModelConfig,
        device:   &B::Device,
    ) -> Result<(GlossModel<B>, GlossModelConfig)> {
        let cfg = self.load_config()?;
        ensure!(
            cfg.feature_dim == expected.feature_dim,
            "checkpoint expects {}-dim features, data has {}",
            cfg.feature_dim,
            expected.feature_dim
        );
        ensure!(
            cfg.vocab_size == expected.vocab_size,
            "checkpoint has {} classes, vocabulary has {}",
            cfg.vocab_size,
            expected.vocab_size
        );

        let record = CompactRecorder::new()
            .load(self.path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", self.path.display()))?;

        let model = cfg.init::<B>(device).load_record(record);
        tracing::info!("Model loaded from '{}'", self.weights_path().display());
        Ok((model, cfg))
    }

    /// Load if a checkpoint exists, otherwise initialise from `fallback`.
    pub fn load_or_init<B: Backend>(
        &self,
        fallback: &GlossModelConfig,
        device:   &B::Device,
    ) -> Result<(GlossModel<B>, GlossModelConfig)> {
        if self.exists() {
            return self.load(fallback, device);
        }

        tracing::warn!(
            "No checkpoint at '{}'; using an untrained model",
            self.weights_path().display()
        );
        Ok((fallback.init(device), fallback.clone()))
    }

    /// Load a checkpoint that must exist.
    pub fn require<B: Backend>(
        &self,
        expected: &GlossModelConfig,
        device:   &B::Device,
    ) -> Result<(GlossModel<B>, GlossModelConfig)> {
        if !self.exists() {
            bail!(
                "Model checkpoint '{}' does not exist",
                self.weights_path().display()
            );
        }
        self.load(expected, device)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn cfg() -> GlossModelConfig {
        GlossModelConfig::new(4, 6, 3, 4)
    }

    #[test]
    fn test_missing_checkpoint_initialises() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("m"));
        assert!(!ckpt.exists());

        let device = Default::default();
        let (_, used) = ckpt.load_or_init::<TestBackend>(&cfg(), &device).unwrap();
        assert_eq!(used.vocab_size, 3);
        assert!(ckpt.require::<TestBackend>(&cfg(), &device).is_err());
    }

    #[test]
    fn test_saved_model_reloads_with_same_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("sub").join("m"));
        let device = Default::default();

        let model = cfg().init::<TestBackend>(&device);
        ckpt.save(&model, &cfg()).unwrap();
        assert!(ckpt.exists());

        let (loaded, _) = ckpt.require::<TestBackend>(&cfg(), &device).unwrap();
        let x = Tensor::<TestBackend, 3>::ones([1, 9, 4], &device);
        let a: Vec<f32> = model.forward(x.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(x).into_data().to_vec().unwrap();
        for (p, q) in a.iter().zip(&b) {
            // compact recorder stores half precision
            assert!((p - q).abs() < 1e-2);
        }
    }

    #[test]
    fn test_feature_dim_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("m"));
        let device = Default::default();
        ckpt.save(&cfg().init::<TestBackend>(&device), &cfg()).unwrap();

        let other = GlossModelConfig::new(8, 6, 3, 4);
        assert!(ckpt.load_or_init::<TestBackend>(&other, &device).is_err());
    }
}
