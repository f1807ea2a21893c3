// ============================================================
// Layer 2 — Decode Use Case
// ============================================================
// Recognises the gloss sequence of one feature file:
//
//   Step 1: Build the vocabulary        (Layer 3 - domain)
//   Step 2: Load the feature file       (Layer 4 - data)
//   Step 3: Load the checkpointed model (Layer 6 - infra)
//   Step 4: Decode + map ids to glosses (Layer 5 - ml)

use anyhow::Result;
use burn::prelude::*;
use std::path::Path;

use crate::application::config::PipelineConfig;
use crate::data::loader::load_features;
use crate::domain::vocab::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{CheckpointPolicy, Recognizer};

pub struct DecodeUseCase<'a> {
    config: &'a PipelineConfig,
}

impl<'a> DecodeUseCase<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Decode `features` into gloss strings.
    ///
    /// A missing checkpoint falls back to freshly initialised weights,
    /// which is only useful for smoke runs.
    pub fn execute<B: Backend>(&self, features: &Path, device: B::Device) -> Result<Vec<String>> {
        let cfg = self.config;

        // ── Step 1 ───────────────────────────────────────────────────────────
        let vocab = Vocabulary::build(cfg.class_list_path())?;

        // ── Step 2 ───────────────────────────────────────────────────────────
        let feats = load_features(features)?;
        tracing::info!("Features {:?} from '{}'", feats.dim(), features.display());

        // ── Step 3 ───────────────────────────────────────────────────────────
        let model_cfg = cfg.model_config(feats.ncols(), vocab.len());
        let ckpt = CheckpointManager::new(&cfg.checkpoint_path);
        let mut recognizer = Recognizer::<B>::from_checkpoint(
            &ckpt,
            &model_cfg,
            &cfg.decoder,
            CheckpointPolicy::LoadOrInit,
            device,
        )?;

        // ── Step 4 ───────────────────────────────────────────────────────────
        let ids = recognizer.recognize(&feats)?;
        let glosses = vocab.decode(&ids);
        tracing::info!("Decoded {} glosses ({})", glosses.len(), cfg.decoder.describe());

        Ok(glosses)
    }
}
