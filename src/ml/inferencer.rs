// ============================================================
// Layer 5 — Recognizer
// ============================================================
// Wraps a loaded GlossModel with a decoding policy.
//
//   features [L, D] ──▶ [1, L, D] ──model──▶ [W, 1, V] log-probs
//                                               │
//                  recognize:       predict_glosses (greedy / beam)
//                  predict_windows: arg-max per window, no collapse
//
// predict_windows is what the gloss-boundary segmenter needs: one
// label per window, so repeated glosses stay separate clips.
use anyhow::{anyhow, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use ndarray::Array2;

use crate::data::batcher::{GlossBatcher, GlossItem, TargetFormat};
use crate::domain::traits::{SequenceDecoder, WindowClassifier};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::decoder::{predict_glosses, DecoderConfig};
use crate::ml::model::{GlossModel, GlossModelConfig};

pub type InferBackend = burn::backend::Wgpu;

/// Whether a missing checkpoint is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPolicy {
    LoadOrInit,
    Require,
}

pub struct Recognizer<B: Backend> {
    model:   GlossModel<B>,
    decoder: Option<Box<dyn SequenceDecoder>>,
    batcher: GlossBatcher<B>,
}

impl<B: Backend> Recognizer<B> {
    pub fn new(model: GlossModel<B>, decoder_cfg: &DecoderConfig, device: B::Device) -> Self {
        Self {
            model,
            decoder: decoder_cfg.build(),
            batcher: GlossBatcher::new(device, TargetFormat::Raw),
        }
    }

    pub fn from_checkpoint(
        ckpt:        &CheckpointManager,
        model_cfg:   &GlossModelConfig,
        decoder_cfg: &DecoderConfig,
        policy:      CheckpointPolicy,
        device:      B::Device,
    ) -> Result<Self> {
        let (model, _) = match policy {
            CheckpointPolicy::LoadOrInit => ckpt.load_or_init::<B>(model_cfg, &device)?,
            CheckpointPolicy::Require => ckpt.require::<B>(model_cfg, &device)?,
        };
        Ok(Self::new(model, decoder_cfg, device))
    }

    /// Decode a stacked batch into gloss ids per sample.
    pub fn recognize_batch(&mut self, features: Tensor<B, 3>) -> Result<Vec<Vec<usize>>> {
        let preds = self.model.forward(features);
        predict_glosses(preds, self.decoder.as_deref_mut())
    }

    /// Decode one feature sequence.
    pub fn recognize(&mut self, features: &Array2<f32>) -> Result<Vec<usize>> {
        let x = self.single(features);
        self.recognize_batch(x)?
            .pop()
            .ok_or_else(|| anyhow!("model returned no hypothesis"))
    }

    fn single(&self, features: &Array2<f32>) -> Tensor<B, 3> {
        self.batcher
            .batch(vec![GlossItem {
                features: features.clone(),
                targets:  Vec::new(),
            }])
            .features
    }
}

impl<B: Backend> WindowClassifier for Recognizer<B> {
    fn predict_windows(&self, features: &Array2<f32>) -> Result<Vec<usize>> {
        let preds = self.model.forward(self.single(features)); // [W, 1, V]
        let classes: Vec<i64> = preds
            .argmax(2)
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow!("Cannot read window classes: {e:?}"))?;
        Ok(classes.into_iter().map(|c| c as usize).collect())
    }
}
