// ============================================================
// Layer 4 — Gloss Dataset (epochs of length-bucketed batches)
// ============================================================
// Holds the samples of one split by reference (feature path,
// length, targets) and serves them as length-homogeneous batches.
//
// Each epoch:
//   1. start_epoch draws one AugmentPlan per sample (train split
//      with augmentation on), or keeps every sample as it is
//   2. samples are bucketed by their post-augmentation length
//   3. get_batch(i) loads the member feature files, applies each
//      plan (down_sample to down_len, then random_skip) and hands
//      back items that all have the batch's length
//
// Lengths are known before any features are loaded, so the whole
// epoch is planned up front and batches are loaded lazily.

use anyhow::{ensure, Result};
use rand::Rng;

use crate::application::config::PipelineConfig;
use crate::data::{
    augment::{AugmentConfig, AugmentPlan},
    batcher::{bucket_by_length, GlossItem},
    loader::load_features,
    padding::pad_features,
};
use crate::domain::sample::SampleRef;

/// How a split is served.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOptions {
    /// `None` serves samples unchanged.
    pub augment: Option<AugmentConfig>,
    pub min_frames_per_gloss: usize,
    pub max_batch_size: usize,
    /// Resample every loaded sequence to this length.
    pub fixed_len: Option<usize>,
}

impl DatasetOptions {
    /// Augmentation only ever applies to the train split, and never to
    /// fixed-shape sequences.
    pub fn for_split(split: &str, cfg: &PipelineConfig) -> Self {
        let augment = (split == "train" && cfg.augment.enabled && !cfg.fix_shapes)
            .then(|| cfg.augment.clone());
        Self {
            augment,
            min_frames_per_gloss: cfg.min_frames_per_gloss,
            max_batch_size: cfg.max_batch_size,
            fixed_len: cfg.fix_shapes.then_some(cfg.video_seq_len),
        }
    }
}

pub struct GlossDataset {
    split: String,
    samples: Vec<SampleRef>,
    opts: DatasetOptions,
    plans: Vec<AugmentPlan>,
    batches: Vec<Vec<usize>>,
}

impl GlossDataset {
    /// No batches exist until the first [`GlossDataset::start_epoch`].
    pub fn new(split: impl Into<String>, samples: Vec<SampleRef>, opts: DatasetOptions) -> Self {
        let plans = samples.iter().map(|s| AugmentPlan::identity(s.feature_len)).collect();
        Self {
            split: split.into(),
            samples,
            opts,
            plans,
            batches: Vec::new(),
        }
    }

    pub fn split(&self) -> &str {
        &self.split
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Number of batches in the current epoch.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Sample indices of batch `i`.
    pub fn members(&self, i: usize) -> &[usize] {
        &self.batches[i]
    }

    /// Length every item of batch `i` will have.
    pub fn batch_seq_len(&self, i: usize) -> usize {
        self.batches[i]
            .first()
            .map(|&m| self.plans[m].aug_len())
            .unwrap_or(0)
    }

    /// Redraw augmentation and re-bucket for a new epoch.
    pub fn start_epoch<R: Rng + ?Sized>(&mut self, shuffle: bool, rng: &mut R) {
        self.plans = match &self.opts.augment {
            Some(aug) => self
                .samples
                .iter()
                .map(|s| {
                    AugmentPlan::draw(
                        s.feature_len,
                        s.targets.len(),
                        aug,
                        self.opts.min_frames_per_gloss,
                        rng,
                    )
                })
                .collect(),
            None => self
                .samples
                .iter()
                .map(|s| AugmentPlan::identity(s.feature_len))
                .collect(),
        };

        let lengths: Vec<usize> = self.plans.iter().map(AugmentPlan::aug_len).collect();
        self.batches = bucket_by_length(&lengths, self.opts.max_batch_size, shuffle, rng);

        tracing::debug!(
            "[{}] epoch planned: {} samples in {} batches",
            self.split,
            self.samples.len(),
            self.batches.len()
        );
    }

    /// Load batch `i` of the current epoch.
    pub fn get_batch<R: Rng + ?Sized>(&self, i: usize, rng: &mut R) -> Result<Vec<GlossItem>> {
        let expected = self.batch_seq_len(i);
        let mut items = Vec::with_capacity(self.batches[i].len());

        for &m in &self.batches[i] {
            let sample = &self.samples[m];
            let mut features = load_features(&sample.feature_path)?;
            if let Some(len) = self.opts.fixed_len {
                ensure!(features.nrows() > 0, "'{}' has no frames", sample.feature_path.display());
                features = pad_features(&features, len, rng);
            }

            let features = self.plans[m].apply(&features, rng);
            ensure!(
                features.nrows() == expected,
                "'{}' has {} frames, planned for {} (feature file changed?)",
                sample.feature_path.display(),
                features.nrows(),
                expected
            );

            items.push(GlossItem {
                features,
                targets: sample.targets.clone(),
            });
        }

        Ok(items)
    }
}
