// ============================================================
// Layer 4 — Temporal Augmentation
// ============================================================
// Training-only perturbations of a feature sequence's length:
//
//   down_sample  — shrink a sequence to a shorter length with the
//                  same jittered-stride policy as pad_features,
//                  simulating faster signing
//   random_skip  — drop a precomputed set of rows from the
//                  down-sampled sequence
//
// Targets are never touched. The lengths are planned once per
// sample per epoch (AugmentPlan) so the batcher can bucket samples
// by their post-augmentation length before any features are
// loaded:
//
//   original len L ──down_sample──▶ down_len ──random_skip──▶ aug_len
//
// The plan keeps aug_len >= targets * min_frames_per_gloss whenever
// the original length allows it, so augmentation never makes a
// sample infeasible for CTC.

use anyhow::{bail, Result};
use ndarray::{Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::padding::subsample_indices;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Apply augmentation to the train split.
    pub enabled: bool,
    /// Largest fraction of frames removed by down-sampling.
    pub max_down_ratio: f64,
    /// Largest fraction of the down-sampled frames skipped.
    pub max_skip_ratio: f64,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_down_ratio: 0.2,
            max_skip_ratio: 0.1,
        }
    }
}

impl AugmentConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, r) in [
            ("max_down_ratio", self.max_down_ratio),
            ("max_skip_ratio", self.max_skip_ratio),
        ] {
            if !(0.0..1.0).contains(&r) {
                bail!("augment.{name} must be in [0, 1), got {r}");
            }
        }
        Ok(())
    }
}

/// Reduce `seq` to `target_len` rows. Shorter sequences are returned unchanged.
pub fn down_sample<R: Rng + ?Sized>(seq: &Array2<f32>, target_len: usize, rng: &mut R) -> Array2<f32> {
    if seq.nrows() <= target_len || target_len == 0 {
        return seq.clone();
    }
    let indices = subsample_indices(seq.nrows(), target_len, rng);
    seq.select(Axis(0), &indices)
}

/// Remove the rows at `skip_idxs`.
///
/// # Panics
/// Panics if any index is out of range.
pub fn random_skip(seq: &Array2<f32>, skip_idxs: &[usize]) -> Array2<f32> {
    let len = seq.nrows();
    let mut drop = vec![false; len];
    for &i in skip_idxs {
        assert!(i < len, "skip index {i} out of range for {len} frames");
        drop[i] = true;
    }

    let keep: Vec<usize> = (0..len).filter(|&i| !drop[i]).collect();
    seq.select(Axis(0), &keep)
}

/// Per-epoch augmentation decided for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentPlan {
    /// Length after down-sampling.
    pub down_len: usize,
    /// Sorted, distinct rows dropped from the down-sampled sequence.
    pub skipped: Vec<usize>,
}

impl AugmentPlan {
    /// Leave the sample as it is.
    pub fn identity(len: usize) -> Self {
        Self { down_len: len, skipped: Vec::new() }
    }

    /// Draw a plan for a sample of `len` frames and `n_targets` glosses.
    pub fn draw<R: Rng + ?Sized>(
        len: usize,
        n_targets: usize,
        cfg: &AugmentConfig,
        min_frames_per_gloss: usize,
        rng: &mut R,
    ) -> Self {
        let floor_len = (n_targets * min_frames_per_gloss).max(1).min(len);

        let max_down = ((len as f64 * cfg.max_down_ratio) as usize).min(len - floor_len);
        let down_len = len - rng.gen_range(0..=max_down);

        let max_skip = ((down_len as f64 * cfg.max_skip_ratio) as usize).min(down_len - floor_len);
        let n_skip = rng.gen_range(0..=max_skip);

        let mut skipped = rand::seq::index::sample(rng, down_len, n_skip).into_vec();
        skipped.sort_unstable();

        Self { down_len, skipped }
    }

    /// Final length once the plan is applied.
    pub fn aug_len(&self) -> usize {
        self.down_len - self.skipped.len()
    }

    /// Apply the plan to a loaded sequence.
    pub fn apply<R: Rng + ?Sized>(&self, seq: &Array2<f32>, rng: &mut R) -> Array2<f32> {
        let down = down_sample(seq, self.down_len, rng);
        random_skip(&down, &self.skipped)
    }
}
