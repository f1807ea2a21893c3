// ============================================================
// Layer 3 — Core Traits (Capabilities)
// ============================================================
// The seams where implementations are swappable:
//
//   SequenceDecoder  — turns per-timestep class probabilities into
//                      ranked gloss hypotheses (greedy, beam, ...)
//   WindowClassifier — a pretrained model predicting one gloss id per
//                      gloss-boundary window of a video
//   ClipSink         — where segmented clips are persisted
//
// None of these mention a tensor framework; the ml layer adapts
// its tensors to these plain-Rust shapes.

use anyhow::Result;
use ndarray::Array2;

// ─── ProbMatrix ───────────────────────────────────────────────────────────────
/// One sample's `(steps × classes)` probability or log-probability matrix,
/// row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbMatrix {
    pub data: Vec<f32>,
    pub steps: usize,
    pub classes: usize,
}

impl ProbMatrix {
    /// # Panics
    /// Panics if `data.len() != steps * classes`.
    pub fn new(data: Vec<f32>, steps: usize, classes: usize) -> Self {
        assert_eq!(
            data.len(),
            steps * classes,
            "probability matrix is not {steps}x{classes}"
        );
        Self { data, steps, classes }
    }

    pub fn row(&self, t: usize) -> &[f32] {
        &self.data[t * self.classes..(t + 1) * self.classes]
    }
}

// ─── DecodeOutput ─────────────────────────────────────────────────────────────
/// Output of a [`SequenceDecoder`], indexed `[sample][beam]`.
///
/// Beams are ordered best first. Each hypothesis may be padded; only the
/// first `lengths[sample][beam]` ids are meaningful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeOutput {
    pub hypotheses: Vec<Vec<Vec<usize>>>,
    pub scores: Vec<Vec<f32>>,
    pub timesteps: Vec<Vec<Vec<usize>>>,
    pub lengths: Vec<Vec<usize>>,
}

impl DecodeOutput {
    /// Best hypothesis of a sample, truncated to its reported length.
    pub fn top(&self, sample: usize) -> &[usize] {
        &self.hypotheses[sample][0][..self.lengths[sample][0]]
    }
}

// ─── SequenceDecoder ──────────────────────────────────────────────────────────
/// Any CTC decoding policy.
///
/// Implementations:
///   - GreedyDecoder     → arg-max + collapse, single beam
///   - BeamSearchDecoder → CTC prefix beam search
pub trait SequenceDecoder {
    fn decode(&mut self, batch: &[ProbMatrix]) -> DecodeOutput;
}

// ─── WindowClassifier ─────────────────────────────────────────────────────────
/// A pretrained model that labels every gloss-boundary window of a video.
pub trait WindowClassifier {
    /// One predicted gloss id per window of `features` (`[frames, dim]`).
    fn predict_windows(&self, features: &Array2<f32>) -> Result<Vec<usize>>;
}

// ─── ClipSink ─────────────────────────────────────────────────────────────────
/// Persists the frames of one segmented clip.
pub trait ClipSink<F> {
    fn write_clip(&mut self, clip_idx: usize, frames: &[F]) -> Result<()>;
}
