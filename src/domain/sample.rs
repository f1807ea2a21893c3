// ============================================================
// Layer 3 — Samples and Sample-Load Outcomes
// ============================================================
// A sample is one video's feature sequence paired with its gloss
// target sequence. Loading a sample can legitimately fail in a few
// ways that are NOT errors for the run as a whole; the sample is
// just skipped. SampleLoad makes the reason explicit so callers
// and tests can inspect it instead of inferring it from counts.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};

/// A fully loaded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Annotation id (`folder` or `video`).
    pub id: String,
    /// Feature file the sequence was read from.
    pub feature_path: PathBuf,
    /// Feature sequence, shape `[frames, feature_dim]`.
    pub features: Array2<f32>,
    /// Gloss ids.
    pub targets: Vec<usize>,
}

impl Sample {
    pub fn feature_len(&self) -> usize {
        self.features.nrows()
    }

    /// Drop the features, keeping what an epoch needs to re-load them.
    pub fn into_ref(self) -> SampleRef {
        SampleRef {
            feature_len: self.features.nrows(),
            id: self.id,
            feature_path: self.feature_path,
            targets: self.targets,
        }
    }
}

/// A sample whose features stay on disk until a batch needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRef {
    pub id: String,
    pub feature_path: PathBuf,
    pub feature_len: usize,
    pub targets: Vec<usize>,
}

/// Why a sample was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No feature file at the derived path.
    MissingFeatures(PathBuf),
    /// The feature file exists but is unreadable or has fewer than 2 dims.
    MalformedFeatures(String),
    /// Fewer feature frames than glosses.
    TooFewFrames { frames: usize, glosses: usize },
    /// Target too long for CTC to align with this many frames.
    TargetTooLong {
        targets: usize,
        frames: usize,
        min_frames_per_gloss: usize,
    },
}

impl SkipReason {
    /// Short stable name used to aggregate skip counts.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::MissingFeatures(_) => "missing_features",
            SkipReason::MalformedFeatures(_) => "malformed_features",
            SkipReason::TooFewFrames { .. } => "too_few_frames",
            SkipReason::TargetTooLong { .. } => "target_too_long",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingFeatures(p) => write!(f, "no feature file at '{}'", p.display()),
            SkipReason::MalformedFeatures(msg) => write!(f, "malformed features: {msg}"),
            SkipReason::TooFewFrames { frames, glosses } => {
                write!(f, "{frames} frames for {glosses} glosses")
            }
            SkipReason::TargetTooLong {
                targets,
                frames,
                min_frames_per_gloss,
            } => write!(
                f,
                "{targets} glosses need more than {frames} frames ({min_frames_per_gloss} per gloss)"
            ),
        }
    }
}

/// Outcome of loading one annotation row.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleLoad {
    Loaded(Sample),
    Skipped(SkipReason),
}

/// Per-reason skip counts for one pass over a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSummary {
    counts: BTreeMap<&'static str, usize>,
}

impl SkipSummary {
    pub fn record(&mut self, reason: &SkipReason) {
        *self.counts.entry(reason.kind()).or_insert(0) += 1;
    }

    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn log(&self, split: &str) {
        for (kind, n) in &self.counts {
            tracing::info!("[{split}] skipped {n} samples: {kind}");
        }
    }
}
