// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from annotation tables and feature files to
// length-homogeneous tensor batches, plus the gloss-boundary
// segmenter that cuts videos into clips.
//
//   <split>.corpus.csv + .npy features
//       │
//       ▼
//   loader        → typed rows, SampleLoad (loaded / skipped: reason)
//       │
//       ▼
//   padding       → fixed-length resampling (fix_shapes mode)
//   augment       → per-epoch down-sample + frame-skip plans
//       │
//       ▼
//   dataset       → GlossDataset: one epoch of planned batches
//       │
//       ▼
//   batcher       → exact-length buckets, target encodings,
//                   burn Batcher → [N, L, D] tensors
//
//   segmenter     → gloss windows over a frame list, clip sinks
//   splitter      → shuffled train / validation split
//
// Each module is responsible for exactly one step.

/// Annotation tables, feature files, per-split sample loading
pub mod loader;

/// Fixed-length resampling of feature sequences
pub mod padding;

/// Training-time temporal augmentation
pub mod augment;

/// Epochs of length-bucketed batches over one split
pub mod dataset;

/// Length bucketing, target encodings and burn's Batcher
pub mod batcher;

/// Gloss-boundary windows and clip sinks
pub mod segmenter;

/// Shuffles and splits records into train/validation sets
pub mod splitter;
