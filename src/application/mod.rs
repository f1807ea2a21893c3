// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal per command (batching a split, decoding, evaluating,
// segmenting videos into gloss clips, batching those clips).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No printing here (that's Layer 1)
//   - File formats are read and written by Layers 4 and 6
//   - Only workflow coordination
//
// Every use case borrows one validated PipelineConfig.

// Run configuration (defaults, JSON file, validation)
pub mod config;

// Length-bucketed batches of a split
pub mod batch_use_case;

// Gloss recognition of a single feature file
pub mod decode_use_case;

// Word error rate of a split
pub mod evaluate_use_case;

// Sentence videos → gloss clips
pub mod segment_use_case;

// Batches of the gloss clip dataset
pub mod clips_use_case;
