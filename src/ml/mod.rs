// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The tensor side of the pipeline.
//
//   model.rs      — GlossModel: [N, L, D] features →
//                   [W, N, V] log-probs, one step per gloss
//                   window (pad S/2, window 2S, stride S)
//
//   decoder.rs    — predict_glosses, the CTC collapse rule,
//                   GreedyDecoder and the decoder config
//
//   beam.rs       — CTC prefix beam search
//
//   inferencer.rs — Recognizer: a checkpointed model plus a
//                   decoding policy; also the per-window
//                   classifier used by the segmenter
//
// Decoders work on plain ProbMatrix values, so they can be tested
// and swapped without a backend.

/// Window-pooled gloss model
pub mod model;

/// Greedy CTC decoding and predict_glosses
pub mod decoder;

/// CTC prefix beam search
pub mod beam;

/// Checkpoint-backed recognizer
pub mod inferencer;
