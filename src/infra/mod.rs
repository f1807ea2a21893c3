// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several use cases:
//
//   checkpoint.rs   — Gloss model weights + config on disk.
//                     Uses Burn's CompactRecorder; gates
//                     load vs initialise on the file existing.
//
//   batch_cache.rs  — bincode caches of loaded samples and
//                     batch lists, keyed by feature model,
//                     split and batching settings.
//
//   metrics.rs      — Word error rate and the metrics.csv log
//                     of evaluation runs.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Sample and batch caches
pub mod batch_cache;

/// WER and evaluation metrics CSV logger
pub mod metrics;
