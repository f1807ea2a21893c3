// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and capability traits shared by every other
// layer:
//
//   vocab      — gloss ↔ id mapping with the reserved blank id 0
//   annotation — typed corpus rows and generated clip records
//   sample     — loaded samples and explicit skip reasons
//   traits     — decoder / classifier / clip-sink capabilities
//
// Rules for this layer:
//   - NO burn tensor types
//   - NO file layout conventions (paths are derived in data/)
//   - Only structs, enums and traits

/// Gloss vocabulary
pub mod vocab;

/// Annotation rows and gloss clip records
pub mod annotation;

/// Samples and sample-load outcomes
pub mod sample;

/// Capability traits implemented by other layers
pub mod traits;
