// ============================================================
// Layer 3 — Annotation Records
// ============================================================
// Strongly-typed rows for the two tabular files the pipeline
// touches:
//
//   AnnotationRow    — one video of a split and its gloss annotation
//                      (read from the pipe-delimited corpus tables)
//   GlossClipRecord  — one clip produced by the gloss-boundary
//                      segmenter (written as comma-delimited rows)
//
// Rows are parsed once when a table is loaded; nothing downstream
// looks columns up by name.

use serde::{Deserialize, Serialize};

/// Which corpus layout the annotation tables follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    /// RWTH-PHOENIX-Weather: `folder` column pointing at a frame directory glob.
    Phoenix,
    /// K-RSL: `video` column pointing at a video file.
    Krsl,
}

impl DatasetSource {
    /// Column holding the per-video reference.
    pub fn id_column(&self) -> &'static str {
        match self {
            DatasetSource::Phoenix => "folder",
            DatasetSource::Krsl => "video",
        }
    }
}

/// Column holding the space-separated gloss annotation.
pub const ANNOTATION_COLUMN: &str = "annotation";

/// One video of a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRow {
    /// `folder` (Phoenix) or `video` (K-RSL) value, verbatim.
    pub id: String,

    /// Space-separated gloss sequence.
    pub annotation: String,
}

impl AnnotationRow {
    pub fn new(id: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            annotation: annotation.into(),
        }
    }
}

/// One clip of the gloss-level dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossClipRecord {
    /// Clip frame glob relative to the clip directory, e.g. `17/*.png`.
    pub folder: String,

    /// Predicted gloss string.
    pub gloss: String,

    /// Predicted gloss id.
    pub gloss_idx: usize,
}

impl GlossClipRecord {
    pub const HEADER: &'static str = "folder,gloss,gloss_idx";

    pub fn new(folder: impl Into<String>, gloss: impl Into<String>, gloss_idx: usize) -> Self {
        Self {
            folder: folder.into(),
            gloss: gloss.into(),
            gloss_idx,
        }
    }

    /// Comma-delimited row matching [`GlossClipRecord::HEADER`].
    pub fn to_csv_row(&self) -> String {
        format!("{},{},{}", self.folder, self.gloss, self.gloss_idx)
    }

    /// Directory part of the clip glob (`17/*.png` → `17`).
    pub fn clip_dir(&self) -> &str {
        self.folder
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or(&self.folder)
    }
}
