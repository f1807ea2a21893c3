// ============================================================
// Layer 4 — Gloss-Boundary Segmenter
// ============================================================
// Cuts a video's frame list into overlapping clips, one per
// gloss window of the pretrained model:
//
//   stride S, pad P = S/2, window 2S
//
//   [pad x P] f0 f1 ... f(L-1) [pad x P]
//   |<---- 2S ---->|
//         S  |<---- 2S ---->|
//                 S  |<---- 2S ---->|
//
// The window start advances by S every step. A window is kept only
// when it holds more than S frames, which drops the under-full
// tail at the very end. For even S this gives ceil(L / S) clips,
// the same count as the model's output steps over L frames.
//
// Clips are numbered globally across the corpus: the caller passes
// the first free number and every kept window takes the next one.
// Each clip is recorded as "<idx>/*.<ext>" and, when a sink is
// given, its frames are written out.

use anyhow::{Context, Result};
use std::{
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use crate::domain::traits::ClipSink;

/// Windows over a frame list of `len` frames once it is padded with
/// `stride / 2` frames on each side. Ranges index the padded list.
///
/// # Panics
/// Panics if `stride` is zero.
pub fn gloss_windows(len: usize, stride: usize) -> Vec<Range<usize>> {
    assert!(stride > 0, "stride must be positive");

    let padded = len + 2 * (stride / 2);
    let mut windows = Vec::new();

    let mut start = 0;
    while start < padded {
        let end = padded.min(start + 2 * stride);
        if end - start > stride {
            windows.push(start..end);
        }
        start += stride;
    }

    windows
}

/// Clip path reference for clip number `idx`.
pub fn clip_reference(idx: usize, ext: &str) -> String {
    format!("{idx}/*.{ext}")
}

/// Segment `frames` into gloss clips numbered from `first_idx`.
///
/// Returns one path reference per kept window, in order. When `sink`
/// is given each clip's frames (pad frames included) are written to it.
pub fn get_gloss_paths<'s, F: Clone>(
    frames: &[F],
    pad: &F,
    first_idx: usize,
    stride: usize,
    ext: &str,
    mut sink: Option<&mut (dyn ClipSink<F> + 's)>,
) -> Result<Vec<String>> {
    let p = stride / 2;
    let padded: Vec<F> = std::iter::repeat(pad)
        .take(p)
        .chain(frames.iter())
        .chain(std::iter::repeat(pad).take(p))
        .cloned()
        .collect();

    let mut paths = Vec::new();
    for (k, window) in gloss_windows(frames.len(), stride).into_iter().enumerate() {
        let idx = first_idx + k;
        if let Some(sink) = sink.as_deref_mut() {
            sink.write_clip(idx, &padded[window])?;
        }
        paths.push(clip_reference(idx, ext));
    }

    Ok(paths)
}

// ─── DirectoryClipSink ────────────────────────────────────────────────────────
/// Copies clip frames into `<root>/<clip_idx>/<i>.<ext>`.
///
/// An existing clip directory is replaced.
pub struct DirectoryClipSink {
    root: PathBuf,
    ext: String,
}

impl DirectoryClipSink {
    pub fn new(root: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ext: ext.into(),
        }
    }

    pub fn clip_dir(&self, clip_idx: usize) -> PathBuf {
        self.root.join(clip_idx.to_string())
    }
}

impl ClipSink<PathBuf> for DirectoryClipSink {
    fn write_clip(&mut self, clip_idx: usize, frames: &[PathBuf]) -> Result<()> {
        let dir = self.clip_dir(clip_idx);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Cannot clear clip directory '{}'", dir.display()))?;
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create clip directory '{}'", dir.display()))?;

        for (i, src) in frames.iter().enumerate() {
            let dst = dir.join(format!("{i}.{}", self.ext));
            copy_frame(src, &dst)?;
        }

        tracing::trace!("Wrote clip {clip_idx} ({} frames)", frames.len());
        Ok(())
    }
}

fn copy_frame(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .with_context(|| format!("Cannot copy frame '{}' → '{}'", src.display(), dst.display()))?;
    Ok(())
}
