// ============================================================
// Layer 2 — Pipeline Configuration
// ============================================================
// One immutable configuration object for the whole run.
//
// Built once in the CLI layer:
//   defaults → optional JSON file (--config) → CLI overrides
// then validated, then handed by reference to every use case.
// Nothing reads configuration from globals.
//
// Every field has a default, so a JSON file only needs the keys
// it changes:
//
//   { "source": "krsl", "max_batch_size": 16, "decoder": { "beam_width": 10 } }

use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::data::{augment::AugmentConfig, batcher::TargetFormat};
use crate::domain::annotation::DatasetSource;
use crate::ml::{decoder::DecoderConfig, model::GlossModelConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // ── Corpus layout ────────────────────────────────────────────────────────
    pub source:          DatasetSource,
    pub anno_dir:        PathBuf,
    pub feature_dir:     PathBuf,
    pub videos_dir:      PathBuf,
    /// Batch and sample caches
    pub vars_dir:        PathBuf,
    /// Output directory for segmented gloss clips
    pub clips_dir:       PathBuf,
    /// Neutral frame image used to pad videos before segmentation
    pub pad_frame:       PathBuf,
    pub checkpoint_path: PathBuf,
    pub metrics_dir:     PathBuf,
    /// Extension of extracted frame images
    pub frame_ext:       String,

    // ── Features ─────────────────────────────────────────────────────────────
    /// Name of the backbone that produced the feature files
    pub feature_model:   String,
    /// Gloss-window stride S (window length 2S, padding S/2)
    pub temporal_stride: usize,
    /// Fixed length used when `fix_shapes` is on
    pub video_seq_len:   usize,
    /// Target truncation length when `fix_shapes` is on
    pub max_out_len:     usize,
    pub fix_shapes:      bool,

    // ── Batching ─────────────────────────────────────────────────────────────
    /// A training sample is dropped when targets * this > frames
    pub min_frames_per_gloss: usize,
    pub max_batch_size:  usize,
    pub target_format:   TargetFormat,
    pub shuffle:         bool,
    pub cache_batches:   bool,
    pub augment:         AugmentConfig,

    // ── Model / decoding ─────────────────────────────────────────────────────
    pub hidden_size:     usize,
    pub decoder:         DecoderConfig,

    // ── Segmentation ─────────────────────────────────────────────────────────
    pub train_fraction:  f64,
    /// Videos with fewer frames are not segmented
    pub min_video_frames: usize,
    /// Copy clip frames to `clips_dir`; off records paths only
    pub write_clips:     bool,

    // ── Run ──────────────────────────────────────────────────────────────────
    pub seed:            Option<u64>,
    /// Log progress every N rows
    pub progress_every:  usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source:          DatasetSource::Phoenix,
            anno_dir:        PathBuf::from("data/annotations"),
            feature_dir:     PathBuf::from("data/features"),
            videos_dir:      PathBuf::from("data/videos"),
            vars_dir:        PathBuf::from("data/vars"),
            clips_dir:       PathBuf::from("data/gloss_clips"),
            pad_frame:       PathBuf::from("data/pad.png"),
            checkpoint_path: PathBuf::from("checkpoints/gloss_model"),
            metrics_dir:     PathBuf::from("checkpoints"),
            frame_ext:       "png".to_string(),

            feature_model:   "resnet{2+1}d_18".to_string(),
            temporal_stride: 4,
            video_seq_len:   100,
            max_out_len:     30,
            fix_shapes:      false,

            min_frames_per_gloss: 4,
            max_batch_size:  32,
            target_format:   TargetFormat::Concatenated,
            shuffle:         true,
            cache_batches:   true,
            augment:         AugmentConfig::default(),

            hidden_size:     512,
            decoder:         DecoderConfig::default(),

            train_fraction:  0.9,
            min_video_frames: 4,
            write_clips:     true,

            seed:            None,
            progress_every:  25,
        }
    }
}

impl PipelineConfig {
    /// Defaults, overlaid with a JSON file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let cfg = serde_json::from_str(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()))?;

        tracing::info!("Loaded config from '{}'", path.display());
        Ok(cfg)
    }

    /// Reject settings the pipeline cannot run with.
    /// Called before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.temporal_stride < 2 || self.temporal_stride % 2 != 0 {
            bail!(
                "temporal_stride must be an even number >= 2, got {}",
                self.temporal_stride
            );
        }
        if self.max_batch_size == 0 {
            bail!("max_batch_size must be positive");
        }
        if self.video_seq_len == 0 {
            bail!("video_seq_len must be positive");
        }
        if self.min_frames_per_gloss == 0 {
            bail!("min_frames_per_gloss must be positive");
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            bail!("train_fraction must be in [0, 1], got {}", self.train_fraction);
        }
        self.augment.validate()?;
        Ok(())
    }

    /// Gloss model architecture for data of `feature_dim` and a vocabulary
    /// of `vocab_size` entries.
    pub fn model_config(&self, feature_dim: usize, vocab_size: usize) -> GlossModelConfig {
        GlossModelConfig::new(feature_dim, self.hidden_size, vocab_size, self.temporal_stride)
    }

    /// The run's random source.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Training class list the vocabulary is built from.
    pub fn class_list_path(&self) -> PathBuf {
        self.anno_dir.join("automatic").join("trainingClasses.txt")
    }

    /// Pipe-delimited corpus table of a split.
    pub fn split_table_path(&self, split: &str) -> PathBuf {
        self.anno_dir.join("manual").join(format!("{split}.corpus.csv"))
    }

    /// Generated gloss clip table of a split (`train` / `val`).
    pub fn gloss_table_path(&self, split: &str) -> PathBuf {
        self.anno_dir.join(format!("gloss_{split}.csv"))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_odd_stride_is_rejected() {
        let cfg = PipelineConfig { temporal_stride: 3, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let cfg = PipelineConfig { max_batch_size: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{ "source": "krsl", "max_batch_size": 8 }"#).unwrap();

        let cfg = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.source, DatasetSource::Krsl);
        assert_eq!(cfg.max_batch_size, 8);
        assert_eq!(cfg.temporal_stride, 4);
        assert_eq!(cfg.min_frames_per_gloss, 4);
    }

    #[test]
    fn test_missing_file_without_path_gives_defaults() {
        let cfg = PipelineConfig::load(None).unwrap();
        assert_eq!(cfg.max_batch_size, 32);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let cfg = PipelineConfig { seed: Some(7), ..Default::default() };
        let a: u64 = cfg.rng().gen();
        let b: u64 = cfg.rng().gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_model_config_uses_stride_and_hidden() {
        let cfg = PipelineConfig { hidden_size: 64, temporal_stride: 6, ..Default::default() };
        let m = cfg.model_config(10, 20);
        assert_eq!((m.feature_dim, m.hidden, m.vocab_size, m.stride), (10, 64, 20, 6));
    }

    #[test]
    fn test_table_paths() {
        let cfg = PipelineConfig { anno_dir: PathBuf::from("anno"), ..Default::default() };
        assert_eq!(cfg.split_table_path("dev"), PathBuf::from("anno/manual/dev.corpus.csv"));
        assert_eq!(cfg.gloss_table_path("val"), PathBuf::from("anno/gloss_val.csv"));
        assert_eq!(
            cfg.class_list_path(),
            PathBuf::from("anno/automatic/trainingClasses.txt")
        );
    }
}
