// ============================================================
// Layer 2 — Segment Use Case
// ============================================================
// Turns the sentence-level train split into a gloss-level dataset.
//
//   for each train video:
//     frames   ← <videos_dir>/... (skip if missing or too short)
//     features ← <feature_dir>/... (skip if unreadable)
//     classes  ← classifier, one gloss id per window
//     clips    ← get_gloss_paths (pad S/2, window 2S, stride S)
//     one GlossClipRecord per (clip, class) pair
//
//   records ──shuffle + split──▶ gloss_train.csv / gloss_val.csv
//
// Clip ids run on across videos, so every clip directory under
// `clips_dir` is unique for the whole run.

use anyhow::{anyhow, bail, ensure, Result};
use burn::prelude::*;
use rand::Rng;
use std::path::PathBuf;

use crate::application::config::PipelineConfig;
use crate::data::{
    loader::{feature_path, frames_dir, list_frames, load_features, read_annotation_table, write_gloss_table},
    segmenter::{get_gloss_paths, gloss_windows, DirectoryClipSink},
    splitter::split_train_val,
};
use crate::domain::{
    annotation::GlossClipRecord,
    traits::{ClipSink, WindowClassifier},
    vocab::Vocabulary,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{CheckpointPolicy, Recognizer};

/// Backbone family whose features the window classifier was trained on.
const SEGMENTATION_BACKBONE: &str = "resnet{2+1}d";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentReport {
    pub videos:      usize,
    pub skipped:     usize,
    pub clips:       usize,
    pub train_clips: usize,
    pub val_clips:   usize,
}

/// Segment every usable train video and write the gloss clip tables.
///
/// `sink` receives each clip's frames; without one only the tables are
/// written.
pub fn generate_gloss_dataset<C, R>(
    cfg:        &PipelineConfig,
    vocab:      &Vocabulary,
    classifier: &C,
    mut sink:   Option<&mut dyn ClipSink<PathBuf>>,
    rng:        &mut R,
) -> Result<SegmentReport>
where
    C: WindowClassifier + ?Sized,
    R: Rng + ?Sized,
{
    let rows = read_annotation_table(&cfg.split_table_path("train"), cfg.source)?;
    tracing::info!("Segmenting {} train videos", rows.len());

    let mut report = SegmentReport::default();
    let mut records = Vec::new();
    let mut next_idx = 0;

    for (i, row) in rows.iter().enumerate() {
        let dir = frames_dir(row, "train", cfg);
        let frames = match list_frames(&dir, &cfg.frame_ext) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("Skipping '{}': {e:#}", row.id);
                report.skipped += 1;
                continue;
            }
        };
        if frames.len() < cfg.min_video_frames {
            tracing::debug!("Skipping '{}': only {} frames", row.id, frames.len());
            report.skipped += 1;
            continue;
        }

        let features = match load_features(&feature_path(row, "train", cfg)) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Skipping '{}': {e:#}", row.id);
                report.skipped += 1;
                continue;
            }
        };

        let classes = classifier.predict_windows(&features)?;
        let windows = gloss_windows(frames.len(), cfg.temporal_stride).len();
        ensure!(
            classes.len() == windows,
            "'{}': {} window predictions for {} clips ({} frames, {} feature rows)",
            row.id,
            classes.len(),
            windows,
            frames.len(),
            features.nrows()
        );

        let paths = get_gloss_paths(
            &frames,
            &cfg.pad_frame,
            next_idx,
            cfg.temporal_stride,
            &cfg.frame_ext,
            sink.as_deref_mut(),
        )?;
        for (path, id) in paths.into_iter().zip(classes) {
            let gloss = vocab
                .gloss(id)
                .ok_or_else(|| anyhow!("Predicted gloss id {id} is outside the vocabulary"))?;
            records.push(GlossClipRecord::new(path, gloss, id));
        }
        next_idx = records.len();
        report.videos += 1;

        if cfg.progress_every > 0 && (i + 1) % cfg.progress_every == 0 {
            tracing::info!("Segmented {}/{} videos ({} clips)", i + 1, rows.len(), records.len());
        }
    }

    report.clips = records.len();
    let (train, val) = split_train_val(records, cfg.train_fraction, rng);
    report.train_clips = train.len();
    report.val_clips = val.len();

    write_gloss_table(&cfg.gloss_table_path("train"), &train)?;
    write_gloss_table(&cfg.gloss_table_path("val"), &val)?;

    tracing::info!(
        "{} clips from {} videos ({} skipped): {} train / {} val",
        report.clips,
        report.videos,
        report.skipped,
        report.train_clips,
        report.val_clips
    );
    Ok(report)
}

pub struct SegmentUseCase<'a> {
    config: &'a PipelineConfig,
}

impl<'a> SegmentUseCase<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Segment with the checkpointed model. The checkpoint must exist.
    pub fn execute<B: Backend>(&self, device: B::Device) -> Result<SegmentReport> {
        let cfg = self.config;
        if !cfg.feature_model.starts_with(SEGMENTATION_BACKBONE) {
            bail!(
                "Segmentation needs {SEGMENTATION_BACKBONE} features, got '{}'",
                cfg.feature_model
            );
        }

        let ckpt = CheckpointManager::new(&cfg.checkpoint_path);
        if !ckpt.exists() {
            bail!("No checkpoint at '{}' to segment with", ckpt.path().display());
        }
        let stored = ckpt.load_config()?;
        ensure!(
            stored.stride == cfg.temporal_stride,
            "Checkpoint was trained with stride {}, config says {}",
            stored.stride,
            cfg.temporal_stride
        );

        let vocab = Vocabulary::build(cfg.class_list_path())?;
        let recognizer = Recognizer::<B>::from_checkpoint(
            &ckpt,
            &cfg.model_config(stored.feature_dim, vocab.len()),
            &cfg.decoder,
            CheckpointPolicy::Require,
            device,
        )?;

        let mut sink = if cfg.write_clips {
            ensure!(
                cfg.pad_frame.is_file(),
                "Pad frame '{}' does not exist",
                cfg.pad_frame.display()
            );
            Some(DirectoryClipSink::new(&cfg.clips_dir, &cfg.frame_ext))
        } else {
            None
        };

        let mut rng = cfg.rng();
        generate_gloss_dataset(
            cfg,
            &vocab,
            &recognizer,
            sink.as_mut().map(|s| s as &mut dyn ClipSink<PathBuf>),
            &mut rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_gloss_table;
    use ndarray::Array2;
    use ndarray_npy::write_npy;
    use rand::{rngs::StdRng, SeedableRng};
    use std::{cell::Cell, fs, path::Path};

    /// Labels every window with the same gloss.
    struct ConstantClassifier {
        id:     usize,
        stride: usize,
        calls:  Cell<usize>,
    }

    impl WindowClassifier for ConstantClassifier {
        fn predict_windows(&self, features: &Array2<f32>) -> Result<Vec<usize>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![self.id; gloss_windows(features.nrows(), self.stride).len()])
        }
    }

    #[derive(Default)]
    struct CountingSink {
        clips: Vec<(usize, usize)>,
    }

    impl ClipSink<PathBuf> for CountingSink {
        fn write_clip(&mut self, clip_idx: usize, frames: &[PathBuf]) -> Result<()> {
            self.clips.push((clip_idx, frames.len()));
            Ok(())
        }
    }

    fn add_video(cfg: &PipelineConfig, name: &str, frames: usize, feats: Option<usize>) {
        let dir = cfg.videos_dir.join("train").join(name).join("1");
        fs::create_dir_all(&dir).unwrap();
        for f in 0..frames {
            fs::write(dir.join(format!("{f:03}.png")), [f as u8]).unwrap();
        }
        if let Some(rows) = feats {
            let p = cfg.feature_dir.join("train").join(name).join("1.npy");
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            write_npy(&p, &Array2::<f32>::zeros((rows, 3))).unwrap();
        }
    }

    fn corpus(root: &Path) -> PipelineConfig {
        let cfg = PipelineConfig {
            anno_dir: root.join("anno"),
            feature_dir: root.join("feats"),
            videos_dir: root.join("videos"),
            clips_dir: root.join("clips"),
            pad_frame: root.join("pad.png"),
            train_fraction: 0.5,
            ..Default::default()
        };
        let table = cfg.split_table_path("train");
        fs::create_dir_all(table.parent().unwrap()).unwrap();
        fs::write(
            &table,
            "folder|annotation\n\
             a/1/*.png|REGEN\n\
             b/1/*.png|WIND\n\
             c/1/*.png|SONNE\n\
             d/1/*.png|REGEN\n",
        )
        .unwrap();

        add_video(&cfg, "a", 10, Some(10)); // 3 clips
        add_video(&cfg, "b", 8, Some(8)); // 2 clips
        add_video(&cfg, "c", 2, Some(2)); // too short
        add_video(&cfg, "d", 6, None); // no features
        cfg
    }

    #[test]
    fn test_clips_are_numbered_across_videos() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = corpus(dir.path());
        let vocab = Vocabulary::from_glosses(["REGEN", "WIND"]);
        let classifier = ConstantClassifier { id: 2, stride: 4, calls: Cell::new(0) };
        let mut sink = CountingSink::default();
        let mut rng = StdRng::seed_from_u64(0);

        let report = generate_gloss_dataset(
            &cfg,
            &vocab,
            &classifier,
            Some(&mut sink as &mut dyn ClipSink<PathBuf>),
            &mut rng,
        )
        .unwrap();

        assert_eq!(report.videos, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.clips, 5);
        assert_eq!(classifier.calls.get(), 2);
        assert_eq!(sink.clips, vec![(0, 8), (1, 8), (2, 6), (3, 8), (4, 8)]);

        let train = read_gloss_table(&cfg.gloss_table_path("train")).unwrap();
        let val = read_gloss_table(&cfg.gloss_table_path("val")).unwrap();
        assert_eq!((train.len(), val.len()), (2, 3));

        let mut folders: Vec<String> = train.iter().chain(&val).map(|r| r.folder.clone()).collect();
        folders.sort();
        assert_eq!(folders, vec!["0/*.png", "1/*.png", "2/*.png", "3/*.png", "4/*.png"]);
        assert!(train.iter().chain(&val).all(|r| r.gloss == "WIND" && r.gloss_idx == 2));
    }

    #[test]
    fn test_prediction_count_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = corpus(dir.path());
        // features shorter than the frame list
        add_video(&cfg, "a", 10, Some(4));
        let vocab = Vocabulary::from_glosses(["REGEN"]);
        let classifier = ConstantClassifier { id: 1, stride: 4, calls: Cell::new(0) };

        let mut sink = CountingSink::default();

        let res = generate_gloss_dataset(
            &cfg,
            &vocab,
            &classifier,
            Some(&mut sink as &mut dyn ClipSink<PathBuf>),
            &mut StdRng::seed_from_u64(0),
        );
        assert!(res.is_err());
        assert!(sink.clips.is_empty());
    }

    #[test]
    fn test_out_of_vocabulary_prediction_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = corpus(dir.path());
        let vocab = Vocabulary::from_glosses(["REGEN"]);
        let classifier = ConstantClassifier { id: 7, stride: 4, calls: Cell::new(0) };

        let res = generate_gloss_dataset(&cfg, &vocab, &classifier, None, &mut StdRng::seed_from_u64(0));
        assert!(res.is_err());
    }

    #[test]
    fn test_segmentation_requires_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            checkpoint_path: dir.path().join("none"),
            ..corpus(dir.path())
        };
        let res = SegmentUseCase::new(&cfg).execute::<burn::backend::NdArray>(Default::default());
        assert!(res.is_err());
    }

    #[test]
    fn test_other_backbones_are_rejected() {
        let cfg = PipelineConfig { feature_model: "i3d".into(), ..Default::default() };
        let res = SegmentUseCase::new(&cfg).execute::<burn::backend::NdArray>(Default::default());
        assert!(res.is_err());
    }
}
