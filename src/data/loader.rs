// ============================================================
// Layer 4 — Annotation & Feature Loader
// ============================================================
// Reads one split of the corpus into memory.
//
// Files involved:
//   <anno_dir>/manual/<split>.corpus.csv   pipe-delimited, header row
//   <feature_dir>/...                      one .npy array per video
//
//   id|folder|signer|annotation
//   v1|v1/1/*.png|S1|REGEN WIND
//        │
//        ├── folder → <feature_dir>/<split>/v1/1.npy   (Phoenix)
//        └── annotation → vocab.encode → [ids]
//
// The header is checked against the source's schema once; every
// row then becomes an AnnotationRow with named fields.
//
// A row whose features are missing or unusable is skipped, not
// failed: load_sample returns SampleLoad::Skipped(reason) and
// read_split tallies the reasons in a SkipSummary. Only I/O on the
// table itself is a hard error.

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array2, ArrayD};
use ndarray_npy::read_npy;
use rand::Rng;
use std::{
    fs,
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
};

use crate::application::config::PipelineConfig;
use crate::data::padding::pad_features;
use crate::domain::annotation::{AnnotationRow, DatasetSource, GlossClipRecord, ANNOTATION_COLUMN};
use crate::domain::sample::{Sample, SampleLoad, SkipReason, SkipSummary};
use crate::domain::vocab::Vocabulary;

// ─── Annotation tables ────────────────────────────────────────────────────────

/// Parse a pipe-delimited annotation table for `source`.
///
/// Fails when the header lacks the id column or the annotation column.
/// Rows with too few fields are skipped with a warning.
pub fn parse_annotation_table<R: Read>(reader: R, source: DatasetSource) -> Result<Vec<AnnotationRow>> {
    let mut lines = BufReader::new(reader).lines();

    let header = match lines.next() {
        Some(line) => line.context("Cannot read annotation header")?,
        None => bail!("Annotation table is empty"),
    };
    let columns: Vec<&str> = header.trim_end().split('|').map(str::trim).collect();

    let find = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| anyhow!("Annotation table has no '{name}' column"))
    };
    let id_col = find(source.id_column())?;
    let anno_col = find(ANNOTATION_COLUMN)?;
    let needed = id_col.max(anno_col) + 1;

    let mut rows = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let line = line.context("Cannot read annotation row")?;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.trim_end().split('|').collect();
        if fields.len() < needed {
            // header is line 1
            tracing::warn!(
                "Skipping annotation line {}: {} fields, expected at least {}",
                lineno + 2,
                fields.len(),
                needed
            );
            continue;
        }

        rows.push(AnnotationRow::new(fields[id_col].trim(), fields[anno_col].trim()));
    }

    Ok(rows)
}

pub fn read_annotation_table(path: &Path, source: DatasetSource) -> Result<Vec<AnnotationRow>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Cannot open annotation table '{}'", path.display()))?;
    let rows = parse_annotation_table(file, source)
        .with_context(|| format!("Invalid annotation table '{}'", path.display()))?;
    tracing::debug!("Read {} rows from '{}'", rows.len(), path.display());
    Ok(rows)
}

// ─── Path derivation ──────────────────────────────────────────────────────────

/// Strip the trailing frame glob of a Phoenix folder (`v1/1/*.png` → `v1/1`).
fn strip_frame_glob<'a>(folder: &'a str, frame_ext: &str) -> &'a str {
    folder
        .strip_suffix(&format!("/*.{frame_ext}"))
        .unwrap_or(folder)
}

/// Feature file of one annotation row.
pub fn feature_path(row: &AnnotationRow, split: &str, cfg: &PipelineConfig) -> PathBuf {
    match cfg.source {
        DatasetSource::Phoenix => cfg
            .feature_dir
            .join(split)
            .join(format!("{}.npy", strip_frame_glob(&row.id, &cfg.frame_ext))),
        DatasetSource::Krsl => cfg.feature_dir.join(&row.id).with_extension("npy"),
    }
}

/// Directory holding the extracted frames of one annotation row.
pub fn frames_dir(row: &AnnotationRow, split: &str, cfg: &PipelineConfig) -> PathBuf {
    match cfg.source {
        DatasetSource::Phoenix => cfg
            .videos_dir
            .join(split)
            .join(strip_frame_glob(&row.id, &cfg.frame_ext)),
        DatasetSource::Krsl => cfg.videos_dir.join(&row.id).with_extension(""),
    }
}

/// Frame images in `dir` with extension `ext`, in name order.
pub fn list_frames(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read frame directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(ext) {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

// ─── Feature files ────────────────────────────────────────────────────────────

/// Read a `.npy` feature array as `[frames, feature_dim]`.
///
/// Arrays with more than two dims keep their first axis and flatten the rest.
pub fn load_features(path: &Path) -> Result<Array2<f32>> {
    let raw: ArrayD<f32> = read_npy(path)
        .with_context(|| format!("Cannot read features '{}'", path.display()))?;

    if raw.ndim() < 2 {
        bail!("expected at least 2 dims, got shape {:?}", raw.shape());
    }

    let frames = raw.shape()[0];
    let dim: usize = raw.shape()[1..].iter().product();
    let flat: Vec<f32> = raw.iter().copied().collect();

    Array2::from_shape_vec((frames, dim), flat)
        .with_context(|| format!("Cannot reshape features '{}'", path.display()))
}

// ─── Samples ──────────────────────────────────────────────────────────────────

/// Load one row of `split` as a sample, or say why it is skipped.
pub fn load_sample<R: Rng + ?Sized>(
    row: &AnnotationRow,
    vocab: &Vocabulary,
    split: &str,
    cfg: &PipelineConfig,
    rng: &mut R,
) -> SampleLoad {
    let path = feature_path(row, split, cfg);
    if !path.exists() {
        return SampleLoad::Skipped(SkipReason::MissingFeatures(path));
    }

    let mut features = match load_features(&path) {
        Ok(f) => f,
        Err(e) => return SampleLoad::Skipped(SkipReason::MalformedFeatures(format!("{e:#}"))),
    };
    if features.nrows() == 0 {
        return SampleLoad::Skipped(SkipReason::MalformedFeatures(format!(
            "'{}' has no frames",
            path.display()
        )));
    }

    let mut targets = vocab.encode(&row.annotation);

    if cfg.fix_shapes {
        features = pad_features(&features, cfg.video_seq_len, rng);
        targets.truncate(cfg.max_out_len);
    } else {
        let frames = features.nrows();
        if frames < targets.len() {
            return SampleLoad::Skipped(SkipReason::TooFewFrames {
                frames,
                glosses: targets.len(),
            });
        }
        if split == "train" && targets.len() > frames / cfg.min_frames_per_gloss {
            return SampleLoad::Skipped(SkipReason::TargetTooLong {
                targets: targets.len(),
                frames,
                min_frames_per_gloss: cfg.min_frames_per_gloss,
            });
        }
    }

    SampleLoad::Loaded(Sample {
        id: row.id.clone(),
        feature_path: path,
        features,
        targets,
    })
}

/// Everything read from one split.
#[derive(Debug, Clone, Default)]
pub struct SplitData {
    pub samples: Vec<Sample>,
    pub skipped: SkipSummary,
}

/// Load every row of `split`, skipping unusable samples.
pub fn read_split<R: Rng + ?Sized>(
    split: &str,
    vocab: &Vocabulary,
    cfg: &PipelineConfig,
    rng: &mut R,
) -> Result<SplitData> {
    let rows = read_annotation_table(&cfg.split_table_path(split), cfg.source)?;
    tracing::info!("Reading {split} split ({} rows)", rows.len());

    let mut data = SplitData::default();
    for (i, row) in rows.iter().enumerate() {
        match load_sample(row, vocab, split, cfg, rng) {
            SampleLoad::Loaded(sample) => data.samples.push(sample),
            SampleLoad::Skipped(reason) => {
                tracing::debug!("Skipping '{}': {reason}", row.id);
                data.skipped.record(&reason);
            }
        }

        if cfg.progress_every > 0 && (i + 1) % cfg.progress_every == 0 {
            tracing::info!("[{split}] {}/{} rows", i + 1, rows.len());
        }
    }

    data.skipped.log(split);
    tracing::info!("[{split}] loaded {} samples", data.samples.len());
    Ok(data)
}

// ─── Gloss clip tables ────────────────────────────────────────────────────────

pub fn write_gloss_table(path: &Path, records: &[GlossClipRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;

    writeln!(file, "{}", GlossClipRecord::HEADER)?;
    for r in records {
        writeln!(file, "{}", r.to_csv_row())?;
    }

    tracing::info!("Wrote {} clips to '{}'", records.len(), path.display());
    Ok(())
}

pub fn parse_gloss_table<R: Read>(reader: R) -> Result<Vec<GlossClipRecord>> {
    let mut lines = BufReader::new(reader).lines();

    match lines.next() {
        Some(header) => {
            let header = header?;
            if header.trim() != GlossClipRecord::HEADER {
                bail!("unexpected gloss table header '{}'", header.trim());
            }
        }
        None => bail!("Gloss table is empty"),
    }

    let mut records = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // folder never contains a comma; the id is the last field
        let parsed = line.split_once(',').and_then(|(folder, rest)| {
            let (gloss, idx) = rest.rsplit_once(',')?;
            Some((folder, gloss, idx.parse::<usize>().ok()?))
        });
        let Some((folder, gloss, idx)) = parsed else {
            bail!("malformed gloss table line {}: '{line}'", lineno + 2);
        };

        records.push(GlossClipRecord::new(folder, gloss, idx));
    }

    Ok(records)
}

pub fn read_gloss_table(path: &Path) -> Result<Vec<GlossClipRecord>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Cannot open gloss table '{}'", path.display()))?;
    parse_gloss_table(file).with_context(|| format!("Invalid gloss table '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use ndarray_npy::write_npy;
    use rand::{rngs::StdRng, SeedableRng};

    const PHOENIX_TABLE: &str = "\
id|folder|signer|annotation
a|a/1/*.png|S1|REGEN WIND
b|b/1/*.png|S2|SONNE

c|c/1/*.png|S1|REGEN REGEN REGEN
";

    fn vocab() -> Vocabulary {
        Vocabulary::from_glosses(["REGEN", "WIND", "SONNE"])
    }

    fn cfg_in(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            anno_dir: dir.join("anno"),
            feature_dir: dir.join("feats"),
            videos_dir: dir.join("videos"),
            progress_every: 1,
            ..Default::default()
        }
    }

    fn write_features(cfg: &PipelineConfig, split: &str, folder: &str, frames: usize) {
        let path = cfg.feature_dir.join(split).join(format!("{folder}.npy"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_npy(&path, &Array2::<f32>::ones((frames, 3))).unwrap();
    }

    #[test]
    fn test_parse_phoenix_table() {
        let rows = parse_annotation_table(PHOENIX_TABLE.as_bytes(), DatasetSource::Phoenix).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], AnnotationRow::new("a/1/*.png", "REGEN WIND"));
        assert_eq!(rows[2].annotation, "REGEN REGEN REGEN");
    }

    #[test]
    fn test_missing_column_is_named() {
        let err = parse_annotation_table(PHOENIX_TABLE.as_bytes(), DatasetSource::Krsl).unwrap_err();
        assert!(err.to_string().contains("'video'"));
    }

    #[test]
    fn test_feature_and_frame_paths() {
        let cfg = PipelineConfig {
            feature_dir: PathBuf::from("f"),
            videos_dir: PathBuf::from("v"),
            ..Default::default()
        };
        let row = AnnotationRow::new("a/1/*.png", "X");
        assert_eq!(feature_path(&row, "dev", &cfg), PathBuf::from("f/dev/a/1.npy"));
        assert_eq!(frames_dir(&row, "dev", &cfg), PathBuf::from("v/dev/a/1"));

        let krsl = PipelineConfig { source: DatasetSource::Krsl, ..cfg };
        let row = AnnotationRow::new("p1/s3.mp4", "X");
        assert_eq!(feature_path(&row, "train", &krsl), PathBuf::from("f/p1/s3.npy"));
        assert_eq!(frames_dir(&row, "train", &krsl), PathBuf::from("v/p1/s3"));
    }

    #[test]
    fn test_load_features_flattens_trailing_dims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.npy");
        write_npy(&path, &Array3::<f32>::zeros((5, 2, 3))).unwrap();
        assert_eq!(load_features(&path).unwrap().dim(), (5, 6));
    }

    #[test]
    fn test_one_dimensional_features_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_in(dir.path());
        let path = cfg.feature_dir.join("dev").join("a/1.npy");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_npy(&path, &ndarray::Array1::<f32>::zeros(4)).unwrap();

        let row = AnnotationRow::new("a/1/*.png", "REGEN");
        let mut rng = StdRng::seed_from_u64(0);
        match load_sample(&row, &vocab(), "dev", &cfg, &mut rng) {
            SampleLoad::Skipped(reason) => assert_eq!(reason.kind(), "malformed_features"),
            other => panic!("expected a skip, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_reasons_are_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_in(dir.path());
        let mut rng = StdRng::seed_from_u64(0);
        let v = vocab();

        let missing = load_sample(&AnnotationRow::new("z/1/*.png", "REGEN"), &v, "train", &cfg, &mut rng);
        assert!(matches!(missing, SampleLoad::Skipped(SkipReason::MissingFeatures(_))));

        write_features(&cfg, "train", "c/1", 11);
        let long = load_sample(
            &AnnotationRow::new("c/1/*.png", "REGEN REGEN REGEN"),
            &v,
            "train",
            &cfg,
            &mut rng,
        );
        assert_eq!(
            long,
            SampleLoad::Skipped(SkipReason::TargetTooLong {
                targets: 3,
                frames: 11,
                min_frames_per_gloss: 4
            })
        );

        write_features(&cfg, "train", "d/1", 2);
        let short = load_sample(
            &AnnotationRow::new("d/1/*.png", "REGEN WIND SONNE"),
            &v,
            "train",
            &cfg,
            &mut rng,
        );
        assert_eq!(
            short,
            SampleLoad::Skipped(SkipReason::TooFewFrames { frames: 2, glosses: 3 })
        );
    }

    #[test]
    fn test_ctc_filter_only_applies_to_train() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_in(dir.path());
        let mut rng = StdRng::seed_from_u64(0);
        write_features(&cfg, "dev", "c/1", 11);

        let row = AnnotationRow::new("c/1/*.png", "REGEN REGEN REGEN");
        match load_sample(&row, &vocab(), "dev", &cfg, &mut rng) {
            SampleLoad::Loaded(s) => {
                assert_eq!(s.feature_len(), 11);
                assert_eq!(s.targets, vec![1, 1, 1]);
            }
            other => panic!("expected a sample, got {other:?}"),
        }
    }

    #[test]
    fn test_fixed_shapes_pad_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            fix_shapes: true,
            video_seq_len: 16,
            max_out_len: 1,
            ..cfg_in(dir.path())
        };
        write_features(&cfg, "train", "a/1", 40);

        let mut rng = StdRng::seed_from_u64(0);
        let row = AnnotationRow::new("a/1/*.png", "REGEN WIND");
        match load_sample(&row, &vocab(), "train", &cfg, &mut rng) {
            SampleLoad::Loaded(s) => {
                assert_eq!(s.features.dim(), (16, 3));
                assert_eq!(s.targets, vec![1]);
            }
            other => panic!("expected a sample, got {other:?}"),
        }
    }

    #[test]
    fn test_read_split_tallies_skips() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_in(dir.path());
        let table = cfg.split_table_path("train");
        fs::create_dir_all(table.parent().unwrap()).unwrap();
        fs::write(&table, PHOENIX_TABLE).unwrap();
        write_features(&cfg, "train", "a/1", 20);
        write_features(&cfg, "train", "c/1", 8);

        let mut rng = StdRng::seed_from_u64(0);
        let data = read_split("train", &vocab(), &cfg, &mut rng).unwrap();
        assert_eq!(data.samples.len(), 1);
        assert_eq!(data.samples[0].id, "a/1/*.png");
        assert_eq!(data.skipped.count("missing_features"), 1);
        assert_eq!(data.skipped.count("target_too_long"), 1);
    }

    #[test]
    fn test_list_frames_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["f2.png", "f1.png", "notes.txt", "f10.png"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let frames = list_frames(dir.path(), "png").unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["f1.png", "f10.png", "f2.png"]);
    }

    #[test]
    fn test_gloss_table_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gloss_train.csv");
        let records = vec![
            GlossClipRecord::new("0/*.png", "REGEN", 1),
            GlossClipRecord::new("1/*.png", "WIND", 2),
        ];
        write_gloss_table(&path, &records).unwrap();
        assert_eq!(read_gloss_table(&path).unwrap(), records);
    }

    #[test]
    fn test_gloss_table_rejects_bad_header() {
        assert!(parse_gloss_table("a,b\n0/*.png,X,1\n".as_bytes()).is_err());
    }
}
