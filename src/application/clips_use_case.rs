// ============================================================
// Layer 2 — Clip Batches Use Case
// ============================================================
// Batches the gloss-level dataset written by the segmenter.
//
//   gloss_<split>.csv ──▶ frames of <clips_dir>/<clip> ──▶ batches
//
// A clip's "sequence" is its list of frame paths, so clips are
// bucketed by frame count the same way feature sequences are. Each
// batch target is the clip's single gloss id.

use anyhow::Result;
use rand::Rng;
use std::path::PathBuf;

use crate::application::{batch_use_case::BatchReport, config::PipelineConfig};
use crate::data::{
    batcher::{split_batches, Batch},
    loader::{list_frames, read_gloss_table},
};
use crate::infra::batch_cache::BatchCache;

pub type ClipBatch = Batch<Vec<PathBuf>>;

pub struct ClipsUseCase<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ClipsUseCase<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn execute<R: Rng + ?Sized>(
        &self,
        split: &str,
        rng:   &mut R,
    ) -> Result<(Vec<ClipBatch>, BatchReport)> {
        let cfg = self.config;
        let max = format!("b{}", cfg.max_batch_size);
        let key = BatchCache::key("clips", &[split, &max]);

        let batches = BatchCache::new(&cfg.vars_dir).get_or_build(&key, cfg.cache_batches, || {
            let records = read_gloss_table(&cfg.gloss_table_path(split))?;

            let mut frames = Vec::with_capacity(records.len());
            let mut targets = Vec::with_capacity(records.len());
            for r in &records {
                let dir = cfg.clips_dir.join(r.clip_dir());
                match list_frames(&dir, &cfg.frame_ext) {
                    Ok(f) if !f.is_empty() => {
                        frames.push(f);
                        targets.push(vec![r.gloss_idx]);
                    }
                    Ok(_) => tracing::warn!("Skipping clip '{}': no frames", r.folder),
                    Err(e) => tracing::warn!("Skipping clip '{}': {e:#}", r.folder),
                }
            }
            tracing::info!("[{split}] {} of {} clips have frames", frames.len(), records.len());

            Ok(split_batches(
                &frames,
                &targets,
                cfg.max_batch_size,
                cfg.shuffle,
                cfg.target_format,
                rng,
            ))
        })?;

        let report = BatchReport::from_batches(split, &batches);
        tracing::info!(
            "[{split}] {} clips in {} batches, {}..={} frames",
            report.samples,
            report.batches,
            report.shortest_seq,
            report.longest_seq
        );
        Ok((batches, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::write_gloss_table;
    use crate::domain::annotation::GlossClipRecord;
    use rand::{rngs::StdRng, SeedableRng};
    use std::fs;

    #[test]
    fn test_clips_bucket_by_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            anno_dir: dir.path().join("anno"),
            clips_dir: dir.path().join("clips"),
            vars_dir: dir.path().join("vars"),
            max_batch_size: 2,
            cache_batches: false,
            ..Default::default()
        };

        for (clip, frames) in [(0, 8), (1, 8), (2, 6), (3, 8)] {
            let d = cfg.clips_dir.join(clip.to_string());
            fs::create_dir_all(&d).unwrap();
            for f in 0..frames {
                fs::write(d.join(format!("{f}.png")), b"x").unwrap();
            }
        }
        let records: Vec<GlossClipRecord> = (0..5)
            .map(|i| GlossClipRecord::new(format!("{i}/*.png"), "REGEN", 1))
            .collect();
        write_gloss_table(&cfg.gloss_table_path("train"), &records).unwrap();

        let mut rng = StdRng::seed_from_u64(2);
        let (batches, report) = ClipsUseCase::new(&cfg).execute("train", &mut rng).unwrap();

        // clip 4 has no directory
        assert_eq!(report.samples, 4);
        // 8-frame clips: 2 + 1, 6-frame clips: 1
        assert_eq!(report.batches, 3);
        assert_eq!((report.shortest_seq, report.longest_seq), (6, 8));
        assert!(batches.iter().all(|b| b.targets.to_sequences().iter().all(|t| t == &vec![1])));
    }

    #[test]
    fn test_missing_gloss_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            anno_dir: dir.path().to_path_buf(),
            cache_batches: false,
            ..Default::default()
        };
        let res = ClipsUseCase::new(&cfg).execute("val", &mut StdRng::seed_from_u64(0));
        assert!(res.is_err());
    }
}
