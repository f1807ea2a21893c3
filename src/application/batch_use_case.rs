// ============================================================
// Layer 2 — Batch Use Case
// ============================================================
// Builds the length-bucketed batches of one split:
//
//   Step 1: Build the vocabulary          (Layer 3 - domain)
//   Step 2: Load the split's samples      (Layer 4 - data, cached)
//   Step 3: Bucket into batches           (Layer 4 - data, cached)
//   Step 4: Summarise the buckets
//
// Both caches live in `vars_dir` and are keyed by feature model,
// split and the settings that shape their content.

use anyhow::Result;
use ndarray::Array2;
use rand::Rng;
use std::collections::BTreeSet;

use crate::application::config::PipelineConfig;
use crate::data::{
    batcher::{split_batches, Batch, SequenceLength},
    loader::read_split,
};
use crate::domain::{sample::Sample, vocab::Vocabulary};
use crate::infra::batch_cache::BatchCache;

/// Load the samples of `split`, through the sample cache when enabled.
pub fn cached_split<R: Rng + ?Sized>(
    split: &str,
    vocab: &Vocabulary,
    cfg:   &PipelineConfig,
    rng:   &mut R,
) -> Result<Vec<Sample>> {
    let fixed = cfg.video_seq_len.to_string();
    let mut parts = vec![cfg.feature_model.as_str(), split];
    if cfg.fix_shapes {
        parts.push(&fixed);
    }
    let key = BatchCache::key("samples", &parts);

    BatchCache::new(&cfg.vars_dir).get_or_build(&key, cfg.cache_batches, || {
        Ok(read_split(split, vocab, cfg, rng)?.samples)
    })
}

/// Summary of one split's batches.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub split:            String,
    pub samples:          usize,
    pub batches:          usize,
    pub distinct_lengths: usize,
    pub largest_batch:    usize,
    pub shortest_seq:     usize,
    pub longest_seq:      usize,
}

impl BatchReport {
    pub fn from_batches<X: SequenceLength>(split: &str, batches: &[Batch<X>]) -> Self {
        let lengths: BTreeSet<usize> = batches.iter().map(|b| b.seq_len()).collect();
        Self {
            split:            split.to_string(),
            samples:          batches.iter().map(Batch::len).sum(),
            batches:          batches.len(),
            distinct_lengths: lengths.len(),
            largest_batch:    batches.iter().map(Batch::len).max().unwrap_or(0),
            shortest_seq:     lengths.first().copied().unwrap_or(0),
            longest_seq:      lengths.last().copied().unwrap_or(0),
        }
    }
}

pub struct BatchUseCase<'a> {
    config: &'a PipelineConfig,
}

impl<'a> BatchUseCase<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn execute<R: Rng + ?Sized>(
        &self,
        split: &str,
        rng:   &mut R,
    ) -> Result<(Vec<Batch<Array2<f32>>>, BatchReport)> {
        let cfg = self.config;

        // ── Step 1: Vocabulary ───────────────────────────────────────────────
        let vocab = Vocabulary::build(cfg.class_list_path())?;

        // ── Step 2 + 3: Samples and batches ──────────────────────────────────
        let format = format!("f{}", cfg.target_format.index());
        let max = format!("b{}", cfg.max_batch_size);
        let fixed = format!("l{}", cfg.video_seq_len);
        let mut parts = vec![cfg.feature_model.as_str(), split, &format, &max];
        if cfg.fix_shapes {
            parts.push(&fixed);
        }
        let key = BatchCache::key("batches", &parts);

        let batches = BatchCache::new(&cfg.vars_dir).get_or_build(&key, cfg.cache_batches, || {
            let samples = cached_split(split, &vocab, cfg, rng)?;
            let (xs, ys): (Vec<Array2<f32>>, Vec<Vec<usize>>) =
                samples.into_iter().map(|s| (s.features, s.targets)).unzip();
            Ok(split_batches(
                &xs,
                &ys,
                cfg.max_batch_size,
                cfg.shuffle,
                cfg.target_format,
                rng,
            ))
        })?;

        // ── Step 4: Summary ──────────────────────────────────────────────────
        let report = BatchReport::from_batches(split, &batches);
        tracing::info!(
            "[{split}] {} samples in {} batches over {} lengths",
            report.samples,
            report.batches,
            report.distinct_lengths
        );

        Ok((batches, report))
    }
}
