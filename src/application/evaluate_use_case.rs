// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Word error rate of the checkpointed model on one split:
//
//   Step 1: Vocabulary + samples of the split (cached)
//   Step 2: Serve the split as length-bucketed batches
//   Step 3: Stack each batch and decode it
//   Step 4: WER against the reference glosses, appended to
//           <metrics_dir>/metrics.csv
//
// The split is served without shuffling, so hypotheses come out in
// bucket order; references are taken from the same batches.

use anyhow::{ensure, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::application::{batch_use_case::cached_split, config::PipelineConfig};
use crate::data::{
    batcher::GlossBatcher,
    dataset::{DatasetOptions, GlossDataset},
};
use crate::domain::{sample::SampleRef, vocab::Vocabulary};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{word_error_rate, EvalMetrics, MetricsLogger},
};
use crate::ml::inferencer::{CheckpointPolicy, Recognizer};

/// Serve `split` as it is on disk: no augmentation, even for train.
pub fn evaluation_dataset(split: &str, samples: Vec<SampleRef>, cfg: &PipelineConfig) -> GlossDataset {
    let opts = DatasetOptions {
        augment: None,
        ..DatasetOptions::for_split(split, cfg)
    };
    GlossDataset::new(split, samples, opts)
}

pub struct EvaluateUseCase<'a> {
    config: &'a PipelineConfig,
}

impl<'a> EvaluateUseCase<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn execute<B: Backend>(&self, split: &str, device: B::Device) -> Result<EvalMetrics> {
        let cfg = self.config;
        let mut rng = cfg.rng();

        // ── Step 1 ───────────────────────────────────────────────────────────
        let vocab = Vocabulary::build(cfg.class_list_path())?;
        let samples = cached_split(split, &vocab, cfg, &mut rng)?;
        ensure!(!samples.is_empty(), "No usable samples in split '{split}'");
        let feature_dim = samples[0].features.ncols();

        // ── Step 2 ───────────────────────────────────────────────────────────
        let refs = samples.into_iter().map(|s| s.into_ref()).collect();
        let mut dataset = evaluation_dataset(split, refs, cfg);
        dataset.start_epoch(false, &mut rng);

        // ── Step 3 ───────────────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_path);
        let mut recognizer = Recognizer::<B>::from_checkpoint(
            &ckpt,
            &cfg.model_config(feature_dim, vocab.len()),
            &cfg.decoder,
            CheckpointPolicy::LoadOrInit,
            device.clone(),
        )?;
        let batcher = GlossBatcher::<B>::new(device, cfg.target_format);

        let mut hyps = Vec::with_capacity(dataset.sample_count());
        let mut targets = Vec::with_capacity(dataset.sample_count());
        for i in 0..dataset.len() {
            let batch = batcher.batch(dataset.get_batch(i, &mut rng)?);
            hyps.extend(recognizer.recognize_batch(batch.features)?);
            targets.extend(batch.targets.to_sequences());

            if cfg.progress_every > 0 && (i + 1) % cfg.progress_every == 0 {
                tracing::info!("[{split}] decoded {}/{} batches", i + 1, dataset.len());
            }
        }

        // ── Step 4 ───────────────────────────────────────────────────────────
        let wer = word_error_rate(&hyps, &targets)?;
        let metrics = EvalMetrics::new(split, hyps.len(), wer, cfg.decoder.describe());
        MetricsLogger::new(&cfg.metrics_dir)?.log(&metrics)?;

        tracing::info!(
            "[{split}] WER {:.2}% over {} samples ({})",
            metrics.wer,
            metrics.samples,
            metrics.decoder
        );
        Ok(metrics)
    }
}
