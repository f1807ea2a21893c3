// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap, builds the PipelineConfig and routes to Layer 2.
//
//   slr-ctc [--config FILE] [--seed N] <command>
//
//   vocab     — class list → vocabulary (+ encode a text)
//   batches   — split → length-bucketed batches
//   decode    — one feature file → glosses
//   evaluate  — split → WER, appended to metrics.csv
//   segment   — train videos → gloss clips + tables
//   clips     — gloss clip table → batches
//
// Model commands run on the wgpu backend.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::application::config::PipelineConfig;
use crate::domain::vocab::Vocabulary;
use crate::ml::inferencer::InferBackend;
use commands::Commands;

#[derive(Parser, Debug)]
#[command(
    name = "slr-ctc",
    version = "0.1.0",
    about = "Sign language gloss recognition: batching, CTC decoding and gloss-level segmentation."
)]
pub struct Cli {
    /// JSON file overriding the default configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Seed for shuffling, augmentation and the train/val split
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Build the run configuration: file, then flags, then validation.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut cfg = PipelineConfig::load(self.config.as_deref())?;
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }

        match &self.command {
            Commands::Batches(args) => args.apply(&mut cfg),
            Commands::Decode(args) => {
                if let Some(w) = args.beam_width {
                    cfg.decoder.beam_width = w;
                }
            }
            Commands::Evaluate(args) => {
                if let Some(w) = args.beam_width {
                    cfg.decoder.beam_width = w;
                }
            }
            Commands::Segment(args) => {
                if args.no_write {
                    cfg.write_clips = false;
                }
            }
            Commands::Clips(args) => {
                if let Some(n) = args.max_batch_size {
                    cfg.max_batch_size = n;
                }
            }
            Commands::Vocab(_) => {}
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Dispatch to the use case. Only this layer prints.
    pub fn run(self) -> Result<()> {
        let cfg = self.pipeline_config()?;
        let device = burn::backend::wgpu::WgpuDevice::default();

        match &self.command {
            Commands::Vocab(args) => {
                let vocab = Vocabulary::build(cfg.class_list_path())?;
                println!("{} glosses (blank included)", vocab.len());
                if let Some(text) = &args.text {
                    let encoded = vocab.encode_checked(text);
                    for e in encoded.iter().filter(|e| e.is_fallback()) {
                        tracing::warn!("Unknown gloss {e:?} encoded as blank");
                    }
                    let ids: Vec<usize> = encoded.iter().map(|e| e.id()).collect();
                    println!("{ids:?}");
                    println!("{}", vocab.decode(&ids).join(" "));
                }
            }

            Commands::Batches(args) => {
                use crate::application::batch_use_case::BatchUseCase;

                let mut rng = cfg.rng();
                let (_, report) = BatchUseCase::new(&cfg).execute(&args.split, &mut rng)?;
                println!(
                    "{}: {} samples, {} batches (largest {}), lengths {}..={} over {} buckets",
                    report.split,
                    report.samples,
                    report.batches,
                    report.largest_batch,
                    report.shortest_seq,
                    report.longest_seq,
                    report.distinct_lengths
                );
            }

            Commands::Decode(args) => {
                use crate::application::decode_use_case::DecodeUseCase;

                let glosses = DecodeUseCase::new(&cfg).execute::<InferBackend>(&args.features, device)?;
                println!("{}", glosses.join(" "));
            }

            Commands::Evaluate(args) => {
                use crate::application::evaluate_use_case::EvaluateUseCase;

                let m = EvaluateUseCase::new(&cfg).execute::<InferBackend>(&args.split, device)?;
                println!("{}: WER {:.2}% over {} samples ({})", m.split, m.wer, m.samples, m.decoder);
            }

            Commands::Segment(_) => {
                use crate::application::segment_use_case::SegmentUseCase;

                let r = SegmentUseCase::new(&cfg).execute::<InferBackend>(device)?;
                println!(
                    "{} clips from {} videos ({} skipped): {} train, {} val",
                    r.clips, r.videos, r.skipped, r.train_clips, r.val_clips
                );
            }

            Commands::Clips(args) => {
                use crate::application::clips_use_case::ClipsUseCase;

                let mut rng = cfg.rng();
                let (_, report) = ClipsUseCase::new(&cfg).execute(&args.split, &mut rng)?;
                println!(
                    "{}: {} clips, {} batches, {}..={} frames",
                    report.split, report.samples, report.batches, report.shortest_seq, report.longest_seq
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_flags_override_config() {
        let cli = Cli::parse_from([
            "slr-ctc", "--seed", "5", "batches", "--split", "dev",
            "--target-format", "1", "--max-batch-size", "8", "--no-shuffle",
        ]);
        let cfg = cli.pipeline_config().unwrap();
        assert_eq!(cfg.seed, Some(5));
        assert_eq!(cfg.max_batch_size, 8);
        assert_eq!(cfg.target_format, crate::data::batcher::TargetFormat::Padded);
        assert!(!cfg.shuffle);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = Cli::parse_from(["slr-ctc", "clips", "--max-batch-size", "0"]);
        assert!(cli.pipeline_config().is_err());
    }

    #[test]
    fn test_beam_width_flag() {
        let cli = Cli::parse_from(["slr-ctc", "evaluate", "--beam-width", "10"]);
        let cfg = cli.pipeline_config().unwrap();
        assert_eq!(cfg.decoder.describe(), "beam10");
    }
}
