// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// One subcommand per use case. Flags given here override the
// matching PipelineConfig field; anything not given keeps the
// config file's (or default) value.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::config::PipelineConfig;
use crate::data::batcher::TargetFormat;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the gloss vocabulary from the training class list
    Vocab(VocabArgs),

    /// Load a split and bucket it into batches
    Batches(BatchArgs),

    /// Recognise the glosses of one feature file
    Decode(DecodeArgs),

    /// Word error rate of the checkpoint on a split
    Evaluate(EvaluateArgs),

    /// Cut the train videos into gloss clips and write gloss_train/val.csv
    Segment(SegmentArgs),

    /// Bucket the gloss clip dataset into batches
    Clips(ClipsArgs),
}

#[derive(Args, Debug)]
pub struct VocabArgs {
    /// Annotation text to encode and decode again
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Split name, e.g. train / dev / test
    #[arg(long, default_value = "train")]
    pub split: String,

    /// 0 = concatenated, 1 = padded, anything else = raw
    #[arg(long)]
    pub target_format: Option<u8>,

    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// Keep buckets and their members in first-seen order
    #[arg(long)]
    pub no_shuffle: bool,
}

impl BatchArgs {
    pub fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(f) = self.target_format {
            cfg.target_format = TargetFormat::from_index(f);
        }
        if let Some(n) = self.max_batch_size {
            cfg.max_batch_size = n;
        }
        if self.no_shuffle {
            cfg.shuffle = false;
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// `.npy` feature file of one video
    #[arg(long)]
    pub features: PathBuf,

    /// Beam width; 1 decodes greedily
    #[arg(long)]
    pub beam_width: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "dev")]
    pub split: String,

    /// Beam width; 1 decodes greedily
    #[arg(long)]
    pub beam_width: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SegmentArgs {
    /// Record clip paths without copying frames
    #[arg(long)]
    pub no_write: bool,
}

#[derive(Args, Debug)]
pub struct ClipsArgs {
    /// `train` or `val`
    #[arg(long, default_value = "train")]
    pub split: String,

    #[arg(long)]
    pub max_batch_size: Option<usize>,
}
