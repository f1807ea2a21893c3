// ============================================================
// Layer 5 — CTC Decoding
// ============================================================
// Turns the model's per-window class scores into gloss sequences.
//
// Greedy (no decoder handle):
//   [T, N, V] ──swap──▶ [N, T, V] ──argmax──▶ [N, T]
//   then per sample the CTC collapse rule:
//
//     classes  0 0 3 3 0 5 5 5 0
//     emit       3     5            → [3, 5]
//
//   a class is emitted only when it is not blank and differs from
//   the class seen at the previous step (a blank in between lets a
//   gloss repeat: 3 0 3 → [3, 3]).
//
// With a decoder handle:
//   the tensor is handed over as one ProbMatrix per sample and
//   only the top beam of each sample, cut to its reported length,
//   is kept.
//
// Both paths are pure functions of the prediction tensor.

use anyhow::{anyhow, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::traits::{DecodeOutput, ProbMatrix, SequenceDecoder};
use crate::domain::vocab::BLANK_ID;
use crate::ml::beam::BeamSearchDecoder;

// ─── Config ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// 1 or less decodes greedily on the tensor.
    pub beam_width: usize,
    /// Classes considered per time step by the beam search.
    pub cutoff_top_n: usize,
    /// Scores are log-probabilities rather than probabilities.
    pub log_probs_input: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_width: 1,
            cutoff_top_n: 40,
            log_probs_input: true,
        }
    }
}

impl DecoderConfig {
    /// The decoder handle for [`predict_glosses`]; `None` means greedy.
    pub fn build(&self) -> Option<Box<dyn SequenceDecoder>> {
        (self.beam_width > 1).then(|| {
            Box::new(BeamSearchDecoder::new(
                self.beam_width,
                self.cutoff_top_n,
                self.log_probs_input,
                BLANK_ID,
            )) as Box<dyn SequenceDecoder>
        })
    }

    pub fn describe(&self) -> String {
        if self.beam_width > 1 {
            format!("beam{}", self.beam_width)
        } else {
            "greedy".to_string()
        }
    }
}

// ─── Collapse ─────────────────────────────────────────────────────────────────

/// CTC collapse: drop blanks and repeats of the previously seen class.
pub fn collapse_ctc(classes: &[usize], blank: usize) -> Vec<usize> {
    collapse_with_steps(classes, blank).0
}

/// [`collapse_ctc`] that also reports the step each id was emitted at.
pub fn collapse_with_steps(classes: &[usize], blank: usize) -> (Vec<usize>, Vec<usize>) {
    let mut ids = Vec::new();
    let mut steps = Vec::new();
    let mut prev = None;

    for (t, &c) in classes.iter().enumerate() {
        if c != blank && prev != Some(c) {
            ids.push(c);
            steps.push(t);
        }
        prev = Some(c);
    }

    (ids, steps)
}

fn argmax(row: &[f32]) -> (usize, f32) {
    let mut best = 0;
    let mut best_val = row[0];
    for (i, &v) in row.iter().enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    (best, best_val)
}

// ─── GreedyDecoder ────────────────────────────────────────────────────────────
/// Arg-max per step, then collapse. One beam per sample.
#[derive(Debug, Clone)]
pub struct GreedyDecoder {
    pub blank: usize,
    pub log_probs_input: bool,
}

impl Default for GreedyDecoder {
    fn default() -> Self {
        Self { blank: BLANK_ID, log_probs_input: true }
    }
}

impl SequenceDecoder for GreedyDecoder {
    fn decode(&mut self, batch: &[ProbMatrix]) -> DecodeOutput {
        let mut out = DecodeOutput::default();

        for m in batch {
            let mut classes = Vec::with_capacity(m.steps);
            let mut score = 0.0;
            for t in 0..m.steps {
                let (c, v) = argmax(m.row(t));
                classes.push(c);
                score += if self.log_probs_input { v } else { v.max(f32::MIN_POSITIVE).ln() };
            }

            let (mut ids, steps) = collapse_with_steps(&classes, self.blank);
            let len = ids.len();
            ids.resize(m.steps, self.blank);

            out.hypotheses.push(vec![ids]);
            out.scores.push(vec![score]);
            out.timesteps.push(vec![steps]);
            out.lengths.push(vec![len]);
        }

        out
    }
}

// ─── predict_glosses ──────────────────────────────────────────────────────────

/// Decode `preds` (`[T, N, V]`) into one gloss-id sequence per sample.
pub fn predict_glosses<'d, B: Backend>(
    preds: Tensor<B, 3>,
    decoder: Option<&mut (dyn SequenceDecoder + 'd)>,
) -> Result<Vec<Vec<usize>>> {
    let [steps, batch, classes] = preds.dims();
    let per_sample = preds.swap_dims(0, 1); // [N, T, V]

    match decoder {
        None => {
            let best: Vec<i64> = per_sample
                .argmax(2)
                .into_data()
                .convert::<i64>()
                .to_vec::<i64>()
                .map_err(|e| anyhow!("Cannot read arg-max classes: {e:?}"))?;

            // one row per sample, empty rows included
            Ok((0..batch)
                .map(|n| {
                    let row: Vec<usize> = best[n * steps..(n + 1) * steps]
                        .iter()
                        .map(|&c| c as usize)
                        .collect();
                    collapse_ctc(&row, BLANK_ID)
                })
                .collect())
        }
        Some(decoder) => {
            let flat: Vec<f32> = per_sample
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow!("Cannot read predictions: {e:?}"))?;

            let size = steps * classes;
            let matrices: Vec<ProbMatrix> = (0..batch)
                .map(|n| ProbMatrix::new(flat[n * size..(n + 1) * size].to_vec(), steps, classes))
                .collect();

            let out = decoder.decode(&matrices);
            Ok((0..batch).map(|n| out.top(n).to_vec()).collect())
        }
    }
}
