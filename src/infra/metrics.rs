// ============================================================
// Layer 6 — Metrics
// ============================================================
// Word error rate over gloss sequences, and a CSV log of every
// evaluation run.
//
// WER:
//   For each sentence, the Levenshtein distance between the
//   hypothesis and the reference gloss ids (substitutions,
//   insertions, deletions all cost 1). Distances are summed over
//   the split and divided by the total reference length:
//
//     WER = 100 · Σ dist(hyp_i, ref_i) / Σ |ref_i|
//
//   ref [1 2 3]  hyp [1 3]     → 1 deletion    → 33.3
//   ref [1 2]    hyp [1 2 2 4] → 2 insertions  → 100.0
//
//   WER can exceed 100 when hypotheses are much longer than the
//   references.
//
// Output file: <metrics_dir>/metrics.csv
//
//   split,samples,wer,decoder
//   dev,540,41.250000,greedy
//   dev,540,39.870000,beam10

use anyhow::{ensure, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// Edit distance between two id sequences.
pub fn levenshtein(a: &[usize], b: &[usize]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, x) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(x != y);
            curr[j + 1] = sub.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Corpus-level word error rate in percent.
///
/// An empty reference set gives 0.
pub fn word_error_rate(hyps: &[Vec<usize>], refs: &[Vec<usize>]) -> Result<f64> {
    ensure!(
        hyps.len() == refs.len(),
        "{} hypotheses for {} references",
        hyps.len(),
        refs.len()
    );

    let errors: usize = hyps.iter().zip(refs).map(|(h, r)| levenshtein(h, r)).sum();
    let words: usize = refs.iter().map(Vec::len).sum();

    if words == 0 {
        return Ok(0.0);
    }
    Ok(100.0 * errors as f64 / words as f64)
}

/// One evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub split:   String,
    pub samples: usize,
    /// Percent
    pub wer:     f64,
    /// Decoding policy, e.g. `greedy` or `beam10`
    pub decoder: String,
}

impl EvalMetrics {
    pub fn new(split: impl Into<String>, samples: usize, wer: f64, decoder: impl Into<String>) -> Self {
        Self { split: split.into(), samples, wer, decoder: decoder.into() }
    }
}

/// Appends evaluation results to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");

        // Appending across runs keeps one history per directory
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "split,samples,wer,decoder")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EvalMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(f, "{},{},{:.6},{}", m.split, m.samples, m.wer, m.decoder)?;

        tracing::debug!("Logged {} WER {:.2} ({})", m.split, m.wer, m.decoder);
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
