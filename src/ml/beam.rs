// ============================================================
// Layer 5 — CTC Prefix Beam Search
// ============================================================
// Keeps the `beam_width` most likely label prefixes while walking
// the time steps. Every prefix carries two log scores:
//
//   p_b   — paths ending in blank
//   p_nb  — paths ending in the prefix's last label
//
// Per step and per candidate class c:
//
//   c == blank            prefix.p_b  += total(prefix) · p(c)
//   c == last(prefix)     prefix.p_nb += prefix.p_nb · p(c)   (repeat collapses)
//                         prefix+c    += prefix.p_b  · p(c)   (blank in between)
//   otherwise             prefix+c    += total(prefix) · p(c)
//
// All products and sums happen in log space (log-sum-exp). Only the
// `cutoff_top_n` best classes of a step are expanded.
//
// Several paths that collapse to one label sequence are merged into
// one prefix, which is why this can beat greedy decoding:
//
//   T=2, two classes, every step [0.6, 0.4]
//   greedy: blank, blank → []
//   beam:   p([1]) = 0.64 > p([]) = 0.36 → [1]

use std::{cmp::Ordering, collections::HashMap};

use crate::domain::traits::{DecodeOutput, ProbMatrix, SequenceDecoder};

#[derive(Debug, Clone)]
struct Prefix {
    labels: Vec<usize>,
    /// Emission step of each label along the prefix's dominant path.
    timesteps: Vec<usize>,
    p_b: f32,
    p_nb: f32,
}

impl Prefix {
    fn score(&self) -> f32 {
        log_sum_exp(self.p_b, self.p_nb)
    }
}

fn log_sum_exp(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Best first; equal scores fall back to label order so output is stable.
fn rank(a: &Prefix, b: &Prefix) -> Ordering {
    b.score()
        .partial_cmp(&a.score())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.labels.cmp(&b.labels))
}

#[derive(Debug, Clone)]
pub struct BeamSearchDecoder {
    beam_width: usize,
    cutoff_top_n: usize,
    log_probs_input: bool,
    blank: usize,
}

impl BeamSearchDecoder {
    pub fn new(beam_width: usize, cutoff_top_n: usize, log_probs_input: bool, blank: usize) -> Self {
        Self {
            beam_width: beam_width.max(1),
            cutoff_top_n: cutoff_top_n.max(1),
            log_probs_input,
            blank,
        }
    }

    fn log_row(&self, row: &[f32]) -> Vec<f32> {
        if self.log_probs_input {
            row.to_vec()
        } else {
            row.iter()
                .map(|&p| if p > 0.0 { p.ln() } else { f32::NEG_INFINITY })
                .collect()
        }
    }

    /// Ranked prefixes for one sample.
    fn search(&self, m: &ProbMatrix) -> Vec<Prefix> {
        let mut beams = vec![Prefix {
            labels: Vec::new(),
            timesteps: Vec::new(),
            p_b: 0.0,
            p_nb: f32::NEG_INFINITY,
        }];

        for t in 0..m.steps {
            let row = self.log_row(m.row(t));

            let mut classes: Vec<usize> = (0..m.classes).collect();
            if self.cutoff_top_n < m.classes {
                classes.sort_by(|&a, &b| row[b].partial_cmp(&row[a]).unwrap_or(Ordering::Equal));
                classes.truncate(self.cutoff_top_n);
            }

            let mut next: HashMap<Vec<usize>, Candidate> = HashMap::new();

            for beam in &beams {
                let total = beam.score();

                for &c in &classes {
                    let lp = row[c];
                    if lp == f32::NEG_INFINITY {
                        continue;
                    }

                    if c == self.blank {
                        let cand = candidate(&mut next, beam.labels.clone());
                        cand.carry(beam, total + lp, |p| &mut p.p_b);
                        continue;
                    }

                    let mut labels = beam.labels.clone();
                    labels.push(c);

                    if beam.labels.last() == Some(&c) {
                        let cand = candidate(&mut next, beam.labels.clone());
                        cand.carry(beam, beam.p_nb + lp, |p| &mut p.p_nb);

                        candidate(&mut next, labels).extend(beam, beam.p_b + lp, t);
                    } else {
                        candidate(&mut next, labels).extend(beam, total + lp, t);
                    }
                }
            }

            let mut ranked: Vec<Prefix> = next
                .into_values()
                .map(Candidate::finish)
                .filter(|p| p.score() > f32::NEG_INFINITY)
                .collect();
            if ranked.is_empty() {
                // every expanded class had zero probability; keep the old beams
                continue;
            }
            ranked.sort_by(rank);
            ranked.truncate(self.beam_width);
            beams = ranked;
        }

        beams.sort_by(rank);
        beams
    }
}

/// A prefix being scored for the next step.
///
/// The prefix can be reached by carrying a beam with the same labels
/// (blank or collapsed repeat) or by extending a shorter beam. Its
/// label timesteps come from whichever route contributed more.
struct Candidate {
    prefix: Prefix,
    carried: f32,
    extended: f32,
    carried_steps: Vec<usize>,
    extended_steps: Vec<usize>,
}

impl Candidate {
    fn carry(&mut self, beam: &Prefix, score: f32, slot: impl Fn(&mut Prefix) -> &mut f32) {
        let s = slot(&mut self.prefix);
        *s = log_sum_exp(*s, score);
        if self.carried == f32::NEG_INFINITY {
            self.carried_steps = beam.timesteps.clone();
        }
        self.carried = log_sum_exp(self.carried, score);
    }

    fn extend(&mut self, parent: &Prefix, score: f32, t: usize) {
        self.prefix.p_nb = log_sum_exp(self.prefix.p_nb, score);
        if score > self.extended {
            self.extended = score;
            self.extended_steps = parent.timesteps.clone();
            self.extended_steps.push(t);
        }
    }

    fn finish(mut self) -> Prefix {
        self.prefix.timesteps = if self.extended > self.carried {
            self.extended_steps
        } else {
            self.carried_steps
        };
        self.prefix
    }
}

fn candidate(next: &mut HashMap<Vec<usize>, Candidate>, labels: Vec<usize>) -> &mut Candidate {
    next.entry(labels.clone()).or_insert_with(|| Candidate {
        prefix: Prefix {
            labels,
            timesteps: Vec::new(),
            p_b: f32::NEG_INFINITY,
            p_nb: f32::NEG_INFINITY,
        },
        carried: f32::NEG_INFINITY,
        extended: f32::NEG_INFINITY,
        carried_steps: Vec::new(),
        extended_steps: Vec::new(),
    })
}

impl SequenceDecoder for BeamSearchDecoder {
    fn decode(&mut self, batch: &[ProbMatrix]) -> DecodeOutput {
        let mut out = DecodeOutput::default();

        for m in batch {
            let beams = self.search(m);

            let mut hyps = Vec::with_capacity(beams.len());
            let mut scores = Vec::with_capacity(beams.len());
            let mut steps = Vec::with_capacity(beams.len());
            let mut lengths = Vec::with_capacity(beams.len());

            for beam in beams {
                scores.push(beam.score());
                lengths.push(beam.labels.len());
                let mut padded = beam.labels;
                padded.resize(m.steps.max(padded.len()), self.blank);
                hyps.push(padded);
                steps.push(beam.timesteps);
            }

            out.hypotheses.push(hyps);
            out.scores.push(scores);
            out.timesteps.push(steps);
            out.lengths.push(lengths);
        }

        out
    }
}
