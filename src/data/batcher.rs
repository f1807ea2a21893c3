// ============================================================
// Layer 4 — Length-Bucketed Batcher
// ============================================================
// Groups variable-length feature sequences into mini-batches whose
// members all have EXACTLY the same length, so a batch stacks into
// one [N, L, D] tensor with no padding at all.
//
// Algorithm:
//   1. Length table: feature length → sample indices (first-seen order)
//   2. Optionally shuffle the order of lengths, and the indices
//      inside every length
//   3. Cut each length group into consecutive chunks of at most
//      max_batch_size; each chunk is one batch (the last chunk of a
//      group may be smaller)
//
//   lengths: [5, 7, 5, 5, 7]   max=2
//   table:   5 → [0, 2, 3]     7 → [1, 4]
//   batches: [0, 2] [3] [1, 4]
//
// Batch order is length-bucket-major, not sample order.
//
// Targets are attached in one of three encodings:
//   Concatenated — one flat id stream + per-sample lengths
//                  (CTC losses over flattened labels)
//   Padded       — zero-padded [N, max_len] matrix + lengths
//   Raw          — the per-sample lists untouched
//
// GlossBatcher implements burn's Batcher trait and turns a list of
// same-length items into the tensor batch the model consumes.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use ndarray::Array2;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Sequence length ──────────────────────────────────────────────────────────
/// Anything with a temporal length the batcher can bucket on.
pub trait SequenceLength {
    fn seq_len(&self) -> usize;
}

impl SequenceLength for Array2<f32> {
    fn seq_len(&self) -> usize {
        self.nrows()
    }
}

impl<T> SequenceLength for Vec<T> {
    fn seq_len(&self) -> usize {
        self.len()
    }
}

// ─── Target encodings ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Concatenated,
    Padded,
    Raw,
}

impl TargetFormat {
    /// 0 → Concatenated, 1 → Padded, anything else → Raw.
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => TargetFormat::Concatenated,
            1 => TargetFormat::Padded,
            _ => TargetFormat::Raw,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            TargetFormat::Concatenated => 0,
            TargetFormat::Padded => 1,
            TargetFormat::Raw => 2,
        }
    }
}

/// Targets of one batch in the chosen encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetBatch {
    Concatenated { targets: Vec<usize>, lengths: Vec<usize> },
    Padded { targets: Array2<usize>, lengths: Vec<usize> },
    Raw(Vec<Vec<usize>>),
}

impl TargetBatch {
    pub fn encode(format: TargetFormat, targets: &[&[usize]]) -> Self {
        let lengths: Vec<usize> = targets.iter().map(|t| t.len()).collect();

        match format {
            TargetFormat::Concatenated => TargetBatch::Concatenated {
                targets: targets.iter().flat_map(|t| t.iter().copied()).collect(),
                lengths,
            },
            TargetFormat::Padded => {
                let max_len = lengths.iter().copied().max().unwrap_or(0);
                let mut padded = Array2::zeros((targets.len(), max_len));
                for (row, t) in targets.iter().enumerate() {
                    for (col, &id) in t.iter().enumerate() {
                        padded[[row, col]] = id;
                    }
                }
                TargetBatch::Padded { targets: padded, lengths }
            }
            TargetFormat::Raw => TargetBatch::Raw(targets.iter().map(|t| t.to_vec()).collect()),
        }
    }

    pub fn lengths(&self) -> Vec<usize> {
        match self {
            TargetBatch::Concatenated { lengths, .. } | TargetBatch::Padded { lengths, .. } => {
                lengths.clone()
            }
            TargetBatch::Raw(ts) => ts.iter().map(Vec::len).collect(),
        }
    }

    /// Recover the per-sample target lists whatever the encoding.
    pub fn to_sequences(&self) -> Vec<Vec<usize>> {
        match self {
            TargetBatch::Concatenated { targets, lengths } => {
                let mut out = Vec::with_capacity(lengths.len());
                let mut start = 0;
                for &len in lengths {
                    out.push(targets[start..start + len].to_vec());
                    start += len;
                }
                out
            }
            TargetBatch::Padded { targets, lengths } => lengths
                .iter()
                .enumerate()
                .map(|(row, &len)| targets.row(row).iter().take(len).copied().collect())
                .collect(),
            TargetBatch::Raw(ts) => ts.clone(),
        }
    }
}

// ─── Batch ────────────────────────────────────────────────────────────────────
/// One length-homogeneous batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch<X> {
    /// Indices of the members in the input lists.
    pub members: Vec<usize>,
    pub features: Vec<X>,
    pub targets: TargetBatch,
}

impl<X: SequenceLength> Batch<X> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Shared feature length of every member.
    pub fn seq_len(&self) -> usize {
        self.features.first().map(|x| x.seq_len()).unwrap_or(0)
    }
}

/// Group sample indices by exact length into batches of at most `max_batch_size`.
///
/// # Panics
/// Panics if `max_batch_size` is zero.
pub fn bucket_by_length<R: Rng + ?Sized>(
    lengths: &[usize],
    max_batch_size: usize,
    shuffle: bool,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    assert!(max_batch_size > 0, "max_batch_size must be positive");

    // Vec + slot map keeps lengths in first-seen order
    let mut table: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut slots: HashMap<usize, usize> = HashMap::new();
    for (idx, &len) in lengths.iter().enumerate() {
        let slot = *slots.entry(len).or_insert_with(|| {
            table.push((len, Vec::new()));
            table.len() - 1
        });
        table[slot].1.push(idx);
    }

    if shuffle {
        table.shuffle(rng);
    }

    let mut batches = Vec::new();
    for (_, mut idxs) in table {
        if shuffle {
            idxs.shuffle(rng);
        }
        batches.extend(idxs.chunks(max_batch_size).map(<[usize]>::to_vec));
    }

    tracing::debug!(
        "Bucketed {} samples into {} batches (max {})",
        lengths.len(),
        batches.len(),
        max_batch_size
    );

    batches
}

/// Split parallel feature/target lists into length-homogeneous batches.
///
/// # Panics
/// Panics if the lists differ in length or `max_batch_size` is zero.
pub fn split_batches<X, R>(
    xs: &[X],
    ys: &[Vec<usize>],
    max_batch_size: usize,
    shuffle: bool,
    format: TargetFormat,
    rng: &mut R,
) -> Vec<Batch<X>>
where
    X: SequenceLength + Clone,
    R: Rng + ?Sized,
{
    assert_eq!(xs.len(), ys.len(), "features and targets must be parallel");

    let lengths: Vec<usize> = xs.iter().map(SequenceLength::seq_len).collect();

    bucket_by_length(&lengths, max_batch_size, shuffle, rng)
        .into_iter()
        .map(|members| {
            let features = members.iter().map(|&i| xs[i].clone()).collect();
            let targets: Vec<&[usize]> = members.iter().map(|&i| ys[i].as_slice()).collect();
            Batch {
                targets: TargetBatch::encode(format, &targets),
                features,
                members,
            }
        })
        .collect()
}

// ─── Tensor batching ──────────────────────────────────────────────────────────
/// One sample ready for stacking.
#[derive(Debug, Clone, PartialEq)]
pub struct GlossItem {
    /// `[L, D]`
    pub features: Array2<f32>,
    pub targets: Vec<usize>,
}

/// A stacked batch for the model forward pass.
#[derive(Debug, Clone)]
pub struct GlossBatch<B: Backend> {
    /// `[batch_size, seq_len, feature_dim]`
    pub features: Tensor<B, 3>,
    pub targets: TargetBatch,
}

#[derive(Clone, Debug)]
pub struct GlossBatcher<B: Backend> {
    pub device: B::Device,
    pub format: TargetFormat,
}

impl<B: Backend> GlossBatcher<B> {
    pub fn new(device: B::Device, format: TargetFormat) -> Self {
        Self { device, format }
    }
}

impl<B: Backend> Batcher<GlossItem, GlossBatch<B>> for GlossBatcher<B> {
    /// Stack items into `[N, L, D]`.
    ///
    /// Items must share one shape; length bucketing upstream guarantees it.
    fn batch(&self, items: Vec<GlossItem>) -> GlossBatch<B> {
        let batch_size = items.len();
        let (seq_len, dim) = items
            .first()
            .map(|i| i.features.dim())
            .unwrap_or((0, 0));

        assert!(
            items.iter().all(|i| i.features.dim() == (seq_len, dim)),
            "batch items must share one feature shape"
        );

        // Logical (row-major) order regardless of the arrays' memory layout
        let flat: Vec<f32> = items
            .iter()
            .flat_map(|i| i.features.iter().copied())
            .collect();

        let features = Tensor::<B, 3>::from_data(
            TensorData::new(flat, [batch_size, seq_len, dim]),
            &self.device,
        );

        let targets: Vec<&[usize]> = items.iter().map(|i| i.targets.as_slice()).collect();

        GlossBatch {
            features,
            targets: TargetBatch::encode(self.format, &targets),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = burn::backend::NdArray;

    fn seq(len: usize) -> Vec<u8> {
        vec![0; len]
    }

    #[test]
    fn test_unshuffled_buckets_follow_first_seen_order() {
        let mut rng = StdRng::seed_from_u64(0);
        let batches = bucket_by_length(&[5, 7, 5, 5, 7], 2, false, &mut rng);
        assert_eq!(batches, vec![vec![0, 2], vec![3], vec![1, 4]]);
    }

    #[test]
    fn test_batches_are_homogeneous_and_cover_every_sample_once() {
        let mut rng = StdRng::seed_from_u64(17);
        let lens: Vec<usize> = (0..200).map(|i| 3 + (i * 7) % 11).collect();
        let xs: Vec<Vec<u8>> = lens.iter().map(|&l| seq(l)).collect();
        let ys: Vec<Vec<usize>> = (0..200).map(|i| vec![1; 1 + i % 3]).collect();

        let batches = split_batches(&xs, &ys, 8, true, TargetFormat::Raw, &mut rng);

        let mut seen = vec![0usize; xs.len()];
        for b in &batches {
            assert!(!b.is_empty() && b.len() <= 8);
            let l = b.seq_len();
            assert!(b.features.iter().all(|x| x.len() == l));
            for &m in &b.members {
                assert_eq!(lens[m], l);
                seen[m] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_only_last_chunk_of_a_bucket_is_short() {
        let mut rng = StdRng::seed_from_u64(0);
        let batches = bucket_by_length(&[4; 10], 4, false, &mut rng);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_concatenated_targets() {
        let mut rng = StdRng::seed_from_u64(0);
        let xs = vec![seq(3), seq(3)];
        let ys = vec![vec![1, 2], vec![3, 4, 5]];
        let batches = split_batches(&xs, &ys, 4, false, TargetFormat::Concatenated, &mut rng);
        assert_eq!(
            batches[0].targets,
            TargetBatch::Concatenated { targets: vec![1, 2, 3, 4, 5], lengths: vec![2, 3] }
        );
    }

    #[test]
    fn test_padded_targets_are_left_aligned() {
        let mut rng = StdRng::seed_from_u64(0);
        let xs = vec![seq(3), seq(3)];
        let ys = vec![vec![7], vec![3, 4, 5]];
        let batches = split_batches(&xs, &ys, 4, false, TargetFormat::Padded, &mut rng);
        match &batches[0].targets {
            TargetBatch::Padded { targets, lengths } => {
                assert_eq!(targets.dim(), (2, 3));
                assert_eq!(targets.row(0).to_vec(), vec![7, 0, 0]);
                assert_eq!(targets.row(1).to_vec(), vec![3, 4, 5]);
                assert_eq!(lengths, &vec![1, 3]);
            }
            other => panic!("expected padded targets, got {other:?}"),
        }
    }

    #[test]
    fn test_every_encoding_recovers_sequences() {
        let ys: Vec<&[usize]> = vec![&[1, 2], &[], &[9, 8, 7]];
        for idx in 0..3 {
            let tb = TargetBatch::encode(TargetFormat::from_index(idx), &ys);
            assert_eq!(tb.to_sequences(), vec![vec![1, 2], vec![], vec![9, 8, 7]]);
            assert_eq!(tb.lengths(), vec![2, 0, 3]);
        }
    }

    #[test]
    fn test_format_index_mapping() {
        assert_eq!(TargetFormat::from_index(0), TargetFormat::Concatenated);
        assert_eq!(TargetFormat::from_index(1), TargetFormat::Padded);
        assert_eq!(TargetFormat::from_index(2), TargetFormat::Raw);
        assert_eq!(TargetFormat::from_index(9), TargetFormat::Raw);
    }

    #[test]
    #[should_panic]
    fn test_zero_batch_size_panics() {
        let mut rng = StdRng::seed_from_u64(0);
        let _ = bucket_by_length(&[1, 2], 0, false, &mut rng);
    }

    #[test]
    fn test_gloss_batcher_stacks_rows_in_order() {
        let device = Default::default();
        let batcher = GlossBatcher::<TestBackend>::new(device, TargetFormat::Raw);
        let items = vec![
            GlossItem {
                features: Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
                targets: vec![1],
            },
            GlossItem {
                features: Array2::from_shape_vec((2, 2), vec![5.0, 6.0, 7.0, 8.0]).unwrap(),
                targets: vec![2, 3],
            },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.features.dims(), [2, 2, 2]);
        let values: Vec<f32> = batch.features.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(batch.targets, TargetBatch::Raw(vec![vec![1], vec![2, 3]]));
    }
}
