// ============================================================
// Layer 4 — Feature Padding / Resampling
// ============================================================
// Maps a feature sequence of any length L to a fixed length T.
//
// Downsample (L > T):
//   step     = L / T
//   leftover = L % T
//   Start at step / 2 and walk T slots. Each slot copies the row at
//   the pointer, then advances by `step`, or by `step + 1` with
//   probability leftover / T. The extra advances are spread across
//   the sequence instead of bunched at the end. A guard stops the
//   pointer from outrunning the rows still needed by later slots.
//
//   Example L=10, T=5: step=2, leftover=0 → rows [1, 3, 5, 7, 9]
//
// Upsample (L <= T):
//   Copy rows 0..L, then repeat row L-1 until T rows exist
//   (edge padding, so recurrent consumers see the last state).
//
// The random source is passed in, so a seeded RNG makes every
// call reproducible.

use ndarray::{Array2, Axis};
use rand::Rng;

/// Source row indices for downsampling `len` rows to `target` rows.
///
/// The result has exactly `target` entries, is strictly increasing and
/// every entry is `< len`.
///
/// # Panics
/// Panics unless `len > target > 0`.
pub fn subsample_indices<R: Rng + ?Sized>(len: usize, target: usize, rng: &mut R) -> Vec<usize> {
    assert!(
        target > 0 && len > target,
        "subsampling needs len ({len}) > target ({target}) > 0"
    );

    let step = len / target;
    let leftover = len % target;
    let jitter_prob = leftover as f64 / target as f64;

    let mut idx = step / 2;
    let mut indices = Vec::with_capacity(target);

    for slot in 0..target {
        indices.push(idx);

        let remaining = target - slot - 1;
        let jitter = rng.gen::<f64>() < jitter_prob;
        if jitter && len - 1 > idx + step * remaining {
            idx += step + 1;
        } else {
            idx += step;
        }
    }

    indices
}

/// Source row indices for edge-padding `len` rows up to `target` rows.
pub fn edge_pad_indices(len: usize, target: usize) -> Vec<usize> {
    (0..target).map(|i| i.min(len.saturating_sub(1))).collect()
}

/// Resample `feats` (`[L, D]`) to exactly `target` rows.
///
/// # Panics
/// Panics on an empty input sequence.
pub fn pad_features<R: Rng + ?Sized>(feats: &Array2<f32>, target: usize, rng: &mut R) -> Array2<f32> {
    let len = feats.nrows();
    assert!(len > 0, "cannot pad an empty feature sequence");

    let indices = if len > target {
        subsample_indices(len, target, rng)
    } else {
        edge_pad_indices(len, target)
    };

    feats.select(Axis(0), &indices)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::{rngs::StdRng, SeedableRng};

    /// Row i holds the value i in every column.
    fn ramp(len: usize, dim: usize) -> Array2<f32> {
        Array2::from_shape_fn((len, dim), |(r, _)| r as f32)
    }

    #[test]
    fn test_exact_multiple_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = pad_features(&ramp(10, 3), 5, &mut rng);
        let rows: Vec<f32> = out.column(0).to_vec();
        assert_eq!(rows, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_upsample_copies_then_repeats_last_row() {
        let mut rng = StdRng::seed_from_u64(0);
        let input = ramp(3, 2);
        let out = pad_features(&input, 6, &mut rng);

        assert_eq!(out.nrows(), 6);
        for r in 0..3 {
            assert_eq!(out.row(r), input.row(r));
        }
        for r in 3..6 {
            assert_eq!(out.row(r), input.row(2));
        }
    }

    #[test]
    fn test_equal_length_is_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        let input = ramp(7, 2);
        assert_eq!(pad_features(&input, 7, &mut rng), input);
    }

    #[test]
    fn test_downsample_indices_are_increasing_and_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for len in 2..120 {
            for target in 1..len {
                let idx = subsample_indices(len, target, &mut rng);
                assert_eq!(idx.len(), target);
                assert!(idx.windows(2).all(|w| w[0] < w[1]), "len={len} target={target}");
                assert!(*idx.last().unwrap() < len, "len={len} target={target}");
            }
        }
    }

    #[test]
    fn test_downsample_jitter_is_bounded() {
        let mut rng = StdRng::seed_from_u64(3);
        let (len, target) = (23, 7); // step 3, leftover 2
        for _ in 0..200 {
            let idx = subsample_indices(len, target, &mut rng);
            assert_eq!(idx[0], 1);
            for w in idx.windows(2) {
                let gap = w[1] - w[0];
                assert!(gap == 3 || gap == 4);
            }
        }
    }

    #[test]
    fn test_downsample_rows_come_from_input() {
        let mut rng = StdRng::seed_from_u64(11);
        let input = ramp(37, 4);
        let out = pad_features(&input, 10, &mut rng);
        assert_eq!(out.nrows(), 10);
        assert_eq!(out.ncols(), 4);
        let src: Vec<f32> = out.column(0).to_vec();
        assert!(src.windows(2).all(|w| w[0] < w[1]));
        assert!(src.iter().all(|&v| v >= 0.0 && v < 37.0 && v.fract() == 0.0));
    }

    #[test]
    fn test_same_seed_same_output() {
        let input = ramp(53, 2);
        let a = pad_features(&input, 16, &mut StdRng::seed_from_u64(5));
        let b = pad_features(&input, 16, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic]
    fn test_empty_input_panics() {
        let mut rng = StdRng::seed_from_u64(0);
        let _ = pad_features(&Array2::<f32>::zeros((0, 3)), 4, &mut rng);
    }
}
