// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles records and cuts them in two:
//   - train: the first floor(L * train_fraction) records
//   - val:   the rest
//
// Used for the generated gloss clip table, which is assembled
// video by video. Without the shuffle every clip of the last
// videos would land in validation.

use rand::{seq::SliceRandom, Rng};

/// Shuffle `records` and split them into (train, val).
///
/// The cut rounds down, so 15 records at 0.9 give 13 / 2. A fraction
/// above 1 keeps everything in train.
pub fn split_train_val<T, R: Rng + ?Sized>(
    mut records: Vec<T>,
    train_fraction: f64,
    rng: &mut R,
) -> (Vec<T>, Vec<T>) {
    records.shuffle(rng);

    let n = records.len();
    let cut = (((n as f64) * train_fraction).floor() as usize).min(n);
    let val = records.split_off(cut);

    tracing::debug!("Split {n} records: {} train / {} val", records.len(), val.len());
    (records, val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::annotation::GlossClipRecord;
    use rand::{rngs::StdRng, SeedableRng};

    fn clips(n: usize) -> Vec<GlossClipRecord> {
        (0..n)
            .map(|i| GlossClipRecord::new(format!("{i}/*.png"), "REGEN", 1))
            .collect()
    }

    #[test]
    fn test_cut_rounds_down() {
        let (train, val) = split_train_val(clips(15), 0.9, &mut StdRng::seed_from_u64(0));
        assert_eq!((train.len(), val.len()), (13, 2));

        let (train, val) = split_train_val(clips(100), 0.9, &mut StdRng::seed_from_u64(0));
        assert_eq!((train.len(), val.len()), (90, 10));
    }

    #[test]
    fn test_no_clip_is_lost_or_duplicated() {
        let (train, val) = split_train_val(clips(40), 0.7, &mut StdRng::seed_from_u64(1));
        let mut folders: Vec<String> = train.into_iter().chain(val).map(|r| r.folder).collect();
        folders.sort();
        let mut expected: Vec<String> = clips(40).into_iter().map(|r| r.folder).collect();
        expected.sort();
        assert_eq!(folders, expected);
    }

    #[test]
    fn test_degenerate_fractions() {
        let (train, val) = split_train_val(Vec::<usize>::new(), 0.9, &mut StdRng::seed_from_u64(0));
        assert!(train.is_empty() && val.is_empty());

        let (train, val) = split_train_val(clips(6), 1.0, &mut StdRng::seed_from_u64(0));
        assert_eq!((train.len(), val.len()), (6, 0));

        let (train, val) = split_train_val(clips(6), 0.0, &mut StdRng::seed_from_u64(0));
        assert_eq!((train.len(), val.len()), (0, 6));
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val(clips(30), 0.9, &mut StdRng::seed_from_u64(3));
        let b = split_train_val(clips(30), 0.9, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
