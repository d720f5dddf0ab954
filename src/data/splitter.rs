// ============================================================
// Layer 4 — Train/Validation/Test Partitioner
// ============================================================
// Assigns every corpus index to exactly one of three subsets:
//   - Training set:   used to update model weights
//   - Validation set: measured after every epoch
//   - Test set:       measured once, after training
//
// The assignment is a pure function of (corpus size, seed,
// max_samples), so re-running an experiment with the same
// seed on the same corpus reproduces the same split.
//
// Algorithm:
//   1. If max_samples < n, draw max_samples indices uniformly
//      without replacement (ChaCha8 seeded with `seed`)
//   2. Shuffle the kept indices with a fresh ChaCha8 seeded
//      with the same `seed`
//   3. Cut at floor(0.8·n) and floor(0.1·n); test takes the rest
//
// Reference: rand crate documentation (seq::index::sample)

use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const TRAIN_FRACTION: f64 = 0.8;
pub const VAL_FRACTION:   f64 = 0.1;

/// Smallest n for which floor(0.8n) and floor(0.1n) and the
/// remainder are all non-empty.
pub const MIN_SAMPLES: usize = 10;

/// Disjoint index sets into the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub val:   Vec<usize>,
    pub test:  Vec<usize>,
}

impl Split {
    /// Total number of assigned indices.
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `corpus_len` indices into train/val/test.
///
/// # Errors
/// * `EmptyCorpus`         — `corpus_len == 0`
/// * `InsufficientSamples` — fewer than [`MIN_SAMPLES`] indices remain after subsampling
pub fn partition(corpus_len: usize, seed: u64, max_samples: Option<usize>) -> Result<Split> {
    if corpus_len == 0 {
        return Err(Error::EmptyCorpus(Default::default()));
    }

    // ── Step 1: optional subsample ────────────────────────────────────────────
    let mut indices: Vec<usize> = match max_samples {
        Some(k) if k < corpus_len => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            index::sample(&mut rng, corpus_len, k).into_vec()
        }
        _ => (0..corpus_len).collect(),
    };

    let n = indices.len();
    if n < MIN_SAMPLES {
        return Err(Error::InsufficientSamples { found: n, required: MIN_SAMPLES });
    }

    // ── Step 2: shuffle with the same seed ────────────────────────────────────
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    // ── Step 3: cut ───────────────────────────────────────────────────────────
    let train_len = (n as f64 * TRAIN_FRACTION).floor() as usize;
    let val_len   = (n as f64 * VAL_FRACTION).floor() as usize;

    let test  = indices.split_off(train_len + val_len);
    let val   = indices.split_off(train_len);
    let train = indices;

    tracing::debug!(
        "Dataset split: {} train, {} validation, {} test (seed {})",
        train.len(),
        val.len(),
        test.len(),
        seed,
    );

    Ok(Split { train, val, test })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_sizes_for_100() {
        let split = partition(100, 42, None).unwrap();
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.val.len(),   10);
        assert_eq!(split.test.len(),  10);
    }

    #[test]
    fn test_remainder_goes_to_test() {
        // floor(0.8*17)=13, floor(0.1*17)=1, remainder 3
        let split = partition(17, 1, None).unwrap();
        assert_eq!((split.train.len(), split.val.len(), split.test.len()), (13, 1, 3));
    }

    #[test]
    fn test_subsample_caps_size() {
        let split = partition(1000, 7, Some(50)).unwrap();
        assert_eq!(split.len(), 50);
        assert!(split.train.iter().chain(&split.val).chain(&split.test).all(|&i| i < 1000));
    }

    #[test]
    fn test_max_samples_larger_than_corpus_keeps_everything() {
        let split = partition(20, 7, Some(2000)).unwrap();
        assert_eq!(split.len(), 20);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(matches!(partition(0, 42, None), Err(Error::EmptyCorpus(_))));
    }

    #[test]
    fn test_too_small() {
        assert!(matches!(
            partition(9, 42, None),
            Err(Error::InsufficientSamples { found: 9, required: 10 })
        ));
        assert!(matches!(
            partition(100, 42, Some(5)),
            Err(Error::InsufficientSamples { found: 5, .. })
        ));
        assert!(partition(10, 42, None).is_ok());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = partition(200, 1, None).unwrap();
        let b = partition(200, 2, None).unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_same_seed_same_split(seed in any::<u64>(), n in 10usize..500, cap in proptest::option::of(10usize..600)) {
            prop_assert_eq!(partition(n, seed, cap).unwrap(), partition(n, seed, cap).unwrap());
        }

        #[test]
        fn prop_disjoint_and_complete(seed in any::<u64>(), n in 10usize..500) {
            let split = partition(n, seed, None).unwrap();
            let all: Vec<usize> = split.train.iter().chain(&split.val).chain(&split.test).copied().collect();
            let unique: HashSet<usize> = all.iter().copied().collect();
            prop_assert_eq!(all.len(), n);
            prop_assert_eq!(unique.len(), n);
            prop_assert_eq!(unique, (0..n).collect::<HashSet<_>>());
        }

        #[test]
        fn prop_subsample_is_disjoint(seed in any::<u64>(), n in 10usize..500, k in 10usize..500) {
            let split = partition(n, seed, Some(k)).unwrap();
            let all: Vec<usize> = split.train.iter().chain(&split.val).chain(&split.test).copied().collect();
            let unique: HashSet<usize> = all.iter().copied().collect();
            prop_assert_eq!(all.len(), k.min(n));
            prop_assert_eq!(unique.len(), all.len());
        }
    }
}
