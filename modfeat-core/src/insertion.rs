//! Folding a run of inserted read bases into a single alignment column
//!
//! An insertion has no reference column of its own, so the whole run is collapsed
//! into one packed integer code plus one representative Phred quality.

use thiserror::Error;

use crate::types::nucleotide_index;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsertionError {
    #[error("Inserted base {0:?} is not one of A, C, G, T")]
    InvalidBase(char),
}

/// Phred quality of "at least one of these bases is wrong".
///
/// Each score is read as an independent error probability `10^(-q/10)`. A run
/// of one base returns that base's own score. Callers never pass an empty run.
pub fn merge_quality<I>(qualities: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let all_correct: f64 = qualities
        .into_iter()
        .map(|q| 1.0 - 10f64.powf(-q / 10.0))
        .product();
    -10.0 * (1.0 - all_correct).log10()
}

/// Pack a run of inserted bases into one base-4 integer.
///
/// The digits `A=0, C=1, G=2, T=3` are prefixed by a leading `1` so leading `A`s
/// survive. Runs of 32 or more bases do not fit in an `i64` and saturate at
/// `i64::MAX`.
pub fn pack_insertion(bases: &[u8]) -> Result<i64, InsertionError> {
    let mut packed: i64 = 1;
    let mut saturated = false;
    for &base in bases {
        let digit = nucleotide_index(base).ok_or(InsertionError::InvalidBase(base as char))? as i64;
        if saturated {
            continue;
        }
        match packed.checked_mul(4).and_then(|v| v.checked_add(digit)) {
            Some(next) => packed = next,
            None => {
                packed = i64::MAX;
                saturated = true;
            }
        }
    }
    Ok(packed)
}

/// Bases and qualities of consecutive insertion events awaiting a reference column.
#[derive(Debug, Default, Clone)]
pub struct InsertionRun {
    bases: Vec<u8>,
    qualities: Vec<f64>,
}

impl InsertionRun {
    pub fn push(&mut self, base: u8, quality: u8) {
        self.bases.push(base);
        self.qualities.push(quality as f64);
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn packed(&self) -> Result<i64, InsertionError> {
        pack_insertion(&self.bases)
    }

    /// Merge the run's qualities with one flanking quality, placed before the
    /// run (`leading`) or after it.
    pub fn merged_quality(&self, flank: f64, leading: bool) -> f64 {
        let run = self.qualities.iter().copied();
        if leading {
            merge_quality(std::iter::once(flank).chain(run))
        } else {
            merge_quality(run.chain(std::iter::once(flank)))
        }
    }

    pub fn clear(&mut self) {
        self.bases.clear();
        self.qualities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bases(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 0..=max_len)
    }

    proptest! {
        #[test]
        fn prop_pack_insertion_injective_below_saturation(a in bases(31), b in bases(31)) {
            let (pa, pb) = (pack_insertion(&a).unwrap(), pack_insertion(&b).unwrap());
            prop_assert_eq!(pa == pb, a == b);
        }
    }

    #[test]
    fn test_merge_single_quality_is_identity() {
        for q in [0.0, 7.0, 20.0, 30.0, 45.0] {
            assert!((merge_quality([q]) - q).abs() < 1e-9, "q = {}", q);
        }
    }

    #[test]
    fn test_merge_two_qualities() {
        // p = 0.1 twice: 1 - 0.9 * 0.9 = 0.19
        let expected = -10.0 * 0.19f64.log10();
        assert!((merge_quality([10.0, 10.0]) - expected).abs() < 1e-9);
        assert!(merge_quality([10.0, 10.0]) < 10.0);
    }

    #[test]
    fn test_merge_with_zero_quality_is_zero() {
        assert_eq!(merge_quality([0.0, 40.0]), 0.0);
    }

    #[test]
    fn test_pack_insertion_codes() {
        assert_eq!(pack_insertion(b"").unwrap(), 1);
        assert_eq!(pack_insertion(b"A").unwrap(), 4);
        assert_eq!(pack_insertion(b"T").unwrap(), 7);
        // "1" "0" "2" in base 4
        assert_eq!(pack_insertion(b"AG").unwrap(), 16 + 2);
        assert_ne!(pack_insertion(b"AC").unwrap(), pack_insertion(b"CA").unwrap());
    }

    #[test]
    fn test_pack_insertion_saturates() {
        let longest = [b'T'; 31];
        assert_eq!(pack_insertion(&longest).unwrap(), i64::MAX);
        assert!(pack_insertion(&[b'A'; 31]).unwrap() < i64::MAX);
        assert_eq!(pack_insertion(&[b'A'; 32]).unwrap(), i64::MAX);
        assert_eq!(pack_insertion(&[b'C'; 200]).unwrap(), i64::MAX);
    }

    #[test]
    fn test_pack_insertion_rejects_ambiguous_base() {
        assert_eq!(pack_insertion(b"AN"), Err(InsertionError::InvalidBase('N')));
    }

    #[test]
    fn test_insertion_run_flank_order() {
        let mut run = InsertionRun::default();
        run.push(b'G', 30);
        assert_eq!(run.len(), 1);
        assert_eq!(run.packed().unwrap(), 6);
        let leading = run.merged_quality(20.0, true);
        let trailing = run.merged_quality(20.0, false);
        assert!((leading - merge_quality([20.0, 30.0])).abs() < 1e-12);
        assert!((trailing - merge_quality([30.0, 20.0])).abs() < 1e-12);
        run.clear();
        assert!(run.is_empty());
    }
}
