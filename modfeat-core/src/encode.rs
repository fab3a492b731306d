//! Read alignment encoder
//!
//! Turns one read's walk over a region into a `[window, 6]` integer matrix and a
//! `[window]` quality vector. Row `i` is reference position `region.start + i`.
//! Channels:
//!
//! | channel | meaning                                  |
//! |---------|------------------------------------------|
//! | 0..=3   | read base A, C, G, T (one-hot)           |
//! | 4       | deletion                                 |
//! | 5       | packed insertion code (0 = no insertion) |
//!
//! Insertions have no row of their own and are folded into a neighbouring row.
//! On the forward strand the run lands on the row *before* the reference position
//! that closes it; on the reverse strand it lands on that row itself, since the
//! read was sequenced in the opposite direction.

use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::insertion::{InsertionError, InsertionRun};
use crate::read::AlignedRead;
use crate::region::Region;
use crate::types::{nucleotide_index, AlignedPair, Strand, NUCLEOTIDES};

/// Number of channels per alignment row.
pub const ALIGNMENT_CHANNELS: usize = NUCLEOTIDES + 2;
/// Channel flagging a deleted reference base.
pub const DELETION_CHANNEL: usize = NUCLEOTIDES;
/// Channel holding the packed insertion code.
pub const INSERTION_CHANNEL: usize = NUCLEOTIDES + 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Read has no base qualities")]
    MissingQualities,
    #[error("Read position {position} is outside the read (length {length})")]
    ReadPositionOutOfBounds { position: usize, length: usize },
    #[error("Aligned base {0:?} is not one of A, C, G, T")]
    InvalidBase(char),
    #[error(transparent)]
    Insertion(#[from] InsertionError),
}

/// Encoded contribution of one read to one region.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadTensor {
    /// `[window, ALIGNMENT_CHANNELS]`
    pub alignment: Array2<i64>,
    /// `[window]`
    pub quality: Array1<f32>,
}

impl ReadTensor {
    pub fn window(&self) -> usize {
        self.quality.len()
    }
}

/// Encode `read` over `region`.
///
/// Returns `Ok(None)` when the read is on the other strand or never touches a
/// column of the region.
pub fn encode_read(read: &AlignedRead, region: &Region) -> Result<Option<ReadTensor>, EncodeError> {
    encode_pairs(
        read.strand(),
        read.aligned_pairs(),
        read.sequence(),
        read.qualities(),
        region,
    )
}

/// Encode an arbitrary aligned-pair stream; see [`encode_read`].
///
/// `sequence` and `qualities` are indexed by the read positions of `pairs`.
pub fn encode_pairs<I>(
    strand: Strand,
    pairs: I,
    sequence: &[u8],
    qualities: &[u8],
    region: &Region,
) -> Result<Option<ReadTensor>, EncodeError>
where
    I: IntoIterator<Item = AlignedPair>,
{
    if strand != region.strand() || region.is_empty() {
        return Ok(None);
    }

    let mut encoder = Encoder::new(region, sequence, qualities);
    let mut in_range = false;

    for pair in pairs {
        if let Some(reference) = pair.reference() {
            if reference == region.start() {
                in_range = true;
            } else if reference >= region.end() {
                break;
            }
        }
        if !in_range {
            continue;
        }

        match pair {
            AlignedPair::Match { read, reference } => encoder.matched(read, reference)?,
            AlignedPair::Insertion { read } => encoder.inserted(read)?,
            AlignedPair::Deletion { reference } => encoder.deleted(reference)?,
        }
    }

    Ok(encoder.finish())
}

struct Encoder<'a> {
    start: u64,
    reverse: bool,
    sequence: &'a [u8],
    qualities: &'a [u8],
    alignment: Array2<i64>,
    quality: Array1<f32>,
    run: InsertionRun,
}

impl<'a> Encoder<'a> {
    fn new(region: &Region, sequence: &'a [u8], qualities: &'a [u8]) -> Self {
        let window = region.len() as usize;
        Self {
            start: region.start(),
            reverse: region.strand().is_reverse(),
            sequence,
            qualities,
            alignment: Array2::zeros((window, ALIGNMENT_CHANNELS)),
            quality: Array1::zeros(window),
            run: InsertionRun::default(),
        }
    }

    fn row(&self, reference: u64) -> usize {
        (reference - self.start) as usize
    }

    fn base(&self, position: usize) -> Result<(u8, u8), EncodeError> {
        let base = *self.sequence.get(position).ok_or(EncodeError::ReadPositionOutOfBounds {
            position,
            length: self.sequence.len(),
        })?;
        if self.qualities.is_empty() {
            return Err(EncodeError::MissingQualities);
        }
        let quality = *self.qualities.get(position).ok_or(EncodeError::ReadPositionOutOfBounds {
            position,
            length: self.qualities.len(),
        })?;
        Ok((base, quality))
    }

    fn matched(&mut self, position: usize, reference: u64) -> Result<(), EncodeError> {
        let row = self.row(reference);
        let (base, quality) = self.base(position)?;
        let channel = nucleotide_index(base).ok_or(EncodeError::InvalidBase(base as char))?;

        if !self.run.is_empty() && self.reverse {
            self.alignment[[row, INSERTION_CHANNEL]] = self.run.packed()?;
            self.alignment[[row, channel]] = 1;
            self.quality[row] = self.run.merged_quality(quality as f64, false) as f32;
            self.run.clear();
            return Ok(());
        }

        if !self.run.is_empty() {
            self.fold_before(row)?;
        }
        self.alignment[[row, channel]] = 1;
        self.quality[row] = quality as f32;
        Ok(())
    }

    fn inserted(&mut self, position: usize) -> Result<(), EncodeError> {
        let (base, quality) = self.base(position)?;
        self.run.push(base, quality);
        Ok(())
    }

    fn deleted(&mut self, reference: u64) -> Result<(), EncodeError> {
        let row = self.row(reference);
        if !self.run.is_empty() {
            if self.reverse {
                self.alignment[[row, INSERTION_CHANNEL]] = self.run.packed()?;
                self.run.clear();
            } else {
                self.fold_before(row)?;
            }
        }
        self.alignment[[row, DELETION_CHANNEL]] = 1;
        Ok(())
    }

    /// Forward-strand fold: the run belongs to the column preceding `row` and its
    /// qualities are merged with whatever that column already holds.
    fn fold_before(&mut self, row: usize) -> Result<(), EncodeError> {
        // a run only opens after an in-range column, so row >= 1
        debug_assert!(row > 0);
        let prev = row.saturating_sub(1);
        self.alignment[[prev, INSERTION_CHANNEL]] = self.run.packed()?;
        self.quality[prev] = self.run.merged_quality(self.quality[prev] as f64, true) as f32;
        self.run.clear();
        Ok(())
    }

    fn finish(self) -> Option<ReadTensor> {
        if self.alignment.iter().all(|&v| v == 0) {
            return None;
        }
        Some(ReadTensor {
            alignment: self.alignment,
            quality: self.quality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insertion::{merge_quality, pack_insertion};
    use noodles::sam::alignment::record::cigar::{op::Kind, Op};

    fn region(strand: Strand) -> Region {
        Region::new("chr1", 100, 110, strand).unwrap()
    }

    fn full_read(strand: Strand, cigar: Vec<Op>, len: usize, start: u64) -> AlignedRead {
        let sequence: Vec<u8> = b"ACGT".iter().copied().cycle().take(len).collect();
        let qualities: Vec<u8> = (0..len).map(|i| 10 + i as u8).collect();
        AlignedRead::new(strand, start, cigar, sequence, qualities)
    }

    #[test]
    fn test_plain_matches() {
        let read = full_read(Strand::Forward, vec![Op::new(Kind::Match, 20)], 20, 95);
        let tensor = encode_read(&read, &region(Strand::Forward)).unwrap().unwrap();
        assert_eq!(tensor.window(), 10);
        // reference 100 is read position 5 -> 'C'
        assert_eq!(tensor.alignment.row(0).to_vec(), vec![0, 1, 0, 0, 0, 0]);
        assert_eq!(tensor.quality[0], 15.0);
        assert_eq!(tensor.alignment.sum(), 10);
    }

    #[test]
    fn test_strand_mismatch_is_none() {
        let read = full_read(Strand::Reverse, vec![Op::new(Kind::Match, 20)], 20, 95);
        assert_eq!(encode_read(&read, &region(Strand::Forward)).unwrap(), None);
    }

    #[test]
    fn test_empty_region_is_none() {
        let read = full_read(Strand::Forward, vec![Op::new(Kind::Match, 20)], 20, 95);
        let empty = Region::new("chr1", 100, 100, Strand::Forward).unwrap();
        assert_eq!(encode_read(&read, &empty), Ok(None));
    }

    #[test]
    fn test_read_starting_inside_region_is_none() {
        // never touches region.start, so the scan never enters the window
        let read = full_read(Strand::Forward, vec![Op::new(Kind::Match, 5)], 5, 103);
        assert_eq!(encode_read(&read, &region(Strand::Forward)).unwrap(), None);
    }

    #[test]
    fn test_forward_insertion_lands_on_previous_row() {
        // 5 matches over 100..105, one inserted base, then 105..110
        let cigar = vec![
            Op::new(Kind::Match, 5),
            Op::new(Kind::Insertion, 1),
            Op::new(Kind::Match, 5),
        ];
        let read = full_read(Strand::Forward, cigar, 11, 100);
        let tensor = encode_read(&read, &region(Strand::Forward)).unwrap().unwrap();

        let inserted: Vec<usize> = (0..10)
            .filter(|&row| tensor.alignment[[row, INSERTION_CHANNEL]] != 0)
            .collect();
        assert_eq!(inserted, vec![4]);
        // read position 5 is 'C'
        assert_eq!(tensor.alignment[[4, INSERTION_CHANNEL]], pack_insertion(b"C").unwrap());
        let expected = merge_quality([14.0, 15.0]) as f32;
        assert!((tensor.quality[4] - expected).abs() < 1e-4);
        // the closing match keeps its own base and quality
        assert_eq!(tensor.alignment[[5, 2]], 1);
        assert_eq!(tensor.quality[5], 16.0);
    }

    #[test]
    fn test_reverse_insertion_lands_on_current_row() {
        let cigar = vec![
            Op::new(Kind::Match, 5),
            Op::new(Kind::Insertion, 2),
            Op::new(Kind::Match, 5),
        ];
        let read = full_read(Strand::Reverse, cigar, 12, 100);
        let tensor = encode_read(&read, &region(Strand::Reverse)).unwrap().unwrap();

        assert_eq!(tensor.alignment[[4, INSERTION_CHANNEL]], 0);
        // read positions 5, 6 are 'C', 'G'; position 7 ('T') closes the run
        assert_eq!(tensor.alignment[[5, INSERTION_CHANNEL]], pack_insertion(b"CG").unwrap());
        assert_eq!(tensor.alignment[[5, 3]], 1);
        let expected = merge_quality([15.0, 16.0, 17.0]) as f32;
        assert!((tensor.quality[5] - expected).abs() < 1e-4);
        assert_eq!(tensor.quality[4], 14.0);
    }

    #[test]
    fn test_deletions() {
        let cigar = vec![
            Op::new(Kind::Match, 3),
            Op::new(Kind::Deletion, 2),
            Op::new(Kind::Match, 5),
        ];
        let read = full_read(Strand::Forward, cigar, 8, 100);
        let tensor = encode_read(&read, &region(Strand::Forward)).unwrap().unwrap();
        assert_eq!(tensor.alignment.column(DELETION_CHANNEL).to_vec(), vec![0, 0, 0, 1, 1, 0, 0, 0, 0, 0]);
        assert_eq!(tensor.quality[3], 0.0);
        assert_eq!(tensor.alignment.row(3).iter().take(NUCLEOTIDES).sum::<i64>(), 0);
    }

    #[test]
    fn test_insertion_before_deletion() {
        let cigar = vec![
            Op::new(Kind::Match, 3),
            Op::new(Kind::Insertion, 1),
            Op::new(Kind::Deletion, 1),
            Op::new(Kind::Match, 6),
        ];

        let forward = full_read(Strand::Forward, cigar.clone(), 10, 100);
        let tensor = encode_read(&forward, &region(Strand::Forward)).unwrap().unwrap();
        assert_ne!(tensor.alignment[[2, INSERTION_CHANNEL]], 0);
        assert_eq!(tensor.alignment[[3, DELETION_CHANNEL]], 1);
        let expected = merge_quality([12.0, 13.0]) as f32;
        assert!((tensor.quality[2] - expected).abs() < 1e-4);

        let reverse = full_read(Strand::Reverse, cigar, 10, 100);
        let tensor = encode_read(&reverse, &region(Strand::Reverse)).unwrap().unwrap();
        assert_ne!(tensor.alignment[[3, INSERTION_CHANNEL]], 0);
        assert_eq!(tensor.alignment[[3, DELETION_CHANNEL]], 1);
        assert_eq!(tensor.quality[3], 0.0);
    }

    #[test]
    fn test_scan_stops_at_region_end() {
        let cigar = vec![Op::new(Kind::Match, 10), Op::new(Kind::Insertion, 3), Op::new(Kind::Match, 5)];
        let read = full_read(Strand::Forward, cigar, 18, 100);
        let tensor = encode_read(&read, &region(Strand::Forward)).unwrap().unwrap();
        // the run after the last column is never closed inside the window
        assert!(tensor.alignment.column(INSERTION_CHANNEL).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_leading_soft_clip_is_ignored() {
        let cigar = vec![Op::new(Kind::SoftClip, 4), Op::new(Kind::Match, 10)];
        let read = full_read(Strand::Forward, cigar, 14, 100);
        let tensor = encode_read(&read, &region(Strand::Forward)).unwrap().unwrap();
        assert!(tensor.alignment.column(INSERTION_CHANNEL).iter().all(|&v| v == 0));
        // read position 4 is 'A'
        assert_eq!(tensor.alignment[[0, 0]], 1);
    }

    #[test]
    fn test_missing_qualities_is_an_error() {
        let read = AlignedRead::new(
            Strand::Forward,
            100,
            vec![Op::new(Kind::Match, 10)],
            b"ACGTACGTAC".to_vec(),
            Vec::new(),
        );
        assert_eq!(
            encode_read(&read, &region(Strand::Forward)),
            Err(EncodeError::MissingQualities)
        );
    }

    #[test]
    fn test_ambiguous_base_is_an_error() {
        let read = AlignedRead::new(
            Strand::Forward,
            100,
            vec![Op::new(Kind::Match, 10)],
            b"ACGTNCGTAC".to_vec(),
            vec![20; 10],
        );
        assert_eq!(
            encode_read(&read, &region(Strand::Forward)),
            Err(EncodeError::InvalidBase('N'))
        );
    }

    #[test]
    fn test_explicit_pair_stream() {
        let pairs = vec![
            AlignedPair::Deletion { reference: 100 },
            AlignedPair::Match { read: 0, reference: 101 },
        ];
        let tensor = encode_pairs(Strand::Forward, pairs, b"G", &[40], &region(Strand::Forward))
            .unwrap()
            .unwrap();
        assert_eq!(tensor.alignment[[0, DELETION_CHANNEL]], 1);
        assert_eq!(tensor.alignment[[1, 2]], 1);
        assert_eq!(tensor.quality[1], 40.0);
    }
}
