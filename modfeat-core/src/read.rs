//! Aligned reads and their per-base alignment walk

use noodles::sam::alignment::record::cigar::{op::Kind, Op};

use crate::types::{AlignedPair, Strand};

/// One mapped read as handed over by an alignment source.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRead {
    name: Option<String>,
    strand: Strand,
    alignment_start: u64,
    cigar: Vec<Op>,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
}

impl AlignedRead {
    /// `alignment_start` is the 0-based reference position of the first
    /// reference-consuming CIGAR operation.
    pub fn new(
        strand: Strand,
        alignment_start: u64,
        cigar: Vec<Op>,
        sequence: Vec<u8>,
        qualities: Vec<u8>,
    ) -> Self {
        Self {
            name: None,
            strand,
            alignment_start,
            cigar,
            sequence,
            qualities,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn alignment_start(&self) -> u64 {
        self.alignment_start
    }

    pub fn cigar(&self) -> &[Op] {
        &self.cigar
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Raw Phred scores, parallel to [`sequence`](Self::sequence). Empty when the
    /// record stored none.
    pub fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    /// Walk the alignment one base at a time, in CIGAR order.
    pub fn aligned_pairs(&self) -> AlignedPairs<'_> {
        AlignedPairs {
            ops: self.cigar.iter(),
            kind: Kind::Pad,
            remaining: 0,
            read_pos: 0,
            ref_pos: self.alignment_start,
        }
    }
}

/// Iterator over the [`AlignedPair`]s of an [`AlignedRead`].
///
/// `M`, `=` and `X` yield matches; `I` and `S` yield insertions; `D` and `N`
/// yield deletions; `H` and `P` yield nothing.
#[derive(Debug, Clone)]
pub struct AlignedPairs<'a> {
    ops: std::slice::Iter<'a, Op>,
    kind: Kind,
    remaining: usize,
    read_pos: usize,
    ref_pos: u64,
}

impl Iterator for AlignedPairs<'_> {
    type Item = AlignedPair;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == 0 {
                let op = self.ops.next()?;
                self.kind = op.kind();
                self.remaining = op.len();
                continue;
            }

            self.remaining -= 1;
            match self.kind {
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                    let pair = AlignedPair::Match { read: self.read_pos, reference: self.ref_pos };
                    self.read_pos += 1;
                    self.ref_pos += 1;
                    return Some(pair);
                }
                Kind::Insertion | Kind::SoftClip => {
                    let pair = AlignedPair::Insertion { read: self.read_pos };
                    self.read_pos += 1;
                    return Some(pair);
                }
                Kind::Deletion | Kind::Skip => {
                    let pair = AlignedPair::Deletion { reference: self.ref_pos };
                    self.ref_pos += 1;
                    return Some(pair);
                }
                Kind::HardClip | Kind::Pad => {
                    self.remaining = 0;
                }
            }
        }
    }
}
