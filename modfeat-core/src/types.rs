//! Shared value types: strands, aligned pairs and nucleotide channels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of nucleotide channels (A, C, G, T) in every one-hot layout.
pub const NUCLEOTIDES: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid strand {0:?}: expected '+' or '-'")]
pub struct InvalidStrand(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl From<bool> for Strand {
    fn from(forward: bool) -> Self {
        if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl TryFrom<char> for Strand {
    type Error = InvalidStrand;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '+' => Ok(Strand::Forward),
            '-' => Ok(Strand::Reverse),
            other => Err(InvalidStrand(other.to_string())),
        }
    }
}

impl FromStr for Strand {
    type Err = InvalidStrand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(InvalidStrand(other.to_string())),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

/// One step of a read-to-reference alignment.
///
/// Positions are 0-based: `read` indexes the read's stored sequence, `reference`
/// the chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignedPair {
    /// Read base aligned to a reference base (match or mismatch).
    Match { read: usize, reference: u64 },
    /// Read base with no reference counterpart (insertion or soft clip).
    Insertion { read: usize },
    /// Reference base with no read counterpart (deletion or skip).
    Deletion { reference: u64 },
}

impl AlignedPair {
    pub fn reference(&self) -> Option<u64> {
        match *self {
            AlignedPair::Match { reference, .. } | AlignedPair::Deletion { reference } => {
                Some(reference)
            }
            AlignedPair::Insertion { .. } => None,
        }
    }

    pub fn read(&self) -> Option<usize> {
        match *self {
            AlignedPair::Match { read, .. } | AlignedPair::Insertion { read } => Some(read),
            AlignedPair::Deletion { .. } => None,
        }
    }
}

/// Channel of an upper- or lower-case nucleotide: A=0, C=1, G=2, T=3.
pub fn nucleotide_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}
