//! Reference sequence features
//!
//! Chromosome lengths come from the FASTA index (`.fai`), and the sequence of a
//! region becomes a `[len, 4]` one-hot matrix over `A, C, G, T`. IUPAC ambiguity
//! codes spread their weight evenly over the bases they stand for. Minus-strand
//! regions are reverse-complemented so row 0 is always the 5' end of the strand.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{s, Array2};
use noodles::core::{region::Interval, Position, Region as QueryRegion};
use noodles::fasta;
use thiserror::Error;

use crate::io::npy::{write_npy, NpyError};
use crate::layout::RegionPaths;
use crate::region::Region;
use crate::types::{Strand, NUCLEOTIDES};

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("FASTA index {0} not found (run `samtools faidx` on the reference)")]
    MissingIndex(PathBuf),
    #[error("Failed to open reference {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid FASTA index line {line}: {reason}")]
    InvalidIndex { line: usize, reason: String },
    #[error("Failed to fetch {region}: {source}")]
    Fetch {
        region: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Fetched {found} bases for {region}, expected {expected}")]
    Truncated { region: String, expected: u64, found: usize },
    #[error("Base {0:?} is not a nucleotide or IUPAC code")]
    InvalidBase(char),
    #[error("Failed to write reference features: {0}")]
    Write(#[from] NpyError),
}

/// `<reference>.fai`
pub fn fai_path<P: AsRef<Path>>(reference: P) -> PathBuf {
    let mut name = reference.as_ref().as_os_str().to_owned();
    name.push(".fai");
    PathBuf::from(name)
}

/// Chromosome name to length, as listed in a FASTA index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromSizes {
    sizes: HashMap<String, u64>,
}

impl ChromSizes {
    pub fn from_fai<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReferenceError::MissingIndex(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| ReferenceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ReferenceError> {
        let mut sizes = HashMap::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ReferenceError::InvalidIndex {
                line: line_num + 1,
                reason: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let mut fields = line.split('\t');
            let (name, length) = match (fields.next(), fields.next()) {
                (Some(name), Some(length)) => (name, length),
                _ => {
                    return Err(ReferenceError::InvalidIndex {
                        line: line_num + 1,
                        reason: "expected name and length columns".to_string(),
                    })
                }
            };
            let length = length.trim().parse::<u64>().map_err(|_| ReferenceError::InvalidIndex {
                line: line_num + 1,
                reason: format!("invalid length {:?}", length),
            })?;
            sizes.insert(name.to_string(), length);
        }
        Ok(Self { sizes })
    }

    pub fn get(&self, chrom: &str) -> Option<u64> {
        self.sizes.get(chrom).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

/// Bit set over `A=1, C=2, G=4, T=8` for a nucleotide or IUPAC code.
fn iupac_mask(base: u8) -> Option<u8> {
    let mask = match base.to_ascii_uppercase() {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' => 0b1000,
        b'M' => 0b0011,
        b'R' => 0b0101,
        b'W' => 0b1001,
        b'S' => 0b0110,
        b'Y' => 0b1010,
        b'K' => 0b1100,
        b'V' => 0b0111,
        b'H' => 0b1011,
        b'D' => 0b1101,
        b'B' => 0b1110,
        b'N' => 0b1111,
        _ => return None,
    };
    Some(mask)
}

/// A<->T and C<->G swap the outer and inner bit pairs.
fn complement_mask(mask: u8) -> u8 {
    ((mask & 0b0001) << 3) | ((mask & 0b0010) << 1) | ((mask & 0b0100) >> 1) | ((mask & 0b1000) >> 3)
}

/// One-hot encode `bases` as read on `strand`.
pub fn one_hot(bases: &[u8], strand: Strand) -> Result<Array2<f32>, ReferenceError> {
    let mut encoded = Array2::zeros((bases.len(), NUCLEOTIDES));

    for row in 0..bases.len() {
        let base = match strand {
            Strand::Forward => bases[row],
            Strand::Reverse => bases[bases.len() - 1 - row],
        };
        let mut mask = iupac_mask(base).ok_or(ReferenceError::InvalidBase(base as char))?;
        if strand.is_reverse() {
            mask = complement_mask(mask);
        }
        let weight = 1.0 / mask.count_ones() as f32;
        for channel in 0..NUCLEOTIDES {
            if mask & (1 << channel) != 0 {
                encoded[[row, channel]] = weight;
            }
        }
    }

    Ok(encoded)
}

/// Indexed FASTA reader producing per-region one-hot matrices.
pub struct ReferenceReader<R> {
    reader: fasta::io::IndexedReader<R>,
    sizes: ChromSizes,
}

/// Open an indexed FASTA file; the `.fai` index must sit next to it.
pub fn open_reference<P: AsRef<Path>>(path: P) -> Result<ReferenceReader<impl BufRead + Seek>, ReferenceError> {
    let path = path.as_ref();
    let index = fai_path(path);
    if !index.is_file() {
        return Err(ReferenceError::MissingIndex(index));
    }

    let reader = fasta::io::indexed_reader::Builder::default()
        .build_from_path(path)
        .map_err(|source| ReferenceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let sizes = ChromSizes::from_fai(&index)?;
    Ok(ReferenceReader { reader, sizes })
}

impl<R: BufRead + Seek> ReferenceReader<R> {
    /// Raw bases of `[region.start, region.end)` on the plus strand, clipped
    /// to the chromosome end.
    pub fn fetch(&mut self, region: &Region) -> Result<Vec<u8>, ReferenceError> {
        let end = match self.sizes.get(region.chrom()) {
            Some(length) => region.end().min(length),
            None => region.end(),
        };
        if end <= region.start() {
            return Ok(Vec::new());
        }

        let fetch_error = |source| ReferenceError::Fetch { region: region.key(), source };
        let position = |value: u64| {
            usize::try_from(value).ok().and_then(Position::new).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "position out of range")
            })
        };
        let query_start = position(region.start() + 1).map_err(fetch_error)?;
        let query_end = position(end).map_err(fetch_error)?;
        let query = QueryRegion::new(region.chrom(), Interval::from(query_start..=query_end));

        let record = self.reader.query(&query).map_err(fetch_error)?;
        let bases = record.sequence().as_ref().to_vec();
        let expected = end - region.start();
        if bases.len() as u64 != expected {
            return Err(ReferenceError::Truncated {
                region: region.key(),
                expected,
                found: bases.len(),
            });
        }
        Ok(bases)
    }

    /// One-hot matrix of `region`, oriented along its strand. Positions past
    /// the chromosome end are all-zero rows.
    pub fn one_hot(&mut self, region: &Region) -> Result<Array2<f32>, ReferenceError> {
        let bases = self.fetch(region)?;
        let encoded = one_hot(&bases, region.strand())?;
        let rows = region.len() as usize;
        if encoded.nrows() == rows {
            return Ok(encoded);
        }

        debug!("{}: padding {} rows past the chromosome end", region.key(), rows - encoded.nrows());
        let mut padded = Array2::zeros((rows, NUCLEOTIDES));
        let offset = match region.strand() {
            Strand::Forward => 0,
            Strand::Reverse => rows - encoded.nrows(),
        };
        padded
            .slice_mut(s![offset..offset + encoded.nrows(), ..])
            .assign(&encoded);
        Ok(padded)
    }

    /// Write `<key>.ref_seq.npy` for `region` (already resized to the sequence
    /// window). Returns `false` when the file exists and `overwrite` is off.
    pub fn write_features(
        &mut self,
        key: &str,
        region: &Region,
        output_dir: &Path,
        overwrite: bool,
    ) -> Result<bool, ReferenceError> {
        let path = RegionPaths::new(output_dir, key).reference;
        if !overwrite && path.is_file() {
            debug!("{}: reference features present, skipping", key);
            return Ok(false);
        }
        let encoded = self.one_hot(region)?;
        write_npy(&path, &encoded)?;
        Ok(true)
    }
}
