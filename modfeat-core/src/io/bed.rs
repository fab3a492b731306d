//! BED6 region list reader
//!
//! Each line contributes one [`Region`]: `chrom start end name score strand`.
//! The name and score are kept verbatim (tab-joined) as the region's info
//! string. Lines starting with `#`, `track` or `browser` are headers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use flate2::read::GzDecoder;
use thiserror::Error;

use crate::region::{Region, RegionError};

#[derive(Debug, Error)]
pub enum BedError {
    #[error("Line {line}: insufficient fields (expected at least 6, got {found})")]
    InsufficientFields { line: usize, found: usize },
    #[error("Line {line}: invalid position value: {value}")]
    InvalidPosition { line: usize, value: String },
    #[error("Line {line}: {source}")]
    Region {
        line: usize,
        #[source]
        source: RegionError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// BED reader producing regions in file order
pub struct BedReader;

impl BedReader {
    /// Parse a single BED line. `line_num` is 1-based and only used in errors.
    pub fn parse_line(line: &str, line_num: usize) -> Result<Region, BedError> {
        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() < 6 {
            return Err(BedError::InsufficientFields { line: line_num, found: fields.len() });
        }

        let position = |value: &str| {
            value.parse::<u64>().map_err(|_| BedError::InvalidPosition {
                line: line_num,
                value: value.to_string(),
            })
        };
        let start = position(fields[1])?;
        let end = position(fields[2])?;

        let region = Region::parse(fields[0], start, end, fields[5])
            .map_err(|source| BedError::Region { line: line_num, source })?
            .with_info(format!("{}\t{}", fields[3], fields[4]));
        Ok(region)
    }

    /// Read every region of a BED file; `.gz` files are decompressed on the fly.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<Region>, BedError> {
        let file = File::open(&path)?;
        let path_str = path.as_ref().to_string_lossy();

        if path_str.ends_with(".gz") {
            Self::read_regions(BufReader::new(GzDecoder::new(file)))
        } else {
            Self::read_regions(BufReader::new(file))
        }
    }

    /// Read regions from any BufRead source
    pub fn read_regions<R: BufRead>(reader: R) -> Result<Vec<Region>, BedError> {
        let mut regions = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if Self::is_header(&line) {
                continue;
            }
            regions.push(Self::parse_line(&line, line_num + 1)?);
        }

        Ok(regions)
    }

    fn is_header(line: &str) -> bool {
        let line = line.trim();
        line.is_empty()
            || line.starts_with('#')
            || line.starts_with("track")
            || line.starts_with("browser")
    }
}
