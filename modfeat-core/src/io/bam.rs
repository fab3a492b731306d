//! Indexed BAM alignment source using noodles

use std::fs::File;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::trace;
use noodles::bam;
use noodles::bgzf;
use noodles::core::{region::Interval, Position, Region as QueryRegion};
use noodles::sam;
use noodles::sam::alignment::record::cigar::Op;

use crate::read::AlignedRead;
use crate::source::{AlignmentSource, SourceError};
use crate::types::Strand;

/// BAM stores a missing quality string as a run of `0xFF`.
const MISSING_QUALITY: u8 = 0xff;

/// Locate the index of a BAM file: `<path>.bai`, then `<path>.csi`.
pub fn check_alignment_index<P: AsRef<Path>>(path: P) -> Result<PathBuf, SourceError> {
    let path = path.as_ref();
    ["bai", "csi"]
        .iter()
        .map(|ext| with_appended_extension(path, ext))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| SourceError::MissingIndex(path.to_path_buf()))
}

fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Random-access reader over a coordinate-sorted, indexed BAM file.
pub struct IndexedBamSource {
    path: PathBuf,
    reader: bam::io::IndexedReader<bgzf::Reader<File>>,
    header: sam::Header,
}

impl IndexedBamSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        check_alignment_index(&path)?;

        let open_error = |source| SourceError::Open { path: path.clone(), source };
        let mut reader = bam::io::indexed_reader::Builder::default()
            .build_from_path(&path)
            .map_err(open_error)?;
        let header = reader.read_header().map_err(open_error)?;

        Ok(Self { path, reader, header })
    }
}

impl AlignmentSource for IndexedBamSource {
    fn visit_overlapping(
        &mut self,
        chrom: &str,
        start: u64,
        end: u64,
        visitor: &mut dyn FnMut(AlignedRead),
    ) -> Result<(), SourceError> {
        if start >= end {
            return Ok(());
        }

        let query_error = |source| SourceError::Query {
            chrom: chrom.to_string(),
            start,
            end,
            source,
        };
        let interval = query_interval(start, end).map_err(query_error)?;
        let region = QueryRegion::new(chrom, interval);

        let query = self.reader.query(&self.header, &region).map_err(query_error)?;
        let mut visited = 0usize;
        for result in query {
            let record = result.map_err(SourceError::Record)?;
            if let Some(read) = record_to_read(&record)? {
                visited += 1;
                visitor(read);
            }
        }

        trace!("{}: {}:{}-{}: {} mapped reads", self.path.display(), chrom, start, end, visited);
        Ok(())
    }
}

/// 1-based closed interval covering the 0-based half-open `[start, end)`.
fn query_interval(start: u64, end: u64) -> std::io::Result<Interval> {
    let position = |value: u64| {
        usize::try_from(value)
            .ok()
            .and_then(Position::new)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "position out of range"))
    };
    Ok(Interval::from(position(start + 1)?..=position(end)?))
}

/// Convert a BAM record; unmapped records yield `None`.
fn record_to_read(record: &bam::Record) -> Result<Option<AlignedRead>, SourceError> {
    let flags = record.flags();
    if flags.is_unmapped() {
        return Ok(None);
    }

    let alignment_start = match record.alignment_start() {
        Some(position) => usize::from(position.map_err(SourceError::Record)?) as u64 - 1,
        None => return Ok(None),
    };

    let cigar = record
        .cigar()
        .iter()
        .collect::<std::io::Result<Vec<Op>>>()
        .map_err(SourceError::Record)?;
    let sequence: Vec<u8> = record.sequence().iter().collect();

    let scores = record.quality_scores();
    let scores: &[u8] = scores.as_ref();
    let qualities = if scores.iter().all(|&q| q == MISSING_QUALITY) {
        Vec::new()
    } else {
        scores.to_vec()
    };

    let strand = Strand::from(!flags.is_reverse_complemented());
    let mut read = AlignedRead::new(strand, alignment_start, cigar, sequence, qualities);
    if let Some(name) = record.name() {
        read = read.with_name(String::from_utf8_lossy(name.as_ref()).into_owned());
    }
    Ok(Some(read))
}
