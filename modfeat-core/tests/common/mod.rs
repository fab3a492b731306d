#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use modfeat_core::{AlignedRead, AlignmentSource, SourceError, Strand};
use noodles::sam::alignment::record::cigar::{op::Kind, Op};

/// Reads held in memory, tagged with their chromosome.
pub struct MemorySource<'a> {
    pub reads: &'a [(String, AlignedRead)],
    /// Chromosome whose queries fail.
    pub broken_chrom: Option<&'a str>,
}

impl AlignmentSource for MemorySource<'_> {
    fn visit_overlapping(
        &mut self,
        chrom: &str,
        start: u64,
        end: u64,
        visitor: &mut dyn FnMut(AlignedRead),
    ) -> Result<(), SourceError> {
        if self.broken_chrom == Some(chrom) {
            return Err(SourceError::Other(format!("cannot read {}", chrom)));
        }
        for (read_chrom, read) in self.reads {
            let read_end = read.alignment_start() + reference_len(read);
            if read_chrom == chrom && read.alignment_start() < end && read_end > start {
                visitor(read.clone());
            }
        }
        Ok(())
    }
}

fn reference_len(read: &AlignedRead) -> u64 {
    read.cigar()
        .iter()
        .filter(|op| op.kind().consumes_reference())
        .map(|op| op.len() as u64)
        .sum()
}

/// Counts how often a source is opened.
#[derive(Default)]
pub struct OpenCounter(AtomicUsize);

impl OpenCounter {
    pub fn open<'a>(
        &self,
        reads: &'a [(String, AlignedRead)],
        broken_chrom: Option<&'a str>,
    ) -> Result<MemorySource<'a>, SourceError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySource { reads, broken_chrom })
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read with sequence `ACGT` repeated and qualities cycling `10..40`.
pub fn read(strand: Strand, start: u64, cigar: &[(Kind, usize)]) -> AlignedRead {
    let ops: Vec<Op> = cigar.iter().map(|&(kind, len)| Op::new(kind, len)).collect();
    let length: usize = cigar
        .iter()
        .filter(|(kind, _)| kind.consumes_read())
        .map(|(_, len)| len)
        .sum();
    let sequence = b"ACGT".iter().cycle().take(length).copied().collect();
    let qualities = (0..length).map(|i| 10 + (i % 30) as u8).collect();
    AlignedRead::new(strand, start, ops, sequence, qualities)
}

pub fn on(chrom: &str, read: AlignedRead) -> (String, AlignedRead) {
    (chrom.to_string(), read)
}
