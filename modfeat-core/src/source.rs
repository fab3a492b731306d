//! Alignment sources
//!
//! A source hands over every mapped read overlapping a reference interval. The
//! batch driver opens one source per region, so implementations are free to
//! hold file handles and are never shared between threads.

use std::path::PathBuf;
use thiserror::Error;

use crate::read::AlignedRead;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open alignment file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No .bai or .csi index found next to {0}")]
    MissingIndex(PathBuf),
    #[error("Cannot query {chrom}:{start}-{end}: {source}")]
    Query {
        chrom: String,
        start: u64,
        end: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode alignment record: {0}")]
    Record(#[source] std::io::Error),
    #[error("{0}")]
    Other(String),
}

pub trait AlignmentSource {
    /// Call `visitor` once for every mapped read overlapping the half-open
    /// interval `[start, end)` of `chrom`, in the source's native order.
    fn visit_overlapping(
        &mut self,
        chrom: &str,
        start: u64,
        end: u64,
        visitor: &mut dyn FnMut(AlignedRead),
    ) -> Result<(), SourceError>;
}
