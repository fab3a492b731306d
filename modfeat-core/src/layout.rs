//! Per-region output file names
//!
//! Every region owns the files `<output_dir>/<key>.<suffix>` where `key` is the
//! region's canonical `chrom_strand_start-end` string, so concurrent workers
//! never write to the same path.

use std::path::{Path, PathBuf};

pub const ALIGNMENT_SUFFIX: &str = "reads_alignment.npy";
pub const QUALITY_SUFFIX: &str = "reads_quality.npy";
pub const DONE_SUFFIX: &str = "ali.done";
pub const REFERENCE_SUFFIX: &str = "ref_seq.npy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPaths {
    /// `i64 [num_reads, window, 6]`
    pub alignment: PathBuf,
    /// `f32 [num_reads, window]`
    pub quality: PathBuf,
    /// Zero-byte marker written after both arrays.
    pub done: PathBuf,
    /// `f32 [seq_window, 4]`
    pub reference: PathBuf,
}

impl RegionPaths {
    pub fn new(output_dir: &Path, key: &str) -> Self {
        let file = |suffix: &str| output_dir.join(format!("{}.{}", key, suffix));
        Self {
            alignment: file(ALIGNMENT_SUFFIX),
            quality: file(QUALITY_SUFFIX),
            done: file(DONE_SUFFIX),
            reference: file(REFERENCE_SUFFIX),
        }
    }
}
