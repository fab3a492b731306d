//! File format I/O for modfeat
//!
//! BED regions in, indexed BAM reads in, NumPy arrays out.

pub mod bam;
pub mod bed;
pub mod npy;

pub use bam::{check_alignment_index, IndexedBamSource};
pub use bed::{BedError, BedReader};
pub use npy::{read_npy, write_npy, NpyElement, NpyError};
