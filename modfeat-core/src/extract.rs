//! Region batch driver
//!
//! Extracts the per-read alignment features of one region and persists them:
//!
//! 1. skip the region if its `.ali.done` marker exists (unless overwriting),
//! 2. open an alignment source and encode every overlapping read,
//! 3. stack the encoded reads into `[num_reads, window, 6]` and
//!    `[num_reads, window]` arrays and write both as `.npy`,
//! 4. touch the marker.
//!
//! The marker is only written after both arrays, so an interrupted region is
//! redone on the next run.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use ndarray::{Array2, Array3};
use thiserror::Error;

use crate::encode::{encode_read, ReadTensor, ALIGNMENT_CHANNELS};
use crate::io::npy::{write_npy, NpyError};
use crate::layout::RegionPaths;
use crate::region::Region;
use crate::source::{AlignmentSource, SourceError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: NpyError,
    },
    #[error("Failed to update marker {path}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to stack read tensors: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Worker panicked: {0}")]
    Panicked(String),
}

/// One unit of work for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionJob {
    /// Filename stem; the key of the region as listed in the input.
    pub key: String,
    /// Region already resized to the alignment window.
    pub region: Region,
    pub output_dir: PathBuf,
    pub overwrite: bool,
}

impl RegionJob {
    pub fn new(key: impl Into<String>, region: Region, output_dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            key: key.into(),
            region,
            output_dir: output_dir.into(),
            overwrite,
        }
    }

    /// Job for `region` resized to `window`, keyed by the region as given.
    pub fn resized(
        region: &Region,
        window: u64,
        limit: Option<u64>,
        output_dir: &Path,
        overwrite: bool,
    ) -> Result<Self, crate::region::RegionError> {
        let resized = region.resized(window, limit)?;
        Ok(Self::new(region.key(), resized, output_dir, overwrite))
    }

    pub fn paths(&self) -> RegionPaths {
        RegionPaths::new(&self.output_dir, &self.key)
    }

    pub fn window(&self) -> usize {
        self.region.len() as usize
    }

    pub fn is_done(&self) -> bool {
        self.paths().done.is_file()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOutcome {
    /// Marker present; nothing was read or written.
    Skipped,
    /// Arrays and marker written. `rejected` counts reads dropped as malformed.
    Written { reads: usize, rejected: usize },
}

/// Encoded reads of one region, stacked in source order.
#[derive(Debug)]
struct ReadStack {
    window: usize,
    reads: usize,
    alignment: Vec<i64>,
    quality: Vec<f32>,
}

impl ReadStack {
    fn new(window: usize) -> Self {
        Self {
            window,
            reads: 0,
            alignment: Vec::new(),
            quality: Vec::new(),
        }
    }

    fn push(&mut self, tensor: ReadTensor) {
        debug_assert_eq!(tensor.window(), self.window);
        self.alignment.extend(tensor.alignment.iter().copied());
        self.quality.extend(tensor.quality.iter().copied());
        self.reads += 1;
    }

    fn into_arrays(self) -> Result<(Array3<i64>, Array2<f32>), ndarray::ShapeError> {
        let alignment = Array3::from_shape_vec((self.reads, self.window, ALIGNMENT_CHANNELS), self.alignment)?;
        let quality = Array2::from_shape_vec((self.reads, self.window), self.quality)?;
        Ok((alignment, quality))
    }
}

/// Run one region to completion.
///
/// `open_source` is only called when the region actually needs work.
pub fn extract_region<S, F>(job: &RegionJob, open_source: F) -> Result<RegionOutcome, ExtractError>
where
    S: AlignmentSource,
    F: FnOnce() -> Result<S, SourceError>,
{
    let paths = job.paths();
    if !job.overwrite && paths.done.is_file() {
        debug!("{}: already extracted, skipping", job.key);
        return Ok(RegionOutcome::Skipped);
    }
    if job.overwrite {
        remove_marker(&paths.done)?;
    }

    let mut source = open_source()?;
    let region = &job.region;
    let mut stack = ReadStack::new(job.window());
    let mut rejected = 0usize;

    source.visit_overlapping(region.chrom(), region.start(), region.end(), &mut |read| {
        match encode_read(&read, region) {
            Ok(Some(tensor)) => stack.push(tensor),
            Ok(None) => {}
            Err(e) => {
                rejected += 1;
                warn!("{}: skipping read {}: {}", job.key, read.name().unwrap_or("*"), e);
            }
        }
    })?;

    let reads = stack.reads;
    let (alignment, quality) = stack.into_arrays()?;

    write_npy(&paths.alignment, &alignment).map_err(|source| ExtractError::Write {
        path: paths.alignment.clone(),
        source,
    })?;
    write_npy(&paths.quality, &quality).map_err(|source| ExtractError::Write {
        path: paths.quality.clone(),
        source,
    })?;
    File::create(&paths.done).map_err(|source| ExtractError::Marker {
        path: paths.done.clone(),
        source,
    })?;

    debug!("{}: wrote {} reads ({} rejected)", job.key, reads, rejected);
    Ok(RegionOutcome::Written { reads, rejected })
}

/// A stale marker must not survive a failed redo.
fn remove_marker(path: &Path) -> Result<(), ExtractError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ExtractError::Marker {
            path: path.to_path_buf(),
            source,
        }),
    }
}
