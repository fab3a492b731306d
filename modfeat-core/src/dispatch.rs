//! Parallel dispatch of region jobs over a rayon worker pool
//!
//! Each worker opens its own alignment source per region; regions never share
//! output files, so workers need no coordination beyond the pool itself. A
//! failing region is recorded and the remaining regions still run.

use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info};
use rayon::prelude::*;
use thiserror::Error;

use crate::extract::{extract_region, ExtractError, RegionJob, RegionOutcome};
use crate::source::{AlignmentSource, SourceError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("{} of {total} regions failed; first failure: {}", .failures.len(), first_failure(.failures))]
    RegionsFailed { total: usize, failures: Vec<RegionFailure> },
}

fn first_failure(failures: &[RegionFailure]) -> String {
    failures
        .first()
        .map(|f| format!("{}: {}", f.key, f.error))
        .unwrap_or_default()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug)]
pub struct RegionFailure {
    pub key: String,
    pub error: ExtractError,
}

/// Aggregate result of a dispatch run.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub reads: usize,
    pub rejected_reads: usize,
    pub failures: Vec<RegionFailure>,
}

impl DispatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded failures into an error.
    pub fn into_result(self) -> Result<Self, DispatchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DispatchError::RegionsFailed {
                total: self.total,
                failures: self.failures,
            })
        }
    }

    fn record(&mut self, key: &str, result: Result<RegionOutcome, ExtractError>) {
        match result {
            Ok(RegionOutcome::Skipped) => self.skipped += 1,
            Ok(RegionOutcome::Written { reads, rejected }) => {
                self.written += 1;
                self.reads += reads;
                self.rejected_reads += rejected;
            }
            Err(error) => self.failures.push(RegionFailure { key: key.to_string(), error }),
        }
    }
}

/// Run every job on a pool of `min(threads, jobs.len())` workers.
///
/// `open_source` is called once per region that needs work, on the worker that
/// runs it. `on_region` is called after each region finishes, from that worker.
/// Per-region failures, panics included, are collected in the summary; only a
/// pool that cannot be built is an error here.
pub fn dispatch<S, F, P>(
    jobs: &[RegionJob],
    threads: usize,
    open_source: F,
    on_region: P,
) -> Result<DispatchSummary, DispatchError>
where
    S: AlignmentSource,
    F: Fn() -> Result<S, SourceError> + Sync,
    P: Fn(&RegionJob, &Result<RegionOutcome, ExtractError>) + Sync,
{
    let mut summary = DispatchSummary {
        total: jobs.len(),
        ..DispatchSummary::default()
    };
    if jobs.is_empty() {
        debug!("No regions to dispatch");
        return Ok(summary);
    }

    let workers = threads.clamp(1, jobs.len());
    info!("Dispatching {} regions over {} workers", jobs.len(), workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("modfeat-worker-{}", i))
        .build()?;

    let results: Vec<Result<RegionOutcome, ExtractError>> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let result = panic::catch_unwind(AssertUnwindSafe(|| extract_region(job, &open_source)))
                    .unwrap_or_else(|payload| Err(ExtractError::Panicked(panic_message(payload.as_ref()))));
                if let Err(e) = &result {
                    error!("{}: {}", job.key, e);
                }
                on_region(job, &result);
                result
            })
            .collect()
    });

    for (job, result) in jobs.iter().zip(results) {
        summary.record(&job.key, result);
    }

    info!(
        "Regions: {} written, {} skipped, {} failed ({} reads)",
        summary.written,
        summary.skipped,
        summary.failures.len(),
        summary.reads
    );
    Ok(summary)
}
