//! Extract command implementation - reference and per-read alignment features per region

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use modfeat_core::io::check_alignment_index;
use modfeat_core::reference::fai_path;
use modfeat_core::{
    dispatch, open_reference, BedReader, ChromSizes, DispatchError, IndexedBamSource, Region,
    RegionJob,
};

use crate::error::{CliError, CliResult};

/// Settings resolved from the config file and command-line flags
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub seq_window: u64,
    pub ali_window: u64,
    pub overwrite: bool,
    pub threads: usize,
}

pub fn execute(
    bed: &Path,
    align: &Path,
    reference: &Path,
    output: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    info!("Starting feature extraction");
    info!("Regions: {}", bed.display());
    info!("Alignments: {}", align.display());
    info!("Reference: {}", reference.display());
    info!("Output directory: {}", output.display());

    validate_inputs(bed, align, reference, options)?;

    let fai = fai_path(reference);
    let sizes = ChromSizes::from_fai(&fai)
        .with_context(|| format!("Failed to read reference index: {}", fai.display()))?;
    let regions = load_regions(bed)?;
    check_chromosomes(&regions, &sizes)?;

    create_output_dir(output)?;

    write_reference_features(reference, &regions, &sizes, output, options)?;

    let jobs = regions
        .iter()
        .map(|region| {
            RegionJob::resized(
                region,
                options.ali_window,
                sizes.get(region.chrom()),
                output,
                options.overwrite,
            )
        })
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to resize regions to the alignment window")?;

    let progress = progress_bar(jobs.len() as u64, "alignment features");
    let summary = dispatch(
        &jobs,
        options.threads,
        || IndexedBamSource::open(align),
        |_, _| progress.inc(1),
    )?;
    progress.finish_and_clear();

    info!(
        "Alignment features: {} regions written, {} already done, {} reads encoded",
        summary.written, summary.skipped, summary.reads
    );
    if summary.rejected_reads > 0 {
        warn!("{} malformed reads were skipped", summary.rejected_reads);
    }

    match summary.into_result() {
        Ok(_) => {
            info!("Extraction completed successfully");
            Ok(())
        }
        Err(DispatchError::RegionsFailed { total, failures }) => {
            for failure in &failures {
                error!("Region {} failed: {}", failure.key, failure.error);
            }
            Err(CliError::RegionsFailed { failed: failures.len(), total }.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_inputs(bed: &Path, align: &Path, reference: &Path, options: &ExtractOptions) -> CliResult<()> {
    for path in [bed, align, reference] {
        if !path.is_file() {
            return Err(CliError::file_not_found(path.to_path_buf()));
        }
    }
    if check_alignment_index(align).is_err() {
        return Err(CliError::missing_bam_index(align.to_path_buf()));
    }
    if !fai_path(reference).is_file() {
        return Err(CliError::missing_fasta_index(reference.to_path_buf()));
    }
    if options.seq_window == 0 || options.ali_window == 0 {
        return Err(CliError::config("window sizes must be at least 1"));
    }
    Ok(())
}

fn create_output_dir(output: &Path) -> CliResult<()> {
    std::fs::create_dir_all(output).map_err(|e| {
        CliError::io(format!("cannot create output directory {}: {}", output.display(), e))
    })
}

/// Read the BED file, keeping the first occurrence of each region.
fn load_regions(bed: &Path) -> Result<Vec<Region>> {
    let regions = BedReader::read_file(bed)
        .with_context(|| format!("Failed to read BED file: {}", bed.display()))?;

    let total = regions.len();
    let mut seen = HashSet::new();
    let unique: Vec<Region> = regions.into_iter().filter(|r| seen.insert(r.key())).collect();
    if unique.len() < total {
        warn!("Ignoring {} duplicate regions", total - unique.len());
    }

    info!("Loaded {} regions", unique.len());
    Ok(unique)
}

fn check_chromosomes(regions: &[Region], sizes: &ChromSizes) -> CliResult<()> {
    match regions.iter().find(|r| sizes.get(r.chrom()).is_none()) {
        Some(region) => Err(CliError::UnknownChromosome {
            chrom: region.chrom().to_string(),
            region: region.key(),
        }),
        None => Ok(()),
    }
}

/// One-hot reference windows, written serially before the parallel stage.
fn write_reference_features(
    reference: &Path,
    regions: &[Region],
    sizes: &ChromSizes,
    output: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    let mut reader = open_reference(reference)
        .with_context(|| format!("Failed to open reference: {}", reference.display()))?;

    let progress = progress_bar(regions.len() as u64, "reference features");
    let mut written = 0usize;
    for region in regions {
        let window = region.resized(options.seq_window, sizes.get(region.chrom()))?;
        let key = region.key();
        if reader
            .write_features(&key, &window, output, options.overwrite)
            .with_context(|| format!("Failed to extract reference features for {}", key))?
        {
            written += 1;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    info!(
        "Reference features: {} written, {} already present",
        written,
        regions.len() - written
    );
    Ok(())
}

fn progress_bar(length: u64, message: &str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(" {spinner} {msg:<20} {wide_bar} {pos}/{len} ETA {eta_precise} ")
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let bar = ProgressBar::new(length);
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message(message.to_owned());
    bar
}
