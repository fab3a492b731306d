use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "modfeat")]
#[command(about = "modfeat - per-read alignment features for base-modification calling")]
#[command(version)]
#[command(long_about = "
modfeat turns a BED file of candidate sites, an indexed BAM file and an indexed
reference into per-region NumPy tensors: a one-hot reference window and, for every
read covering the site on its strand, an alignment matrix plus base qualities.

Examples:
  modfeat extract --bed sites.bed --align reads.bam --reference hg38.fa --output features/
  modfeat extract --bed sites.bed.gz --align reads.bam --reference hg38.fa --output features/ -t 16
  modfeat config > modfeat.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract reference and per-read alignment features for every BED region
    Extract {
        /// Candidate sites (BED6, optionally gzipped)
        #[arg(long, required = true)]
        bed: PathBuf,

        /// Coordinate-sorted BAM file with a .bai or .csi index
        #[arg(long, required = true)]
        align: PathBuf,

        /// Reference FASTA with a .fai index
        #[arg(long, required = true)]
        reference: PathBuf,

        /// Output directory (created if absent)
        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Width of the reference one-hot window
        #[arg(long)]
        seq_window: Option<u64>,

        /// Width of the per-read alignment window
        #[arg(long)]
        ali_window: Option<u64>,

        /// Redo regions whose outputs already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Print an example configuration file
    Config {
        /// Write the example to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let threads = cli.threads.unwrap_or(config.general.threads);

    match cli.command {
        Commands::Extract {
            bed,
            align,
            reference,
            output,
            seq_window,
            ali_window,
            overwrite,
        } => {
            let options = commands::extract::ExtractOptions {
                seq_window: seq_window.unwrap_or(config.extract.seq_window),
                ali_window: ali_window.unwrap_or(config.extract.ali_window),
                overwrite: overwrite || config.extract.overwrite,
                threads,
            };
            commands::extract::execute(&bed, &align, &reference, &output, &options)?;
        }

        Commands::Config { output } => {
            commands::config::execute(output)?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        match err.downcast_ref::<CliError>() {
            Some(cli_err) => print_error_and_exit(cli_err),
            None => {
                eprintln!("Error: {:#}", err);
                std::process::exit(1);
            }
        }
    }
}
