//! Error handling for the modfeat CLI

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for modfeat CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Index not found for {path}")]
    MissingIndex { path: PathBuf, tool: &'static str },

    #[error("Chromosome {chrom} of region {region} is not in the reference index")]
    UnknownChromosome { chrom: String, region: String },

    #[error("{failed} of {total} regions failed")]
    RegionsFailed { failed: usize, total: usize },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn missing_bam_index(path: PathBuf) -> Self {
        Self::MissingIndex { path, tool: "samtools index" }
    }

    pub fn missing_fasta_index(path: PathBuf) -> Self {
        Self::MissingIndex { path, tool: "samtools faidx" }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::MissingIndex { path, tool } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Build the index with: {} {}\n\
                 • Keep the index next to the file it indexes",
                tool,
                path.display()
            ));
        }

        CliError::UnknownChromosome { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the BED file and the reference use the same chromosome names\n\
                 • Regenerate the .fai index if the reference was edited",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your modfeat.toml configuration file\n\
                 • Use 'modfeat config' to print a sample configuration",
            );
        }

        CliError::RegionsFailed { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • See the log above for the failing regions\n\
                 • Rerun the same command: finished regions are skipped",
            );
        }

        CliError::Io { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the output path is a directory you can write to\n\
                 • Check that the disk is not full",
            );
        }
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}
