use crate::handler::HandlerConfig;
use crate::types::Quality;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Convert DICOM images to contrast-normalized JPEGs
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Directory under which per-request scratch directories are created
    #[arg(long, global = true, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Age in hours after which leftover scratch entries are removed
    #[arg(long, global = true, default_value_t = 24)]
    pub max_age_hours: u64,

    /// Let `handle` events read `file://` URLs and bare paths
    #[arg(long, global = true)]
    pub allow_local_files: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Args {
    /// Handler settings derived from the global options
    #[must_use]
    pub fn handler_config(&self) -> HandlerConfig {
        let defaults = HandlerConfig::default();
        HandlerConfig {
            temp_dir: self.temp_dir.clone().unwrap_or(defaults.temp_dir),
            max_age_hours: self.max_age_hours,
            allow_local_files: self.allow_local_files,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert a DICOM file to JPEG and print the output path
    Convert(ConvertArgs),

    /// Print the metadata record of a DICOM file
    Metadata {
        /// DICOM file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Aligned text instead of JSON
        #[arg(short, long)]
        text: bool,
    },

    /// Check that a file is DICOM with readable pixel data (exit code 1 if not)
    Validate {
        /// File to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Run the request handler on a JSON event and print the response
    Handle {
        /// Event file; read from stdin when omitted
        #[arg(short, long, value_name = "FILE")]
        event: Option<PathBuf>,
    },

    /// Print the health check response
    Health,

    /// Remove stale scratch entries and print the report
    Cleanup {
        /// Only report current usage, remove nothing
        #[arg(long)]
        stats: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ConvertArgs {
    /// DICOM file path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output directory (defaults to the input file's directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// JPEG quality, 1 to 100
    #[arg(short, long, default_value_t = Quality::DEFAULT)]
    pub quality: Quality,

    /// Zero-based frame to render from a multi-frame image
    #[arg(short, long, default_value_t = 0)]
    pub frame: u32,
}
