//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{CONFIG_LOCATION_ENV, DEFAULT_CONFIG_PATH};

/// Provision one virtual machine on AWS, GCP or Azure from a YAML document.
#[derive(Parser, Debug)]
#[command(name = "compute-creator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration document.
    #[arg(short, long, env = CONFIG_LOCATION_ENV, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
