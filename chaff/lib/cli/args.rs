use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// chaff - find bytes a container image ships but can never expose
#[derive(Debug, Parser)]
#[command(name = "chaff", author, about, version, styles=styles::styles())]
pub struct ChaffArgs {
    /// Image to analyze, e.g. `alpine:3.19` or `ghcr.io/org/app@sha256:...`
    #[arg(
        value_name = "IMAGE",
        required_unless_present = "archive",
        conflicts_with = "archive"
    )]
    pub image: Option<String>,

    /// Analyze local layer tarballs instead of pulling an image, oldest layer first
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub archive: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Only list the N largest chaff entries
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Platform to select from multi-platform images [default: linux/amd64]
    #[arg(long, value_name = "OS/ARCH[/VARIANT]", conflicts_with = "archive")]
    pub platform: Option<String>,

    /// Print a per-layer breakdown
    #[arg(long)]
    pub layers: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// How the report is printed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,

    /// The full report as JSON.
    Json,
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------
