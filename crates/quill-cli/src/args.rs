//! Command-line argument definitions for the Quill CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the template, the data it is rendered
//! with, where the output goes, the configuration file and logging verbosity.

use clap::Parser;

/// Command-line arguments for the Quill template renderer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the template to render
    #[arg(help = "Path to the template file")]
    pub input: String,

    /// TOML file whose top-level table becomes the template variables
    #[arg(short, long)]
    pub data: Option<String>,

    /// Templates whose `#define`s are callable from every template
    #[arg(short, long)]
    pub shared: Vec<String>,

    /// Path to the output file; stdout when absent
    #[arg(short, long)]
    pub output: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
