//! CLI command definitions using clap.
//!
//! - analyze: run a batch of transcripts through the analysis pipeline
//! - check: test whether a file holds a well-formed JSON object

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Callpipe - batch LLM analysis of transcribed calls
#[derive(Parser, Debug)]
#[command(name = "callpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze transcription result files (or directories of them)
    Analyze {
        /// Transcript files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Size of the worker pool
        #[arg(short, long)]
        workers: Option<usize>,

        /// Attempts per record before giving up on invalid output
        #[arg(short = 'a', long)]
        max_attempts: Option<u32>,

        /// Task prompt template file
        #[arg(short, long)]
        prompt: Option<PathBuf>,

        /// Directory artifacts are written below
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Delete each transcript after its artifact is saved
        #[arg(long)]
        remove_sources: bool,

        /// Cancel the batch after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Check whether a file contains a well-formed JSON object
    Check {
        /// File to check
        file: PathBuf,
    },
}
