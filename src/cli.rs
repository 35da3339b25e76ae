//! Command-line interface for testverse
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// testverse - isolated virtual networks for VM test clusters
#[derive(Parser)]
#[command(name = "testverse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Verify that the required external tools are installed
    Check,

    /// Bring up a universe and keep it alive until Ctrl+C
    Up {
        /// Number of node slots to reserve
        #[arg(short, long, default_value_t = 1)]
        nodes: usize,

        /// Print the node plan as JSON
        #[arg(long)]
        json: bool,

        /// Tear the universe down after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "testverse", &mut std::io::stdout());
    }
}
