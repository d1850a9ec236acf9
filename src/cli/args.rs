//! CLI argument parsing module
//!
//! This module defines the command-line interface for the libcsearch tool.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// libcsearch - identify libc builds from leaked symbol addresses
#[derive(Parser, Debug)]
#[command(name = "libcsearch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Identify libc builds from leaked symbol addresses")]
#[command(long_about = r#"
libcsearch asks the libc.blukat.me or libc.rip databases which C library
builds place the given symbols at the given addresses, verifies every
suggestion against its full symbol table and optionally downloads the
matching shared objects.

Symbols are given as NAME=ADDRESS (hex, 0x optional). A bare NAME is not
sent to the database but its offset is resolved in every match. The alias
`binsh` stands for the "/bin/sh" string (str_bin_sh).

Examples:
  libcsearch find puts=0x7f10101010                  # Candidates for one leak
  libcsearch find puts=0x7f10101010 binsh system     # Also resolve offsets
  libcsearch find --download puts=0x7f10101010       # Fetch the .so files
  libcsearch --format json find puts=0x7f10101010    # Output results as JSON
  libcsearch test-api                                # Check backend reachability
"#)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short = 'f', long = "format", global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Suppress colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

/// Backend and concurrency settings shared by the network commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BackendOptions {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Backend to probe, as KIND=URL (blukat or rip); repeat to set the
    /// probe order
    #[arg(long = "backend", value_name = "KIND=URL")]
    pub backends: Vec<String>,

    /// Reachability probe timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub probe_timeout: Option<u64>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find libc builds matching leaked symbol addresses
    Find {
        /// Symbols as NAME=ADDRESS, or NAME to only resolve its offset
        #[arg(value_name = "SYMBOL[=ADDRESS]", required = true)]
        symbols: Vec<String>,

        /// Download the shared object of every match
        #[arg(short, long)]
        download: bool,

        /// Directory downloads are written to
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Maximum number of concurrent requests
        #[arg(short, long, value_name = "N")]
        workers: Option<usize>,

        #[command(flatten)]
        backend: BackendOptions,
    },

    /// Test connectivity to the libc databases
    TestApi {
        #[command(flatten)]
        backend: BackendOptions,
    },

    /// Show version information and exit
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed human-readable output (default)
    Pretty,
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Simple text output (minimal formatting)
    Simple,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pretty => write!(f, "pretty"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Simple => write!(f, "simple"),
        }
    }
}
