//! libcsearch - find the libc behind a leak
//!
//! A CLI tool that identifies C library builds from leaked symbol addresses
//! using the libc.blukat.me and libc.rip databases, and downloads them.

use anyhow::Result;
use clap::Parser;
use libcsearch::cli::{Args, CliApp};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_target(false)
        .init();

    // Create and run the CLI application
    let app = CliApp::new(args);
    let exit_code = app.run().await?;

    // Exit with the appropriate code
    std::process::exit(exit_code);
}
