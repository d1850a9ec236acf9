//! CLI module for the libcsearch tool
//!
//! This module provides the command-line interface functionality including
//! argument parsing and output formatting.

pub mod args;
pub mod output;

pub use args::{Args, BackendOptions, Commands, OutputFormat};
pub use output::{Color, OutputFormatter, SearchOutput};

use crate::config::{BackendEndpoint, SearchConfig};
use crate::libc::{ConstraintSet, LibcSearch};
use crate::transport::{ReqwestTransport, Transport};
use anyhow::{anyhow, Context, Result};
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Main CLI application runner
pub struct CliApp {
    args: Args,
}

impl CliApp {
    /// Create a new CLI application with parsed arguments
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Run the CLI application
    pub async fn run(&self) -> Result<i32> {
        match &self.args.command {
            Commands::Find {
                symbols,
                download,
                output_dir,
                workers,
                backend,
            } => {
                self.run_find(symbols, *download, output_dir, *workers, backend)
                    .await
            }
            Commands::TestApi { backend } => self.run_test_api(backend).await,
            Commands::Version => self.run_version().await,
        }
    }

    fn formatter(&self) -> OutputFormatter {
        OutputFormatter::new(
            self.args.format.clone(),
            !self.args.no_color,
            self.args.verbose,
        )
    }

    /// Run the find command
    async fn run_find(
        &self,
        symbols: &[String],
        download: bool,
        output_dir: &Path,
        workers: Option<usize>,
        backend: &BackendOptions,
    ) -> Result<i32> {
        let mut config = build_config(backend)?;
        if let Some(workers) = workers {
            config.max_workers = workers;
        }

        let constraints = ConstraintSet::from_specs(symbols)?;
        if constraints.constraints().is_empty() {
            return Err(anyhow!(
                "at least one symbol needs an address (NAME=ADDRESS)"
            ));
        }

        let transport = ReqwestTransport::new(&config)?;
        self.find_with(Arc::new(transport), config, constraints, download, output_dir)
            .await
    }

    /// Resolve, optionally download, print. Exits non-zero only when a
    /// download failed; an empty catalog is a successful run.
    async fn find_with(
        &self,
        transport: Arc<dyn Transport>,
        config: SearchConfig,
        constraints: ConstraintSet,
        download: bool,
        output_dir: &Path,
    ) -> Result<i32> {
        let search = LibcSearch::resolve(transport, config, constraints).await?;

        let downloads = if download {
            Some(search.download_to(output_dir).await)
        } else {
            None
        };

        let formatter = self.formatter();
        let mut stdout = io::stdout();
        formatter.write_search_results(
            &mut stdout,
            &SearchOutput {
                backend: search.backend(),
                catalog: search.catalog(),
                rejected: search.rejected(),
                downloads: downloads.as_ref(),
            },
        )?;

        let exit_code = match downloads {
            Some(report) if !report.failures.is_empty() => 2,
            _ => 0,
        };
        Ok(exit_code)
    }

    /// Run the test-api command
    async fn run_test_api(&self, backend: &BackendOptions) -> Result<i32> {
        let config = build_config(backend)?;
        let formatter = self.formatter();
        let mut stdout = io::stdout();

        match crate::libc::test_api_connection(&config).await {
            Ok(selected) => {
                formatter.write_api_test_result(
                    &mut stdout,
                    true,
                    &format!("{} selected ({})", selected.base_url(), selected.kind()),
                )?;
                Ok(0)
            }
            Err(e) => {
                formatter.write_api_test_result(&mut stdout, false, &e.to_string())?;
                Ok(1)
            }
        }
    }

    /// Run the version command
    async fn run_version(&self) -> Result<i32> {
        match self.args.format {
            OutputFormat::Json => {
                let version_info = serde_json::json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                    "description": env!("CARGO_PKG_DESCRIPTION"),
                });
                println!("{}", serde_json::to_string_pretty(&version_info)?);
            }
            _ => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                println!("{}", env!("CARGO_PKG_DESCRIPTION"));
            }
        }
        Ok(0)
    }
}

/// Merge the configuration file (if any) with command-line overrides.
fn build_config(options: &BackendOptions) -> Result<SearchConfig> {
    let mut config = match &options.config {
        Some(path) => SearchConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SearchConfig::default(),
    };

    if !options.backends.is_empty() {
        config.backends = options
            .backends
            .iter()
            .map(|b| b.parse::<BackendEndpoint>())
            .collect::<Result<_, _>>()?;
    }
    if let Some(ms) = options.probe_timeout {
        config.probe_timeout_ms = ms;
    }

    config.validate()?;
    Ok(config)
}
