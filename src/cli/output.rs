//! CLI output formatting module
//!
//! This module provides various output formatters for displaying search results
//! in different formats (pretty, JSON, CSV, simple text).

use crate::cli::args::OutputFormat;
use crate::error::SearchError;
use crate::libc::{Backend, DownloadReport, LibraryCatalog};
use crate::runner::TaskFailure;
use anyhow::Result;
use colored::*;
use std::io::Write;

/// Everything a `find` run has to show
pub struct SearchOutput<'a> {
    pub backend: &'a Backend,
    pub catalog: &'a LibraryCatalog,
    pub rejected: &'a [TaskFailure<SearchError>],
    pub downloads: Option<&'a DownloadReport>,
}

/// Main output formatter that handles different formats
pub struct OutputFormatter {
    format: OutputFormat,
    use_color: bool,
    verbose: bool,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(format: OutputFormat, use_color: bool, verbose: bool) -> Self {
        Self {
            format,
            use_color,
            verbose,
        }
    }

    /// Format and write search results
    pub fn write_search_results<W: Write>(
        &self,
        writer: &mut W,
        output: &SearchOutput<'_>,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Pretty => self.write_pretty_output(writer, output),
            OutputFormat::Json => self.write_json_output(writer, output),
            OutputFormat::Csv => self.write_csv_output(writer, output),
            OutputFormat::Simple => self.write_simple_output(writer, output),
        }
    }

    /// Write API test results
    pub fn write_api_test_result<W: Write>(
        &self,
        writer: &mut W,
        success: bool,
        message: &str,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let result = serde_json::json!({
                    "api_test": {
                        "success": success,
                        "message": message
                    }
                });
                writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
            }
            _ => {
                let status = if success {
                    self.colorize("✓ SUCCESS", Color::Green)
                } else {
                    self.colorize("✗ FAILED", Color::Red)
                };
                writeln!(writer, "API Test: {} - {}", status, message)?;
            }
        }
        Ok(())
    }

    fn write_pretty_output<W: Write>(&self, writer: &mut W, output: &SearchOutput<'_>) -> Result<()> {
        writeln!(writer, "{}", self.colorize("libcsearch results", Color::Cyan))?;
        writeln!(writer, "{}", "=".repeat(18))?;
        writeln!(
            writer,
            "Backend: {} ({})",
            output.backend.base_url(),
            output.backend.kind()
        )?;
        writeln!(writer, "Matches: {}", output.catalog.len())?;
        writeln!(writer)?;

        if output.catalog.is_empty() {
            writeln!(
                writer,
                "{}",
                self.colorize("No libc build matches the given symbols", Color::Yellow)
            )?;
        }

        for library in output.catalog {
            writeln!(writer, "{}", self.colorize(&format!("[*]{}", library.name()), Color::Green))?;
            for (symbol, offset) in library.offsets() {
                writeln!(writer, "    {:12} 0x{:x}", symbol, offset)?;
            }
        }

        if !output.rejected.is_empty() {
            writeln!(writer)?;
            writeln!(
                writer,
                "{}",
                self.colorize(
                    &format!("Rejected candidates: {}", output.rejected.len()),
                    Color::Yellow
                )
            )?;
            if self.verbose {
                for failure in output.rejected {
                    writeln!(writer, "  - {}", failure)?;
                }
            }
        }

        if let Some(downloads) = output.downloads {
            writeln!(writer)?;
            writeln!(writer, "{}", self.colorize("Downloads", Color::Cyan))?;
            for file in &downloads.files {
                writeln!(writer, "  {} {}", self.colorize("✓", Color::Green), file)?;
            }
            for failure in &downloads.failures {
                writeln!(writer, "  {} {}", self.colorize("✗", Color::Red), failure)?;
            }
        }

        Ok(())
    }

    fn write_json_output<W: Write>(&self, writer: &mut W, output: &SearchOutput<'_>) -> Result<()> {
        let mut result = serde_json::json!({
            "backend": {
                "kind": output.backend.kind(),
                "url": output.backend.base_url(),
            },
            "matches": output.catalog,
            "rejected": output
                .rejected
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>(),
        });

        if let Some(downloads) = output.downloads {
            result["downloads"] = serde_json::json!({
                "files": downloads.files,
                "failures": downloads
                    .failures
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>(),
            });
        }

        writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
        Ok(())
    }

    fn write_csv_output<W: Write>(&self, writer: &mut W, output: &SearchOutput<'_>) -> Result<()> {
        writeln!(writer, "library,symbol,offset")?;
        for library in output.catalog {
            for (symbol, offset) in library.offsets() {
                writeln!(writer, "{},{},0x{:x}", library.name(), symbol, offset)?;
            }
        }
        Ok(())
    }

    fn write_simple_output<W: Write>(&self, writer: &mut W, output: &SearchOutput<'_>) -> Result<()> {
        for library in output.catalog {
            let offsets: Vec<String> = library
                .offsets()
                .iter()
                .map(|(symbol, offset)| format!("{}=0x{:x}", symbol, offset))
                .collect();
            writeln!(writer, "{} {}", library.name(), offsets.join(" "))?;
        }
        if let Some(downloads) = output.downloads {
            for file in &downloads.files {
                writeln!(writer, "{}", file)?;
            }
        }
        Ok(())
    }

    /// Apply color to text if colors are enabled
    pub fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_color {
            match color {
                Color::Red => text.red().to_string(),
                Color::Green => text.green().to_string(),
                Color::Yellow => text.yellow().to_string(),
                Color::Cyan => text.cyan().to_string(),
            }
        } else {
            text.to_string()
        }
    }
}

/// Color enumeration for output formatting
#[derive(Debug, Clone, Copy)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Cyan,
}
