//! CLI module for the Cadenza verifier
//!
//! A thin shell over the engine. Parsing source text and walking directories are somebody else's job: `check` reads
//! a JSON array of already-parsed, typed `SourceUnit`s.
//!
//! ## Commands
//!
//! - `check <program.json> [--config <config.json>] [--format human|json]` - Verify a program
//! - `rules` - List every diagnostic rule
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Bad input or configuration, as opposed to a program that failed verification.
    pub const USAGE: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::USAGE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Static effect and Result-discharge verifier for Cadenza programs
#[derive(Parser, Debug)]
#[command(name = "cadenza")]
#[command(version = VERSION)]
#[command(about = "Static effect and Result-discharge verifier for Cadenza programs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify a parsed program
    Check {
        /// JSON array of typed source units
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,
        /// Analysis configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// List every diagnostic rule
    Rules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Rendered reports with source excerpts
    Human,
    /// One JSON document with diagnostics and metrics
    Json,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Check {
            program,
            config,
            format,
        } => commands::check(&program, config.as_deref(), format),
        Command::Rules => commands::list_rules(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::try_parse_from(["cadenza", "check", "program.json"]).unwrap();
        if let Command::Check {
            program,
            config,
            format,
        } = cli.command
        {
            assert_eq!(program, PathBuf::from("program.json"));
            assert!(config.is_none());
            assert_eq!(format, OutputFormat::Human);
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_cli_parse_check_with_options() {
        let cli = Cli::try_parse_from([
            "cadenza",
            "check",
            "program.json",
            "--config",
            "cadenza.json",
            "--format",
            "json",
        ])
        .unwrap();
        if let Command::Check { config, format, .. } = cli.command {
            assert_eq!(config, Some(PathBuf::from("cadenza.json")));
            assert_eq!(format, OutputFormat::Json);
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_cli_parse_rules() {
        let cli = Cli::try_parse_from(["cadenza", "rules"]).unwrap();
        assert!(matches!(cli.command, Command::Rules));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["cadenza", "check", "p.json", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_cli_error_codes() {
        assert_eq!(CliError::failure("x").exit_code, ExitCode::FAILURE);
        assert_eq!(CliError::usage("x").exit_code, ExitCode::USAGE);
    }
}
