//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use cadenza_core::lang::registry::Stability;
use cadenza_core::lang::rules::{RULES, RuleInfo};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::engine::{AnalysisReport, Engine, Metrics};
use crate::frontend::ast::SourceUnit;
use crate::frontend::diagnostics::{Diagnostic, Rendered};

use super::{CliError, CliResult, ExitCode, OutputFormat};

// ============================================================================
// Input loading
// ============================================================================

fn read_to_string(path: &Path, what: &str) -> CliResult<String> {
    fs::read_to_string(path)
        .map_err(|e| CliError::usage(format!("Error reading {what} '{}': {e}", path.display())))
}

/// Read the JSON array of parsed units handed over by the parser.
pub fn load_program(path: &Path) -> CliResult<Vec<SourceUnit>> {
    let text = read_to_string(path, "program")?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::usage(format!("Error parsing program '{}': {e}", path.display())))
}

pub fn load_config(path: Option<&Path>) -> CliResult<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let text = read_to_string(path, "config")?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::usage(format!("Error parsing config '{}': {e}", path.display())))
}

// ============================================================================
// check
// ============================================================================

/// JSON output document for `check --format json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    diagnostics: &'a [Diagnostic],
    metrics: Metrics,
    exceeds_threshold: bool,
}

/// Verify a program and print its diagnostics.
pub fn check(program: &Path, config: Option<&Path>, format: OutputFormat) -> CliResult<ExitCode> {
    let units = load_program(program)?;
    let config = load_config(config)?;

    let sources: HashMap<PathBuf, Option<String>> = units.iter().map(|u| (u.path.clone(), u.source.clone())).collect();

    let mut engine = Engine::new(config).map_err(|e| CliError::usage(format!("Error in config: {e}")))?;
    let report = engine.analyze(units);

    match format {
        OutputFormat::Human => print_human(&report, &sources),
        OutputFormat::Json => print_json(&report)?,
    }

    if report.exceeds_threshold() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_human(report: &AnalysisReport, sources: &HashMap<PathBuf, Option<String>>) {
    for diagnostic in &report.diagnostics {
        let source = sources.get(&diagnostic.location.file).and_then(Option::as_deref);
        let rendered = Rendered::new(diagnostic.clone(), source);
        eprintln!("{}", rendered.to_report_string());
    }
    println!("{}", summary_line(&report.metrics));
}

fn print_json(report: &AnalysisReport) -> CliResult<()> {
    let document = JsonReport {
        diagnostics: &report.diagnostics,
        metrics: report.metrics,
        exceeds_threshold: report.exceeds_threshold(),
    };
    let text = serde_json::to_string_pretty(&document)
        .map_err(|e| CliError::failure(format!("Error serializing report: {e}")))?;
    println!("{text}");
    Ok(())
}

/// `2 errors, 1 warning, 0 infos in 14 functions (3 pure)`
pub fn summary_line(metrics: &Metrics) -> String {
    let plural = |n: usize, word: &str| {
        if n == 1 {
            format!("{n} {word}")
        } else {
            format!("{n} {word}s")
        }
    };
    format!(
        "{}, {}, {} in {} ({} pure)",
        plural(metrics.errors, "error"),
        plural(metrics.warnings, "warning"),
        plural(metrics.infos, "info"),
        plural(metrics.functions_analyzed, "function"),
        metrics.pure_functions
    )
}

// ============================================================================
// rules
// ============================================================================

pub fn list_rules() -> CliResult<ExitCode> {
    let width = RULES.iter().map(|r| r.item.canonical.len()).max().unwrap_or(0);
    for rule in RULES {
        println!("{}", rule_line(rule, width));
    }
    Ok(ExitCode::SUCCESS)
}

/// One row of `cadenza rules`: id, category, default severity, provenance, description.
fn rule_line(rule: &RuleInfo, width: usize) -> String {
    let item = &rule.item;
    let provenance = match (item.since_version, item.stability) {
        (Some(since), Stability::Stable) => format!("since {since}"),
        (Some(since), stability) => format!("since {since}, {}", stability.as_str()),
        (None, stability) => stability.as_str().to_string(),
    };
    format!(
        "{:<width$}  {:<13}  {:<7}  {:<13}  {}",
        item.canonical,
        rule.category.as_str(),
        rule.default_severity.as_str(),
        provenance,
        item.description,
    )
}
