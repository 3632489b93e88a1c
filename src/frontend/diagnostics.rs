//! Diagnostics for the Cadenza verification engine
//!
//! Every finding is a [`Diagnostic`]: an immutable record with a rule id, severity, message, location, category and
//! an optional fix suggestion. Diagnostics are built once (with the consuming `with_*` builders) and never mutated
//! after they leave the phase that produced them.
//!
//! Rendering for humans goes through miette (see [`Rendered`]); machine output serializes with serde.

use std::fmt;
use std::path::{Path, PathBuf};

use cadenza_core::lang::rules::{RuleCategory, RuleId, Severity};
use miette::{LabeledSpan, NamedSource, SourceCode};
use serde::{Serialize, Serializer};

use crate::frontend::ast::{SourceUnit, Span};

/// Where a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub length: u32,
    /// Text of the source line, when the unit carries its source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Location {
    pub fn new(file: &Path, span: Span) -> Self {
        Self {
            file: file.to_path_buf(),
            line: span.line,
            column: span.column,
            length: span.len,
            snippet: None,
        }
    }
}

/// A single verification finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    #[serde(rename = "ruleId", serialize_with = "as_display")]
    pub rule: RuleId,
    #[serde(serialize_with = "as_display")]
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    #[serde(serialize_with = "as_display")]
    pub category: RuleCategory,
    #[serde(rename = "fixSuggestion", skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

fn as_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl Diagnostic {
    /// Create a diagnostic with the rule's registry category and default severity.
    pub fn new(rule: RuleId, message: impl Into<String>, file: &Path, span: Span) -> Self {
        Self {
            rule,
            severity: rule.default_severity(),
            message: message.into(),
            location: Location::new(file, span),
            category: rule.category(),
            fix: None,
            notes: Vec::new(),
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach the source line when `unit` carries its text.
    pub fn with_snippet_from(mut self, unit: &SourceUnit) -> Self {
        if self.location.snippet.is_none() {
            self.location.snippet = unit.line_text(self.location.line).map(str::to_string);
        }
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.rule.is_fatal()
    }

    /// Ordering key used when publishing a file's diagnostics.
    pub(crate) fn sort_key(&self) -> (u32, u32, RuleId, &str) {
        (self.location.line, self.location.column, self.rule, self.message.as_str())
    }
}

/// One-line form: `error[UnusedResultError] f.cdz:3:12: message`.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}:{}:{}: {}",
            self.severity,
            self.rule,
            self.location.file.display(),
            self.location.line,
            self.location.column,
            self.message
        )
    }
}

// ============================================================================
// miette rendering
// ============================================================================

/// A diagnostic paired with its source text, ready for miette's report handlers.
#[derive(Debug)]
pub struct Rendered {
    diagnostic: Diagnostic,
    source: Option<NamedSource<String>>,
    offset: Option<(usize, usize)>,
    help: Option<String>,
}

impl Rendered {
    pub fn new(diagnostic: Diagnostic, source: Option<&str>) -> Self {
        let offset = source.and_then(|text| byte_offset(text, &diagnostic.location));
        let source = source.map(|text| {
            NamedSource::new(diagnostic.location.file.display().to_string(), text.to_string())
        });

        let mut help_lines: Vec<String> = diagnostic.fix.iter().cloned().collect();
        help_lines.extend(diagnostic.notes.iter().map(|n| format!("note: {n}")));
        let help = (!help_lines.is_empty()).then(|| help_lines.join("\n"));

        Self {
            diagnostic,
            source,
            offset,
            help,
        }
    }

    /// Render with the graphical handler (no colors, so output is stable in logs).
    pub fn to_report_string(&self) -> String {
        let mut out = String::new();
        let handler = miette::GraphicalReportHandler::new_themed(miette::GraphicalTheme::unicode_nocolor());
        if handler.render_report(&mut out, self).is_err() {
            return self.diagnostic.to_string();
        }
        out
    }
}

/// Convert a 1-based line/column location into a byte offset and length within `text`.
fn byte_offset(text: &str, location: &Location) -> Option<(usize, usize)> {
    let line_index = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let mut start = 0;
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i == line_index {
            let trimmed = line.trim_end_matches(['\n', '\r']);
            let column = usize::try_from(location.column).ok()?.saturating_sub(1);
            let col_byte = trimmed.char_indices().nth(column).map(|(b, _)| b).unwrap_or(trimmed.len());
            let len_chars = usize::try_from(location.length).ok()?.max(1);
            let end_byte = trimmed[col_byte..]
                .char_indices()
                .nth(len_chars)
                .map(|(b, _)| col_byte + b)
                .unwrap_or(trimmed.len());
            return Some((start + col_byte, end_byte.saturating_sub(col_byte)));
        }
        start += line.len();
    }
    None
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diagnostic.message)
    }
}

impl std::error::Error for Rendered {}

impl miette::Diagnostic for Rendered {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.diagnostic.rule))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.diagnostic.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
            Severity::Info => miette::Severity::Advice,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help.as_ref().map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.source.as_ref().map(|s| s as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (offset, len) = self.offset?;
        let label = LabeledSpan::new(Some(self.diagnostic.category.to_string()), offset, len);
        Some(Box::new(std::iter::once(label)))
    }
}

// ============================================================================
// Error catalog
// ============================================================================

/// Constructors for every diagnostic the engine emits, so wording stays consistent across phases.
pub mod errors {
    use super::*;
    use cadenza_core::effects::EffectSet;
    use cadenza_core::lang::effects::EffectId;

    pub fn unresolved_module(file: &Path, target: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::UnresolvedImport,
            format!("cannot resolve import {target}: no module or file with that name"),
            file,
            span,
        )
        .with_fix("check the module name, or declare it with `module <name>` in the file that provides it")
    }

    pub fn unexported_import(file: &Path, module: &str, name: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::UnresolvedImport,
            format!("module `{module}` does not export `{name}`"),
            file,
            span,
        )
        .with_fix(format!("add `{name}` to the export list of `{module}`, or remove it from the import"))
    }

    pub fn unexported_call(file: &Path, module: &str, name: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::UnresolvedImport,
            format!("`{name}` is defined in module `{module}` but not exported"),
            file,
            span,
        )
        .with_fix(format!("add `{name}` to the export list of `{module}`"))
    }

    pub fn unresolved_reference(file: &Path, name: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::UnresolvedReference,
            format!("cannot find function `{name}` in this scope"),
            file,
            span,
        )
        .with_fix("define the function, or import the module that exports it")
    }

    pub fn missing_in_module(file: &Path, module: &str, name: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::UnresolvedReference,
            format!("module `{module}` has no function `{name}`"),
            file,
            span,
        )
    }

    pub fn unknown_qualifier(file: &Path, qualifier: &str, name: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::UnresolvedReference,
            format!("cannot resolve `{qualifier}.{name}`: `{qualifier}` is not an imported module"),
            file,
            span,
        )
        .with_fix(format!("add `import {qualifier}`"))
    }

    pub fn duplicate_function(file: &Path, name: &str, first: Span, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::DuplicateFunction,
            format!("function `{name}` is already defined on line {}", first.line),
            file,
            span,
        )
        .with_note("this declaration is ignored")
        .with_fix(format!("rename or remove one of the `{name}` functions"))
    }

    pub fn circular_dependency(file: &Path, cycle: &[PathBuf], span: Span) -> Diagnostic {
        let path = cycle
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        Diagnostic::new(RuleId::CircularDependency, format!("circular dependency: {path}"), file, span)
            .with_note("files on a dependency cycle are excluded from further analysis")
    }

    pub fn duplicate_module(file: &Path, module: &str, name: &str, other: &Path, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::DuplicateModule,
            format!(
                "module `{module}` is declared again here and exports `{name}`, which `{}` already defines",
                other.display()
            ),
            file,
            span,
        )
        .with_fix(format!(
            "rename one of the modules, or list both files as fragments of `{module}` in the configuration"
        ))
    }

    pub fn ambiguous_reference(file: &Path, name: &str, candidates: &[String], span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::AmbiguousReference,
            format!("`{name}` is ambiguous: it could refer to {}", candidates.join(" or ")),
            file,
            span,
        )
        .with_fix("qualify the call with its module name")
    }

    pub fn unknown_effect(file: &Path, token: &str, span: Span) -> Diagnostic {
        let known = cadenza_core::lang::effects::EFFECTS
            .iter()
            .map(|e| e.canonical)
            .collect::<Vec<_>>()
            .join(", ");
        Diagnostic::new(RuleId::UnknownEffect, format!("unknown effect `{token}`"), file, span)
            .with_note(format!("known effects: {known}"))
    }

    pub fn pure_calls_effectful(file: &Path, function: &str, callee: &str, effects: EffectSet, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::PureFunctionViolation,
            format!("pure function `{function}` calls `{callee}`, which requires {effects}"),
            file,
            span,
        )
        .with_fix(format!("remove `pure` from `{function}` and declare `uses {effects}`"))
    }

    pub fn pure_declares_effects(file: &Path, function: &str, declared: EffectSet, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::PureFunctionViolation,
            format!("pure function `{function}` declares effects {declared}"),
            file,
            span,
        )
        .with_fix("remove the `uses` clause or the `pure` marker")
    }

    pub fn missing_effect(
        file: &Path,
        function: &str,
        effect: EffectId,
        chain: &str,
        suggested: EffectSet,
        span: Span,
    ) -> Diagnostic {
        Diagnostic::new(
            RuleId::EffectCompleteness,
            format!("function `{function}` requires effect `{effect}` but does not declare it"),
            file,
            span,
        )
        .with_note(format!("required through {chain}"))
        .with_fix(format!("declare `uses {suggested}`"))
    }

    pub fn unused_effect(file: &Path, function: &str, effect: EffectId, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::EffectMinimality,
            format!("function `{function}` declares effect `{effect}` but never uses it"),
            file,
            span,
        )
        .with_fix(format!("remove `{effect}` from the uses clause"))
    }

    pub fn unused_result(file: &Path, callee: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::UnusedResult,
            format!("Result of `{callee}` is not handled"),
            file,
            span,
        )
        .with_fix(format!("propagate it with `{callee}(..)?` or match on both `Ok` and `Err`"))
    }

    pub fn partially_handled_result(file: &Path, callee: &str, missing: &str, span: Span) -> Diagnostic {
        unused_result(file, callee, span).with_note(format!("the `{missing}` variant is never handled"))
    }

    pub fn propagation_outside_result(file: &Path, function: &str, returns: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::ErrorPropagationMisuse,
            format!("`?` used in `{function}`, which returns `{returns}` rather than a Result"),
            file,
            span,
        )
        .with_fix("change the return type to a Result, or match on the value instead")
    }

    pub fn propagation_on_non_result(file: &Path, found: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::ErrorPropagationMisuse,
            format!("`?` applied to a value of type `{found}`, which is not a Result"),
            file,
            span,
        )
    }

    pub fn incompatible_error_type(file: &Path, expected: &str, found: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            RuleId::ErrorPropagationMisuse,
            format!("`?` cannot convert error type `{found}` into `{expected}`"),
            file,
            span,
        )
        .with_fix(format!("declare `type {expected} from [{found}]`, or map the error first"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn sample() -> Diagnostic {
        errors::unused_result(Path::new("f.cdz"), "divide", Span::new(2, 12, 12))
    }

    #[test]
    fn test_display_one_line() {
        insta::assert_snapshot!(sample().to_string(), @"error[UnusedResultError] f.cdz:2:12: Result of `divide` is not handled");
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["ruleId"], "UnusedResultError");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["category"], "result-type");
        assert_eq!(json["location"]["line"], 2);
        assert_eq!(json["location"]["length"], 12);
        assert!(json["fixSuggestion"].as_str().unwrap().contains("divide"));
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn test_builders_do_not_touch_identity() {
        let d = sample().with_severity(Severity::Warning).with_note("n");
        assert_eq!(d.rule, RuleId::UnusedResult);
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.notes, vec!["n".to_string()]);
    }

    #[test]
    fn test_byte_offset_on_second_line() {
        let text = "module m\n    return divide(x, 2)\n";
        let loc = Location::new(Path::new("m.cdz"), Span::new(2, 12, 6));
        assert_eq!(byte_offset(text, &loc), Some((9 + 11, 6)));
    }

    #[test]
    fn test_rendered_report_mentions_code_and_help() {
        let text = "function f() -> int {\n    divide(1, 2)\n}\n";
        let d = errors::unused_result(Path::new("f.cdz"), "divide", Span::new(2, 5, 12));
        let report = Rendered::new(d, Some(text)).to_report_string();
        assert!(report.contains("UnusedResultError"));
        assert!(report.contains("divide(1, 2)"));
        assert!(report.contains("propagate it"));
    }
}
