//! Diagnostic rule vocabulary.
//!
//! Every diagnostic the verification engine produces carries a [`RuleId`]. The table below is the single source of
//! truth for rule spellings (the `ruleId` consumed by CLI/CI and editor layers), categories, default severities and
//! whether the rule is fatal for the file/function it is reported on.
//!
//! ## Examples
//! ```rust
//! use cadenza_core::lang::rules::{self, RuleCategory, RuleId, Severity};
//!
//! assert_eq!(rules::from_str("UnusedResultError"), Some(RuleId::UnusedResult));
//! let info = rules::info_for(RuleId::EffectMinimality);
//! assert_eq!(info.default_severity, Severity::Warning);
//! assert_eq!(info.category, RuleCategory::EffectSystem);
//! assert!(!info.fatal);
//! ```

use std::fmt;
use std::str::FromStr;

use super::registry::{LangItemInfo, stable};

/// Stable identifier for a diagnostic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleId {
    UnresolvedImport,
    UnresolvedReference,
    CircularDependency,
    DuplicateModule,
    DuplicateFunction,
    AmbiguousReference,
    UnknownEffect,
    PureFunctionViolation,
    EffectCompleteness,
    EffectMinimality,
    UnusedResult,
    ErrorPropagationMisuse,
}

/// Diagnostic severity. Ordered so that `Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Diagnostic category, as reported to CLI/CI and editor layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCategory {
    EffectSystem,
    ResultType,
    ModuleSystem,
}

/// Metadata for a rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleInfo {
    pub item: LangItemInfo<RuleId>,
    pub category: RuleCategory,
    pub default_severity: Severity,
    /// Fatal rules halt further processing of the affected file or function (never the whole run).
    pub fatal: bool,
}

/// Registry of all rules.
pub const RULES: &[RuleInfo] = &[
    rule(
        RuleId::UnresolvedImport,
        "UnresolvedImportError",
        RuleCategory::ModuleSystem,
        Severity::Error,
        true,
        "An import names a module or file that does not exist, or a symbol the module does not export.",
    ),
    rule(
        RuleId::UnresolvedReference,
        "UnresolvedReferenceError",
        RuleCategory::ModuleSystem,
        Severity::Error,
        true,
        "A call names a function or module qualifier that is not visible from the calling file.",
    ),
    rule(
        RuleId::CircularDependency,
        "CircularDependencyError",
        RuleCategory::ModuleSystem,
        Severity::Error,
        true,
        "Files import each other in a cycle; every file on the cycle is excluded from further analysis.",
    ),
    rule(
        RuleId::DuplicateModule,
        "DuplicateModuleError",
        RuleCategory::ModuleSystem,
        Severity::Error,
        true,
        "Two files declare the same module and export the same name with different definitions.",
    ),
    rule(
        RuleId::DuplicateFunction,
        "DuplicateFunctionError",
        RuleCategory::ModuleSystem,
        Severity::Error,
        true,
        "A file declares two functions with the same name; only the first is bound and verified.",
    ),
    rule(
        RuleId::AmbiguousReference,
        "AmbiguousReferenceError",
        RuleCategory::ModuleSystem,
        Severity::Error,
        true,
        "An unqualified call matches names exposed by more than one import; qualify the call.",
    ),
    rule(
        RuleId::UnknownEffect,
        "UnknownEffectError",
        RuleCategory::EffectSystem,
        Severity::Error,
        true,
        "A `uses [...]` clause names an effect outside the engine's effect registry.",
    ),
    rule(
        RuleId::PureFunctionViolation,
        "PureFunctionViolationError",
        RuleCategory::EffectSystem,
        Severity::Error,
        true,
        "A function marked `pure` performs (or calls something that performs) an effect, or declares effects.",
    ),
    rule(
        RuleId::EffectCompleteness,
        "EffectCompletenessError",
        RuleCategory::EffectSystem,
        Severity::Error,
        true,
        "A function requires an effect it does not declare in its `uses [...]` clause.",
    ),
    rule(
        RuleId::EffectMinimality,
        "EffectMinimalityWarning",
        RuleCategory::EffectSystem,
        Severity::Warning,
        false,
        "A function declares an effect that nothing in its body requires.",
    ),
    rule(
        RuleId::UnusedResult,
        "UnusedResultError",
        RuleCategory::ResultType,
        Severity::Error,
        true,
        "A Result-typed call is neither propagated with `?` nor handled on both its Ok and Err variants.",
    ),
    rule(
        RuleId::ErrorPropagationMisuse,
        "ErrorPropagationMisuseError",
        RuleCategory::ResultType,
        Severity::Error,
        true,
        "The `?` operator is used outside a Result-returning function, on a non-Result value, or with an \
         error type that does not convert to the function's error type.",
    ),
];

/// Resolve a rule spelling to its id.
pub fn from_str(name: &str) -> Option<RuleId> {
    RULES.iter().find(|r| r.item.matches(name)).map(|r| r.item.id)
}

/// Return the canonical spelling (the `ruleId`) for a rule.
pub fn as_str(id: RuleId) -> &'static str {
    info_for(id).item.canonical
}

/// Return the registry entry for a rule.
pub fn info_for(id: RuleId) -> &'static RuleInfo {
    RULES
        .iter()
        .find(|r| r.item.id == id)
        .expect("INVARIANT: every RuleId has a registry entry")
}

impl RuleId {
    pub fn category(self) -> RuleCategory {
        info_for(self).category
    }

    pub fn default_severity(self) -> Severity {
        info_for(self).default_severity
    }

    pub fn is_fatal(self) -> bool {
        info_for(self).fatal
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(as_str(*self))
    }
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Accepts `error`, `warning`/`warn` and `info` in any ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity '{other}' (expected error, warning or info)")),
        }
    }
}

impl RuleCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleCategory::EffectSystem => "effect-system",
            RuleCategory::ResultType => "result-type",
            RuleCategory::ModuleSystem => "module-system",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn rule(
    id: RuleId,
    canonical: &'static str,
    category: RuleCategory,
    default_severity: Severity,
    fatal: bool,
    description: &'static str,
) -> RuleInfo {
    RuleInfo {
        item: stable(id, canonical, description),
        category,
        default_severity,
        fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("Error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_only_minimality_is_advisory() {
        let advisory: Vec<RuleId> = RULES.iter().filter(|r| !r.fatal).map(|r| r.item.id).collect();
        assert_eq!(advisory, vec![RuleId::EffectMinimality]);
    }
}
