//! Analysis configuration.
//!
//! The engine consumes an already-parsed [`AnalysisConfig`]; loading it from disk is the caller's business (the CLI
//! reads JSON). [`AnalysisConfig::resolve`] validates rule ids, exclude globs and rule parameters once, producing the
//! [`ResolvedConfig`] the engine actually consults.
//!
//! ```json
//! {
//!   "rules": {
//!     "EffectMinimalityWarning": { "level": "info", "params": { "ignore": ["Logging"] } },
//!     "UnusedResultError": { "enabled": false }
//!   },
//!   "exclude": ["generated/**"],
//!   "severityThreshold": "warning",
//!   "fragments": { "app": ["app/core.cdz", "app/extra.cdz"] }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use cadenza_core::effects::EffectSet;
use cadenza_core::lang::rules::{self, RuleId, Severity};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EngineError, EngineResult};
use crate::frontend::registry::EffectRegistry;

/// Raw configuration as handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Per-rule settings keyed by rule id (`UnusedResultError`, ...).
    pub rules: BTreeMap<String, RuleConfig>,
    /// Glob patterns for files that are analyzed for structure only and report nothing.
    pub exclude: Vec<String>,
    /// Diagnostics at or above this severity make the run fail.
    #[serde(serialize_with = "severity_out", deserialize_with = "severity_in")]
    pub severity_threshold: Severity,
    /// Files declared as fragments of one module; exempt from duplicate-module checks.
    pub fragments: BTreeMap<String, Vec<PathBuf>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rules: BTreeMap::new(),
            exclude: Vec::new(),
            severity_threshold: Severity::Error,
            fragments: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "level_out",
        deserialize_with = "level_in"
    )]
    pub level: Option<Severity>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            level: None,
            enabled: true,
            params: serde_json::Map::new(),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

fn severity_in<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Severity, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn severity_out<S: Serializer>(severity: &Severity, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(severity)
}

fn level_in<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Severity>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| s.parse().map_err(serde::de::Error::custom)).transpose()
}

fn level_out<S: Serializer>(level: &Option<Severity>, serializer: S) -> Result<S::Ok, S::Error> {
    match level {
        Some(severity) => serializer.collect_str(severity),
        None => serializer.serialize_none(),
    }
}

impl AnalysisConfig {
    /// Validate and compile the configuration.
    pub fn resolve(&self, registry: &EffectRegistry) -> EngineResult<ResolvedConfig> {
        let mut resolved_rules = HashMap::new();
        let mut minimality_ignore = EffectSet::empty();

        for (name, rule_config) in &self.rules {
            let id = rules::from_str(name).ok_or_else(|| EngineError::UnknownRule(name.clone()))?;
            if id == RuleId::EffectMinimality {
                minimality_ignore = parse_ignore_list(name, rule_config, registry)?;
            }
            resolved_rules.insert(id, rule_config.clone());
        }

        let exclude = self
            .exclude
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|source| EngineError::InvalidExclude {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(ResolvedConfig {
            rules: resolved_rules,
            exclude,
            threshold: self.severity_threshold,
            fragments: self.fragments.clone(),
            minimality_ignore,
        })
    }
}

fn parse_ignore_list(rule: &str, config: &RuleConfig, registry: &EffectRegistry) -> EngineResult<EffectSet> {
    let invalid = |reason: String| EngineError::InvalidRuleParam {
        rule: rule.to_string(),
        param: "ignore".to_string(),
        reason,
    };

    let Some(value) = config.params.get("ignore") else {
        return Ok(EffectSet::empty());
    };
    let Some(items) = value.as_array() else {
        return Err(invalid("expected a list of effect names".to_string()));
    };

    let mut set = EffectSet::empty();
    for item in items {
        let name = item
            .as_str()
            .ok_or_else(|| invalid(format!("expected an effect name, found {item}")))?;
        let effect = registry
            .effect(name)
            .ok_or_else(|| invalid(format!("unknown effect `{name}`")))?;
        set.insert(effect);
    }
    Ok(set)
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    rules: HashMap<RuleId, RuleConfig>,
    exclude: Vec<glob::Pattern>,
    threshold: Severity,
    fragments: BTreeMap<String, Vec<PathBuf>>,
    minimality_ignore: EffectSet,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            rules: HashMap::new(),
            exclude: Vec::new(),
            threshold: Severity::Error,
            fragments: BTreeMap::new(),
            minimality_ignore: EffectSet::empty(),
        }
    }
}

impl ResolvedConfig {
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|p| p.matches_path(path))
    }

    pub fn is_enabled(&self, rule: RuleId) -> bool {
        self.rules.get(&rule).is_none_or(|r| r.enabled)
    }

    pub fn severity_for(&self, rule: RuleId) -> Severity {
        self.rules
            .get(&rule)
            .and_then(|r| r.level)
            .unwrap_or_else(|| rule.default_severity())
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// `true` when both files are listed as fragments of `module`.
    pub fn are_fragments(&self, module: &str, a: &Path, b: &Path) -> bool {
        self.fragments
            .get(module)
            .is_some_and(|files| files.iter().any(|f| f == a) && files.iter().any(|f| f == b))
    }

    /// Effects the minimality rule should not report.
    pub fn minimality_ignore(&self) -> EffectSet {
        self.minimality_ignore
    }

    pub fn fragments(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        &self.fragments
    }
}
