//! Analysis engine: batch and incremental entry points.
//!
//! The engine owns every piece of derived state (module graph, symbol table, bindings, effect summaries and
//! per-file diagnostics) so an editor host can keep one instance per workspace and feed it single-file edits.
//!
//! ## Pipeline
//!
//! 1. [`ModuleGraph::build`] over all units (parallel per-file import resolution).
//! 2. Declaration collection into the [`SymbolTable`].
//! 3. Binding, a single-threaded barrier. Files halted by the module graph are not bound.
//! 4. [`CallGraph`] construction, then the effect and discharge verifiers side by side (`rayon::join`).
//! 5. Publishing: per file, diagnostics are merged, ordered by location, filtered through the configuration and
//!    given their source snippet.
//!
//! [`Engine::analyze_changed`] runs the same pipeline but only rebinds the files an edit can affect, recomputes only
//! SCCs that reach a rebound function, and republishes only files whose output may have changed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use cadenza_core::lang::rules::Severity;
use serde::Serialize;

use crate::config::{AnalysisConfig, ResolvedConfig};
use crate::error::EngineResult;
use crate::frontend::ast::SourceUnit;
use crate::frontend::binder::{Binder, BoundFile, BoundFunction};
use crate::frontend::checker::call_graph::CallGraph;
use crate::frontend::checker::discharge::{DischargeVerifier, FileDischarge, ResultExpression};
use crate::frontend::checker::effects::{EffectSummary, EffectVerifier};
use crate::frontend::diagnostics::Diagnostic;
use crate::frontend::module_graph::ModuleGraph;
use crate::frontend::registry::EffectRegistry;
use crate::frontend::symbols::{FunctionId, SymbolTable};

/// Counters reported alongside every diagnostic set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    /// Functions whose bodies were bound and verified.
    pub functions_analyzed: usize,
    pub pure_functions: usize,
}

/// Output of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: Metrics,
    /// Compilation order of the files that were not halted.
    #[serde(skip)]
    pub order: Vec<PathBuf>,
    #[serde(skip)]
    threshold: Severity,
}

impl AnalysisReport {
    /// `true` when any diagnostic is at or above the configured severity threshold.
    pub fn exceeds_threshold(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= self.threshold)
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn diagnostics_for<'a>(&'a self, file: &'a Path) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.location.file == file)
    }
}

/// Output of an incremental run: the complete new diagnostic list of every file that was recomputed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticDelta {
    pub files: BTreeMap<PathBuf, Vec<Diagnostic>>,
    pub metrics: Metrics,
}

pub struct Engine {
    registry: EffectRegistry,
    config: ResolvedConfig,
    units: BTreeMap<PathBuf, SourceUnit>,
    graph: ModuleGraph,
    symbols: SymbolTable,
    bindings: BTreeMap<PathBuf, BoundFile>,
    calls: CallGraph,
    summaries: HashMap<FunctionId, EffectSummary>,
    effect_diagnostics: HashMap<FunctionId, Vec<Diagnostic>>,
    discharge: BTreeMap<PathBuf, FileDischarge>,
    published: BTreeMap<PathBuf, Vec<Diagnostic>>,
}

impl Engine {
    /// Create an engine over the standard effect registry.
    pub fn new(config: AnalysisConfig) -> EngineResult<Self> {
        Self::with_registry(config, EffectRegistry::standard())
    }

    pub fn with_registry(config: AnalysisConfig, registry: EffectRegistry) -> EngineResult<Self> {
        let config = config.resolve(&registry)?;
        Ok(Self {
            registry,
            config,
            units: BTreeMap::new(),
            graph: ModuleGraph::default(),
            symbols: SymbolTable::new(),
            bindings: BTreeMap::new(),
            calls: CallGraph::default(),
            summaries: HashMap::new(),
            effect_diagnostics: HashMap::new(),
            discharge: BTreeMap::new(),
            published: BTreeMap::new(),
        })
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    /// Analyze a whole program from scratch. Later units with the same path replace earlier ones.
    #[tracing::instrument(skip_all)]
    pub fn analyze(&mut self, units: impl IntoIterator<Item = SourceUnit>) -> AnalysisReport {
        self.units = units.into_iter().map(|u| (u.path.clone(), u)).collect();
        self.symbols.clear();
        self.bindings.clear();
        self.summaries.clear();
        self.effect_diagnostics.clear();
        self.discharge.clear();
        self.published.clear();

        self.graph = ModuleGraph::build(&self.units, &self.config);
        for (path, unit) in &self.units {
            let module = self.graph.module_of(path).unwrap_or_default();
            self.symbols.collect_file(unit, module, &self.registry);
        }

        let all: BTreeSet<PathBuf> = self.units.keys().cloned().collect();
        self.rebind(&all);
        self.calls = self.build_call_graph();
        let functions: HashSet<FunctionId> = self.symbols.functions().map(|s| s.id).collect();
        self.verify(&functions, &all);
        for path in &all {
            self.publish(path);
        }

        let report = AnalysisReport {
            diagnostics: self.published.values().flatten().cloned().collect(),
            metrics: self.metrics(),
            order: self.graph.compilation_order().to_vec(),
            threshold: self.config.threshold(),
        };
        tracing::info!(
            files = self.units.len(),
            functions = report.metrics.functions_analyzed,
            issues = report.metrics.total_issues,
            "analysis complete"
        );
        report
    }

    /// Re-analyze after `path` changed (or appeared), returning the new diagnostics of every affected file.
    #[tracing::instrument(skip_all, fields(file = %path.as_ref().display()))]
    pub fn analyze_changed(&mut self, path: impl AsRef<Path>, unit: SourceUnit) -> DiagnosticDelta {
        let path = path.as_ref().to_path_buf();
        let mut unit = unit;
        unit.path = path.clone();

        let old_module = self.graph.module_of(&path).map(str::to_string);
        let old_conversions = self.symbols.conversions_of(&path);
        let old_ids: Vec<FunctionId> = self.symbols.functions_in_file(&path).to_vec();

        self.units.insert(path.clone(), unit);
        let old_graph = std::mem::take(&mut self.graph);
        self.graph = ModuleGraph::build(&self.units, &self.config);

        let new_module = self.graph.module_of(&path).unwrap_or_default().to_string();
        if let Some(unit) = self.units.get(&path) {
            self.symbols.collect_file(unit, &new_module, &self.registry);
        }
        let new_ids: HashSet<FunctionId> = self.symbols.functions_in_file(&path).iter().copied().collect();
        for id in old_ids.iter().filter(|id| !new_ids.contains(id)) {
            self.summaries.remove(id);
            self.effect_diagnostics.remove(id);
        }

        let mut rebind: BTreeSet<PathBuf> = BTreeSet::from([path.clone()]);
        let mut modules = vec![new_module];
        modules.extend(old_module);
        for module in &modules {
            rebind.extend(old_graph.files_of(module).iter().cloned());
            rebind.extend(self.graph.files_of(module).iter().cloned());
            rebind.extend(old_graph.importers_of(module));
            rebind.extend(self.graph.importers_of(module));
        }
        for file in self.units.keys() {
            if old_graph.resolution(file) != self.graph.resolution(file)
                || old_graph.is_halted(file) != self.graph.is_halted(file)
            {
                rebind.insert(file.clone());
            }
        }
        self.rebind(&rebind);

        let seeds: Vec<FunctionId> = rebind
            .iter()
            .flat_map(|f| self.symbols.functions_in_file(f).iter().copied())
            .collect();
        self.calls = self.build_call_graph();
        let affected = self.calls.callers_closure(seeds);

        let discharge_files: BTreeSet<PathBuf> = if self.symbols.conversions_of(&path) != old_conversions {
            self.units.keys().cloned().collect()
        } else {
            rebind.clone()
        };
        self.verify(&affected, &discharge_files);

        let mut republish = rebind;
        republish.extend(discharge_files);
        republish.extend(
            affected
                .iter()
                .filter_map(|id| self.symbols.get(*id))
                .map(|s| s.file.clone()),
        );
        for file in self.units.keys() {
            if old_graph.diagnostics_for(file) != self.graph.diagnostics_for(file) {
                republish.insert(file.clone());
            }
        }

        let mut delta = DiagnosticDelta::default();
        for file in &republish {
            self.publish(file);
            if let Some(diagnostics) = self.published.get(file) {
                delta.files.insert(file.clone(), diagnostics.clone());
            }
        }
        delta.metrics = self.metrics();
        tracing::debug!(
            files = delta.files.len(),
            affected_functions = affected.len(),
            "incremental analysis complete"
        );
        delta
    }

    // ------------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------------

    /// Bind `files` against the current graph and symbol table. Halted or unknown files lose their bindings.
    fn rebind(&mut self, files: &BTreeSet<PathBuf>) {
        let binder = Binder::new(&self.symbols, &self.graph, &self.registry);
        for file in files {
            match self.units.get(file) {
                Some(unit) if !self.graph.is_halted(file) => {
                    self.bindings.insert(file.clone(), binder.bind_file(unit));
                }
                _ => {
                    self.bindings.remove(file);
                    self.discharge.remove(file);
                }
            }
        }
    }

    fn build_call_graph(&self) -> CallGraph {
        CallGraph::build(&self.symbols, self.bindings.values().flat_map(|b| &b.functions))
    }

    /// Recompute effect summaries for the SCCs containing `affected`, check those functions, and rerun discharge
    /// for `discharge_files`. Expects `self.calls` to be current.
    fn verify(&mut self, affected: &HashSet<FunctionId>, discharge_files: &BTreeSet<PathBuf>) {
        for id in affected {
            self.summaries.remove(id);
            self.effect_diagnostics.remove(id);
        }

        let bodies: HashMap<FunctionId, &BoundFunction> = self
            .bindings
            .values()
            .flat_map(|b| &b.functions)
            .map(|f| (f.id, f))
            .collect();
        let sccs: Vec<&[FunctionId]> = self
            .calls
            .sccs_containing(affected)
            .into_iter()
            .filter_map(|i| self.calls.sccs().get(i))
            .map(Vec::as_slice)
            .collect();

        let (inferred, discharged) = {
            let verifier = EffectVerifier::new(&self.symbols, &bodies, &self.registry);
            let discharge = DischargeVerifier::new(&self.symbols);
            let cached = &self.summaries;
            let (units, bindings, config) = (&self.units, &self.bindings, &self.config);
            rayon::join(
                || verifier.infer(&sccs, cached),
                || {
                    discharge_files
                        .iter()
                        .filter(|f| !config.is_excluded(f))
                        .filter_map(|f| Some((f.clone(), discharge.check_file(units.get(f)?, bindings.get(f)?))))
                        .collect::<Vec<_>>()
                },
            )
        };
        tracing::debug!(
            sccs = sccs.len(),
            functions = inferred.len(),
            files = discharged.len(),
            "verifiers finished"
        );

        self.summaries.extend(inferred);
        for (file, result) in discharged {
            self.discharge.insert(file, result);
        }

        let verifier = EffectVerifier::new(&self.symbols, &bodies, &self.registry);
        let ignore = self.config.minimality_ignore();
        for id in affected {
            let Some(signature) = self.symbols.get(*id) else {
                continue;
            };
            if self.config.is_excluded(&signature.file) {
                continue;
            }
            let diagnostics = verifier.check(*id, &self.summaries, ignore);
            if !diagnostics.is_empty() {
                self.effect_diagnostics.insert(*id, diagnostics);
            }
        }
    }

    /// Assemble, order and filter the diagnostics of one file.
    fn publish(&mut self, file: &Path) {
        let Some(unit) = self.units.get(file) else {
            self.published.remove(file);
            return;
        };
        if self.config.is_excluded(file) {
            self.published.insert(file.to_path_buf(), Vec::new());
            return;
        }

        let mut diagnostics: Vec<Diagnostic> = self.graph.diagnostics_for(file).to_vec();
        if let Some(bound) = self.bindings.get(file) {
            diagnostics.extend(bound.diagnostics.iter().cloned());
        }
        for id in self.symbols.functions_in_file(file) {
            if let Some(found) = self.effect_diagnostics.get(id) {
                diagnostics.extend(found.iter().cloned());
            }
        }
        if let Some(discharge) = self.discharge.get(file) {
            diagnostics.extend(discharge.diagnostics.iter().cloned());
        }

        diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        diagnostics.dedup();
        let config = &self.config;
        let diagnostics: Vec<Diagnostic> = diagnostics
            .into_iter()
            .filter(|d| config.is_enabled(d.rule))
            .map(|d| {
                let severity = config.severity_for(d.rule);
                d.with_severity(severity).with_snippet_from(unit)
            })
            .collect();
        self.published.insert(file.to_path_buf(), diagnostics);
    }

    fn metrics(&self) -> Metrics {
        let mut metrics = Metrics::default();
        for diagnostic in self.published.values().flatten() {
            metrics.total_issues += 1;
            match diagnostic.severity {
                Severity::Error => metrics.errors += 1,
                Severity::Warning => metrics.warnings += 1,
                Severity::Info => metrics.infos += 1,
            }
        }
        for (file, bound) in &self.bindings {
            if self.config.is_excluded(file) {
                continue;
            }
            for function in &bound.functions {
                metrics.functions_analyzed += 1;
                if self.symbols.get(function.id).is_some_and(|s| s.is_pure) {
                    metrics.pure_functions += 1;
                }
            }
        }
        metrics
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.calls
    }

    pub fn compilation_order(&self) -> &[PathBuf] {
        self.graph.compilation_order()
    }

    /// Every published diagnostic, file by file.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.published.values().flatten()
    }

    pub fn diagnostics_for(&self, file: &Path) -> &[Diagnostic] {
        self.published.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Result-typed calls in `file` and how each was discharged.
    pub fn discharge_states(&self, file: &Path) -> &[ResultExpression] {
        self.discharge
            .get(file)
            .map(|d| d.expressions.as_slice())
            .unwrap_or(&[])
    }

    pub fn effect_summary(&self, file: &Path, function: &str) -> Option<&EffectSummary> {
        let id = self.symbols.find(file, function)?;
        self.summaries.get(&id)
    }

    pub fn current_metrics(&self) -> Metrics {
        self.metrics()
    }
}

/// One-shot batch analysis.
pub fn analyze(units: impl IntoIterator<Item = SourceUnit>, config: AnalysisConfig) -> EngineResult<AnalysisReport> {
    let mut engine = Engine::new(config)?;
    Ok(engine.analyze(units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::lang::rules::RuleId;
    use cadenza_syntax::builder::*;

    fn config(json: &str) -> AnalysisConfig {
        serde_json::from_str(json).unwrap()
    }

    fn program() -> Vec<SourceUnit> {
        vec![
            unit("lib.cdz")
                .module("lib")
                .export(&["load"])
                .function(function("load").uses(&["Database", "Logging"]).body(vec![expr(op("db.query", vec![]))]))
                .build(),
            unit("main.cdz")
                .import("lib")
                .function(function("main").uses(&[]).body(vec![expr(qcall("lib", "load", vec![]))]))
                .build(),
        ]
    }

    #[test]
    fn test_metrics_count_severities() {
        let report = analyze(program(), AnalysisConfig::default()).unwrap();
        assert_eq!(report.metrics.errors, 1);
        assert_eq!(report.metrics.warnings, 1);
        assert_eq!(report.metrics.total_issues, 2);
        assert_eq!(report.metrics.functions_analyzed, 2);
        assert!(report.exceeds_threshold());
        assert_eq!(report.order, vec![PathBuf::from("lib.cdz"), PathBuf::from("main.cdz")]);
    }

    #[test]
    fn test_disabled_rule_and_level_override() {
        let config = config(
            r#"{
                "rules": {
                    "EffectMinimalityWarning": { "enabled": false },
                    "EffectCompletenessError": { "level": "warning" }
                },
                "severityThreshold": "error"
            }"#,
        );
        let report = analyze(program(), config).unwrap();
        let rules: Vec<RuleId> = report.diagnostics.iter().map(|d| d.rule).collect();
        assert_eq!(rules, vec![RuleId::EffectCompleteness]);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
        assert!(!report.exceeds_threshold());
    }

    #[test]
    fn test_excluded_file_reports_nothing_but_still_links() {
        let report = analyze(program(), config(r#"{ "exclude": ["lib.cdz"] }"#)).unwrap();
        assert_eq!(report.diagnostics_for(Path::new("lib.cdz")).count(), 0);
        assert_eq!(report.diagnostics_for(Path::new("main.cdz")).count(), 1);
        assert_eq!(report.metrics.functions_analyzed, 1);
    }

    #[test]
    fn test_unknown_rule_in_config_is_rejected() {
        assert!(Engine::new(config(r#"{ "rules": { "NoSuchRule": {} } }"#)).is_err());
    }
}
