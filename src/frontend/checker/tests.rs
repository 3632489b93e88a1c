//! Verifier unit tests.
//!
//! Programs are built with the AST builder and pushed through the real phases (module graph, symbols, binder) so
//! the verifiers see exactly what the engine would hand them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use cadenza_core::effects::EffectSet;
use cadenza_core::lang::effects::EffectId;
use cadenza_core::lang::rules::RuleId;
use cadenza_syntax::builder::*;

use super::call_graph::CallGraph;
use super::discharge::{DischargeState, DischargeVerifier, FileDischarge};
use super::effects::{EffectSummary, EffectVerifier};
use crate::config::ResolvedConfig;
use crate::frontend::ast::SourceUnit;
use crate::frontend::binder::{Binder, BoundFile, BoundFunction};
use crate::frontend::diagnostics::Diagnostic;
use crate::frontend::module_graph::ModuleGraph;
use crate::frontend::registry::EffectRegistry;
use crate::frontend::symbols::{FunctionId, SymbolTable};

struct Program {
    units: BTreeMap<PathBuf, SourceUnit>,
    symbols: SymbolTable,
    registry: EffectRegistry,
    bound: BTreeMap<PathBuf, BoundFile>,
}

fn program(list: Vec<SourceUnit>) -> Program {
    let units: BTreeMap<PathBuf, SourceUnit> = list.into_iter().map(|u| (u.path.clone(), u)).collect();
    let graph = ModuleGraph::build(&units, &ResolvedConfig::default());
    let registry = EffectRegistry::standard();
    let mut symbols = SymbolTable::new();
    for (path, unit) in &units {
        symbols.collect_file(unit, graph.module_of(path).unwrap_or_default(), &registry);
    }
    let bound = {
        let binder = Binder::new(&symbols, &graph, &registry);
        units.iter().map(|(p, u)| (p.clone(), binder.bind_file(u))).collect()
    };
    Program {
        units,
        symbols,
        registry,
        bound,
    }
}

impl Program {
    fn id(&self, file: &str, name: &str) -> FunctionId {
        self.symbols.find(Path::new(file), name).unwrap()
    }

    fn bodies(&self) -> HashMap<FunctionId, &BoundFunction> {
        self.bound
            .values()
            .flat_map(|b| &b.functions)
            .map(|f| (f.id, f))
            .collect()
    }

    fn summaries(&self) -> HashMap<FunctionId, EffectSummary> {
        let bodies = self.bodies();
        let graph = CallGraph::build(&self.symbols, bodies.values().copied());
        let sccs: Vec<&[FunctionId]> = graph.sccs().iter().map(Vec::as_slice).collect();
        EffectVerifier::new(&self.symbols, &bodies, &self.registry).infer(&sccs, &HashMap::new())
    }

    fn effect_diagnostics_with(&self, ignore: EffectSet) -> Vec<Diagnostic> {
        let bodies = self.bodies();
        let summaries = self.summaries();
        let verifier = EffectVerifier::new(&self.symbols, &bodies, &self.registry);
        self.symbols
            .functions()
            .flat_map(|s| verifier.check(s.id, &summaries, ignore))
            .collect()
    }

    fn effect_diagnostics(&self) -> Vec<Diagnostic> {
        self.effect_diagnostics_with(EffectSet::empty())
    }

    fn discharge(&self, file: &str) -> FileDischarge {
        let path = Path::new(file);
        DischargeVerifier::new(&self.symbols).check_file(&self.units[path], &self.bound[path])
    }
}

fn rules(diagnostics: &[Diagnostic]) -> Vec<RuleId> {
    diagnostics.iter().map(|d| d.rule).collect()
}

fn set(effects: &[EffectId]) -> EffectSet {
    effects.iter().copied().collect()
}

fn int_or_string() -> cadenza_syntax::ast::Type {
    result(ty("int"), ty("string"))
}

fn divide() -> FnBuilder {
    function("divide")
        .param("a", ty("int"))
        .param("b", ty("int"))
        .uses(&[])
        .returns(int_or_string())
        .body(vec![ret(ok(var("a")))])
}

// ========================================
// Effect inference
// ========================================

#[test]
fn test_exact_declaration_is_silent() {
    let p = program(vec![
        unit("a.cdz")
            .function(function("load").uses(&["Database"]).body(vec![expr(op("db.query", vec![]))]))
            .build(),
    ]);
    assert!(p.effect_diagnostics().is_empty());
    assert_eq!(p.summaries()[&p.id("a.cdz", "load")].required, set(&[EffectId::Database]));
}

#[test]
fn test_missing_effect_reported_at_introducing_call() {
    let unit = unit("a.cdz")
        .function(function("fetch").uses(&["Network"]).body(vec![expr(op("http.get", vec![]))]))
        .function(function("main").uses(&[]).body(vec![expr(call("fetch", vec![]))]))
        .build();
    let call_span = find_call(&unit, "fetch").unwrap();
    let p = program(vec![unit]);

    let diagnostics = p.effect_diagnostics();
    assert_eq!(rules(&diagnostics), vec![RuleId::EffectCompleteness]);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.location.line, call_span.line);
    assert_eq!(diagnostic.location.column, call_span.column);
    assert!(diagnostic.message.contains("Network"));
    assert_eq!(diagnostic.notes, vec!["required through main -> fetch -> http.get".to_string()]);
    assert_eq!(diagnostic.fix.as_deref(), Some("declare `uses [Network]`"));
}

#[test]
fn test_one_completeness_error_per_missing_effect() {
    let p = program(vec![
        unit("a.cdz")
            .function(
                function("sync")
                    .uses(&[])
                    .body(vec![expr(op("db.query", vec![])), expr(op("http.post", vec![])), expr(op("db.execute", vec![]))]),
            )
            .build(),
    ]);
    let diagnostics = p.effect_diagnostics();
    assert_eq!(rules(&diagnostics), vec![RuleId::EffectCompleteness, RuleId::EffectCompleteness]);
    assert!(diagnostics[0].message.contains("Database"));
    assert!(diagnostics[1].message.contains("Network"));
}

#[test]
fn test_unused_declared_effect_is_a_warning() {
    let p = program(vec![
        unit("a.cdz")
            .function(
                function("load")
                    .uses(&["Database", "Logging"])
                    .body(vec![expr(op("db.query", vec![]))]),
            )
            .build(),
    ]);
    let diagnostics = p.effect_diagnostics();
    assert_eq!(rules(&diagnostics), vec![RuleId::EffectMinimality]);
    assert!(diagnostics[0].message.contains("Logging"));
    assert!(!diagnostics[0].is_fatal());
}

#[test]
fn test_minimality_ignore_list() {
    let p = program(vec![
        unit("a.cdz")
            .function(function("load").uses(&["Database", "Logging"]).body(vec![expr(op("db.query", vec![]))]))
            .build(),
    ]);
    assert!(p.effect_diagnostics_with(set(&[EffectId::Logging])).is_empty());
}

#[test]
fn test_incomplete_and_overdeclared_reports_both() {
    let p = program(vec![
        unit("a.cdz")
            .function(function("load").uses(&["Logging"]).body(vec![expr(op("db.query", vec![]))]))
            .build(),
    ]);
    let mut found = rules(&p.effect_diagnostics());
    found.sort_by_key(|r| r.to_string());
    assert_eq!(found, vec![RuleId::EffectCompleteness, RuleId::EffectMinimality]);
}

#[test]
fn test_mutual_recursion_reaches_fixed_point() {
    let a = function("a")
        .uses(&["Database"])
        .body(vec![expr(op("db.query", vec![])), expr(op("http.get", vec![])), expr(call("b", vec![]))]);
    let b = function("b").uses(&[]).body(vec![expr(op("http.get", vec![])), expr(call("a", vec![]))]);
    let expected = set(&[EffectId::Database, EffectId::Network]);

    for (first, second) in [(a.clone(), b.clone()), (b, a)] {
        let p = program(vec![unit("m.cdz").function(first).function(second).build()]);
        let summaries = p.summaries();
        assert_eq!(summaries[&p.id("m.cdz", "a")].required, expected);
        assert_eq!(summaries[&p.id("m.cdz", "b")].required, expected);
    }
}

#[test]
fn test_mutual_recursion_checks_each_member() {
    let p = program(vec![
        unit("m.cdz")
            .function(
                function("even")
                    .uses(&["Logging"])
                    .body(vec![expr(op("log.info", vec![])), expr(call("odd", vec![]))]),
            )
            .function(function("odd").uses(&["Logging"]).body(vec![expr(call("even", vec![]))]))
            .build(),
    ]);
    assert!(p.effect_diagnostics().is_empty());
}

#[test]
fn test_chain_through_recursion_terminates() {
    let p = program(vec![
        unit("m.cdz")
            .function(function("ping").uses(&[]).body(vec![expr(call("pong", vec![]))]))
            .function(
                function("pong")
                    .uses(&[])
                    .body(vec![expr(call("ping", vec![])), expr(op("print", vec![]))]),
            )
            .build(),
    ]);
    let diagnostics = p.effect_diagnostics();
    assert_eq!(rules(&diagnostics), vec![RuleId::EffectCompleteness, RuleId::EffectCompleteness]);
    assert_eq!(diagnostics[0].notes, vec!["required through ping -> pong -> print".to_string()]);
}

#[test]
fn test_pure_function_single_violation() {
    let unit = unit("a.cdz")
        .function(
            function("square")
                .pure()
                .body(vec![expr(op("print", vec![])), expr(op("db.query", vec![])), ret(int(1))]),
        )
        .build();
    let print = find_call(&unit, "print").unwrap();
    let p = program(vec![unit]);

    let diagnostics = p.effect_diagnostics();
    assert_eq!(rules(&diagnostics), vec![RuleId::PureFunctionViolation]);
    assert_eq!(diagnostics[0].location.column, print.column);
    assert!(diagnostics[0].message.contains("print"));
    assert!(p.summaries()[&p.id("a.cdz", "square")].required.len() == 2);
}

#[test]
fn test_pure_function_calling_pure_function() {
    let p = program(vec![
        unit("a.cdz")
            .function(function("double").pure().body(vec![ret(int(2))]))
            .function(function("quad").pure().body(vec![ret(call("double", vec![]))]))
            .build(),
    ]);
    assert!(p.effect_diagnostics().is_empty());
}

#[test]
fn test_pure_function_with_uses_clause() {
    let p = program(vec![
        unit("a.cdz").function(function("noop").pure().uses(&["IO"])).build(),
    ]);
    assert_eq!(rules(&p.effect_diagnostics()), vec![RuleId::PureFunctionViolation]);
}

#[test]
fn test_poisoned_callee_suppresses_minimality() {
    let p = program(vec![
        unit("a.cdz")
            .function(
                function("odd")
                    .uses(&["Database", "Telepathy"])
                    .body(vec![expr(op("db.query", vec![]))]),
            )
            .function(
                function("main")
                    .uses(&["Database", "Logging"])
                    .body(vec![expr(call("odd", vec![]))]),
            )
            .build(),
    ]);
    let main = p.summaries()[&p.id("a.cdz", "main")].clone();
    assert!(!main.complete);
    assert_eq!(main.required, set(&[EffectId::Database]));
    // `odd` is poisoned by its unknown token and `main` only has a lower bound, so neither is judged.
    assert!(p.effect_diagnostics().is_empty());
}

// ========================================
// Result discharge
// ========================================

#[test]
fn test_returned_result_is_undischarged() {
    let unit = unit("f.cdz")
        .function(divide())
        .function(
            function("f")
                .param("x", ty("int"))
                .uses(&[])
                .returns(int_or_string())
                .body(vec![ret(call("divide", vec![var("x"), int(2)]).of_type(int_or_string()))]),
        )
        .build();
    let span = find_call(&unit, "divide").unwrap();
    let p = program(vec![unit]);

    let discharge = p.discharge("f.cdz");
    assert_eq!(rules(&discharge.diagnostics), vec![RuleId::UnusedResult]);
    assert_eq!(discharge.diagnostics[0].location.line, span.line);
    assert_eq!(discharge.diagnostics[0].location.column, span.column);
    assert_eq!(discharge.diagnostics[0].message, "Result of `divide` is not handled");
    assert_eq!(discharge.expressions[0].state, DischargeState::Undischarged);
}

#[test]
fn test_propagation_discharges() {
    let p = program(vec![
        unit("f.cdz")
            .function(divide())
            .function(function("f").uses(&[]).returns(int_or_string()).body(vec![
                let_("y", try_(call("divide", vec![int(1), int(2)]).of_type(int_or_string()))),
                ret(ok(var("y"))),
            ]))
            .build(),
    ]);
    let discharge = p.discharge("f.cdz");
    assert!(discharge.diagnostics.is_empty(), "{:?}", discharge.diagnostics);
    assert_eq!(discharge.expressions.len(), 1);
    assert_eq!(discharge.expressions[0].state, DischargeState::DischargedByPropagation);
}

#[test]
fn test_propagation_outside_result_function() {
    let p = program(vec![
        unit("f.cdz")
            .function(divide())
            .function(
                function("main")
                    .uses(&[])
                    .body(vec![expr(try_(call("divide", vec![int(1), int(0)]).of_type(int_or_string())))]),
            )
            .build(),
    ]);
    let discharge = p.discharge("f.cdz");
    assert_eq!(rules(&discharge.diagnostics), vec![RuleId::ErrorPropagationMisuse]);
    assert!(discharge.diagnostics[0].message.contains("returns `()`"));
}

#[test]
fn test_propagation_on_plain_value() {
    let p = program(vec![
        unit("f.cdz")
            .function(function("f").uses(&[]).returns(int_or_string()).body(vec![ret(ok(try_(int(42))))]))
            .build(),
    ]);
    let discharge = p.discharge("f.cdz");
    assert_eq!(rules(&discharge.diagnostics), vec![RuleId::ErrorPropagationMisuse]);
    assert!(discharge.diagnostics[0].message.contains("`int`"));
}

#[test]
fn test_error_type_conversion() {
    let db_result = || result(ty("Row"), ty("DbError"));
    let app = |unit: UnitBuilder| {
        unit.function(function("load").uses(&[]).returns(db_result()).body(vec![ret(ok(var("row")))]))
            .function(
                function("handler")
                    .uses(&[])
                    .returns(result(ty("Row"), ty("AppError")))
                    .body(vec![ret(ok(try_(call("load", vec![]).of_type(db_result()))))]),
            )
    };

    let without = program(vec![app(unit("app.cdz")).build()]);
    let discharge = without.discharge("app.cdz");
    assert_eq!(rules(&discharge.diagnostics), vec![RuleId::ErrorPropagationMisuse]);
    assert!(discharge.diagnostics[0].message.contains("`DbError` into `AppError`"));

    let with = program(vec![app(unit("app.cdz").type_from("AppError", &["DbError"])).build()]);
    assert!(with.discharge("app.cdz").diagnostics.is_empty());
}

#[test]
fn test_exhaustive_match_discharges() {
    let p = program(vec![
        unit("f.cdz")
            .function(divide())
            .function(function("main").uses(&[]).body(vec![expr(match_(
                call("divide", vec![int(4), int(2)]).of_type(int_or_string()),
                vec![arm_expr(p_ok("v"), var("v")), arm_expr(p_err("e"), var("e"))],
            ))]))
            .build(),
    ]);
    let discharge = p.discharge("f.cdz");
    assert!(discharge.diagnostics.is_empty());
    assert_eq!(discharge.expressions[0].state, DischargeState::DischargedByMatch);
}

#[test]
fn test_match_missing_error_arm() {
    let p = program(vec![
        unit("f.cdz")
            .function(divide())
            .function(function("main").uses(&[]).body(vec![expr(match_(
                call("divide", vec![int(4), int(2)]).of_type(int_or_string()),
                vec![arm(p_ok("v"), vec![expr(var("v"))])],
            ))]))
            .build(),
    ]);
    let discharge = p.discharge("f.cdz");
    assert_eq!(rules(&discharge.diagnostics), vec![RuleId::UnusedResult]);
    assert_eq!(discharge.diagnostics[0].notes, vec!["the `Err` variant is never handled".to_string()]);
}

#[test]
fn test_status_branch_needs_else() {
    let branch = |else_body: Option<Vec<cadenza_syntax::ast::Stmt>>| {
        function("main").uses(&[]).body(vec![expr(if_ok(
            call("divide", vec![int(4), int(2)]).of_type(int_or_string()),
            vec![expr(value())],
            else_body,
        ))])
    };

    let full = program(vec![unit("f.cdz").function(divide()).function(branch(Some(vec![expr(error())]))).build()]);
    assert!(full.discharge("f.cdz").diagnostics.is_empty());

    let partial = program(vec![unit("f.cdz").function(divide()).function(branch(None)).build()]);
    assert_eq!(rules(&partial.discharge("f.cdz").diagnostics), vec![RuleId::UnusedResult]);
}

#[test]
fn test_untyped_call_uses_callee_signature() {
    let p = program(vec![
        unit("f.cdz")
            .function(divide())
            .function(function("main").uses(&[]).body(vec![let_("r", call("divide", vec![int(1), int(2)]))]))
            .build(),
    ]);
    let discharge = p.discharge("f.cdz");
    assert_eq!(rules(&discharge.diagnostics), vec![RuleId::UnusedResult]);
    assert_eq!(discharge.expressions[0].callee, "divide");
}

#[test]
fn test_result_nested_in_arguments() {
    let p = program(vec![
        unit("f.cdz")
            .function(divide())
            .function(
                function("main")
                    .uses(&["IO"])
                    .body(vec![expr(op("print", vec![call("divide", vec![int(1), int(2)]).of_type(int_or_string())]))]),
            )
            .build(),
    ]);
    assert_eq!(rules(&p.discharge("f.cdz").diagnostics), vec![RuleId::UnusedResult]);
}

#[test]
fn test_non_result_calls_are_ignored() {
    let p = program(vec![
        unit("f.cdz")
            .function(function("helper").returns(ty("int")).body(vec![ret(int(1))]))
            .function(function("main").body(vec![expr(call("helper", vec![]).of_type(ty("int")))]))
            .build(),
    ]);
    let discharge = p.discharge("f.cdz");
    assert!(discharge.diagnostics.is_empty());
    assert!(discharge.expressions.is_empty());
}
