//! Property-based tests for the Cadenza verifier
//!
//! These tests use proptest to check the graph and fixed-point invariants over randomly generated programs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use cadenza::AnalysisConfig;
use cadenza::engine::Engine;
use cadenza_core::effects::EffectSet;
use cadenza_core::lang::rules::RuleId;
use cadenza_syntax::ast::SourceUnit;
use cadenza_syntax::builder::*;
use proptest::prelude::*;

const OPS: [&str; 6] = ["db.query", "http.get", "fs.read", "log.info", "print", "mem.alloc"];

fn engine() -> Engine {
    Engine::new(AnalysisConfig::default()).unwrap()
}

// =============================================================================
// Module graph
// =============================================================================

/// `n` files where file `i` may import any file `j < i`.
fn dag_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..8).prop_flat_map(|n| {
        let edges = prop::collection::vec((1..n, 0..n), 0..n * 2)
            .prop_map(|pairs| pairs.into_iter().filter(|(i, j)| j < i).collect::<Vec<_>>());
        (Just(n), edges)
    })
}

fn dag_units(n: usize, edges: &[(usize, usize)]) -> Vec<SourceUnit> {
    (0..n)
        .map(|i| {
            let mut builder = unit(format!("f{i}.cdz")).module(&format!("m{i}"));
            let imports: BTreeSet<usize> = edges.iter().filter(|(from, _)| *from == i).map(|(_, to)| *to).collect();
            for target in imports {
                builder = builder.import(&format!("m{target}"));
            }
            builder.build()
        })
        .collect()
}

// =============================================================================
// Call graphs
// =============================================================================

/// Each function gets one operation and a list of callees; cycles are allowed.
fn call_graph_strategy() -> impl Strategy<Value = Vec<(usize, Vec<usize>)>> {
    (1usize..8).prop_flat_map(|n| prop::collection::vec((0..OPS.len(), prop::collection::vec(0..n, 0..3)), n))
}

fn fn_name(i: usize) -> String {
    format!("f{i}")
}

/// Functions of one module spread over two files, declared in `order`.
fn call_graph_units(spec: &[(usize, Vec<usize>)], order: &[usize]) -> Vec<SourceUnit> {
    let mut files = [unit("a.cdz").module("m"), unit("b.cdz").module("m")];
    for &i in order {
        let (op_index, callees) = &spec[i];
        let mut body = vec![expr(op(OPS[*op_index], vec![]))];
        body.extend(callees.iter().map(|c| expr(call(&fn_name(*c), vec![]))));
        let file = i % 2;
        files[file] = files[file].clone().function(function(&fn_name(i)).body(body));
    }
    files.into_iter().map(|b| b.build()).collect()
}

fn file_of(i: usize) -> &'static Path {
    if i % 2 == 0 { Path::new("a.cdz") } else { Path::new("b.cdz") }
}

/// Union of the operations' effects over everything reachable from `start`.
fn reachable_effects(engine: &Engine, spec: &[(usize, Vec<usize>)], start: usize) -> EffectSet {
    let registry = engine.registry();
    let mut seen = BTreeSet::from([start]);
    let mut stack = vec![start];
    let mut effects = EffectSet::empty();
    while let Some(i) = stack.pop() {
        let op = registry.operation(OPS[spec[i].0]).unwrap();
        effects.insert(registry.effect_of(op));
        for callee in &spec[i].1 {
            if seen.insert(*callee) {
                stack.push(*callee);
            }
        }
    }
    effects
}

fn required_sets(engine: &Engine, n: usize) -> BTreeMap<usize, EffectSet> {
    (0..n)
        .map(|i| (i, engine.effect_summary(file_of(i), &fn_name(i)).unwrap().required))
        .collect()
}

proptest! {
    /// Property: every import lands before its importer in the compilation order
    #[test]
    fn compilation_order_respects_imports((n, edges) in dag_strategy()) {
        let mut engine = engine();
        let report = engine.analyze(dag_units(n, &edges));
        prop_assert!(report.diagnostics.is_empty());
        prop_assert_eq!(report.order.len(), n);

        let position: BTreeMap<PathBuf, usize> =
            report.order.iter().enumerate().map(|(i, p)| (p.clone(), i)).collect();
        for (from, to) in &edges {
            let importer = position[&PathBuf::from(format!("f{from}.cdz"))];
            let imported = position[&PathBuf::from(format!("f{to}.cdz"))];
            prop_assert!(imported < importer, "f{to} must precede f{from}");
        }
    }

    /// Property: one back edge turns any DAG into exactly one reported cycle
    #[test]
    fn back_edge_reports_one_cycle((n, mut edges) in dag_strategy()) {
        edges.retain(|(from, to)| *from != 0 && *to != 0);
        edges.push((n - 1, 0));
        edges.push((0, n - 1));
        let report = engine().analyze(dag_units(n, &edges));
        let cycles = report
            .diagnostics
            .iter()
            .filter(|d| d.rule == RuleId::CircularDependency)
            .count();
        prop_assert_eq!(cycles, 1);
    }

    /// Property: required effects are the reachable operations' effects, whatever the declaration order
    #[test]
    fn fixed_point_is_order_independent(spec in call_graph_strategy()) {
        let n = spec.len();
        let forward: Vec<usize> = (0..n).collect();
        let backward: Vec<usize> = (0..n).rev().collect();

        let mut first = engine();
        first.analyze(call_graph_units(&spec, &forward));
        let mut second = engine();
        second.analyze(call_graph_units(&spec, &backward));

        let required = required_sets(&first, n);
        prop_assert_eq!(&required, &required_sets(&second, n));
        for (i, set) in &required {
            prop_assert_eq!(*set, reachable_effects(&first, &spec, *i));
        }
    }

    /// Property: an incremental edit ends in the same state as a batch run of the edited program
    #[test]
    fn incremental_edit_matches_batch(spec in call_graph_strategy(), new_op in 0..OPS.len()) {
        let n = spec.len();
        let order: Vec<usize> = (0..n).collect();
        let mut edited = spec.clone();
        edited[0].0 = new_op;

        let mut incremental = engine();
        incremental.analyze(call_graph_units(&spec, &order));
        let changed = call_graph_units(&edited, &order).remove(0);
        incremental.analyze_changed("a.cdz", changed);

        let mut batch = engine();
        batch.analyze(call_graph_units(&edited, &order));

        prop_assert_eq!(required_sets(&incremental, n), required_sets(&batch, n));
        let left: Vec<_> = incremental.diagnostics().cloned().collect();
        let right: Vec<_> = batch.diagnostics().cloned().collect();
        prop_assert_eq!(left, right);
    }
}
