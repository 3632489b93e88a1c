//! Call graph construction and SCC partitioning.
//!
//! Nodes are [`FunctionId`]s (every function in the symbol table, bound or not); edges are resolved calls to user
//! functions. Builtin operations are not nodes. Recursion is represented as ordinary edges, including self-loops.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::frontend::ast::Span;
use crate::frontend::binder::{BoundFunction, Callee};
use crate::frontend::symbols::{FunctionId, SymbolTable};

#[derive(Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<FunctionId, Span>,
    nodes: HashMap<FunctionId, NodeIndex>,
    /// Callees before callers: every SCC comes after all SCCs it calls into.
    sccs: Vec<Vec<FunctionId>>,
    scc_of: HashMap<FunctionId, usize>,
}

impl CallGraph {
    #[tracing::instrument(skip_all, fields(functions = symbols.len()))]
    pub fn build<'b>(symbols: &SymbolTable, bodies: impl IntoIterator<Item = &'b BoundFunction>) -> Self {
        let mut this = CallGraph::default();
        for signature in symbols.functions() {
            let node = this.graph.add_node(signature.id);
            this.nodes.insert(signature.id, node);
        }

        for body in bodies {
            let Some(&from) = this.nodes.get(&body.id) else {
                continue;
            };
            for site in &body.calls {
                if let Callee::Function(callee) = site.callee {
                    if let Some(&to) = this.nodes.get(&callee) {
                        this.graph.add_edge(from, to, site.span);
                    }
                }
            }
        }

        // tarjan_scc yields SCCs in post-order, so callees come first.
        for component in tarjan_scc(&this.graph) {
            let mut members: Vec<FunctionId> = component.into_iter().map(|n| this.graph[n]).collect();
            members.sort();
            let index = this.sccs.len();
            for member in &members {
                this.scc_of.insert(*member, index);
            }
            this.sccs.push(members);
        }

        tracing::debug!(
            edges = this.graph.edge_count(),
            sccs = this.sccs.len(),
            "call graph built"
        );
        this
    }

    /// SCCs in processing order (callees first). Members are sorted by id.
    pub fn sccs(&self) -> &[Vec<FunctionId>] {
        &self.sccs
    }

    pub fn scc_of(&self, id: FunctionId) -> Option<usize> {
        self.scc_of.get(&id).copied()
    }

    pub fn callees(&self, id: FunctionId) -> Vec<FunctionId> {
        self.neighbors(id, Direction::Outgoing)
    }

    pub fn callers(&self, id: FunctionId) -> Vec<FunctionId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: FunctionId, direction: Direction) -> Vec<FunctionId> {
        let Some(&node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<FunctionId> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// `true` for functions that can reach themselves.
    pub fn is_recursive(&self, id: FunctionId) -> bool {
        let in_cycle = self
            .scc_of(id)
            .is_some_and(|i| self.sccs.get(i).is_some_and(|members| members.len() > 1));
        in_cycle || self.callees(id).contains(&id)
    }

    /// `seeds` plus every function that transitively calls one of them.
    pub fn callers_closure(&self, seeds: impl IntoIterator<Item = FunctionId>) -> HashSet<FunctionId> {
        let mut seen: HashSet<FunctionId> = HashSet::new();
        let mut stack: Vec<FunctionId> = seeds.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.callers(id).into_iter().filter(|c| !seen.contains(c)));
        }
        seen
    }

    /// Indices of SCCs containing any of `functions`, in processing order.
    pub fn sccs_containing(&self, functions: &HashSet<FunctionId>) -> Vec<usize> {
        let mut indices: Vec<usize> = functions.iter().filter_map(|f| self.scc_of(*f)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::binder::CallSite;
    use crate::frontend::registry::EffectRegistry;
    use cadenza_syntax::builder::*;

    fn table(names: &[&str]) -> (SymbolTable, Vec<FunctionId>) {
        let mut builder = unit("a.cdz");
        for name in names {
            builder = builder.function(function(name));
        }
        let mut symbols = SymbolTable::new();
        let ids = symbols.collect_file(&builder.build(), "a", &EffectRegistry::standard());
        (symbols, ids)
    }

    fn body(id: FunctionId, callees: &[FunctionId]) -> BoundFunction {
        BoundFunction {
            id,
            calls: callees
                .iter()
                .map(|c| CallSite {
                    callee: Callee::Function(*c),
                    span: Span::default(),
                })
                .collect(),
            poisoned: false,
        }
    }

    #[test]
    fn test_sccs_are_callees_first() {
        let (symbols, ids) = table(&["main", "a", "b", "leaf"]);
        let (main, a, b, leaf) = (ids[0], ids[1], ids[2], ids[3]);
        let bodies = vec![body(main, &[a]), body(a, &[b]), body(b, &[a, leaf]), body(leaf, &[])];
        let graph = CallGraph::build(&symbols, &bodies);

        let position = |id: FunctionId| graph.scc_of(id).unwrap();
        assert_eq!(graph.sccs().len(), 3);
        assert_eq!(position(a), position(b));
        assert!(position(leaf) < position(a));
        assert!(position(a) < position(main));
        assert!(graph.is_recursive(a));
        assert!(!graph.is_recursive(main));
    }

    #[test]
    fn test_self_loop_is_recursive() {
        let (symbols, ids) = table(&["fact"]);
        let graph = CallGraph::build(&symbols, &[body(ids[0], &[ids[0]])]);
        assert!(graph.is_recursive(ids[0]));
        assert_eq!(graph.sccs().len(), 1);
    }

    #[test]
    fn test_callers_closure() {
        let (symbols, ids) = table(&["main", "mid", "leaf", "other"]);
        let bodies = vec![body(ids[0], &[ids[1]]), body(ids[1], &[ids[2]])];
        let graph = CallGraph::build(&symbols, &bodies);
        let closure = graph.callers_closure([ids[2]]);
        assert_eq!(closure.len(), 3);
        assert!(!closure.contains(&ids[3]));
    }
}
