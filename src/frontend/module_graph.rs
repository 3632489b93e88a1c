//! Module graph builder.
//!
//! Resolves every file's imports against the set of known modules and files, builds the file-level dependency graph,
//! detects import cycles and conflicting duplicate module declarations, and produces the compilation order.
//!
//! ## Notes
//!
//! - **Module names**: a file's module is its `module` declaration, or its path without extension when it has none.
//!   Import targets try declared names first, implicit names second.
//! - **Partial failure**: an unresolved import drops only that edge; the file stays in the graph. Files on a cycle and
//!   the later file of a conflicting duplicate module are *halted*: their signatures remain visible, but they are not
//!   bound or verified, and they are left out of the compilation order.
//! - **Cycles**: every file in a strongly connected component of the import graph is halted. Files and neighbours are
//!   visited in path order, so the reported cycles come out the same on every run.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

use crate::config::ResolvedConfig;
use crate::frontend::ast::{ImportItems, ImportTarget, SOURCE_EXTENSION, SourceUnit, Span, implicit_module_name};
use crate::frontend::diagnostics::{Diagnostic, errors};

/// Edge payload: the import directive that created the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportEdge {
    pub span: Span,
}

/// How an import exposes names to the importing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// Whole module; names are reachable as `qualifier.name`.
    Module,
    Wildcard,
    Names(Vec<ImportedName>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    pub name: String,
    /// Name visible in the importing file (the alias, when given).
    pub local: String,
    pub span: Span,
}

/// A successfully resolved import directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub module: String,
    /// Extra qualifier the module is reachable under: the alias, or the file stem for path imports.
    pub qualifier: Option<String>,
    pub kind: ImportKind,
    pub span: Span,
}

/// What a failed import would have brought into scope. Calls through these are skipped without further diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailedImport {
    pub target: String,
    pub qualifiers: Vec<String>,
    pub names: Vec<String>,
    pub wildcard: bool,
}

impl FailedImport {
    pub fn hides_name(&self, name: &str) -> bool {
        self.wildcard || self.names.iter().any(|n| n == name)
    }
}

/// Per-file outcome of import resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportResolution {
    pub imports: Vec<ResolvedImport>,
    pub failed: Vec<FailedImport>,
}

impl ImportResolution {
    pub fn references_module(&self, module: &str) -> bool {
        self.imports.iter().any(|i| i.module == module) || self.failed.iter().any(|f| f.target == module)
    }
}

/// The file dependency graph of one analysis run. Immutable once built.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    graph: DiGraph<PathBuf, ImportEdge>,
    nodes: HashMap<PathBuf, NodeIndex>,
    file_modules: BTreeMap<PathBuf, String>,
    modules: BTreeMap<String, Vec<PathBuf>>,
    resolutions: BTreeMap<PathBuf, ImportResolution>,
    order: Vec<PathBuf>,
    halted: BTreeSet<PathBuf>,
    cycles: Vec<Vec<PathBuf>>,
    diagnostics: BTreeMap<PathBuf, Vec<Diagnostic>>,
}

/// Read-only lookup tables shared by the parallel resolution workers.
struct ResolveIndex<'a> {
    modules: &'a BTreeMap<String, Vec<PathBuf>>,
    file_modules: &'a BTreeMap<PathBuf, String>,
    normalized: HashMap<PathBuf, PathBuf>,
    exports: HashMap<&'a str, BTreeSet<&'a str>>,
}

impl ModuleGraph {
    #[tracing::instrument(skip_all, fields(files = units.len()))]
    pub fn build(units: &BTreeMap<PathBuf, SourceUnit>, config: &ResolvedConfig) -> Self {
        let mut this = ModuleGraph::default();

        for (path, unit) in units {
            let module = unit
                .declared_module()
                .map(str::to_string)
                .unwrap_or_else(|| implicit_module_name(path));
            this.file_modules.insert(path.clone(), module);
            let node = this.graph.add_node(path.clone());
            this.nodes.insert(path.clone(), node);
        }
        this.modules = group_modules(units, &this.file_modules);

        let resolved: Vec<(PathBuf, ImportResolution, Vec<Diagnostic>)> = {
            let index = ResolveIndex::new(units, &this.modules, &this.file_modules);
            units
                .par_iter()
                .map(|(path, unit)| {
                    let (resolution, diagnostics) = index.resolve_file(path, unit);
                    (path.clone(), resolution, diagnostics)
                })
                .collect()
        };

        for (path, resolution, diagnostics) in resolved {
            this.add_edges(&path, &resolution);
            if !diagnostics.is_empty() {
                this.diagnostics.entry(path.clone()).or_default().extend(diagnostics);
            }
            this.resolutions.insert(path, resolution);
        }

        this.detect_cycles();
        this.detect_duplicate_modules(units, config);
        this.order = this.topological_order();

        tracing::debug!(
            edges = this.graph.edge_count(),
            cycles = this.cycles.len(),
            halted = this.halted.len(),
            "module graph built"
        );
        this
    }

    fn add_edges(&mut self, importer: &Path, resolution: &ImportResolution) {
        let Some(&from) = self.nodes.get(importer) else {
            return;
        };
        for import in &resolution.imports {
            let targets = self.modules.get(&import.module).cloned().unwrap_or_default();
            for target in targets {
                if target == importer {
                    continue;
                }
                if let Some(&to) = self.nodes.get(&target) {
                    self.graph.add_edge(from, to, ImportEdge { span: import.span });
                }
            }
        }
    }

    /// Dependencies of `node`, sorted by path and deduplicated.
    fn sorted_dependencies(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut deps: Vec<NodeIndex> = self.graph.neighbors_directed(node, Direction::Outgoing).collect();
        deps.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        deps.dedup();
        deps
    }

    /// Earliest import in `from` that created an edge to `to`.
    fn edge_span(&self, from: NodeIndex, to: NodeIndex) -> Span {
        self.graph
            .edges_connecting(from, to)
            .map(|e| e.weight().span)
            .min_by_key(|s| (s.line, s.column))
            .unwrap_or_default()
    }

    /// Cycles are found per strongly connected component, so every file that can reach itself is halted no matter
    /// which way the imports close. Within a component each import edge is covered by one reported cycle: the edge
    /// `u -> v` followed by the shortest way back from `v` to `u`. Each distinct cycle is reported once, on the
    /// import that closes it.
    fn detect_cycles(&mut self) {
        let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|c| c.len() > 1)
            .map(|mut c| {
                c.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
                c
            })
            .collect();
        components.sort_by(|a, b| self.graph[a[0]].cmp(&self.graph[b[0]]));

        let mut seen: HashSet<Vec<PathBuf>> = HashSet::new();
        let mut found: Vec<(Vec<NodeIndex>, NodeIndex, NodeIndex)> = Vec::new();
        for component in &components {
            let inside: HashSet<NodeIndex> = component.iter().copied().collect();
            let mut covered: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
            for &from in component {
                for to in self.sorted_dependencies(from) {
                    if !inside.contains(&to) || covered.contains(&(from, to)) {
                        continue;
                    }
                    let Some(back) = self.shortest_path(to, from, &inside) else {
                        continue;
                    };
                    // `from -> to -> ... -> from`, with `from` listed once.
                    let mut members = vec![from];
                    members.extend(&back[..back.len() - 1]);
                    let mut ring = members.clone();
                    ring.push(from);
                    for pair in ring.windows(2) {
                        covered.insert((pair[0], pair[1]));
                    }
                    let paths: Vec<PathBuf> = members.iter().map(|n| self.graph[*n].clone()).collect();
                    if seen.insert(canonical_rotation(&paths)) {
                        let closing = members[members.len() - 1];
                        found.push((members, closing, from));
                    }
                }
            }
        }

        for component in &components {
            self.halted.extend(component.iter().map(|n| self.graph[*n].clone()));
        }
        for (members, closing_from, closing_to) in found {
            let file = self.graph[closing_from].clone();
            let mut cycle: Vec<PathBuf> = members.iter().map(|n| self.graph[*n].clone()).collect();
            cycle.push(self.graph[closing_to].clone());
            let span = self.edge_span(closing_from, closing_to);
            tracing::debug!(cycle = ?cycle, "import cycle");
            self.diagnostics
                .entry(file.clone())
                .or_default()
                .push(errors::circular_dependency(&file, &cycle, span));
            self.cycles.push(cycle);
        }
    }

    /// Breadth-first path `from ..= to` through `within`, visiting dependencies in path order.
    fn shortest_path(&self, from: NodeIndex, to: NodeIndex, within: &HashSet<NodeIndex>) -> Option<Vec<NodeIndex>> {
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        let mut visited = HashSet::from([from]);
        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to];
                let mut current = to;
                while let Some(&previous) = parent.get(&current) {
                    path.push(previous);
                    current = previous;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.sorted_dependencies(node) {
                if within.contains(&next) && visited.insert(next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Files declaring the same module merge freely unless two of them export the same name with separate
    /// definitions. The later file (path order) is reported and halted, unless both are configured fragments.
    fn detect_duplicate_modules(&mut self, units: &BTreeMap<PathBuf, SourceUnit>, config: &ResolvedConfig) {
        let mut declared: BTreeMap<&str, Vec<&SourceUnit>> = BTreeMap::new();
        for unit in units.values() {
            if let Some(module) = unit.declared_module() {
                declared.entry(module).or_default().push(unit);
            }
        }

        for (module, files) in declared {
            if files.len() < 2 {
                continue;
            }
            let mut owners: BTreeMap<&str, &Path> = BTreeMap::new();
            for unit in files {
                if self.halted.contains(&unit.path) {
                    continue;
                }
                let defined = defined_names(unit);
                let mut conflicts = Vec::new();
                for export in &unit.exports {
                    let name = export.node.as_str();
                    if !defined.contains(name) {
                        continue;
                    }
                    match owners.get(name) {
                        Some(owner) if !config.are_fragments(module, owner, &unit.path) => {
                            conflicts.push(errors::duplicate_module(&unit.path, module, name, owner, export.span));
                        }
                        Some(_) => {}
                        None => {
                            owners.insert(name, &unit.path);
                        }
                    }
                }
                if !conflicts.is_empty() {
                    self.halted.insert(unit.path.clone());
                    self.diagnostics.entry(unit.path.clone()).or_default().extend(conflicts);
                }
            }
        }
    }

    /// Kahn's algorithm over the non-halted files, dependencies first, ties broken by path.
    fn topological_order(&self) -> Vec<PathBuf> {
        let live = |n: NodeIndex| !self.halted.contains(&self.graph[n]);

        let mut remaining: HashMap<NodeIndex, usize> = HashMap::new();
        let mut ready: BinaryHeap<Reverse<(PathBuf, NodeIndex)>> = BinaryHeap::new();
        for node in self.graph.node_indices().filter(|n| live(*n)) {
            let deps = self.sorted_dependencies(node).into_iter().filter(|d| live(*d)).count();
            if deps == 0 {
                ready.push(Reverse((self.graph[node].clone(), node)));
            } else {
                remaining.insert(node, deps);
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((path, node))) = ready.pop() {
            order.push(path);
            let mut importers: Vec<NodeIndex> = self.graph.neighbors_directed(node, Direction::Incoming).collect();
            importers.sort();
            importers.dedup();
            for importer in importers {
                if let Some(count) = remaining.get_mut(&importer) {
                    *count -= 1;
                    if *count == 0 {
                        remaining.remove(&importer);
                        ready.push(Reverse((self.graph[importer].clone(), importer)));
                    }
                }
            }
        }
        order
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Valid linearization of the non-halted files: every file comes after everything it imports.
    pub fn compilation_order(&self) -> &[PathBuf] {
        &self.order
    }

    pub fn module_of(&self, file: &Path) -> Option<&str> {
        self.file_modules.get(file).map(String::as_str)
    }

    pub fn files_of(&self, module: &str) -> &[PathBuf] {
        self.modules.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn resolution(&self, file: &Path) -> Option<&ImportResolution> {
        self.resolutions.get(file)
    }

    pub fn is_halted(&self, file: &Path) -> bool {
        self.halted.contains(file)
    }

    pub fn halted(&self) -> &BTreeSet<PathBuf> {
        &self.halted
    }

    pub fn cycles(&self) -> &[Vec<PathBuf>] {
        &self.cycles
    }

    pub fn diagnostics_for(&self, file: &Path) -> &[Diagnostic] {
        self.diagnostics.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Files whose imports name `module`, resolved or not.
    pub fn importers_of(&self, module: &str) -> Vec<PathBuf> {
        self.resolutions
            .iter()
            .filter(|(_, r)| r.references_module(module))
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Files `file` depends on through resolved imports.
    pub fn dependencies(&self, file: &Path) -> Vec<PathBuf> {
        let Some(&node) = self.nodes.get(file) else {
            return Vec::new();
        };
        self.sorted_dependencies(node)
            .into_iter()
            .map(|n| self.graph[n].clone())
            .collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&Path, &Path)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].as_path(), self.graph[e.target()].as_path()))
    }
}

fn group_modules(
    units: &BTreeMap<PathBuf, SourceUnit>,
    file_modules: &BTreeMap<PathBuf, String>,
) -> BTreeMap<String, Vec<PathBuf>> {
    let mut declared: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut implicit: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for (path, unit) in units {
        let Some(module) = file_modules.get(path) else {
            continue;
        };
        let bucket = if unit.declared_module().is_some() {
            &mut declared
        } else {
            &mut implicit
        };
        bucket.entry(module.clone()).or_default().push(path.clone());
    }
    // Declared names shadow implicit ones.
    for (name, files) in implicit {
        declared.entry(name).or_insert(files);
    }
    declared
}

fn defined_names(unit: &SourceUnit) -> BTreeSet<&str> {
    unit.functions()
        .map(|(f, _)| f.name.as_str())
        .chain(unit.types().map(|t| t.name.as_str()))
        .collect()
}

/// Rotate a cycle so it starts at its smallest path, giving one key per distinct cycle.
fn canonical_rotation(members: &[PathBuf]) -> Vec<PathBuf> {
    let start = members
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    members[start..].iter().chain(members[..start].iter()).cloned().collect()
}

/// Lexically normalize a path (`./a/../b.cdz` -> `b.cdz`).
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

impl<'a> ResolveIndex<'a> {
    fn new(
        units: &'a BTreeMap<PathBuf, SourceUnit>,
        modules: &'a BTreeMap<String, Vec<PathBuf>>,
        file_modules: &'a BTreeMap<PathBuf, String>,
    ) -> Self {
        let normalized = units.keys().map(|p| (normalize(p), p.clone())).collect();
        let mut exports: HashMap<&'a str, BTreeSet<&'a str>> = HashMap::new();
        for (path, unit) in units {
            if let Some(module) = file_modules.get(path) {
                exports
                    .entry(module.as_str())
                    .or_default()
                    .extend(unit.exports.iter().map(|e| e.node.as_str()));
            }
        }
        Self {
            modules,
            file_modules,
            normalized,
            exports,
        }
    }

    fn find_file(&self, importer: &Path, target: &str) -> Option<&PathBuf> {
        let raw = Path::new(target);
        let base = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            importer.parent().unwrap_or(Path::new("")).join(raw)
        };
        let mut candidates = vec![normalize(&base)];
        if base.extension().is_none() {
            candidates.push(normalize(&base.with_extension(SOURCE_EXTENSION)));
        }
        candidates.iter().find_map(|c| self.normalized.get(c))
    }

    fn resolve_file(&self, path: &Path, unit: &SourceUnit) -> (ImportResolution, Vec<Diagnostic>) {
        let mut resolution = ImportResolution::default();
        let mut diagnostics = Vec::new();

        for import in &unit.imports {
            let decl = &import.node;
            let found: Option<(String, Option<String>)> = match &decl.target {
                ImportTarget::Module(name) => self
                    .modules
                    .contains_key(name)
                    .then(|| (name.clone(), decl.alias.clone())),
                ImportTarget::File(target) => self.find_file(path, target).and_then(|file| {
                    let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned());
                    self.file_modules
                        .get(file)
                        .map(|module| (module.clone(), decl.alias.clone().or(stem)))
                }),
            };

            let Some((module, qualifier)) = found else {
                diagnostics.push(errors::unresolved_module(path, &decl.target.to_string(), import.span));
                resolution.failed.push(failed_import(decl));
                continue;
            };

            let kind = match &decl.items {
                ImportItems::Module => ImportKind::Module,
                ImportItems::Wildcard => ImportKind::Wildcard,
                ImportItems::Names(items) => {
                    let exported = self.exports.get(module.as_str());
                    let mut names = Vec::new();
                    let mut missing = FailedImport {
                        target: module.clone(),
                        ..FailedImport::default()
                    };
                    for item in items {
                        let is_exported = exported.is_some_and(|set| set.contains(item.node.name.as_str()));
                        if is_exported {
                            names.push(ImportedName {
                                name: item.node.name.clone(),
                                local: item.node.local_name().to_string(),
                                span: item.span,
                            });
                        } else {
                            diagnostics.push(errors::unexported_import(path, &module, &item.node.name, item.span));
                            missing.names.push(item.node.local_name().to_string());
                        }
                    }
                    if !missing.names.is_empty() {
                        resolution.failed.push(missing);
                    }
                    ImportKind::Names(names)
                }
            };

            resolution.imports.push(ResolvedImport {
                module,
                qualifier,
                kind,
                span: import.span,
            });
        }

        (resolution, diagnostics)
    }
}

fn failed_import(decl: &crate::frontend::ast::ImportDecl) -> FailedImport {
    let target = match &decl.target {
        ImportTarget::Module(name) => name.clone(),
        ImportTarget::File(path) => path.clone(),
    };
    let mut qualifiers: Vec<String> = decl.alias.iter().cloned().collect();
    match &decl.target {
        ImportTarget::Module(name) => qualifiers.push(name.clone()),
        ImportTarget::File(path) => {
            if let Some(stem) = Path::new(path).file_stem() {
                qualifiers.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    let (names, wildcard) = match &decl.items {
        ImportItems::Module => (Vec::new(), false),
        ImportItems::Wildcard => (Vec::new(), true),
        ImportItems::Names(items) => (items.iter().map(|i| i.node.local_name().to_string()).collect(), false),
    };
    FailedImport {
        target,
        qualifiers,
        names,
        wildcard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::lang::rules::RuleId;
    use cadenza_syntax::builder::*;

    fn units(list: Vec<SourceUnit>) -> BTreeMap<PathBuf, SourceUnit> {
        list.into_iter().map(|u| (u.path.clone(), u)).collect()
    }

    fn build(list: Vec<SourceUnit>) -> ModuleGraph {
        ModuleGraph::build(&units(list), &ResolvedConfig::default())
    }

    fn rules_for(graph: &ModuleGraph, file: &str) -> Vec<RuleId> {
        graph.diagnostics_for(Path::new(file)).iter().map(|d| d.rule).collect()
    }

    #[test]
    fn test_two_file_cycle_reported_once() {
        let graph = build(vec![unit("a.cdz").import("b").build(), unit("b.cdz").import("a").build()]);

        assert_eq!(graph.cycles().len(), 1);
        assert_eq!(
            graph.cycles()[0],
            vec![PathBuf::from("a.cdz"), PathBuf::from("b.cdz"), PathBuf::from("a.cdz")]
        );
        let all: Vec<&Diagnostic> = ["a.cdz", "b.cdz"]
            .iter()
            .flat_map(|f| graph.diagnostics_for(Path::new(f)))
            .collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].rule, RuleId::CircularDependency);
        assert!(all[0].message.contains("a.cdz -> b.cdz -> a.cdz"));
        assert!(graph.is_halted(Path::new("a.cdz")));
        assert!(graph.compilation_order().is_empty());
    }

    #[test]
    fn test_cycle_does_not_halt_independent_files() {
        let graph = build(vec![
            unit("a.cdz").import("b").build(),
            unit("b.cdz").import("a").build(),
            unit("c.cdz").import("d").build(),
            unit("d.cdz").build(),
        ]);
        assert_eq!(graph.compilation_order(), &[PathBuf::from("d.cdz"), PathBuf::from("c.cdz")]);
    }

    #[test]
    fn test_three_file_cycle_path() {
        let graph = build(vec![
            unit("a.cdz").import("b").build(),
            unit("b.cdz").import("c").build(),
            unit("c.cdz").import("a").build(),
        ]);
        assert_eq!(graph.cycles().len(), 1);
        let names: Vec<String> = graph.cycles()[0].iter().map(|p| p.display().to_string()).collect();
        assert_eq!(names, vec!["a.cdz", "b.cdz", "c.cdz", "a.cdz"]);
        assert_eq!(rules_for(&graph, "c.cdz"), vec![RuleId::CircularDependency]);
    }

    #[test]
    fn test_cycle_closing_through_finished_file() {
        // a -> b -> d -> a and a -> c -> d -> a share the edge d -> a.
        let graph = build(vec![
            unit("a.cdz").import("b").import("c").build(),
            unit("b.cdz").import("d").build(),
            unit("c.cdz").import("d").build(),
            unit("d.cdz").import("a").build(),
            unit("e.cdz").import("c").build(),
        ]);

        for file in ["a.cdz", "b.cdz", "c.cdz", "d.cdz"] {
            assert!(graph.is_halted(Path::new(file)), "{file} should be halted");
        }
        assert_eq!(graph.compilation_order(), &[PathBuf::from("e.cdz")]);

        let cycles: Vec<String> = graph
            .cycles()
            .iter()
            .map(|c| c.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))
            .collect();
        assert_eq!(cycles, vec!["a.cdz -> b.cdz -> d.cdz -> a.cdz", "a.cdz -> c.cdz -> d.cdz -> a.cdz"]);
        assert_eq!(rules_for(&graph, "d.cdz"), vec![RuleId::CircularDependency, RuleId::CircularDependency]);
        assert!(rules_for(&graph, "c.cdz").is_empty());
    }

    #[test]
    fn test_missing_module_is_one_error_and_file_kept() {
        let graph = build(vec![unit("a.cdz").import("M").build(), unit("b.cdz").build()]);
        assert_eq!(rules_for(&graph, "a.cdz"), vec![RuleId::UnresolvedImport]);
        assert!(rules_for(&graph, "b.cdz").is_empty());
        assert_eq!(graph.compilation_order().len(), 2);
        let failed = &graph.resolution(Path::new("a.cdz")).unwrap().failed;
        assert_eq!(failed[0].qualifiers, vec!["M".to_string()]);
    }

    #[test]
    fn test_declared_module_name_resolves_before_path() {
        let graph = build(vec![
            unit("lib/net.cdz").module("http").export(&["get"]).build(),
            unit("main.cdz").import("http").build(),
        ]);
        assert!(rules_for(&graph, "main.cdz").is_empty());
        assert_eq!(graph.dependencies(Path::new("main.cdz")), vec![PathBuf::from("lib/net.cdz")]);
        assert_eq!(
            graph.compilation_order(),
            &[PathBuf::from("lib/net.cdz"), PathBuf::from("main.cdz")]
        );
    }

    #[test]
    fn test_file_import_relative_to_importer() {
        let graph = build(vec![
            unit("app/main.cdz").import_file("./util").build(),
            unit("app/util.cdz").build(),
        ]);
        assert!(rules_for(&graph, "app/main.cdz").is_empty());
        let import = &graph.resolution(Path::new("app/main.cdz")).unwrap().imports[0];
        assert_eq!(import.module, "app/util");
        assert_eq!(import.qualifier.as_deref(), Some("util"));
    }

    #[test]
    fn test_unexported_name_import() {
        let graph = build(vec![
            unit("m.cdz").module("m").export(&["a"]).build(),
            unit("main.cdz").from_import("m", &["a", "b"]).build(),
        ]);
        let diags = graph.diagnostics_for(Path::new("main.cdz"));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("does not export `b`"));
        let resolution = graph.resolution(Path::new("main.cdz")).unwrap();
        assert_eq!(resolution.imports.len(), 1);
        assert!(resolution.failed[0].hides_name("b"));
    }

    #[test]
    fn test_duplicate_module_conflicting_export() {
        let f = || function("run");
        let graph = build(vec![
            unit("a.cdz").module("app").export(&["run"]).function(f()).build(),
            unit("b.cdz").module("app").export(&["run"]).function(f()).build(),
        ]);
        assert!(rules_for(&graph, "a.cdz").is_empty());
        assert_eq!(rules_for(&graph, "b.cdz"), vec![RuleId::DuplicateModule]);
        assert!(graph.is_halted(Path::new("b.cdz")));
    }

    #[test]
    fn test_disjoint_exports_merge_into_one_module() {
        let graph = build(vec![
            unit("a.cdz").module("app").export(&["one"]).function(function("one")).build(),
            unit("b.cdz").module("app").export(&["two"]).function(function("two")).build(),
        ]);
        assert!(graph.halted().is_empty());
        assert_eq!(graph.files_of("app").len(), 2);
    }

    #[test]
    fn test_configured_fragments_may_overlap() {
        let config: crate::config::AnalysisConfig =
            serde_json::from_str(r#"{ "fragments": { "app": ["a.cdz", "b.cdz"] } }"#).unwrap();
        let resolved = config.resolve(&crate::frontend::registry::EffectRegistry::standard()).unwrap();
        let f = || function("run");
        let graph = ModuleGraph::build(
            &units(vec![
                unit("a.cdz").module("app").export(&["run"]).function(f()).build(),
                unit("b.cdz").module("app").export(&["run"]).function(f()).build(),
            ]),
            &resolved,
        );
        assert!(graph.halted().is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./a/../b.cdz")), PathBuf::from("b.cdz"));
        assert_eq!(normalize(Path::new("../x.cdz")), PathBuf::from("../x.cdz"));
    }
}
