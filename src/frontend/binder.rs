//! Cross-module binder.
//!
//! Resolves every call expression in every function body to exactly one callee: a user function (by
//! [`FunctionId`]) or a builtin operation. It also validates `uses [...]` tokens against the effect registry. The
//! bound result is the only input the call graph and both verifiers read.
//!
//! ## Lookup order
//!
//! - **Unqualified** `name(..)`: same file, then the rest of the file's module, then imported names (explicit and
//!   wildcard imports have equal standing; more than one distinct candidate is ambiguous), then builtin operations.
//! - **Qualified** `q.name(..)`: `q` is the file's own module, an import alias, or the name of an imported module;
//!   the call resolves against that module's export table. When no function of that name exists, or `q` names no
//!   module at all, `q.name` may still spell a builtin operation.
//!
//! A second function with the same name in one file is reported and ignored.
//!
//! A function with any binding error, or with a call that goes through a failed import, is *poisoned*: it keeps what
//! could be bound, but the verifiers report nothing for it.

use std::collections::HashMap;
use std::path::Path;

use cadenza_core::lang::operations::OperationId;

use crate::frontend::ast::{CallPath, Expr, ExprKind, SourceUnit, Span, Spanned};
use crate::frontend::diagnostics::{Diagnostic, errors};
use crate::frontend::module_graph::{FailedImport, ImportKind, ModuleGraph};
use crate::frontend::registry::EffectRegistry;
use crate::frontend::symbols::{FunctionId, SymbolTable};
use cadenza_syntax::visit;

/// What a call site resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callee {
    Function(FunctionId),
    Operation(OperationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub callee: Callee,
    pub span: Span,
}

/// A function body with every resolvable call bound, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFunction {
    pub id: FunctionId,
    pub calls: Vec<CallSite>,
    pub poisoned: bool,
}

impl BoundFunction {
    pub fn callee_at(&self, span: Span) -> Option<Callee> {
        self.calls.iter().find(|c| c.span == span).map(|c| c.callee)
    }
}

/// Binding output for one file.
#[derive(Debug, Clone, Default)]
pub struct BoundFile {
    pub functions: Vec<BoundFunction>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BoundFile {
    pub fn function(&self, id: FunctionId) -> Option<&BoundFunction> {
        self.functions.iter().find(|f| f.id == id)
    }
}

enum Resolution {
    Bound(Callee),
    /// Goes through a failed import; already reported by the module graph.
    Skipped,
    Error(Diagnostic),
}

/// Names visible in one file, derived from its resolved imports.
struct FileScope<'a> {
    file: &'a Path,
    module: &'a str,
    names: HashMap<&'a str, Vec<FunctionId>>,
    wildcards: Vec<&'a str>,
    qualifiers: HashMap<&'a str, &'a str>,
    failed: &'a [FailedImport],
}

pub struct Binder<'a> {
    symbols: &'a SymbolTable,
    graph: &'a ModuleGraph,
    registry: &'a EffectRegistry,
}

impl<'a> Binder<'a> {
    pub fn new(symbols: &'a SymbolTable, graph: &'a ModuleGraph, registry: &'a EffectRegistry) -> Self {
        Self {
            symbols,
            graph,
            registry,
        }
    }

    #[tracing::instrument(skip_all, fields(file = %unit.path.display()))]
    pub fn bind_file(&self, unit: &SourceUnit) -> BoundFile {
        let scope = self.scope_for(&unit.path);
        let mut bound = BoundFile::default();

        for (decl, span) in unit.functions() {
            let Some(id) = self.symbols.find(&unit.path, &decl.name) else {
                continue;
            };
            if bound.function(id).is_some() {
                let first = self.symbols.get(id).map_or(span, |s| s.span);
                bound
                    .diagnostics
                    .push(errors::duplicate_function(&unit.path, &decl.name, first, span));
                continue;
            }
            let mut function = BoundFunction {
                id,
                calls: Vec::new(),
                poisoned: false,
            };

            for token in &decl.effects {
                if self.registry.effect(&token.node).is_none() {
                    bound
                        .diagnostics
                        .push(errors::unknown_effect(&unit.path, &token.node, token.span));
                    function.poisoned = true;
                }
            }

            let mut calls: Vec<(CallPath, Span)> = Vec::new();
            visit::walk_block(&decl.body, &mut |e: &Spanned<Expr>| {
                if let ExprKind::Call(call) = &e.node.kind {
                    calls.push((call.path.clone(), e.span));
                }
            });

            for (path, span) in &calls {
                let span = *span;
                match self.resolve(&scope, path, span) {
                    Resolution::Bound(callee) => function.calls.push(CallSite { callee, span }),
                    Resolution::Skipped => function.poisoned = true,
                    Resolution::Error(diagnostic) => {
                        bound.diagnostics.push(diagnostic);
                        function.poisoned = true;
                    }
                }
            }

            if function.poisoned {
                tracing::debug!(function = %decl.name, "function not fully bound");
            }
            bound.functions.push(function);
        }
        bound
    }

    fn scope_for<'s>(&'s self, file: &'s Path) -> FileScope<'s> {
        let mut scope = FileScope {
            file,
            module: self.graph.module_of(file).unwrap_or_default(),
            names: HashMap::new(),
            wildcards: Vec::new(),
            qualifiers: HashMap::new(),
            failed: &[],
        };
        let Some(resolution) = self.graph.resolution(file) else {
            return scope;
        };
        scope.failed = &resolution.failed;

        for import in &resolution.imports {
            let module = import.module.as_str();
            scope.qualifiers.insert(module, module);
            if let Some(q) = &import.qualifier {
                scope.qualifiers.insert(q.as_str(), module);
            }
            match &import.kind {
                ImportKind::Module => {}
                ImportKind::Wildcard => scope.wildcards.push(module),
                ImportKind::Names(names) => {
                    for imported in names {
                        let targets = self.exported(module, &imported.name);
                        let entry = scope.names.entry(imported.local.as_str()).or_default();
                        for target in targets {
                            if !entry.contains(&target) {
                                entry.push(target);
                            }
                        }
                    }
                }
            }
        }
        scope
    }

    fn exported(&self, module: &str, name: &str) -> Vec<FunctionId> {
        self.symbols
            .lookup_in_files(self.graph.files_of(module), name)
            .into_iter()
            .filter(|id| self.symbols.get(*id).is_some_and(|s| s.exported))
            .collect()
    }

    fn describe(&self, ids: &[FunctionId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.symbols.get(*id))
            .map(|s| format!("`{}` ({})", s.qualified_name(), s.file.display()))
            .collect()
    }

    fn pick(&self, scope: &FileScope<'_>, name: &str, candidates: Vec<FunctionId>, span: Span) -> Option<Resolution> {
        match candidates.len() {
            0 => None,
            1 => Some(Resolution::Bound(Callee::Function(candidates[0]))),
            _ => Some(Resolution::Error(errors::ambiguous_reference(
                scope.file,
                name,
                &self.describe(&candidates),
                span,
            ))),
        }
    }

    fn resolve(&self, scope: &FileScope<'_>, path: &CallPath, span: Span) -> Resolution {
        match &path.qualifier {
            None => self.resolve_unqualified(scope, &path.name, span),
            Some(q) => self.resolve_qualified(scope, q, &path.name, span),
        }
    }

    fn resolve_unqualified(&self, scope: &FileScope<'_>, name: &str, span: Span) -> Resolution {
        if let Some(id) = self.symbols.lookup_in_file(scope.file, name) {
            return Resolution::Bound(Callee::Function(id));
        }

        let siblings: Vec<FunctionId> = self
            .symbols
            .lookup_in_files(self.graph.files_of(scope.module), name)
            .into_iter()
            .filter(|id| self.symbols.get(*id).is_some_and(|s| s.file != scope.file))
            .collect();
        if let Some(resolution) = self.pick(scope, name, siblings, span) {
            return resolution;
        }

        let mut imported: Vec<FunctionId> = scope.names.get(name).cloned().unwrap_or_default();
        for module in &scope.wildcards {
            for id in self.exported(module, name) {
                if !imported.contains(&id) {
                    imported.push(id);
                }
            }
        }
        if let Some(resolution) = self.pick(scope, name, imported, span) {
            return resolution;
        }

        if scope.failed.iter().any(|f| f.hides_name(name)) {
            return Resolution::Skipped;
        }
        if let Some(op) = self.registry.operation(name) {
            return Resolution::Bound(Callee::Operation(op));
        }
        Resolution::Error(errors::unresolved_reference(scope.file, name, span))
    }

    fn resolve_qualified(&self, scope: &FileScope<'_>, qualifier: &str, name: &str, span: Span) -> Resolution {
        let display = format!("{qualifier}.{name}");

        if qualifier == scope.module {
            let mut candidates = self.symbols.lookup_in_files(self.graph.files_of(scope.module), name);
            if let Some(own) = self.symbols.lookup_in_file(scope.file, name) {
                candidates = vec![own];
            }
            if let Some(resolution) = self.pick(scope, &display, candidates, span) {
                return resolution;
            }
            return self.operation_or(&display, || errors::missing_in_module(scope.file, scope.module, name, span));
        }

        if let Some(module) = scope.qualifiers.get(qualifier) {
            let exported = self.exported(module, name);
            if let Some(resolution) = self.pick(scope, &display, exported, span) {
                return resolution;
            }
            let defined = self.symbols.lookup_in_files(self.graph.files_of(module), name);
            if !defined.is_empty() {
                return Resolution::Error(errors::unexported_call(scope.file, module, name, span));
            }
            return self.operation_or(&display, || errors::missing_in_module(scope.file, module, name, span));
        }

        if scope.failed.iter().any(|f| f.qualifiers.iter().any(|q| q == qualifier)) {
            return Resolution::Skipped;
        }
        self.operation_or(&display, || errors::unknown_qualifier(scope.file, qualifier, name, span))
    }

    /// A qualified spelling that no user function claims may still be a builtin operation (`db.query` next to a
    /// user module named `db`).
    fn operation_or(&self, display: &str, otherwise: impl FnOnce() -> Diagnostic) -> Resolution {
        match self.registry.operation(display) {
            Some(op) => Resolution::Bound(Callee::Operation(op)),
            None => Resolution::Error(otherwise()),
        }
    }
}
