//! Global symbol table for Cadenza programs
//!
//! Holds one [`FunctionSignature`] per declared function across all files, plus the error-type conversions declared
//! by `type E from [...]`. Entries are owned per file: re-collecting a file replaces exactly the entries it
//! contributed and leaves everything else alone.
//!
//! Function ids are interned per `(file, name)` and never reused, so an id stays valid across incremental runs as
//! long as the function keeps its name and file.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use cadenza_core::effects::EffectSet;

use crate::frontend::ast::{Ident, Param, SourceUnit, Span, Spanned, Type};
use crate::frontend::registry::EffectRegistry;

/// Opaque index of a function. Cheap to copy; used as the call-graph node weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u32);

impl FunctionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// A declared function, as seen by the binder and verifiers. Immutable once collected.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub id: FunctionId,
    pub name: Ident,
    pub module: String,
    pub file: PathBuf,
    pub params: Vec<Param>,
    pub return_type: Type,
    /// Effects from the `uses` clause that the registry recognizes.
    pub declared_effects: EffectSet,
    /// Every token from the `uses` clause, in source order, recognized or not.
    pub effect_tokens: Vec<Spanned<Ident>>,
    pub is_pure: bool,
    pub exported: bool,
    pub span: Span,
    pub effects_span: Option<Span>,
}

impl FunctionSignature {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    pub fn returns_result(&self) -> bool {
        self.return_type.is_result()
    }

    /// Tokens the registry does not recognize.
    pub fn unknown_effects<'a>(&'a self, registry: &'a EffectRegistry) -> impl Iterator<Item = &'a Spanned<Ident>> + 'a {
        self.effect_tokens.iter().filter(|t| registry.effect(&t.node).is_none())
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    interner: HashMap<(PathBuf, Ident), FunctionId>,
    next_id: u32,
    functions: BTreeMap<FunctionId, FunctionSignature>,
    by_file: BTreeMap<PathBuf, Vec<FunctionId>>,
    /// Per file: `(target type, source types)` from `type T from [...]`.
    conversions: BTreeMap<PathBuf, Vec<(Ident, Vec<Type>)>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, file: &Path, name: &str) -> FunctionId {
        let key = (file.to_path_buf(), name.to_string());
        if let Some(id) = self.interner.get(&key) {
            return *id;
        }
        let id = FunctionId(self.next_id);
        self.next_id += 1;
        self.interner.insert(key, id);
        id
    }

    /// Collect the declarations of one file into the table, replacing whatever that file contributed before.
    ///
    /// A second function with the same name in the same file is ignored; the first declaration owns the name.
    pub fn collect_file(&mut self, unit: &SourceUnit, module: &str, registry: &EffectRegistry) -> Vec<FunctionId> {
        self.remove_file(&unit.path);

        let mut ids = Vec::new();
        for (decl, span) in unit.functions() {
            let id = self.intern(&unit.path, &decl.name);
            if ids.contains(&id) {
                continue;
            }
            let declared_effects = decl
                .effects
                .iter()
                .filter_map(|t| registry.effect(&t.node))
                .collect();
            self.functions.insert(
                id,
                FunctionSignature {
                    id,
                    name: decl.name.clone(),
                    module: module.to_string(),
                    file: unit.path.clone(),
                    params: decl.params.clone(),
                    return_type: decl.return_type.clone(),
                    declared_effects,
                    effect_tokens: decl.effects.clone(),
                    is_pure: decl.is_pure,
                    exported: unit.exports_name(&decl.name),
                    span,
                    effects_span: decl.effects_span,
                },
            );
            ids.push(id);
        }
        self.by_file.insert(unit.path.clone(), ids.clone());

        let conversions: Vec<(Ident, Vec<Type>)> = unit
            .types()
            .filter(|t| !t.converts_from.is_empty())
            .map(|t| (t.name.clone(), t.converts_from.clone()))
            .collect();
        if !conversions.is_empty() {
            self.conversions.insert(unit.path.clone(), conversions);
        }

        tracing::trace!(file = %unit.path.display(), functions = ids.len(), "collected declarations");
        ids
    }

    /// Drop every entry contributed by `file`. Interned ids are kept so the file can come back with the same ids.
    pub fn remove_file(&mut self, file: &Path) -> Vec<FunctionId> {
        let ids = self.by_file.remove(file).unwrap_or_default();
        for id in &ids {
            self.functions.remove(id);
        }
        self.conversions.remove(file);
        ids
    }

    pub fn clear(&mut self) {
        self.functions.clear();
        self.by_file.clear();
        self.conversions.clear();
    }

    pub fn get(&self, id: FunctionId) -> Option<&FunctionSignature> {
        self.functions.get(&id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions_in_file(&self, file: &Path) -> &[FunctionId] {
        self.by_file.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookup_in_file(&self, file: &Path, name: &str) -> Option<FunctionId> {
        self.functions_in_file(file)
            .iter()
            .copied()
            .find(|id| self.functions.get(id).is_some_and(|s| s.name == name))
    }

    /// Every function named `name` across `files` (the files of one module), in file order.
    pub fn lookup_in_files(&self, files: &[PathBuf], name: &str) -> Vec<FunctionId> {
        files.iter().filter_map(|f| self.lookup_in_file(f, name)).collect()
    }

    /// Find a function by `(file, name)` without interning a new id.
    pub fn find(&self, file: &Path, name: &str) -> Option<FunctionId> {
        self.interner
            .get(&(file.to_path_buf(), name.to_string()))
            .copied()
            .filter(|id| self.functions.contains_key(id))
    }

    /// `true` when values of error type `from` may be propagated with `?` into a function whose error type is `to`.
    pub fn error_converts(&self, from: &Type, to: &Type) -> bool {
        if from == to {
            return true;
        }
        let Type::Named(target) = to else {
            return false;
        };
        self.conversions
            .values()
            .flatten()
            .any(|(name, sources)| name == target && sources.contains(from))
    }

    /// All declared conversions, for change detection.
    pub fn conversions_of(&self, file: &Path) -> BTreeSet<(Ident, Vec<Type>)> {
        self.conversions
            .get(file)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }
}
