//! Effect inference and verification.
//!
//! A function's *required* effects are the effects of the builtin operations it calls plus the required effects of
//! every function it calls, transitively. Inference runs per SCC in callee-first order; inside an SCC the members'
//! sets are re-unioned until a full pass changes nothing. Sets only grow and the registry is finite, so this always
//! terminates.
//!
//! Verification then compares required against declared:
//!
//! - `pure` functions must require and declare nothing (one violation per function).
//! - Every required-but-undeclared effect is an `EffectCompletenessError` at the call that introduced it.
//! - Every declared-but-unrequired effect is an `EffectMinimalityWarning` at its token, unless the function's
//!   required set is only a lower bound (it, or something it calls, is not fully bound).

use std::collections::{BTreeMap, HashMap, HashSet};

use cadenza_core::effects::EffectSet;
use cadenza_core::lang::effects::EffectId;
use cadenza_core::lang::operations::{self, OperationId};

use crate::frontend::ast::Span;
use crate::frontend::binder::{BoundFunction, Callee};
use crate::frontend::diagnostics::{Diagnostic, errors};
use crate::frontend::registry::EffectRegistry;
use crate::frontend::symbols::{FunctionId, FunctionSignature, SymbolTable};

/// Where a required effect enters a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Operation { op: OperationId, span: Span },
    Call { callee: FunctionId, span: Span },
    /// The function was not analyzed; its declaration is taken at face value.
    Declared,
}

impl Origin {
    pub fn span(&self) -> Option<Span> {
        match self {
            Origin::Operation { span, .. } | Origin::Call { span, .. } => Some(*span),
            Origin::Declared => None,
        }
    }
}

/// Fixed-point result for one function.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSummary {
    pub required: EffectSet,
    pub origins: BTreeMap<EffectId, Origin>,
    /// `false` when the function or anything it reaches is not fully bound; `required` is then a lower bound.
    pub complete: bool,
}

impl EffectSummary {
    fn declared(signature: &FunctionSignature) -> Self {
        Self {
            required: signature.declared_effects,
            origins: signature.declared_effects.iter().map(|e| (e, Origin::Declared)).collect(),
            complete: true,
        }
    }
}

pub struct EffectVerifier<'a> {
    symbols: &'a SymbolTable,
    bodies: &'a HashMap<FunctionId, &'a BoundFunction>,
    registry: &'a EffectRegistry,
}

impl<'a> EffectVerifier<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        bodies: &'a HashMap<FunctionId, &'a BoundFunction>,
        registry: &'a EffectRegistry,
    ) -> Self {
        Self {
            symbols,
            bodies,
            registry,
        }
    }

    /// Infer summaries for `sccs` (given in callee-first order). Callees outside these SCCs are looked up in
    /// `cached`; functions without a bound body fall back to their declaration.
    #[tracing::instrument(skip_all, fields(sccs = sccs.len()))]
    pub fn infer(
        &self,
        sccs: &[&[FunctionId]],
        cached: &HashMap<FunctionId, EffectSummary>,
    ) -> HashMap<FunctionId, EffectSummary> {
        let mut done: HashMap<FunctionId, EffectSummary> = HashMap::new();
        for members in sccs {
            self.infer_scc(members, cached, &mut done);
        }
        done
    }

    fn external<'s>(
        &self,
        id: FunctionId,
        cached: &'s HashMap<FunctionId, EffectSummary>,
        done: &'s HashMap<FunctionId, EffectSummary>,
    ) -> Option<&'s EffectSummary> {
        done.get(&id).or_else(|| cached.get(&id))
    }

    /// Effects one call contributes, given the members' current sets.
    fn contribution(
        &self,
        callee: Callee,
        current: &HashMap<FunctionId, EffectSet>,
        cached: &HashMap<FunctionId, EffectSummary>,
        done: &HashMap<FunctionId, EffectSummary>,
    ) -> EffectSet {
        match callee {
            Callee::Operation(op) => [self.registry.effect_of(op)].into_iter().collect(),
            Callee::Function(id) => {
                if let Some(set) = current.get(&id) {
                    return *set;
                }
                if let Some(summary) = self.external(id, cached, done) {
                    return summary.required;
                }
                self.symbols.get(id).map(|s| s.declared_effects).unwrap_or_default()
            }
        }
    }

    fn infer_scc(
        &self,
        members: &[FunctionId],
        cached: &HashMap<FunctionId, EffectSummary>,
        done: &mut HashMap<FunctionId, EffectSummary>,
    ) {
        let (analyzed, unanalyzed): (Vec<FunctionId>, Vec<FunctionId>) =
            members.iter().copied().partition(|id| self.bodies.contains_key(id));

        for id in unanalyzed {
            if let Some(signature) = self.symbols.get(id) {
                done.insert(id, EffectSummary::declared(signature));
            }
        }
        if analyzed.is_empty() {
            return;
        }

        let mut current: HashMap<FunctionId, EffectSet> =
            analyzed.iter().map(|id| (*id, EffectSet::empty())).collect();
        let mut iterations = 0usize;
        loop {
            iterations += 1;
            let mut changed = false;
            for id in &analyzed {
                let Some(body) = self.bodies.get(id) else {
                    continue;
                };
                let mut required = current.get(id).copied().unwrap_or_default();
                for site in &body.calls {
                    required = required.union(self.contribution(site.callee, &current, cached, done));
                }
                if current.get(id) != Some(&required) {
                    current.insert(*id, required);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        tracing::trace!(members = analyzed.len(), iterations, "effect fixed point reached");

        let analyzed_set: HashSet<FunctionId> = analyzed.iter().copied().collect();
        let mut complete: HashMap<FunctionId, bool> = HashMap::new();
        for id in &analyzed {
            let Some(body) = self.bodies.get(id) else {
                continue;
            };
            let outside_ok = body.calls.iter().all(|site| match site.callee {
                Callee::Function(c) if !analyzed_set.contains(&c) => {
                    self.external(c, cached, done).is_none_or(|s| s.complete)
                }
                _ => true,
            });
            complete.insert(*id, !body.poisoned && outside_ok);
        }
        loop {
            let mut changed = false;
            for id in &analyzed {
                let Some(body) = self.bodies.get(id) else {
                    continue;
                };
                if complete.get(id) != Some(&true) {
                    continue;
                }
                let reaches_incomplete = body.calls.iter().any(|site| match site.callee {
                    Callee::Function(c) => complete.get(&c) == Some(&false),
                    Callee::Operation(_) => false,
                });
                if reaches_incomplete {
                    complete.insert(*id, false);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for id in &analyzed {
            let Some(body) = self.bodies.get(id) else {
                continue;
            };
            // Direct operations first, then calls leaving the SCC, then calls within it, so chains point at the
            // operation rather than looping through recursion.
            let rank = |callee: Callee| match callee {
                Callee::Operation(_) => 0,
                Callee::Function(c) if !analyzed_set.contains(&c) => 1,
                Callee::Function(_) => 2,
            };
            let mut sites: Vec<_> = body.calls.iter().collect();
            sites.sort_by_key(|site| rank(site.callee));
            let mut origins = BTreeMap::new();
            for site in sites {
                let origin = match site.callee {
                    Callee::Operation(op) => Origin::Operation { op, span: site.span },
                    Callee::Function(callee) => Origin::Call { callee, span: site.span },
                };
                for effect in self.contribution(site.callee, &current, cached, done).iter() {
                    origins.entry(effect).or_insert(origin);
                }
            }
            let summary = EffectSummary {
                required: current.get(id).copied().unwrap_or_default(),
                origins,
                complete: complete.get(id).copied().unwrap_or(false),
            };
            done.insert(*id, summary);
        }
    }

    /// Diagnostics for one analyzed, fully bound function.
    pub fn check(
        &self,
        id: FunctionId,
        summaries: &HashMap<FunctionId, EffectSummary>,
        ignore: EffectSet,
    ) -> Vec<Diagnostic> {
        let (Some(signature), Some(body), Some(summary)) =
            (self.symbols.get(id), self.bodies.get(&id), summaries.get(&id))
        else {
            return Vec::new();
        };
        if body.poisoned {
            return Vec::new();
        }

        if signature.is_pure {
            return self.check_pure(signature, body, summary, summaries).into_iter().collect();
        }

        let mut diagnostics = Vec::new();
        let declared = signature.declared_effects;

        for effect in summary.required.difference(declared).iter() {
            let span = summary
                .origins
                .get(&effect)
                .and_then(Origin::span)
                .unwrap_or(signature.span);
            let chain = self.chain(id, effect, summaries);
            diagnostics.push(errors::missing_effect(
                &signature.file,
                &signature.name,
                effect,
                &chain,
                declared.union(summary.required),
                span,
            ));
        }

        if summary.complete {
            for token in &signature.effect_tokens {
                let Some(effect) = self.registry.effect(&token.node) else {
                    continue;
                };
                if !summary.required.contains(effect) && !ignore.contains(effect) {
                    diagnostics.push(errors::unused_effect(&signature.file, &signature.name, effect, token.span));
                }
            }
        }

        diagnostics
    }

    fn check_pure(
        &self,
        signature: &FunctionSignature,
        body: &BoundFunction,
        summary: &EffectSummary,
        summaries: &HashMap<FunctionId, EffectSummary>,
    ) -> Option<Diagnostic> {
        if !summary.required.is_empty() {
            for site in &body.calls {
                let (name, effects) = match site.callee {
                    Callee::Operation(op) => (
                        operations::as_str(op).to_string(),
                        [self.registry.effect_of(op)].into_iter().collect::<EffectSet>(),
                    ),
                    Callee::Function(callee) => {
                        let effects = summaries
                            .get(&callee)
                            .map(|s| s.required)
                            .or_else(|| self.symbols.get(callee).map(|s| s.declared_effects))
                            .unwrap_or_default();
                        let name = self.symbols.get(callee).map(|s| s.name.clone()).unwrap_or_default();
                        (name, effects)
                    }
                };
                if !effects.is_empty() {
                    return Some(errors::pure_calls_effectful(
                        &signature.file,
                        &signature.name,
                        &name,
                        effects,
                        site.span,
                    ));
                }
            }
        }
        if !signature.effect_tokens.is_empty() {
            let span = signature.effects_span.unwrap_or(signature.span);
            return Some(errors::pure_declares_effects(
                &signature.file,
                &signature.name,
                signature.declared_effects,
                span,
            ));
        }
        None
    }

    /// `f -> g -> db.query`: the path through which `effect` reaches `id`.
    fn chain(&self, id: FunctionId, effect: EffectId, summaries: &HashMap<FunctionId, EffectSummary>) -> String {
        let name_of = |id: FunctionId| self.symbols.get(id).map(|s| s.name.clone()).unwrap_or_default();
        let mut parts = vec![name_of(id)];
        let mut visited = HashSet::from([id]);
        let mut current = id;
        loop {
            match summaries.get(&current).and_then(|s| s.origins.get(&effect)) {
                Some(Origin::Operation { op, .. }) => {
                    parts.push(operations::as_str(*op).to_string());
                    break;
                }
                Some(Origin::Call { callee, .. }) => {
                    parts.push(name_of(*callee));
                    if !visited.insert(*callee) {
                        break;
                    }
                    current = *callee;
                }
                Some(Origin::Declared) => {
                    parts.push(format!("(declared `uses` of `{}`)", name_of(current)));
                    break;
                }
                None => break,
            }
        }
        parts.join(" -> ")
    }
}
