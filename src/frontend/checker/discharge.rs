//! Result-discharge verification.
//!
//! Every call whose static type is `Result<T, E>` must be consumed before its statement completes, either by `?` or
//! by a branch that handles both variants. Binding a Result with `let`, returning it, or dropping it on the floor all
//! leave it undischarged.
//!
//! The walk is a single pass over each body in statement order. The only state carried down the tree is the
//! *position* of the current expression: plain, direct operand of `?`, or scrutinee of a branch (and which variants
//! that branch covers).

use std::collections::HashSet;

use crate::frontend::ast::{
    Expr, ExprKind, FunctionDecl, MatchArm, MatchBody, Pattern, SourceUnit, Span, Spanned, StatusCheck, Stmt, Type,
};
use crate::frontend::binder::{BoundFile, BoundFunction, Callee};
use crate::frontend::diagnostics::{Diagnostic, errors};
use crate::frontend::symbols::{FunctionId, FunctionSignature, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DischargeState {
    Undischarged,
    DischargedByPropagation,
    DischargedByMatch,
}

/// One Result-typed call and what happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultExpression {
    pub function: FunctionId,
    pub callee: String,
    pub span: Span,
    /// Innermost statement containing the call.
    pub statement: Span,
    pub state: DischargeState,
}

#[derive(Debug, Clone, Default)]
pub struct FileDischarge {
    pub diagnostics: Vec<Diagnostic>,
    pub expressions: Vec<ResultExpression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Plain,
    Propagated,
    Scrutinized { handles_ok: bool, handles_err: bool },
}

pub struct DischargeVerifier<'a> {
    symbols: &'a SymbolTable,
}

impl<'a> DischargeVerifier<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self { symbols }
    }

    #[tracing::instrument(skip_all, fields(file = %unit.path.display()))]
    pub fn check_file(&self, unit: &SourceUnit, bound: &BoundFile) -> FileDischarge {
        let mut out = FileDischarge::default();
        let mut seen = HashSet::new();
        for (decl, _) in unit.functions() {
            let Some(id) = self.symbols.find(&unit.path, &decl.name) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            let (Some(signature), Some(body)) = (self.symbols.get(id), bound.function(id)) else {
                continue;
            };
            if body.poisoned {
                continue;
            }
            let mut walker = BodyWalker {
                symbols: self.symbols,
                signature,
                body,
                statement: Span::default(),
                out: &mut out,
            };
            walker.walk_function(decl);
        }
        tracing::trace!(
            expressions = out.expressions.len(),
            diagnostics = out.diagnostics.len(),
            "discharge checked"
        );
        out
    }
}

struct BodyWalker<'a, 'o> {
    symbols: &'a SymbolTable,
    signature: &'a FunctionSignature,
    body: &'a BoundFunction,
    statement: Span,
    out: &'o mut FileDischarge,
}

impl BodyWalker<'_, '_> {
    fn walk_function(&mut self, decl: &FunctionDecl) {
        self.walk_block(&decl.body);
    }

    fn walk_block(&mut self, stmts: &[Spanned<Stmt>]) {
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &Spanned<Stmt>) {
        let outer = self.statement;
        self.statement = stmt.span;
        match &stmt.node {
            Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
                self.walk_expr(value, Position::Plain)
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.walk_expr(value, Position::Plain);
                }
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                self.walk_expr(condition, Position::Plain);
                self.walk_block(then_body);
                if let Some(else_body) = else_body {
                    self.walk_block(else_body);
                }
            }
            Stmt::While { condition, body } => {
                self.walk_expr(condition, Position::Plain);
                self.walk_block(body);
            }
        }
        self.statement = outer;
    }

    /// Static type of `expr`, falling back to the bound callee's declared return type for calls the typer left
    /// untyped.
    fn type_of<'e>(&'e self, expr: &'e Spanned<Expr>) -> Option<&'e Type> {
        if let Some(ty) = &expr.node.ty {
            return Some(ty);
        }
        match &expr.node.kind {
            ExprKind::Call(_) => match self.body.callee_at(expr.span)? {
                Callee::Function(id) => self.symbols.get(id).map(|s| &s.return_type),
                Callee::Operation(_) => None,
            },
            ExprKind::Paren(inner) => self.type_of(inner),
            _ => None,
        }
    }

    fn walk_expr(&mut self, expr: &Spanned<Expr>, position: Position) {
        match &expr.node.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::ResultAccess(_) => {}
            ExprKind::Call(call) => {
                if self.type_of(expr).is_some_and(Type::is_result) {
                    self.record(call.path.to_string(), expr.span, position);
                }
                for arg in &call.args {
                    self.walk_expr(arg, Position::Plain);
                }
            }
            ExprKind::Try(operand) => {
                self.check_propagation(expr.span, operand);
                self.walk_expr(operand, Position::Propagated);
            }
            ExprKind::Paren(inner) => self.walk_expr(inner, position),
            ExprKind::Match(scrutinee, arms) => {
                let (handles_ok, handles_err) = coverage(arms);
                self.walk_expr(
                    scrutinee,
                    Position::Scrutinized {
                        handles_ok,
                        handles_err,
                    },
                );
                for arm in arms {
                    match &arm.node.body {
                        MatchBody::Expr(e) => self.walk_expr(e, Position::Plain),
                        MatchBody::Block(stmts) => self.walk_block(stmts),
                    }
                }
            }
            ExprKind::StatusBranch(branch) => {
                let has_else = branch.else_body.is_some();
                let position = match branch.check {
                    StatusCheck::IsOk => Position::Scrutinized {
                        handles_ok: true,
                        handles_err: has_else,
                    },
                    StatusCheck::IsErr => Position::Scrutinized {
                        handles_ok: has_else,
                        handles_err: true,
                    },
                };
                self.walk_expr(&branch.subject, position);
                self.walk_block(&branch.then_body);
                if let Some(else_body) = &branch.else_body {
                    self.walk_block(else_body);
                }
            }
            ExprKind::Constructor(_, args) => {
                for arg in args {
                    self.walk_expr(arg, Position::Plain);
                }
            }
            ExprKind::Binary(lhs, _, rhs) => {
                self.walk_expr(lhs, Position::Plain);
                self.walk_expr(rhs, Position::Plain);
            }
            ExprKind::Unary(_, inner) => self.walk_expr(inner, Position::Plain),
        }
    }

    fn record(&mut self, callee: String, span: Span, position: Position) {
        let signature = self.signature;
        let file = &signature.file;
        let state = match position {
            Position::Plain => {
                self.out.diagnostics.push(errors::unused_result(file, &callee, span));
                DischargeState::Undischarged
            }
            Position::Propagated => DischargeState::DischargedByPropagation,
            Position::Scrutinized {
                handles_ok: true,
                handles_err: true,
            } => DischargeState::DischargedByMatch,
            Position::Scrutinized { handles_ok, .. } => {
                let missing = if handles_ok { "Err" } else { "Ok" };
                self.out
                    .diagnostics
                    .push(errors::partially_handled_result(file, &callee, missing, span));
                DischargeState::Undischarged
            }
        };
        self.out.expressions.push(ResultExpression {
            function: signature.id,
            callee,
            span,
            statement: self.statement,
            state,
        });
    }

    /// `operand?` is only valid inside a Result-returning function, on a Result operand whose error type converts
    /// into the function's.
    fn check_propagation(&mut self, span: Span, operand: &Spanned<Expr>) {
        let signature = self.signature;
        let Some(expected) = signature.return_type.result_err_type() else {
            let returns = signature.return_type.to_string();
            let diagnostic = errors::propagation_outside_result(&signature.file, &signature.name, &returns, span);
            self.out.diagnostics.push(diagnostic);
            return;
        };
        let diagnostic = match self.type_of(operand) {
            None => None,
            Some(found) => match found.result_err_type() {
                None => Some(errors::propagation_on_non_result(&signature.file, &found.to_string(), span)),
                Some(found) if !self.symbols.error_converts(found, expected) => Some(errors::incompatible_error_type(
                    &signature.file,
                    &expected.to_string(),
                    &found.to_string(),
                    span,
                )),
                Some(_) => None,
            },
        };
        if let Some(diagnostic) = diagnostic {
            self.out.diagnostics.push(diagnostic);
        }
    }
}

/// Which variants a set of match arms covers. A wildcard or plain binding covers both.
fn coverage(arms: &[Spanned<MatchArm>]) -> (bool, bool) {
    let mut ok = false;
    let mut err = false;
    for arm in arms {
        match &arm.node.pattern.node {
            Pattern::Wildcard | Pattern::Binding(_) => return (true, true),
            Pattern::Constructor(name, _) if name == "Ok" => ok = true,
            Pattern::Constructor(name, _) if name == "Err" => err = true,
            Pattern::Constructor(..) | Pattern::Literal(_) => {}
        }
    }
    (ok, err)
}
