//! Read-only traversal over function bodies.
//!
//! Expressions are visited in pre-order and in source order: a call is visited before its arguments, a statement's
//! own expressions before any nested block. Consumers that only care about "every expression" (call collection,
//! lookups in tests) use these walkers; verifiers that need context (enclosing statement, discharge position) walk the
//! tree themselves.

use crate::ast::{Expr, ExprKind, MatchBody, Spanned, Stmt};

/// Visit every expression in `stmts`.
pub fn walk_block<'a, F>(stmts: &'a [Spanned<Stmt>], f: &mut F)
where
    F: FnMut(&'a Spanned<Expr>),
{
    for stmt in stmts {
        walk_stmt(stmt, f);
    }
}

pub fn walk_stmt<'a, F>(stmt: &'a Spanned<Stmt>, f: &mut F)
where
    F: FnMut(&'a Spanned<Expr>),
{
    match &stmt.node {
        Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => walk_expr(value, f),
        Stmt::Return(value) => {
            if let Some(value) = value {
                walk_expr(value, f);
            }
        }
        Stmt::If {
            condition,
            then_body,
            else_body,
        } => {
            walk_expr(condition, f);
            walk_block(then_body, f);
            if let Some(else_body) = else_body {
                walk_block(else_body, f);
            }
        }
        Stmt::While { condition, body } => {
            walk_expr(condition, f);
            walk_block(body, f);
        }
    }
}

pub fn walk_expr<'a, F>(expr: &'a Spanned<Expr>, f: &mut F)
where
    F: FnMut(&'a Spanned<Expr>),
{
    f(expr);
    match &expr.node.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::ResultAccess(_) => {}
        ExprKind::Call(call) => {
            for arg in &call.args {
                walk_expr(arg, f);
            }
        }
        ExprKind::Constructor(_, args) => {
            for arg in args {
                walk_expr(arg, f);
            }
        }
        ExprKind::Try(inner) | ExprKind::Paren(inner) | ExprKind::Unary(_, inner) => walk_expr(inner, f),
        ExprKind::Binary(lhs, _, rhs) => {
            walk_expr(lhs, f);
            walk_expr(rhs, f);
        }
        ExprKind::Match(scrutinee, arms) => {
            walk_expr(scrutinee, f);
            for arm in arms {
                match &arm.node.body {
                    MatchBody::Expr(e) => walk_expr(e, f),
                    MatchBody::Block(stmts) => walk_block(stmts, f),
                }
            }
        }
        ExprKind::StatusBranch(branch) => {
            walk_expr(&branch.subject, f);
            walk_block(&branch.then_body, f);
            if let Some(else_body) = &branch.else_body {
                walk_block(else_body, f);
            }
        }
    }
}
