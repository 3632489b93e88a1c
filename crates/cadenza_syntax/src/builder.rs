//! Small constructors for building typed ASTs without a parser.
//!
//! Used by tests and by tools that synthesize programs. Nodes are created with empty spans; [`UnitBuilder`] lays the
//! unit out one construct per line (module, imports, then declarations with one line per statement) and stamps
//! every node with a deterministic [`Span`] as it goes.
//!
//! ## Examples
//! ```rust
//! use cadenza_syntax::builder::*;
//!
//! let unit = unit("main.cdz")
//!     .from_import("math", &["divide"])
//!     .function(
//!         function("f")
//!             .param("x", ty("int"))
//!             .uses(&[])
//!             .returns(result(ty("int"), ty("string")))
//!             .body(vec![ret(call("divide", vec![var("x"), int(2)]).of_type(result(ty("int"), ty("string"))))]),
//!     )
//!     .build();
//!
//! let span = find_call(&unit, "divide").expect("call exists");
//! assert_eq!(span.line, 3);
//! ```

use std::path::PathBuf;

use crate::ast::*;
use crate::visit;

/// Column at which function bodies start.
const BODY_INDENT: u32 = 5;

// ============================================================================
// Types
// ============================================================================

pub fn ty(name: &str) -> Type {
    Type::named(name)
}

pub fn result(ok: Type, err: Type) -> Type {
    Type::result(ok, err)
}

pub fn unit_ty() -> Type {
    Type::Unit
}

// ============================================================================
// Expressions
// ============================================================================

fn node<T>(value: T) -> Spanned<T> {
    Spanned::new(value, Span::default())
}

impl Expr {
    /// Attach a static type, as the typer would.
    pub fn of_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call(CallExpr {
        path: CallPath::unqualified(name),
        args: args.into_iter().map(node).collect(),
    }))
}

pub fn qcall(qualifier: &str, name: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call(CallExpr {
        path: CallPath::qualified(qualifier, name),
        args: args.into_iter().map(node).collect(),
    }))
}

/// A call spelled like a builtin operation: `op("db.query", ..)` or `op("print", ..)`.
pub fn op(spelling: &str, args: Vec<Expr>) -> Expr {
    match spelling.split_once('.') {
        Some((qualifier, name)) => qcall(qualifier, name, args),
        None => call(spelling, args),
    }
}

pub fn var(name: &str) -> Expr {
    Expr::new(ExprKind::Ident(name.to_string()))
}

pub fn int(value: i64) -> Expr {
    Expr::typed(ExprKind::Literal(Literal::Int(value)), ty("int"))
}

pub fn string(value: &str) -> Expr {
    Expr::typed(ExprKind::Literal(Literal::Str(value.to_string())), ty("string"))
}

pub fn try_(inner: Expr) -> Expr {
    let ty = inner.ty.as_ref().and_then(|t| t.result_ok_type()).cloned();
    Expr {
        kind: ExprKind::Try(Box::new(node(inner))),
        ty,
    }
}

pub fn ok(value: Expr) -> Expr {
    Expr::new(ExprKind::Constructor("Ok".to_string(), vec![node(value)]))
}

pub fn err(value: Expr) -> Expr {
    Expr::new(ExprKind::Constructor("Err".to_string(), vec![node(value)]))
}

pub fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
    Expr::new(ExprKind::Binary(Box::new(node(lhs)), op, Box::new(node(rhs))))
}

pub fn match_(scrutinee: Expr, arms: Vec<MatchArm>) -> Expr {
    Expr::new(ExprKind::Match(
        Box::new(node(scrutinee)),
        arms.into_iter().map(node).collect(),
    ))
}

pub fn arm(pattern: Pattern, body: Vec<Stmt>) -> MatchArm {
    MatchArm {
        pattern: node(pattern),
        body: MatchBody::Block(body.into_iter().map(node).collect()),
    }
}

pub fn arm_expr(pattern: Pattern, body: Expr) -> MatchArm {
    MatchArm {
        pattern: node(pattern),
        body: MatchBody::Expr(node(body)),
    }
}

pub fn p_ok(binding: &str) -> Pattern {
    Pattern::Constructor("Ok".to_string(), vec![node(Pattern::Binding(binding.to_string()))])
}

pub fn p_err(binding: &str) -> Pattern {
    Pattern::Constructor("Err".to_string(), vec![node(Pattern::Binding(binding.to_string()))])
}

pub fn p_wild() -> Pattern {
    Pattern::Wildcard
}

/// `if subject.is_ok() { then } else { otherwise }`
pub fn if_ok(subject: Expr, then_body: Vec<Stmt>, else_body: Option<Vec<Stmt>>) -> Expr {
    status_branch(subject, StatusCheck::IsOk, then_body, else_body)
}

/// `if subject.is_err() { then } else { otherwise }`
pub fn if_err(subject: Expr, then_body: Vec<Stmt>, else_body: Option<Vec<Stmt>>) -> Expr {
    status_branch(subject, StatusCheck::IsErr, then_body, else_body)
}

fn status_branch(subject: Expr, check: StatusCheck, then_body: Vec<Stmt>, else_body: Option<Vec<Stmt>>) -> Expr {
    Expr::new(ExprKind::StatusBranch(Box::new(StatusBranch {
        subject: node(subject),
        check,
        then_body: then_body.into_iter().map(node).collect(),
        else_body: else_body.map(|b| b.into_iter().map(node).collect()),
    })))
}

pub fn value() -> Expr {
    Expr::new(ExprKind::ResultAccess(ResultField::Value))
}

pub fn error() -> Expr {
    Expr::new(ExprKind::ResultAccess(ResultField::Error))
}

// ============================================================================
// Statements
// ============================================================================

pub fn expr(e: Expr) -> Stmt {
    Stmt::Expr(node(e))
}

pub fn let_(name: &str, value: Expr) -> Stmt {
    Stmt::Let {
        name: name.to_string(),
        ty: value.ty.clone(),
        value: node(value),
    }
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::Return(Some(node(value)))
}

pub fn ret_unit() -> Stmt {
    Stmt::Return(None)
}

pub fn if_(condition: Expr, then_body: Vec<Stmt>, else_body: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If {
        condition: node(condition),
        then_body: then_body.into_iter().map(node).collect(),
        else_body: else_body.map(|b| b.into_iter().map(node).collect()),
    }
}

pub fn while_(condition: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        condition: node(condition),
        body: body.into_iter().map(node).collect(),
    }
}

// ============================================================================
// Functions
// ============================================================================

pub fn function(name: &str) -> FnBuilder {
    FnBuilder {
        name: name.to_string(),
        params: Vec::new(),
        return_type: Type::Unit,
        effects: None,
        is_pure: false,
        body: Vec::new(),
    }
}

/// Builder for a [`FunctionDecl`]; spans are assigned when it is added to a [`UnitBuilder`].
#[derive(Debug, Clone)]
pub struct FnBuilder {
    name: String,
    params: Vec<Param>,
    return_type: Type,
    effects: Option<Vec<String>>,
    is_pure: bool,
    body: Vec<Stmt>,
}

impl FnBuilder {
    pub fn param(mut self, name: &str, ty: Type) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.return_type = ty;
        self
    }

    /// Add a `uses [...]` clause. An empty slice still produces a (empty) clause.
    pub fn uses(mut self, effects: &[&str]) -> Self {
        self.effects = Some(effects.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn pure(mut self) -> Self {
        self.is_pure = true;
        self
    }

    pub fn body(mut self, stmts: Vec<Stmt>) -> Self {
        self.body = stmts;
        self
    }
}

// ============================================================================
// Units
// ============================================================================

pub fn unit(path: impl Into<PathBuf>) -> UnitBuilder {
    UnitBuilder {
        unit: SourceUnit::new(path),
        line: 0,
    }
}

#[derive(Debug, Clone)]
pub struct UnitBuilder {
    unit: SourceUnit,
    line: u32,
}

impl UnitBuilder {
    fn next_line(&mut self) -> u32 {
        self.line += 1;
        self.line
    }

    pub fn module(mut self, name: &str) -> Self {
        let line = self.next_line();
        self.unit.module = Some(Spanned::new(name.to_string(), Span::new(line, 8, len(name))));
        self
    }

    fn push_import(&mut self, target: ImportTarget, items: ImportItems, alias: Option<&str>) {
        let line = self.next_line();
        let items = match items {
            ImportItems::Names(names) => {
                let mut column = 8;
                ImportItems::Names(
                    names
                        .into_iter()
                        .map(|mut item| {
                            item.span = Span::new(line, column, len(&item.node.name));
                            column += len(&item.node.name) + 2;
                            item
                        })
                        .collect(),
                )
            }
            other => other,
        };
        let width = len(&target.to_string()) + 7;
        self.unit.imports.push(Spanned::new(
            ImportDecl {
                target,
                items,
                alias: alias.map(str::to_string),
            },
            Span::new(line, 1, width),
        ));
    }

    /// `import name`
    pub fn import(mut self, module: &str) -> Self {
        self.push_import(ImportTarget::Module(module.to_string()), ImportItems::Module, None);
        self
    }

    /// `import name as alias`
    pub fn import_as(mut self, module: &str, alias: &str) -> Self {
        self.push_import(ImportTarget::Module(module.to_string()), ImportItems::Module, Some(alias));
        self
    }

    /// `import "path"`
    pub fn import_file(mut self, path: &str) -> Self {
        self.push_import(ImportTarget::File(path.to_string()), ImportItems::Module, None);
        self
    }

    /// `from module import a, b`
    pub fn from_import(mut self, module: &str, names: &[&str]) -> Self {
        let items = names
            .iter()
            .map(|n| {
                node(ImportItem {
                    name: n.to_string(),
                    alias: None,
                })
            })
            .collect();
        self.push_import(ImportTarget::Module(module.to_string()), ImportItems::Names(items), None);
        self
    }

    /// `from module import *`
    pub fn from_import_all(mut self, module: &str) -> Self {
        self.push_import(ImportTarget::Module(module.to_string()), ImportItems::Wildcard, None);
        self
    }

    /// `export a, b` (recorded now, placed wherever the builder is)
    pub fn export(mut self, names: &[&str]) -> Self {
        let line = self.next_line();
        let mut column = 8;
        for name in names {
            self.unit
                .exports
                .push(Spanned::new(name.to_string(), Span::new(line, column, len(name))));
            column += len(name) + 2;
        }
        self
    }

    /// `type name from [sources]`
    pub fn type_from(mut self, name: &str, sources: &[&str]) -> Self {
        let line = self.next_line();
        self.unit.declarations.push(Spanned::new(
            Declaration::Type(TypeDecl {
                name: name.to_string(),
                converts_from: sources.iter().map(|s| ty(s)).collect(),
            }),
            Span::new(line, 1, len(name) + 5),
        ));
        self
    }

    pub fn function(mut self, f: FnBuilder) -> Self {
        let header = self.next_line();
        let name_column = if f.is_pure { 15 } else { 10 };
        let mut column = name_column + len(&f.name) + 2;

        let (effects, effects_span) = match f.effects {
            Some(tokens) => {
                let clause_start = column;
                column += 6;
                let spanned: Vec<Spanned<Ident>> = tokens
                    .into_iter()
                    .map(|t| {
                        let span = Span::new(header, column, len(&t));
                        column += len(&t) + 2;
                        Spanned::new(t, span)
                    })
                    .collect();
                (spanned, Some(Span::new(header, clause_start, column - clause_start)))
            }
            None => (Vec::new(), None),
        };

        let mut body: Vec<Spanned<Stmt>> = f.body.into_iter().map(node).collect();
        for stmt in &mut body {
            self.stamp_stmt(stmt);
        }
        self.next_line(); // closing brace

        self.unit.declarations.push(Spanned::new(
            Declaration::Function(FunctionDecl {
                name: f.name.clone(),
                params: f.params,
                return_type: f.return_type,
                effects,
                effects_span,
                is_pure: f.is_pure,
                body,
            }),
            Span::new(header, name_column, len(&f.name)),
        ));
        self
    }

    /// Attach source text (used for snippets and rendering).
    pub fn source(mut self, text: &str) -> Self {
        self.unit.source = Some(text.to_string());
        self
    }

    pub fn build(self) -> SourceUnit {
        self.unit
    }

    fn stamp_stmt(&mut self, stmt: &mut Spanned<Stmt>) {
        let line = self.next_line();
        stmt.span = Span::new(line, BODY_INDENT, 1);
        let mut column = BODY_INDENT;
        match &mut stmt.node {
            Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
                self.stamp_expr(value, line, &mut column)
            }
            Stmt::Return(value) => {
                column += 7;
                if let Some(value) = value {
                    self.stamp_expr(value, line, &mut column);
                }
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                column += 3;
                self.stamp_expr(condition, line, &mut column);
                self.stamp_block(then_body, else_body.as_mut());
            }
            Stmt::While { condition, body } => {
                column += 6;
                self.stamp_expr(condition, line, &mut column);
                self.stamp_block(body, None);
            }
        }
    }

    fn stamp_block(&mut self, then_body: &mut [Spanned<Stmt>], else_body: Option<&mut Vec<Spanned<Stmt>>>) {
        for stmt in then_body.iter_mut() {
            self.stamp_stmt(stmt);
        }
        if let Some(else_body) = else_body {
            self.next_line(); // `} else {`
            for stmt in else_body.iter_mut() {
                self.stamp_stmt(stmt);
            }
        }
        self.next_line(); // `}`
    }

    fn stamp_expr(&mut self, expr: &mut Spanned<Expr>, line: u32, column: &mut u32) {
        let width = match &expr.node.kind {
            ExprKind::Call(c) => len(&c.path.to_string()) + 2,
            ExprKind::Ident(name) => len(name),
            _ => 1,
        };
        expr.span = Span::new(line, *column, width);
        *column += width + 1;

        match &mut expr.node.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::ResultAccess(_) => {}
            ExprKind::Call(c) => {
                for arg in &mut c.args {
                    self.stamp_expr(arg, line, column);
                }
            }
            ExprKind::Constructor(_, args) => {
                for arg in args {
                    self.stamp_expr(arg, line, column);
                }
            }
            ExprKind::Try(inner) | ExprKind::Paren(inner) | ExprKind::Unary(_, inner) => {
                self.stamp_expr(inner, line, column);
            }
            ExprKind::Binary(lhs, _, rhs) => {
                self.stamp_expr(lhs, line, column);
                self.stamp_expr(rhs, line, column);
            }
            ExprKind::Match(scrutinee, arms) => {
                self.stamp_expr(scrutinee, line, column);
                for arm in arms {
                    let arm_line = self.next_line();
                    arm.span = Span::new(arm_line, BODY_INDENT + 4, 1);
                    arm.node.pattern.span = arm.span;
                    match &mut arm.node.body {
                        MatchBody::Expr(e) => {
                            let mut arm_column = BODY_INDENT + 12;
                            self.stamp_expr(e, arm_line, &mut arm_column);
                        }
                        MatchBody::Block(stmts) => {
                            for stmt in stmts.iter_mut() {
                                self.stamp_stmt(stmt);
                            }
                        }
                    }
                }
                self.next_line();
            }
            ExprKind::StatusBranch(branch) => {
                self.stamp_expr(&mut branch.subject, line, column);
                self.stamp_block(&mut branch.then_body, branch.else_body.as_mut());
            }
        }
    }
}

fn len(text: &str) -> u32 {
    u32::try_from(text.chars().count()).unwrap_or(u32::MAX)
}

// ============================================================================
// Lookups
// ============================================================================

/// Span of the first call to `name` (compared against the full call path, e.g. `divide` or `db.query`).
pub fn find_call(unit: &SourceUnit, name: &str) -> Option<Span> {
    find_nth_call(unit, name, 0)
}

/// Span of the `n`th (0-based) call to `name`, in source order across all functions.
pub fn find_nth_call(unit: &SourceUnit, name: &str, n: usize) -> Option<Span> {
    let mut found = Vec::new();
    for (f, _) in unit.functions() {
        visit::walk_block(&f.body, &mut |e: &Spanned<Expr>| {
            if let ExprKind::Call(c) = &e.node.kind {
                if c.path.to_string() == name {
                    found.push(e.span);
                }
            }
        });
    }
    found.get(n).copied()
}
