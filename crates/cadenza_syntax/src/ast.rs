//! Abstract Syntax Tree definitions for Cadenza
//!
//! The tree is *typed*: the external parser/typer attaches the static type of every expression (`Expr::ty`),
//! including the type arguments of `Result<T, E>`. The verification engine never infers expression types.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Source location: 1-based line and column plus the length of the node in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub len: u32,
}

impl Span {
    pub fn new(line: u32, column: u32, len: u32) -> Self {
        Self { line, column, len }
    }
}

/// A node with source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

pub type Ident = String;

/// Conventional file extension for Cadenza sources.
pub const SOURCE_EXTENSION: &str = "cdz";

// ============================================================================
// Source units
// ============================================================================

/// One parsed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// `module foo` declaration, if any. Files without one form an implicit module named after their path.
    #[serde(default)]
    pub module: Option<Spanned<Ident>>,
    #[serde(default)]
    pub imports: Vec<Spanned<ImportDecl>>,
    #[serde(default)]
    pub declarations: Vec<Spanned<Declaration>>,
    /// Names listed in the file's `export` clause.
    #[serde(default)]
    pub exports: Vec<Spanned<Ident>>,
    /// Original text, used for snippets and rendering. Optional: diagnostics carry line/column regardless.
    #[serde(default)]
    pub source: Option<String>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            module: None,
            imports: Vec::new(),
            declarations: Vec::new(),
            exports: Vec::new(),
            source: None,
        }
    }

    pub fn declared_module(&self) -> Option<&str> {
        self.module.as_ref().map(|m| m.node.as_str())
    }

    /// Name of the implicit module a file forms when it declares none: its path without extension.
    pub fn implicit_module_name(&self) -> String {
        implicit_module_name(&self.path)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&FunctionDecl, Span)> {
        self.declarations.iter().filter_map(|d| match &d.node {
            Declaration::Function(f) => Some((f, d.span)),
            Declaration::Type(_) => None,
        })
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.declarations.iter().filter_map(|d| match &d.node {
            Declaration::Type(t) => Some(t),
            Declaration::Function(_) => None,
        })
    }

    pub fn exports_name(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e.node == name)
    }

    /// Text of a 1-based line, when the source text is available.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        self.source.as_deref()?.lines().nth(index)
    }
}

/// `lib/util.cdz` -> `lib/util`, using `/` as separator on every platform.
pub fn implicit_module_name(path: &Path) -> String {
    let stem = path.with_extension("");
    stem.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| c != "." && c != "/")
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Imports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub target: ImportTarget,
    #[serde(default)]
    pub items: ImportItems,
    /// `import db as d`: only meaningful for whole-module imports.
    #[serde(default)]
    pub alias: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportTarget {
    /// `import net.http`: a declared (or implicit) module name.
    Module(Ident),
    /// `import "./util.cdz"`: a relative or absolute file path.
    File(String),
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportTarget::Module(name) => write!(f, "{name}"),
            ImportTarget::File(path) => write!(f, "\"{path}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ImportItems {
    /// Whole-module import: names are reachable only qualified.
    #[default]
    Module,
    /// `from m import *`
    Wildcard,
    /// `from m import a, b as c`
    Names(Vec<Spanned<ImportItem>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportItem {
    pub name: Ident,
    #[serde(default)]
    pub alias: Option<Ident>,
}

impl ImportItem {
    /// The name the item is visible under in the importing file.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    Function(FunctionDecl),
    Type(TypeDecl),
}

/// `[pure] function name(params) uses [effects] -> ReturnType { body }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: Ident,
    #[serde(default)]
    pub params: Vec<Param>,
    pub return_type: Type,
    /// Raw effect tokens from the `uses [...]` clause; validated against the registry by the binder.
    #[serde(default)]
    pub effects: Vec<Spanned<Ident>>,
    /// Span of the whole `uses [...]` clause, when present.
    #[serde(default)]
    pub effects_span: Option<Span>,
    #[serde(default)]
    pub is_pure: bool,
    #[serde(default)]
    pub body: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub ty: Type,
}

/// `type AppError from [DbError, HttpError]`
///
/// The `from` list declares which error types convert into this one for `?` propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: Ident,
    #[serde(default)]
    pub converts_from: Vec<Type>,
}

// ============================================================================
// Types
// ============================================================================

pub const RESULT_TYPE_NAME: &str = "Result";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    Named(Ident),
    Generic(Ident, Vec<Type>),
    Unit,
}

impl Type {
    pub fn named(name: impl Into<Ident>) -> Self {
        Type::Named(name.into())
    }

    pub fn result(ok: Type, err: Type) -> Self {
        Type::Generic(RESULT_TYPE_NAME.to_string(), vec![ok, err])
    }

    pub fn is_result(&self) -> bool {
        matches!(self, Type::Generic(name, args) if name == RESULT_TYPE_NAME && args.len() == 2)
    }

    pub fn result_ok_type(&self) -> Option<&Type> {
        match self {
            Type::Generic(name, args) if name == RESULT_TYPE_NAME && args.len() == 2 => Some(&args[0]),
            _ => None,
        }
    }

    pub fn result_err_type(&self) -> Option<&Type> {
        match self {
            Type::Generic(name, args) if name == RESULT_TYPE_NAME && args.len() == 2 => Some(&args[1]),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Named(name) => write!(f, "{name}"),
            Type::Generic(name, args) => {
                write!(f, "{name}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            Type::Unit => write!(f, "()"),
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let {
        name: Ident,
        #[serde(default)]
        ty: Option<Type>,
        value: Spanned<Expr>,
    },
    Assign {
        target: Ident,
        value: Spanned<Expr>,
    },
    Expr(Spanned<Expr>),
    Return(Option<Spanned<Expr>>),
    If {
        condition: Spanned<Expr>,
        then_body: Vec<Spanned<Stmt>>,
        #[serde(default)]
        else_body: Option<Vec<Spanned<Stmt>>>,
    },
    While {
        condition: Spanned<Expr>,
        body: Vec<Spanned<Stmt>>,
    },
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression together with its static type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    /// Attached by the typer. `None` only when the typer could not determine it.
    #[serde(default)]
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, ty: None }
    }

    pub fn typed(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty: Some(ty) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Ident(Ident),
    Call(CallExpr),
    /// `expr?`: the error-propagation operator.
    Try(Box<Spanned<Expr>>),
    Match(Box<Spanned<Expr>>, Vec<Spanned<MatchArm>>),
    /// `if subject.is_ok() { .. } else { .. }`: a status check over a Result-typed subject.
    StatusBranch(Box<StatusBranch>),
    /// `.value` / `.error` of the subject of the innermost enclosing status branch.
    ResultAccess(ResultField),
    /// `Ok(x)`, `Err(e)` and user constructors.
    Constructor(Ident, Vec<Spanned<Expr>>),
    Binary(Box<Spanned<Expr>>, BinaryOp, Box<Spanned<Expr>>),
    Unary(UnaryOp, Box<Spanned<Expr>>),
    Paren(Box<Spanned<Expr>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub path: CallPath,
    #[serde(default)]
    pub args: Vec<Spanned<Expr>>,
}

/// `name` or `Qualifier.name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallPath {
    #[serde(default)]
    pub qualifier: Option<Ident>,
    pub name: Ident,
}

impl CallPath {
    pub fn unqualified(name: impl Into<Ident>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<Ident>, name: impl Into<Ident>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for CallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBranch {
    pub subject: Spanned<Expr>,
    pub check: StatusCheck,
    pub then_body: Vec<Spanned<Stmt>>,
    #[serde(default)]
    pub else_body: Option<Vec<Spanned<Stmt>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCheck {
    IsOk,
    IsErr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultField {
    Value,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Spanned<Pattern>,
    pub body: MatchBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchBody {
    Expr(Spanned<Expr>),
    Block(Vec<Spanned<Stmt>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard,
    Binding(Ident),
    Literal(Literal),
    Constructor(Ident, Vec<Spanned<Pattern>>),
}
