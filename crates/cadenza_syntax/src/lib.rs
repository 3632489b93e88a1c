//! Shared syntax types for the Cadenza language: the typed AST consumed by the verification engine.
//!
//! ## Notes
//! - Lexing and parsing live outside this workspace. The parser produces one [`ast::SourceUnit`] per file, with a
//!   [`ast::Span`] on every node and the static type attached to every expression.
//! - All AST types implement `serde::{Serialize, Deserialize}` so trees can be handed over as JSON.
//!
//! ## Examples
//! ```rust
//! use cadenza_syntax::ast::{SourceUnit, Type};
//!
//! let unit = SourceUnit::new("main.cdz");
//! assert!(unit.declared_module().is_none());
//! assert_eq!(Type::result(Type::named("int"), Type::named("string")).to_string(), "Result<int, string>");
//! ```

pub mod ast;
pub mod builder;
pub mod visit;
