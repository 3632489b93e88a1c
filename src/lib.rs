#![forbid(unsafe_code)]
//! Cadenza static verifier
//!
//! Cadenza is a small statically typed language with two distinguishing contracts: every function declares the side
//! effects it may perform (`uses [Database, Network]`), and `Result<T, E>` values must be explicitly discharged.
//! This crate is the semantic verification engine: given already-parsed, typed source units it builds the module
//! graph, binds every call across modules, and verifies both contracts, returning [`Diagnostic`]s.
//!
//! ```rust
//! use cadenza::config::AnalysisConfig;
//! use cadenza_syntax::builder::*;
//!
//! let program = vec![
//!     unit("main.cdz")
//!         .function(function("main").uses(&[]).body(vec![expr(op("print", vec![string("hi")]))]))
//!         .build(),
//! ];
//! let report = cadenza::analyze(program, AnalysisConfig::default()).expect("valid config");
//! assert_eq!(report.diagnostics.len(), 1);
//! assert!(report.exceeds_threshold());
//! ```
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents an engine bug (logic error), use `.expect("INVARIANT: reason")` with a
//!   clear explanation.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod frontend;

pub use frontend::ast;
pub use frontend::diagnostics;
pub use frontend::diagnostics::Diagnostic;

pub use config::AnalysisConfig;
pub use engine::{AnalysisReport, DiagnosticDelta, Engine, Metrics, analyze};
pub use error::{EngineError, EngineResult};
