//! Cadenza analysis frontend
//!
//! Phases, in the order the engine runs them:
//! - `module_graph`: import resolution, cycle and duplicate-module detection, compilation order
//! - `symbols`: the global table of function signatures and error-type conversions
//! - `binder`: resolves every call site to a function or builtin operation
//! - `checker`: call graph, effect verification and Result-discharge verification
//!
//! `diagnostics` is the shared output record; `registry` wraps the closed effect and operation tables.

// The typed AST is owned by the shared syntax crate.
pub use cadenza_syntax::ast;

pub mod binder;
pub mod checker;
pub mod diagnostics;
pub mod module_graph;
pub mod registry;
pub mod symbols;
