//! Cadenza language vocabulary registries.
//!
//! This module is the “front door” for language-level vocabulary: effect names, builtin operations and diagnostic
//! rules.
//!
//! The design goal is to avoid stringly-typed checks scattered across the compiler/tooling. Instead, callers work
//! with **stable IDs** (e.g. `EffectId`, `OperationId`, `RuleId`) and look up spellings/metadata via registry tables.
//!
//! ## Notes
//! - Registries are intentionally **pure**: no AST types, no IO, no side effects.
//! - Effect tokens in source text are free-form identifiers until the binder resolves them through
//!   [`effects::from_str`]; anything not in the table is rejected.
//!
//! ## Examples
//! ```rust
//! use cadenza_core::lang::effects::{self, EffectId};
//!
//! assert_eq!(effects::from_str("Network"), Some(EffectId::Network));
//! assert_eq!(effects::as_str(EffectId::Network), "Network");
//! ```

pub mod effects;
pub mod operations;
pub mod registry;
pub mod rules;
