//! Provide shared, pure semantic helpers and canonical language vocabulary for the Cadenza compiler.
//!
//! This crate is intentionally small and dependency-light. It contains the closed vocabularies that the verification
//! engine, the CLI, and editor tooling must agree on:
//! - the effect registry (`Database`, `Network`, ...),
//! - builtin effect-bearing operations (`db.query`, `http.get`, ...),
//! - the diagnostic rule catalog (rule ids, categories, default severities).
//!
//! ## Notes
//!
//! - This is a “semantic core” crate: **no IO**, no global state, and no compiler-specific types.
//! - [`effects::EffectSet`] lives here so every consumer uses the same deterministic iteration order.

pub mod effects;
pub mod lang;
