//! Semantic verification over bound programs.
//!
//! Everything here reads the output of the [binder](crate::frontend::binder) and never mutates it:
//!
//! - [`call_graph`]: function-to-function edges and their SCCs, in callee-first order.
//! - [`effects`]: fixed-point inference of required effects, then purity, completeness and minimality checks.
//! - [`discharge`]: per-body tracking of Result-typed calls and `?` misuse.
//!
//! The two verifiers write disjoint diagnostic sets and may run concurrently.

pub mod call_graph;
pub mod discharge;
pub mod effects;

#[cfg(test)]
mod tests;
