//! Effect vocabulary.
//!
//! This module defines the closed set of effect names a function may list in its `uses [...]` clause.
//! Callers should use the stable identifier [`EffectId`] for identity and query spellings through
//! [`EffectInfo`] / [`EFFECTS`].
//!
//! ## Notes
//! - Lookup via [`from_str`] is **case-sensitive**.
//! - Adding an effect is an engine change: the table below is the whole registry.
//!
//! ## Examples
//! ```rust
//! use cadenza_core::lang::effects::{self, EffectId};
//!
//! assert_eq!(effects::from_str("Database"), Some(EffectId::Database));
//! assert_eq!(effects::from_str("DB"), Some(EffectId::Database));
//! assert_eq!(effects::from_str("database"), None);
//! ```

use super::registry::{LangItemInfo, stable, stable_with_aliases};

/// Stable identifier for an effect.
///
/// The declaration order is the registry order; [`crate::effects::EffectSet`] iterates in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectId {
    Database,
    Network,
    FileSystem,
    Logging,
    IO,
    Memory,
}

/// Metadata for an effect.
pub type EffectInfo = LangItemInfo<EffectId>;

/// Registry of all effects.
pub const EFFECTS: &[EffectInfo] = &[
    stable_with_aliases(
        EffectId::Database,
        "Database",
        &["DB"],
        "Reads or writes a database.",
    ),
    stable(EffectId::Network, "Network", "Performs network requests."),
    stable_with_aliases(
        EffectId::FileSystem,
        "FileSystem",
        &["FS"],
        "Reads or writes the file system.",
    ),
    stable(EffectId::Logging, "Logging", "Emits log records."),
    stable(EffectId::IO, "IO", "Reads from stdin or writes to stdout/stderr."),
    stable(EffectId::Memory, "Memory", "Allocates or releases raw memory."),
];

/// Resolve an effect token (canonical spelling or alias) to its id.
///
/// ## Returns
/// - `Some(EffectId)` if `name` matches a canonical spelling or alias.
/// - `None` otherwise.
pub fn from_str(name: &str) -> Option<EffectId> {
    if let Some(e) = EFFECTS.iter().find(|e| e.canonical == name) {
        return Some(e.id);
    }
    EFFECTS.iter().find(|e| e.aliases.contains(&name)).map(|e| e.id)
}

/// Return the canonical spelling for an effect.
pub fn as_str(id: EffectId) -> &'static str {
    info_for(id).canonical
}

/// Return the registry entry for an effect.
pub fn info_for(id: EffectId) -> &'static EffectInfo {
    EFFECTS
        .iter()
        .find(|e| e.id == id)
        .expect("INVARIANT: every EffectId has a registry entry")
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(as_str(*self))
    }
}
