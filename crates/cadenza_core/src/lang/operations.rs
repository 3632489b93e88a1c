//! Builtin operation vocabulary.
//!
//! Builtin operations are the only place effects originate: a user function *requires* an effect either because its
//! body calls one of these operations or because it calls a function that (transitively) does.
//!
//! ## Notes
//! - Spellings are dotted (`db.query`) except for the console primitives (`print`, `read_line`), which are called
//!   unqualified.
//! - Lookup via [`from_str`] is **case-sensitive**.
//!
//! ## Examples
//! ```rust
//! use cadenza_core::lang::effects::EffectId;
//! use cadenza_core::lang::operations::{self, OperationId};
//!
//! assert_eq!(operations::from_str("http.get"), Some(OperationId::HttpGet));
//! assert_eq!(operations::effect_of(OperationId::HttpGet), EffectId::Network);
//! ```

use super::effects::EffectId;
use super::registry::{LangItemInfo, stable, stable_with_aliases};

/// Stable identifier for a builtin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationId {
    DbQuery,
    DbExecute,
    HttpGet,
    HttpPost,
    FsRead,
    FsWrite,
    LogInfo,
    LogError,
    Print,
    ReadLine,
    MemAlloc,
    MemFree,
}

/// Metadata for a builtin operation: the shared item info plus the effect it performs.
#[derive(Debug, Clone, Copy)]
pub struct OperationInfo {
    pub item: LangItemInfo<OperationId>,
    pub effect: EffectId,
}

/// Registry of all builtin operations.
pub const OPERATIONS: &[OperationInfo] = &[
    op(
        stable(OperationId::DbQuery, "db.query", "Run a read query against the database."),
        EffectId::Database,
    ),
    op(
        stable(OperationId::DbExecute, "db.execute", "Run a write statement against the database."),
        EffectId::Database,
    ),
    op(
        stable(OperationId::HttpGet, "http.get", "Issue an HTTP GET request."),
        EffectId::Network,
    ),
    op(
        stable(OperationId::HttpPost, "http.post", "Issue an HTTP POST request."),
        EffectId::Network,
    ),
    op(
        stable(OperationId::FsRead, "fs.read", "Read a file into a string."),
        EffectId::FileSystem,
    ),
    op(
        stable(OperationId::FsWrite, "fs.write", "Write a string to a file."),
        EffectId::FileSystem,
    ),
    op(
        stable(OperationId::LogInfo, "log.info", "Emit an informational log record."),
        EffectId::Logging,
    ),
    op(
        stable_with_aliases(OperationId::LogError, "log.error", &["log.err"], "Emit an error log record."),
        EffectId::Logging,
    ),
    op(
        stable_with_aliases(OperationId::Print, "print", &["println"], "Print a value to stdout."),
        EffectId::IO,
    ),
    op(
        stable(OperationId::ReadLine, "read_line", "Read one line from stdin."),
        EffectId::IO,
    ),
    op(
        stable(OperationId::MemAlloc, "mem.alloc", "Allocate a raw buffer."),
        EffectId::Memory,
    ),
    op(
        stable(OperationId::MemFree, "mem.free", "Release a raw buffer."),
        EffectId::Memory,
    ),
];

/// Resolve an operation spelling (canonical or alias) to its id.
pub fn from_str(name: &str) -> Option<OperationId> {
    if let Some(o) = OPERATIONS.iter().find(|o| o.item.canonical == name) {
        return Some(o.item.id);
    }
    OPERATIONS
        .iter()
        .find(|o| o.item.aliases.contains(&name))
        .map(|o| o.item.id)
}

/// Return the canonical spelling for an operation.
pub fn as_str(id: OperationId) -> &'static str {
    info_for(id).item.canonical
}

/// Return the effect an operation performs.
pub fn effect_of(id: OperationId) -> EffectId {
    info_for(id).effect
}

/// Return the registry entry for an operation.
pub fn info_for(id: OperationId) -> &'static OperationInfo {
    OPERATIONS
        .iter()
        .find(|o| o.item.id == id)
        .expect("INVARIANT: every OperationId has a registry entry")
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(as_str(*self))
    }
}

const fn op(item: LangItemInfo<OperationId>, effect: EffectId) -> OperationInfo {
    OperationInfo { item, effect }
}
