//! Shareable metadata for `cadenza_core::lang` registries.
//!
//! The `cadenza_core::lang` module is a set of **registry-first** vocabularies: effects, builtin operations and
//! diagnostic rules. This submodule provides the small, dependency-free metadata types that are reused across all
//! registries.
//!
//! ## Notes
//! - These types are intentionally lightweight and `Copy`-friendly so registries can live in `const` tables.
//! - Metadata is meant for tooling/docs/diagnostics; enforcement lives in the binder and verifiers.
//!
//! ## See also
//! - [`crate::lang::effects`]
//! - [`crate::lang::operations`]
//! - [`crate::lang::rules`]

/// Identify the language/compiler version a vocabulary item is available since.
///
/// ## Examples
/// ```rust
/// use cadenza_core::lang::registry::SinceVersion;
///
/// let since: SinceVersion = "0.1.0";
/// assert!(!since.is_empty());
/// ```
pub type SinceVersion = &'static str;

/// Describe the lifecycle status of a language vocabulary item.
///
/// ## Notes
/// - This is intended for docs/tooling (e.g. to warn on deprecated spellings), not for feature-gating by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stability {
    Stable,
    Draft,
    Deprecated,
}

impl Stability {
    pub fn as_str(self) -> &'static str {
        match self {
            Stability::Stable => "stable",
            Stability::Draft => "draft",
            Stability::Deprecated => "deprecated",
        }
    }
}

/// Shared metadata shape for “registry-first” vocabulary items.
///
/// Many vocabularies share the same core fields:
/// - stable identity (`id`)
/// - accepted spellings (`canonical` + `aliases`)
/// - documentation (`description`)
/// - provenance (`since_version`, `stability`)
///
/// Registries that need extra per-item data (e.g. the effect of an operation, the category of a rule) wrap this
/// struct in an “extension” info type.
#[derive(Debug, Clone, Copy)]
pub struct LangItemInfo<Id> {
    pub id: Id,
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub since_version: Option<SinceVersion>,
    pub stability: Stability,
}

impl<Id> LangItemInfo<Id> {
    /// Return `true` if `name` is the canonical spelling or one of the aliases.
    ///
    /// Matching is **case-sensitive**.
    pub fn matches(&self, name: &str) -> bool {
        self.canonical == name || self.aliases.contains(&name)
    }
}

/// Build a stable item with no aliases.
pub(crate) const fn stable<Id>(id: Id, canonical: &'static str, description: &'static str) -> LangItemInfo<Id> {
    LangItemInfo {
        id,
        canonical,
        aliases: &[],
        description,
        since_version: Some("0.1.0"),
        stability: Stability::Stable,
    }
}

/// Build a stable item that also accepts `aliases`.
pub(crate) const fn stable_with_aliases<Id>(
    id: Id,
    canonical: &'static str,
    aliases: &'static [&'static str],
    description: &'static str,
) -> LangItemInfo<Id> {
    LangItemInfo {
        id,
        canonical,
        aliases,
        description,
        since_version: Some("0.1.0"),
        stability: Stability::Stable,
    }
}
