//! The effect registry an engine instance validates against.
//!
//! The registry is a plain immutable value handed to the engine at construction. Two engines (say, one per editor
//! workspace) never share or mutate it. [`EffectRegistry::standard`] covers the full vocabulary from
//! `cadenza_core::lang`; hosts may construct a narrower one from their own tables.

use cadenza_core::lang::effects::{self, EFFECTS, EffectId, EffectInfo};
use cadenza_core::lang::operations::{self, OPERATIONS, OperationId, OperationInfo};

#[derive(Debug, Clone, Copy)]
pub struct EffectRegistry {
    effects: &'static [EffectInfo],
    operations: &'static [OperationInfo],
}

impl EffectRegistry {
    /// Every effect and builtin operation known to this engine version.
    pub const fn standard() -> Self {
        Self {
            effects: EFFECTS,
            operations: OPERATIONS,
        }
    }

    /// A registry restricted to the given tables.
    ///
    /// Operations whose effect is not in `effects` still bind, but a function can never declare that effect.
    pub const fn from_tables(effects: &'static [EffectInfo], operations: &'static [OperationInfo]) -> Self {
        Self { effects, operations }
    }

    /// Resolve an effect token from a `uses [...]` clause.
    pub fn effect(&self, token: &str) -> Option<EffectId> {
        self.effects.iter().find(|e| e.matches(token)).map(|e| e.id)
    }

    /// Resolve a builtin operation spelling such as `db.query` or `print`.
    pub fn operation(&self, spelling: &str) -> Option<OperationId> {
        self.operations
            .iter()
            .find(|o| o.item.matches(spelling))
            .map(|o| o.item.id)
    }

    pub fn effect_of(&self, op: OperationId) -> EffectId {
        self.operations
            .iter()
            .find(|o| o.item.id == op)
            .map(|o| o.effect)
            .unwrap_or_else(|| operations::effect_of(op))
    }

    pub fn effect_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.effects.iter().map(|e| e.canonical)
    }

    pub fn contains_effect(&self, id: EffectId) -> bool {
        self.effects.iter().any(|e| e.id == id)
    }

    /// Canonical spelling, independent of which tables this registry was built from.
    pub fn effect_name(&self, id: EffectId) -> &'static str {
        effects::as_str(id)
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NO_MEMORY: &[EffectInfo] = &[EFFECTS[0], EFFECTS[1], EFFECTS[2], EFFECTS[3], EFFECTS[4]];

    #[test]
    fn test_standard_resolves_aliases() {
        let registry = EffectRegistry::standard();
        assert_eq!(registry.effect("FS"), Some(EffectId::FileSystem));
        assert_eq!(registry.operation("println"), Some(OperationId::Print));
        assert_eq!(registry.effect_of(OperationId::DbQuery), EffectId::Database);
        assert_eq!(registry.effect("Filesystem"), None);
    }

    #[test]
    fn test_restricted_registry_rejects_missing_effect() {
        let registry = EffectRegistry::from_tables(NO_MEMORY, OPERATIONS);
        assert_eq!(registry.effect("Memory"), None);
        assert!(!registry.contains_effect(EffectId::Memory));
        assert_eq!(registry.effect("Network"), Some(EffectId::Network));
    }
}
