//! Effect sets.
//!
//! [`EffectSet`] is a small `Copy` bitset over [`EffectId`]. The registry is closed and tiny, so a set fits in a
//! `u16`, unions are a single `|`, and iteration always follows registry order (which keeps diagnostics
//! deterministic regardless of the order effects were discovered in).

use std::fmt;

use crate::lang::effects::{EFFECTS, EffectId};

/// A set of effects drawn from the closed registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EffectSet {
    bits: u16,
}

impl EffectSet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    const fn bit(effect: EffectId) -> u16 {
        1 << (effect as u16)
    }

    /// Insert `effect`, returning `true` if it was not already present.
    pub fn insert(&mut self, effect: EffectId) -> bool {
        let before = self.bits;
        self.bits |= Self::bit(effect);
        before != self.bits
    }

    pub fn contains(&self, effect: EffectId) -> bool {
        self.bits & Self::bit(effect) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn union(self, other: EffectSet) -> EffectSet {
        EffectSet {
            bits: self.bits | other.bits,
        }
    }

    /// Effects in `self` that are not in `other`.
    pub fn difference(self, other: EffectSet) -> EffectSet {
        EffectSet {
            bits: self.bits & !other.bits,
        }
    }

    pub fn is_subset(&self, other: &EffectSet) -> bool {
        self.bits & !other.bits == 0
    }

    /// Iterate in registry order.
    pub fn iter(&self) -> impl Iterator<Item = EffectId> + '_ {
        EFFECTS.iter().map(|info| info.id).filter(|id| self.contains(*id))
    }
}

impl FromIterator<EffectId> for EffectSet {
    fn from_iter<I: IntoIterator<Item = EffectId>>(iter: I) -> Self {
        let mut set = EffectSet::empty();
        set.extend(iter);
        set
    }
}

impl Extend<EffectId> for EffectSet {
    fn extend<I: IntoIterator<Item = EffectId>>(&mut self, iter: I) {
        for effect in iter {
            self.insert(effect);
        }
    }
}

/// Formats as the source-level clause body, e.g. `[Database, Network]`.
impl fmt::Display for EffectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, effect) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{effect}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_growth() {
        let mut set = EffectSet::empty();
        assert!(set.insert(EffectId::Network));
        assert!(!set.insert(EffectId::Network));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_iteration_follows_registry_order() {
        let set: EffectSet = [EffectId::Memory, EffectId::Database, EffectId::Logging]
            .into_iter()
            .collect();
        let order: Vec<EffectId> = set.iter().collect();
        assert_eq!(order, vec![EffectId::Database, EffectId::Logging, EffectId::Memory]);
        assert_eq!(set.to_string(), "[Database, Logging, Memory]");
    }

    #[test]
    fn test_difference_and_subset() {
        let declared: EffectSet = [EffectId::Database, EffectId::IO].into_iter().collect();
        let required: EffectSet = [EffectId::Database, EffectId::Network].into_iter().collect();

        let missing: Vec<EffectId> = required.difference(declared).iter().collect();
        let extra: Vec<EffectId> = declared.difference(required).iter().collect();
        assert_eq!(missing, vec![EffectId::Network]);
        assert_eq!(extra, vec![EffectId::IO]);
        assert!(!required.is_subset(&declared));
        assert!(EffectSet::empty().is_subset(&declared));
    }
}
