use std::collections::HashMap;

use cadenza_core::effects::EffectSet;
use cadenza_core::lang::{effects, operations, rules};

#[test]
fn effects_spellings_unique_and_resolvable() {
    let mut seen: HashMap<&'static str, effects::EffectId> = HashMap::new();

    for info in effects::EFFECTS {
        assert_eq!(
            effects::from_str(info.canonical),
            Some(info.id),
            "effect canonical spelling not resolvable: {}",
            info.canonical
        );
        assert_eq!(
            effects::as_str(info.id),
            info.canonical,
            "effect as_str mismatch for {:?}",
            info.id
        );
        if let Some(prev) = seen.insert(info.canonical, info.id) {
            panic!("duplicate effect spelling {:?}: {:?} and {:?}", info.canonical, prev, info.id);
        }
        for &alias in info.aliases {
            assert_eq!(effects::from_str(alias), Some(info.id), "effect alias not resolvable: {}", alias);
            if let Some(prev) = seen.insert(alias, info.id) {
                panic!("duplicate effect alias {:?}: {:?} and {:?}", alias, prev, info.id);
            }
        }
    }
}

#[test]
fn effect_registry_fits_in_effect_set() {
    let all: EffectSet = effects::EFFECTS.iter().map(|e| e.id).collect();
    assert_eq!(all.len(), effects::EFFECTS.len());
}

#[test]
fn operations_spellings_unique_and_resolvable() {
    let mut seen: HashMap<&'static str, operations::OperationId> = HashMap::new();

    for info in operations::OPERATIONS {
        let item = &info.item;
        assert_eq!(
            operations::from_str(item.canonical),
            Some(item.id),
            "operation canonical spelling not resolvable: {}",
            item.canonical
        );
        assert_eq!(operations::effect_of(item.id), info.effect);
        if let Some(prev) = seen.insert(item.canonical, item.id) {
            panic!("duplicate operation spelling {:?}: {:?} and {:?}", item.canonical, prev, item.id);
        }
        for &alias in item.aliases {
            assert_eq!(operations::from_str(alias), Some(item.id));
            if let Some(prev) = seen.insert(alias, item.id) {
                panic!("duplicate operation alias {:?}: {:?} and {:?}", alias, prev, item.id);
            }
        }
    }
}

#[test]
fn every_effect_has_at_least_one_operation() {
    for info in effects::EFFECTS {
        assert!(
            operations::OPERATIONS.iter().any(|op| op.effect == info.id),
            "effect {} cannot be produced by any builtin operation",
            info.canonical
        );
    }
}

#[test]
fn rule_ids_follow_naming_convention() {
    for info in rules::RULES {
        let name = info.item.canonical;
        assert_eq!(rules::from_str(name), Some(info.item.id));
        let suffix_ok = if info.fatal { name.ends_with("Error") } else { name.ends_with("Warning") };
        assert!(suffix_ok, "rule {} does not match its fatal flag", name);
    }
}
