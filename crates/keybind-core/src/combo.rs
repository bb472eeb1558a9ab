// Keybind Combo Type
// Key + modifier triggers and the combination matcher

use std::fmt;

use smallvec::SmallVec;

use crate::event::KeyPressEvent;
use crate::key::KeyToken;
use crate::modifier::{Modifier, ModifierRequirements};
use crate::rule::RuleError;

/// One alternative of a combination rule: a key plus modifier requirements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trigger {
    key: KeyToken,
    requirements: ModifierRequirements,
}

impl Trigger {
    /// Create a trigger with no modifier requirements (bare key)
    pub fn new(key: KeyToken) -> Self {
        Self {
            key,
            requirements: ModifierRequirements::default(),
        }
    }

    /// Create a trigger with the given modifier requirements
    pub fn with_requirements(key: KeyToken, requirements: ModifierRequirements) -> Self {
        Self { key, requirements }
    }

    /// Add a modifier requirement to this trigger
    pub fn requiring(mut self, modifier: Modifier, pressed: bool) -> Self {
        self.requirements.require(modifier, pressed);
        self
    }

    pub fn key(&self) -> &KeyToken {
        &self.key
    }

    pub fn requirements(&self) -> &ModifierRequirements {
        &self.requirements
    }

    /// Check a single event against this trigger
    pub fn matches(&self, event: &KeyPressEvent) -> bool {
        self.key.matches(event.key()) && self.requirements.satisfied_by(event.modifiers())
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mods = self.requirements.to_string();
        if mods.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", mods, self.key)
        }
    }
}

/// A set of alternative triggers; matches when any alternative matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    triggers: SmallVec<[Trigger; 2]>,
}

impl Combination {
    /// Create a combination from its alternatives (at least one)
    pub fn new(triggers: impl IntoIterator<Item = Trigger>) -> Result<Self, RuleError> {
        let triggers: SmallVec<[Trigger; 2]> = triggers.into_iter().collect();
        if triggers.is_empty() {
            return Err(RuleError::NoTriggers);
        }
        Ok(Self { triggers })
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Check whether any alternative is satisfied by `event`
    pub fn matches(&self, event: &KeyPressEvent) -> bool {
        self.triggers.iter().any(|trigger| trigger.matches(event))
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.triggers.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::Modifiers;

    fn token(s: &str) -> KeyToken {
        KeyToken::new(s).unwrap()
    }

    fn press(key: &str, mods: &[Modifier]) -> KeyPressEvent {
        KeyPressEvent::new(key).with_modifiers(Modifiers::held(mods.iter().copied()))
    }

    #[test]
    fn test_bare_key_rejects_modifiers() {
        let trigger = Trigger::new(token("s"));
        assert!(trigger.matches(&press("s", &[])));
        assert!(trigger.matches(&press("S", &[])));
        assert!(!trigger.matches(&press("s", &[Modifier::Ctrl])));
    }

    #[test]
    fn test_ctrl_s() {
        let trigger = Trigger::new(token("s")).requiring(Modifier::Ctrl, true);
        assert!(trigger.matches(&press("s", &[Modifier::Ctrl])));
        assert!(trigger.matches(&press("s", &[Modifier::Ctrl, Modifier::Alt])));
        assert!(!trigger.matches(&press("s", &[])));
        assert!(!trigger.matches(&press("d", &[Modifier::Ctrl])));
    }

    #[test]
    fn test_any_alternative_matches() {
        let combo = Combination::new([
            Trigger::new(token("s")).requiring(Modifier::Ctrl, true),
            Trigger::new(token("s")).requiring(Modifier::Meta, true),
        ])
        .unwrap();

        assert!(combo.matches(&press("s", &[Modifier::Ctrl])));
        assert!(combo.matches(&press("s", &[Modifier::Meta])));
        assert!(!combo.matches(&press("s", &[])));
    }

    #[test]
    fn test_empty_combination_rejected() {
        assert_eq!(Combination::new(Vec::new()), Err(RuleError::NoTriggers));
    }

    #[test]
    fn test_display() {
        let combo = Combination::new([
            Trigger::new(token("s"))
                .requiring(Modifier::Ctrl, true)
                .requiring(Modifier::Shift, true),
            Trigger::new(token("Escape")),
        ])
        .unwrap();
        assert_eq!(combo.to_string(), "Ctrl+Shift+s | Escape");
    }
}
