use serde::{Deserialize, Serialize};
use std::fmt;

use super::item::EquipTargetId;

/// Frequency given to classes that never declare one.
pub const DEFAULT_FREQUENCY: f64 = 1.0;

/// A character-class descriptor.
///
/// `frequency` biases random class selection; classes at `0.0` are never
/// picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterClass {
    pub name: String,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default)]
    pub equip_slots: Vec<EquipTargetId>,
}

fn default_frequency() -> f64 {
    DEFAULT_FREQUENCY
}

impl CharacterClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frequency: DEFAULT_FREQUENCY,
            equip_slots: Vec::new(),
        }
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_equip_slots(mut self, slots: impl IntoIterator<Item = EquipTargetId>) -> Self {
        self.equip_slots = slots.into_iter().collect();
        self
    }

    /// Returns true if this class can equip items bound to `target`.
    pub fn can_equip(&self, target: EquipTargetId) -> bool {
        self.equip_slots.contains(&target)
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let class = CharacterClass::new("Warrior");
        assert_eq!(class.frequency, DEFAULT_FREQUENCY);
        assert!(class.equip_slots.is_empty());
        assert_eq!(class.to_string(), "Warrior");
    }

    #[test]
    fn equip_slots() {
        let class = CharacterClass::new("Thief")
            .with_frequency(0.25)
            .with_equip_slots([EquipTargetId(0), EquipTargetId(2)]);
        assert!(class.can_equip(EquipTargetId(2)));
        assert!(!class.can_equip(EquipTargetId(1)));
        assert_eq!(class.frequency, 0.25);
    }
}
