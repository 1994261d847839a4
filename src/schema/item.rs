/// Item definitions: a closed set of item families, validated on construction.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("item name must not be empty")]
    EmptyName,
    #[error("consumable '{0}' must have at least one use")]
    NoUses(String),
    #[error("equip target name must not be empty")]
    EmptyTarget,
}

/// Newtype wrapper for interned equip-slot ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EquipTargetId(pub u32);

/// Interning arena for equip slots ("Head", "Hand", ...).
///
/// Names are capitalised before lookup, so `"hand"` and `"HAND"` intern to
/// the same id. Ids are dense and never reused.
#[derive(Debug, Clone, Default)]
pub struct EquipTargets {
    names: Vec<String>,
    ids: FxHashMap<String, EquipTargetId>,
}

impl EquipTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, registering it if unseen.
    pub fn intern(&mut self, name: &str) -> Result<EquipTargetId, ItemError> {
        let key = capitalize(name.trim());
        if key.is_empty() {
            return Err(ItemError::EmptyTarget);
        }
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }
        let id = EquipTargetId(self.names.len() as u32);
        self.names.push(key.clone());
        self.ids.insert(key, id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<EquipTargetId> {
        self.ids.get(&capitalize(name.trim())).copied()
    }

    pub fn name(&self, id: EquipTargetId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The capability an item family provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Bound to a character slot until unequipped.
    Equippable { target: EquipTargetId },
    /// Removed from the inventory after `uses` applications.
    Consumable { uses: u32 },
    /// Consumed on use against a target.
    Throwable,
    Misc,
}

impl ItemKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equippable { .. } => "Equippable",
            Self::Consumable { .. } => "Consumable",
            Self::Throwable => "Throwable",
            Self::Misc => "Misc. Item",
        }
    }
}

/// A resolved item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Symbol name, e.g. `IronSword`.
    pub name: String,
    /// Player-facing name, e.g. `Iron Sword`.
    pub display_name: String,
    pub kind: ItemKind,
}

impl ItemDefinition {
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Result<Self, ItemError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ItemError::EmptyName);
        }
        if let ItemKind::Consumable { uses: 0 } = kind {
            return Err(ItemError::NoUses(name));
        }
        Ok(Self {
            display_name: camel_to_space(&name),
            name,
            kind,
        })
    }

    pub fn equippable(name: impl Into<String>, target: EquipTargetId) -> Result<Self, ItemError> {
        Self::new(name, ItemKind::Equippable { target })
    }

    pub fn consumable(name: impl Into<String>, uses: u32) -> Result<Self, ItemError> {
        Self::new(name, ItemKind::Consumable { uses })
    }

    pub fn throwable(name: impl Into<String>) -> Result<Self, ItemError> {
        Self::new(name, ItemKind::Throwable)
    }

    pub fn misc(name: impl Into<String>) -> Result<Self, ItemError> {
        Self::new(name, ItemKind::Misc)
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn item_type(&self) -> &'static str {
        self.kind.label()
    }

    pub fn equip_target(&self) -> Option<EquipTargetId> {
        match self.kind {
            ItemKind::Equippable { target } => Some(target),
            _ => None,
        }
    }

}

impl fmt::Display for ItemDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `IronSword` → `Iron Sword`. Runs of capitals stay together
/// (`HTTPClient` → `HTTP Client`).
pub fn camel_to_space(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}
