/// Static symbol table: the registered code units that content records
/// may reference through their `path` field.
///
/// Applications register every class and item descriptor at startup under
/// a unit path (e.g. `classes/warrior` or `classes::warrior`). A record
/// naming an unregistered unit or symbol fails with a plain lookup error.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::character::CharacterClass;
use super::item::{EquipTargets, ItemDefinition, ItemError, ItemKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("code unit '{0}' is not registered")]
    UnknownUnit(String),
    #[error("code unit '{unit}' has no symbol '{symbol}'")]
    MissingSymbol { unit: String, symbol: String },
    #[error("symbol '{symbol}' in '{unit}' is a {found}, not a {expected}")]
    WrongKind {
        unit: String,
        symbol: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid item in '{unit}': {source}")]
    Item {
        unit: String,
        #[source]
        source: ItemError,
    },
}

/// Declarative form of a catalog, for registering symbols from a file.
///
/// ```ron
/// (
///     units: {
///         "classes/fighters": [
///             Class(name: "Warrior", frequency: Some(2.0), equip_slots: ["hand"]),
///         ],
///         "items/weapons": [
///             Item(name: "IronSword", kind: Equippable(target: "hand")),
///             Item(name: "Bandage", kind: Consumable(uses: 3)),
///         ],
///     },
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub units: IndexMap<String, Vec<SymbolSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
pub enum SymbolSpec {
    Class {
        name: String,
        #[serde(default)]
        frequency: Option<f64>,
        #[serde(default)]
        equip_slots: Vec<String>,
    },
    Item {
        name: String,
        #[serde(default)]
        display_name: Option<String>,
        kind: ItemKindSpec,
    },
}

/// [`ItemKind`] with equip targets still given by name.
#[derive(Debug, Clone, Deserialize)]
pub enum ItemKindSpec {
    Equippable { target: String },
    Consumable { uses: u32 },
    Throwable,
    Misc,
}

/// A registered descriptor.
#[derive(Debug, Clone)]
pub enum Symbol {
    CharacterClass(CharacterClass),
    Item(ItemDefinition),
}

impl Symbol {
    fn kind(&self) -> &'static str {
        match self {
            Self::CharacterClass(_) => "character class",
            Self::Item(_) => "item",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    units: FxHashMap<String, FxHashMap<String, Symbol>>,
    equip_targets: EquipTargets,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class descriptor under `unit`, keyed by its name.
    /// Re-registering a name replaces the previous symbol.
    pub fn register_class(&mut self, unit: &str, class: CharacterClass) -> &mut Self {
        self.unit_mut(unit)
            .insert(class.name.clone(), Symbol::CharacterClass(class));
        self
    }

    /// Register an item definition under `unit`, keyed by its name.
    pub fn register_item(&mut self, unit: &str, item: ItemDefinition) -> &mut Self {
        self.unit_mut(unit).insert(item.name.clone(), Symbol::Item(item));
        self
    }

    /// Build a catalog from a RON manifest file.
    pub fn load_from_ron(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        let manifest: CatalogManifest = ron::from_str(&contents)?;
        let mut catalog = Self::new();
        catalog.register_manifest(manifest)?;
        Ok(catalog)
    }

    /// Register every symbol in `manifest`, interning equip targets as
    /// they appear.
    pub fn register_manifest(&mut self, manifest: CatalogManifest) -> Result<&mut Self, CatalogError> {
        for (unit, symbols) in manifest.units {
            for symbol in symbols {
                match symbol {
                    SymbolSpec::Class {
                        name,
                        frequency,
                        equip_slots,
                    } => {
                        let mut slots = Vec::with_capacity(equip_slots.len());
                        for slot in &equip_slots {
                            let id = self.equip_targets.intern(slot).map_err(|source| {
                                CatalogError::Item {
                                    unit: unit.clone(),
                                    source,
                                }
                            })?;
                            slots.push(id);
                        }
                        let mut class = CharacterClass::new(name).with_equip_slots(slots);
                        if let Some(frequency) = frequency {
                            class.frequency = frequency;
                        }
                        self.register_class(&unit, class);
                    }
                    SymbolSpec::Item {
                        name,
                        display_name,
                        kind,
                    } => {
                        let item = self.build_item(name, kind).map_err(|source| CatalogError::Item {
                            unit: unit.clone(),
                            source,
                        })?;
                        let item = match display_name {
                            Some(display) => item.with_display_name(display),
                            None => item,
                        };
                        self.register_item(&unit, item);
                    }
                }
            }
        }
        Ok(self)
    }

    fn build_item(&mut self, name: String, kind: ItemKindSpec) -> Result<ItemDefinition, ItemError> {
        let kind = match kind {
            ItemKindSpec::Equippable { target } => ItemKind::Equippable {
                target: self.equip_targets.intern(&target)?,
            },
            ItemKindSpec::Consumable { uses } => ItemKind::Consumable { uses },
            ItemKindSpec::Throwable => ItemKind::Throwable,
            ItemKindSpec::Misc => ItemKind::Misc,
        };
        ItemDefinition::new(name, kind)
    }

    pub fn equip_targets(&self) -> &EquipTargets {
        &self.equip_targets
    }

    /// Resolve `symbol` in `unit` as a character class.
    ///
    /// Returns the catalog's own descriptor so that record fields such as
    /// `frequency` persist across re-imports.
    pub fn resolve_class_mut(
        &mut self,
        unit: &str,
        symbol: &str,
    ) -> Result<&mut CharacterClass, ResolveError> {
        let unit = normalize_unit_path(unit);
        match self.lookup_mut(&unit, symbol)? {
            Symbol::CharacterClass(class) => Ok(class),
            other => Err(ResolveError::WrongKind {
                expected: "character class",
                found: other.kind(),
                unit,
                symbol: symbol.to_string(),
            }),
        }
    }

    /// Resolve `symbol` in `unit` as an item definition.
    pub fn resolve_item(&mut self, unit: &str, symbol: &str) -> Result<&ItemDefinition, ResolveError> {
        let unit = normalize_unit_path(unit);
        match self.lookup_mut(&unit, symbol)? {
            Symbol::Item(item) => Ok(item),
            other => Err(ResolveError::WrongKind {
                expected: "item",
                found: other.kind(),
                unit,
                symbol: symbol.to_string(),
            }),
        }
    }

    /// Registered unit paths, sorted.
    pub fn units(&self) -> Vec<&str> {
        let mut units: Vec<&str> = self.units.keys().map(String::as_str).collect();
        units.sort_unstable();
        units
    }

    pub fn symbol_count(&self) -> usize {
        self.units.values().map(|u| u.len()).sum()
    }

    fn unit_mut(&mut self, unit: &str) -> &mut FxHashMap<String, Symbol> {
        self.units.entry(normalize_unit_path(unit)).or_default()
    }

    fn lookup_mut(&mut self, unit: &str, symbol: &str) -> Result<&mut Symbol, ResolveError> {
        let symbols = self
            .units
            .get_mut(unit)
            .ok_or_else(|| ResolveError::UnknownUnit(unit.to_string()))?;
        symbols
            .get_mut(symbol)
            .ok_or_else(|| ResolveError::MissingSymbol {
                unit: unit.to_string(),
                symbol: symbol.to_string(),
            })
    }
}

/// Canonical form of a unit path: `classes/warrior.rs`, `classes.warrior`
/// and `classes::warrior` all become `classes::warrior`.
pub fn normalize_unit_path(path: &str) -> String {
    let path = path.trim();
    let path = path.strip_suffix(".rs").unwrap_or(path);
    path.replace("::", "/")
        .split(['/', '.'])
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("::")
}
