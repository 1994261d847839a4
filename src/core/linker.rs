/// Location linking: the second pass over fully imported registries.
///
/// Location import only records raw `exits` and `items`. Linking resolves
/// them by name against the current registries, so it should run after all
/// batches a world depends on have been imported. Each exit and item entry
/// succeeds or fails on its own; a failure never drops the location.

use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::core::importer::ImportOutcome;
use crate::schema::character::CharacterClass;
use crate::schema::item::ItemDefinition;
use crate::schema::location::{Exit, Location};
use crate::schema::value::Value;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("exit entry is a {0}, expected a mapping")]
    NotAMapping(&'static str),
    #[error("no destination provided")]
    NoDestination,
    #[error("destination '{0}' failed to import")]
    DestinationFailed(String),
    #[error("destination '{0}' could not be found")]
    DestinationMissing(String),
    #[error("invalid field '{field}': {reason}")]
    BadField { field: &'static str, reason: String },
    #[error("unknown character class '{0}'")]
    UnknownClass(String),
    #[error("exit name '{0}' is already used in this location")]
    AmbiguousName(String),
    #[error("item '{0}' could not be found")]
    UnknownItem(String),
    #[error("invalid quantity {0} (expected a positive integer)")]
    BadQuantity(String),
}

/// The resolved links of one location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedLocation {
    pub exits: Vec<Exit>,
    /// `(item name, quantity)` in declaration order.
    pub items: Vec<(String, u32)>,
}

impl LinkedLocation {
    /// Find an exit by any of its names.
    pub fn find_exit(&self, name: &str) -> Option<&Exit> {
        self.exits.iter().find(|exit| exit.matches(name))
    }
}

/// Everything a linking pass produced.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub linked: IndexMap<String, LinkedLocation>,
    /// location → exit label → diagnostic
    pub exit_failures: IndexMap<String, IndexMap<String, String>>,
    /// location → item name → diagnostic
    pub item_failures: IndexMap<String, IndexMap<String, String>>,
}

impl LinkReport {
    pub fn failure_count(&self) -> usize {
        self.exit_failures.values().map(|m| m.len()).sum::<usize>()
            + self.item_failures.values().map(|m| m.len()).sum::<usize>()
    }
}

impl fmt::Display for LinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EXIT FAILURES")?;
        for (location, exits) in &self.exit_failures {
            for (exit, reason) in exits {
                writeln!(f, "  {} -> {} :\n    {}", location, exit, reason)?;
            }
        }
        writeln!(f, "ITEM FAILURES")?;
        for (location, items) in &self.item_failures {
            for (item, reason) in items {
                writeln!(f, "  {} [{}] :\n    {}", location, item, reason)?;
            }
        }
        Ok(())
    }
}

/// Resolve the pending exits and items of every registered location.
pub fn link_locations(
    locations: &ImportOutcome<Location>,
    classes: &IndexMap<String, Rc<CharacterClass>>,
    items: &IndexMap<String, Rc<ItemDefinition>>,
) -> LinkReport {
    let mut report = LinkReport::default();

    for (name, location) in &locations.registry {
        let mut linked = LinkedLocation::default();

        let mut exit_failures: IndexMap<String, String> = IndexMap::new();
        for (index, raw) in location.pending.exits.iter().enumerate() {
            let position = format!("[Exit #{}]", index + 1);
            let label = match raw
                .as_map()
                .and_then(|m| m.get("destination"))
                .and_then(Value::as_str)
            {
                Some(dest) if exit_failures.contains_key(dest) => format!("{} {}", dest, position),
                Some(dest) => dest.to_string(),
                None => position,
            };
            match build_exit(raw, locations, classes, &linked.exits) {
                Ok(exit) => linked.exits.push(exit),
                Err(err) => {
                    tracing::warn!(location = %name, exit = %label, "exit not linked: {}", err);
                    exit_failures.insert(label, err.to_string());
                }
            }
        }

        let mut item_failures: IndexMap<String, String> = IndexMap::new();
        for (item_name, quantity) in &location.pending.items {
            let resolved = if items.contains_key(item_name) {
                parse_quantity(quantity)
            } else {
                Err(LinkError::UnknownItem(item_name.clone()))
            };
            match resolved {
                Ok(quantity) => linked.items.push((item_name.clone(), quantity)),
                Err(err) => {
                    tracing::warn!(location = %name, item = %item_name, "item not linked: {}", err);
                    item_failures.insert(item_name.clone(), err.to_string());
                }
            }
        }

        if !exit_failures.is_empty() {
            report.exit_failures.insert(name.clone(), exit_failures);
        }
        if !item_failures.is_empty() {
            report.item_failures.insert(name.clone(), item_failures);
        }
        report.linked.insert(name.clone(), linked);
    }

    tracing::info!(
        locations = report.linked.len(),
        failures = report.failure_count(),
        "locations linked"
    );
    report
}

fn build_exit(
    raw: &Value,
    locations: &ImportOutcome<Location>,
    classes: &IndexMap<String, Rc<CharacterClass>>,
    existing: &[Exit],
) -> Result<Exit, LinkError> {
    let fields = raw.as_map().ok_or(LinkError::NotAMapping(raw.kind()))?;

    let destination = match fields.get("destination") {
        Some(Value::String(d)) => d.clone(),
        Some(other) => {
            return Err(LinkError::BadField {
                field: "destination",
                reason: format!("expected text, got {}", other.kind()),
            })
        }
        None => return Err(LinkError::NoDestination),
    };
    if !locations.registry.contains_key(&destination) {
        return Err(if locations.object_failures.contains_key(&destination) {
            LinkError::DestinationFailed(destination)
        } else {
            LinkError::DestinationMissing(destination)
        });
    }

    let name = match fields.get("name") {
        None => destination.clone(),
        Some(value) => text_field("name", value)?,
    };
    let mut exit = Exit::new(destination, name);
    if let Some(other_names) = fields.get("other_names") {
        exit.names.extend(text_list("other_names", other_names)?);
    }
    if let Some(hide) = fields.get("hide_destination").or_else(|| fields.get("hide_des")) {
        exit.hide_destination = hide.as_bool().ok_or_else(|| LinkError::BadField {
            field: "hide_destination",
            reason: format!("expected boolean, got {}", hide.kind()),
        })?;
    }
    for (field, target) in [("blacklist", &mut exit.blacklist), ("whitelist", &mut exit.whitelist)] {
        let Some(value) = fields.get(field) else {
            continue;
        };
        for class_name in text_list(field, value)? {
            if !classes.contains_key(&class_name) {
                return Err(LinkError::UnknownClass(class_name));
            }
            target.push(class_name);
        }
    }

    for exit_name in &exit.names {
        if existing.iter().any(|e| e.matches(exit_name)) {
            return Err(LinkError::AmbiguousName(exit_name.clone()));
        }
    }
    Ok(exit)
}

fn text_field(field: &'static str, value: &Value) -> Result<String, LinkError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LinkError::BadField {
            field,
            reason: format!("expected text, got {}", value.kind()),
        })
}

fn text_list(field: &'static str, value: &Value) -> Result<Vec<String>, LinkError> {
    let items = value.as_seq().ok_or_else(|| LinkError::BadField {
        field,
        reason: format!("expected a sequence of text, got {}", value.kind()),
    })?;
    items.iter().map(|item| text_field(field, item)).collect()
}

fn parse_quantity(value: &Value) -> Result<u32, LinkError> {
    let quantity = match value {
        Value::Float(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        other => other.as_i64(),
    };
    quantity
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| LinkError::BadQuantity(format!("{:?}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::location::PendingLinks;

    fn location(name: &str, exits: &str, items: &str) -> (String, Rc<Location>) {
        let exits: Vec<Value> = serde_json::from_str(exits).unwrap();
        let items: IndexMap<String, Value> = serde_json::from_str(items).unwrap();
        (
            name.to_string(),
            Rc::new(Location::new(name, "somewhere").with_pending(PendingLinks { exits, items })),
        )
    }

    fn world() -> (
        ImportOutcome<Location>,
        IndexMap<String, Rc<CharacterClass>>,
        IndexMap<String, Rc<ItemDefinition>>,
    ) {
        let mut locations = ImportOutcome::default();
        for (name, loc) in [
            location(
                "Hall",
                r#"[
                    {"destination": "Yard", "name": "north", "other_names": ["n"]},
                    {"destination": "Cellar", "name": "down", "hide_des": true, "blacklist": ["Thief"]},
                    {"destination": "Ruins"},
                    {"destination": "Moon"},
                    {"name": "nowhere"},
                    {"destination": "Yard", "name": "n"},
                    {"destination": "Yard", "name": "gate", "whitelist": ["Wizard"]}
                ]"#,
                r#"{"Torch": 2, "Rope": "3", "Ghost": 1, "Coin": 0}"#,
            ),
            location("Yard", "[]", "{}"),
            location("Cellar", r#"[{"destination": "Hall", "name": "up"}]"#, "{}"),
        ] {
            locations.registry.insert(name, loc);
        }
        locations
            .object_failures
            .insert("Ruins".to_string(), "Ruins: broken".to_string());

        let classes: IndexMap<String, Rc<CharacterClass>> =
            [("Thief".to_string(), Rc::new(CharacterClass::new("Thief")))].into_iter().collect();
        let items: IndexMap<String, Rc<ItemDefinition>> = ["Torch", "Rope", "Coin"]
            .into_iter()
            .map(|n| (n.to_string(), Rc::new(ItemDefinition::misc(n).unwrap())))
            .collect();
        (locations, classes, items)
    }

    #[test]
    fn links_valid_exits_and_items() {
        let (locations, classes, items) = world();
        let report = link_locations(&locations, &classes, &items);

        let hall = &report.linked["Hall"];
        assert_eq!(hall.exits.len(), 2);
        let north = hall.find_exit("n").unwrap();
        assert_eq!(north.destination, "Yard");
        let down = hall.find_exit("down").unwrap();
        assert!(down.hide_destination);
        assert!(!down.permits("Thief"));
        assert_eq!(hall.items, vec![("Torch".to_string(), 2), ("Rope".to_string(), 3)]);

        assert_eq!(report.linked["Cellar"].exits[0].destination, "Hall");
        assert!(report.linked["Yard"].exits.is_empty());
    }

    #[test]
    fn records_each_exit_failure() {
        let (locations, classes, items) = world();
        let report = link_locations(&locations, &classes, &items);
        let failures = &report.exit_failures["Hall"];

        assert_eq!(failures["Ruins"], "destination 'Ruins' failed to import");
        assert_eq!(failures["Moon"], "destination 'Moon' could not be found");
        assert_eq!(failures["[Exit #5]"], "no destination provided");
        assert!(failures["Yard"].contains("already used"));
        assert!(failures["Yard [Exit #7]"].contains("Wizard"));
        assert!(!report.exit_failures.contains_key("Cellar"));
    }

    #[test]
    fn unknown_whitelist_class_fails_exit() {
        let (locations, classes, items) = world();
        let report = link_locations(&locations, &classes, &items);
        assert!(report.linked["Hall"].find_exit("gate").is_none());
        let all: Vec<&String> = report.exit_failures["Hall"].values().collect();
        assert!(all.iter().any(|r| r.contains("unknown character class 'Wizard'")));
    }

    #[test]
    fn records_item_failures() {
        let (locations, classes, items) = world();
        let report = link_locations(&locations, &classes, &items);
        let failures = &report.item_failures["Hall"];
        assert_eq!(failures["Ghost"], "item 'Ghost' could not be found");
        assert!(failures["Coin"].starts_with("invalid quantity"));
        assert_eq!(report.failure_count(), 5 + 2);
        let text = report.to_string();
        assert!(text.contains("Hall -> Moon"));
        assert!(text.contains("Hall [Ghost]"));
    }

    #[test]
    fn quantities_accept_whole_numbers() {
        assert_eq!(parse_quantity(&Value::Int(3)), Ok(3));
        assert_eq!(parse_quantity(&Value::Float(2.0)), Ok(2));
        assert_eq!(parse_quantity(&Value::String(" 4 ".into())), Ok(4));
        for bad in [
            Value::Float(2.5),
            Value::Float(0.0),
            Value::Float(f64::INFINITY),
            Value::Float(1e12),
            Value::Int(-1),
            Value::String("2.0".into()),
            Value::Bool(true),
        ] {
            assert!(matches!(parse_quantity(&bad), Err(LinkError::BadQuantity(_))), "{:?}", bad);
        }
    }
}
