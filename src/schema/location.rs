use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::Value;

/// An in-game location produced by import.
///
/// Import only sets `name` and `description`. The raw `exits` and `items`
/// fields are kept as `pending` so that a later linking pass, run once all
/// records are loaded, can resolve them against the registries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub pending: PendingLinks,
}

/// Unresolved cross-references captured from a location record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingLinks {
    pub exits: Vec<Value>,
    pub items: IndexMap<String, Value>,
}

impl Location {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            pending: PendingLinks::default(),
        }
    }

    pub fn with_pending(mut self, pending: PendingLinks) -> Self {
        self.pending = pending;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A named passage from one location to another.
///
/// `destination` is the registry key of the target location, not a pointer,
/// so locations can be re-imported without dangling exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub destination: String,
    pub names: Vec<String>,
    pub hide_destination: bool,
    /// Character classes denied passage.
    pub blacklist: Vec<String>,
    /// Character classes allowed passage; empty means everyone.
    pub whitelist: Vec<String>,
}

impl Exit {
    pub fn new(destination: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            names: vec![name.into()],
            hide_destination: false,
            blacklist: Vec::new(),
            whitelist: Vec::new(),
        }
    }

    pub fn primary_name(&self) -> &str {
        &self.names[0]
    }

    /// Returns true if `name` is one of this exit's names.
    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Returns true if a character of class `class_name` may pass.
    pub fn permits(&self, class_name: &str) -> bool {
        if self.blacklist.iter().any(|c| c == class_name) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.iter().any(|c| c == class_name)
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hide_destination {
            f.write_str(self.primary_name())
        } else {
            write!(f, "{} -> {}", self.primary_name(), self.destination)
        }
    }
}
