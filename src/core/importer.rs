/// Record import: converts loaded records into domain objects with
/// per-file and per-object failure isolation.

use indexmap::IndexMap;
use rand::RngCore;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::core::record::{Record, RecordLoader};
use crate::schema::catalog::{Catalog, ResolveError};
use crate::schema::character::CharacterClass;
use crate::schema::item::ItemDefinition;
use crate::schema::location::{Location, PendingLinks};
use crate::schema::value::Value;

/// Object-level failures: the record had a name, but could not be
/// converted.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid field '{field}': {reason}")]
    Schema { field: &'static str, reason: String },
    #[error("symbol resolution failed: {0}")]
    Resolution(#[from] ResolveError),
}

impl ConvertError {
    fn schema(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Schema {
            field,
            reason: reason.into(),
        }
    }
}

/// Variant-specific conversion from a validated record.
pub trait ContentKind {
    type Object: fmt::Display + fmt::Debug;

    /// Heading used in reports, e.g. "Locations".
    const LABEL: &'static str;

    fn convert(record: &Record, catalog: &mut Catalog) -> Result<Self::Object, ConvertError>;
}

/// Result of importing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Registered under this name.
    Imported(String),
    /// Failed before a name was known.
    FileFailed,
    /// Failed during conversion of the named record.
    ObjectFailed(String),
}

/// Successes and failures accumulated by one importer.
///
/// Maps keep insertion order so reports follow processing order.
#[derive(Debug)]
pub struct ImportOutcome<T> {
    pub registry: IndexMap<String, Rc<T>>,
    pub file_failures: IndexMap<PathBuf, String>,
    pub object_failures: IndexMap<String, String>,
    /// File each registry entry was last imported from.
    pub object_source: IndexMap<String, PathBuf>,
}

impl<T> Default for ImportOutcome<T> {
    fn default() -> Self {
        Self {
            registry: IndexMap::new(),
            file_failures: IndexMap::new(),
            object_failures: IndexMap::new(),
            object_source: IndexMap::new(),
        }
    }
}

impl<T> ImportOutcome<T> {
    pub fn failure_count(&self) -> usize {
        self.file_failures.len() + self.object_failures.len()
    }
}

/// Drives [`RecordLoader`] over files and converts each record with `K`.
#[derive(Debug)]
pub struct TypeImporter<K: ContentKind> {
    outcome: ImportOutcome<K::Object>,
    _kind: PhantomData<K>,
}

impl<K: ContentKind> Default for TypeImporter<K> {
    fn default() -> Self {
        Self {
            outcome: ImportOutcome::default(),
            _kind: PhantomData,
        }
    }
}

impl<K: ContentKind> TypeImporter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(&self) -> &ImportOutcome<K::Object> {
        &self.outcome
    }

    pub fn registry(&self) -> &IndexMap<String, Rc<K::Object>> {
        &self.outcome.registry
    }

    pub fn get(&self, name: &str) -> Option<&Rc<K::Object>> {
        self.outcome.registry.get(name)
    }

    /// Import one file. Never fails: errors land in the failure maps.
    ///
    /// A successful import overwrites any existing entry with the same name.
    pub fn import_file(
        &mut self,
        path: &Path,
        loader: &RecordLoader,
        catalog: &mut Catalog,
        rng: &mut dyn RngCore,
    ) -> FileOutcome {
        let record = match loader.load(path, rng) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(kind = K::LABEL, path = %path.display(), "file failed: {}", err);
                self.outcome
                    .file_failures
                    .insert(path.to_path_buf(), err.to_string());
                return FileOutcome::FileFailed;
            }
        };

        let name = record.name().to_string();
        match K::convert(&record, catalog) {
            Ok(object) => {
                tracing::debug!(kind = K::LABEL, name = %name, path = %path.display(), "imported");
                self.outcome.registry.insert(name.clone(), Rc::new(object));
                self.outcome
                    .object_source
                    .insert(name.clone(), path.to_path_buf());
                FileOutcome::Imported(name)
            }
            Err(err) => {
                tracing::warn!(kind = K::LABEL, name = %name, path = %path.display(), "object failed: {}", err);
                self.outcome
                    .object_failures
                    .insert(name.clone(), format!("{} ({}): {}", name, path.display(), err));
                FileOutcome::ObjectFailed(name)
            }
        }
    }

    /// Import every path in order; one failure never stops the batch.
    pub fn import_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        loader: &RecordLoader,
        catalog: &mut Catalog,
        rng: &mut dyn RngCore,
    ) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            outcomes.push(self.import_file(path.as_ref(), loader, catalog, rng));
        }
        let imported = outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Imported(_)))
            .count();
        tracing::info!(
            kind = K::LABEL,
            files = paths.len(),
            imported,
            failed = paths.len() - imported,
            "batch imported"
        );
        outcomes
    }
}

/// Report section: successes, then file and object failures.
impl<K: ContentKind> fmt::Display for TypeImporter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", K::LABEL)?;
        writeln!(f, "SUCCESS LIST ({})", self.outcome.registry.len())?;
        for object in self.outcome.registry.values() {
            writeln!(f, "  {}", object)?;
        }
        writeln!(f, "FILE FAILURES ({})", self.outcome.file_failures.len())?;
        for (path, reason) in &self.outcome.file_failures {
            writeln!(f, "  {} :\n    {}", path.display(), reason)?;
        }
        writeln!(f, "OBJECT FAILURES ({})", self.outcome.object_failures.len())?;
        for (name, reason) in &self.outcome.object_failures {
            writeln!(f, "  {} :\n    {}", name, reason)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn require_text<'r>(record: &'r Record, field: &'static str) -> Result<&'r str, ConvertError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ConvertError::schema(
            field,
            format!("expected text, got {}", other.kind()),
        )),
        None => Err(ConvertError::schema(field, "required field is missing")),
    }
}

// ---------------------------------------------------------------------------
// Content kinds
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LocationImport;

impl ContentKind for LocationImport {
    type Object = Location;
    const LABEL: &'static str = "Locations";

    /// Cross-references are captured, not resolved; see
    /// [`crate::core::linker`].
    fn convert(record: &Record, _catalog: &mut Catalog) -> Result<Location, ConvertError> {
        let description = require_text(record, "description")?;

        let items = match record.get("items") {
            None => IndexMap::new(),
            Some(Value::Map(items)) => items.clone(),
            Some(other) => {
                return Err(ConvertError::schema(
                    "items",
                    format!("expected a mapping of item name to quantity, got {}", other.kind()),
                ))
            }
        };
        let exits = match record.get("exits") {
            None => Vec::new(),
            Some(Value::Seq(exits)) => exits.clone(),
            Some(other) => {
                return Err(ConvertError::schema(
                    "exits",
                    format!("expected a sequence, got {}", other.kind()),
                ))
            }
        };

        Ok(Location::new(record.name(), description).with_pending(PendingLinks { exits, items }))
    }
}

#[derive(Debug)]
pub struct CharacterClassImport;

impl ContentKind for CharacterClassImport {
    type Object = CharacterClass;
    const LABEL: &'static str = "Character Classes";

    fn convert(record: &Record, catalog: &mut Catalog) -> Result<CharacterClass, ConvertError> {
        let path = require_text(record, "path")?;
        let frequency = match record.get("frequency") {
            None => None,
            Some(value) => match value.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Some(f),
                Some(f) => {
                    return Err(ConvertError::schema(
                        "frequency",
                        format!("must be a finite non-negative number, got {}", f),
                    ))
                }
                None => {
                    return Err(ConvertError::schema(
                        "frequency",
                        format!("expected a number, got {}", value.kind()),
                    ))
                }
            },
        };

        let class = catalog.resolve_class_mut(path, record.name())?;
        if let Some(frequency) = frequency {
            class.frequency = frequency;
        }
        Ok(class.clone())
    }
}

#[derive(Debug)]
pub struct ItemImport;

impl ContentKind for ItemImport {
    type Object = ItemDefinition;
    const LABEL: &'static str = "Items";

    fn convert(record: &Record, catalog: &mut Catalog) -> Result<ItemDefinition, ConvertError> {
        let path = require_text(record, "path")?;
        let item = catalog.resolve_item(path, record.name())?.clone();
        let slot = item.equip_target().and_then(|id| catalog.equip_targets().name(id));
        tracing::debug!(item = %item, kind = item.item_type(), slot = ?slot, "resolved item");
        Ok(item)
    }
}

pub type LocationImporter = TypeImporter<LocationImport>;
pub type CharacterClassImporter = TypeImporter<CharacterClassImport>;
pub type ItemImporter = TypeImporter<ItemImport>;
