/// The content library: one importer per content kind, the shared symbol
/// catalog, and the character-class distribution.
///
/// Built via `Library::builder()`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use indexmap::IndexMap;

use crate::core::distribution::{DistributionError, WeightedDistribution};
use crate::core::importer::{CharacterClassImporter, ItemImporter, LocationImporter};
use crate::core::linker::{link_locations, LinkReport};
use crate::core::record::RecordLoader;
use crate::core::stochastic::StochasticEvaluator;
use crate::core::template::TemplateError;
use crate::schema::catalog::Catalog;
use crate::schema::character::CharacterClass;
use crate::schema::item::ItemDefinition;
use crate::schema::location::Location;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("no registered character class has a frequency above zero")]
    NoEligibleClasses,
    #[error("distribution error: {0}")]
    Distribution(#[from] DistributionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// File-driven library settings.
///
/// ```ron
/// (
///     seed: Some(7),
///     locations_dir: Some("content/locations"),
///     classes_dir: Some("content/classes"),
///     items_dir: None,
///     extensions: ["json", "ron"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub seed: Option<u64>,
    pub locations_dir: Option<PathBuf>,
    pub classes_dir: Option<PathBuf>,
    pub items_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            seed: None,
            locations_dir: None,
            classes_dir: None,
            items_dir: None,
            extensions: vec!["json".to_string(), "ron".to_string()],
        }
    }
}

impl LibraryConfig {
    pub fn load_from_ron(path: &Path) -> Result<Self, LibraryError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }
}

pub struct Library {
    catalog: Catalog,
    loader: RecordLoader,
    locations: LocationImporter,
    classes: CharacterClassImporter,
    items: ItemImporter,
    class_distribution: Option<WeightedDistribution<Rc<CharacterClass>>>,
    links: Option<LinkReport>,
    config: LibraryConfig,
    rng: StdRng,
}

/// Builder for constructing a `Library`.
#[derive(Default)]
pub struct LibraryBuilder {
    seed: Option<u64>,
    catalog: Option<Catalog>,
    config: Option<LibraryConfig>,
    evaluator: Option<StochasticEvaluator>,
}

impl LibraryBuilder {
    /// Fix the random source. Overrides any seed in the config.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Symbols that class and item records may resolve.
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(mut self, config: LibraryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the macro evaluator (e.g. with extra functions registered).
    pub fn evaluator(mut self, evaluator: StochasticEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn build(self) -> Library {
        let config = self.config.unwrap_or_default();
        let rng = match self.seed.or(config.seed) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Library {
            catalog: self.catalog.unwrap_or_default(),
            loader: RecordLoader::new(self.evaluator.unwrap_or_default()),
            locations: LocationImporter::new(),
            classes: CharacterClassImporter::new(),
            items: ItemImporter::new(),
            class_distribution: None,
            links: None,
            config,
            rng,
        }
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Library {
    pub fn builder() -> LibraryBuilder {
        LibraryBuilder::default()
    }

    /// Import three batches of files, each in list order.
    ///
    /// Additive: earlier registries and failures are kept, and a record
    /// whose name is already registered replaces the previous entry.
    pub fn import_files(
        &mut self,
        locations: &[impl AsRef<Path>],
        classes: &[impl AsRef<Path>],
        items: &[impl AsRef<Path>],
    ) {
        if !locations.is_empty() {
            self.locations
                .import_files(locations, &self.loader, &mut self.catalog, &mut self.rng);
        }
        if !classes.is_empty() {
            self.classes
                .import_files(classes, &self.loader, &mut self.catalog, &mut self.rng);
        }
        if !items.is_empty() {
            self.items
                .import_files(items, &self.loader, &mut self.catalog, &mut self.rng);
        }
    }

    /// Import every content file found in the configured directories.
    ///
    /// Directories that do not exist are skipped with a warning.
    pub fn import_config_dirs(&mut self) -> Result<(), LibraryError> {
        let mut batches: [Vec<PathBuf>; 3] = Default::default();
        let dirs = [
            &self.config.locations_dir,
            &self.config.classes_dir,
            &self.config.items_dir,
        ];
        for (batch, dir) in batches.iter_mut().zip(dirs) {
            let Some(dir) = dir else {
                continue;
            };
            if !dir.is_dir() {
                tracing::warn!(dir = %dir.display(), "content directory not found, skipping");
                continue;
            }
            *batch = list_content_files(dir, &self.config.extensions)?;
        }
        let [locations, classes, items] = batches;
        self.import_files(&locations, &classes, &items);
        Ok(())
    }

    /// Rebuild the class distribution from the current class registry.
    ///
    /// Classes with frequency `0.0` are left out. On error the previous
    /// distribution, if any, is kept.
    pub fn build_class_distribution(&mut self) -> Result<(), LibraryError> {
        let eligible: Vec<(Rc<CharacterClass>, f64)> = self
            .classes
            .registry()
            .values()
            .filter(|class| class.frequency > 0.0)
            .map(|class| (Rc::clone(class), class.frequency))
            .collect();
        if eligible.is_empty() {
            return Err(LibraryError::NoEligibleClasses);
        }
        let distribution = WeightedDistribution::from_pairs(eligible)?;
        tracing::info!(classes = distribution.len(), "class distribution rebuilt");
        self.class_distribution = Some(distribution);
        Ok(())
    }

    /// Sample a class from the last built distribution.
    pub fn random_class(&mut self) -> Option<Rc<CharacterClass>> {
        let distribution = self.class_distribution.as_ref()?;
        Some(Rc::clone(distribution.sample(&mut self.rng)))
    }

    /// Resolve location exits and items against the current registries.
    /// Replaces the result of any earlier pass.
    pub fn link_locations(&mut self) -> &LinkReport {
        let report = link_locations(
            self.locations.outcome(),
            self.classes.registry(),
            self.items.registry(),
        );
        self.links.insert(report)
    }

    /// Render template text with this library's evaluator and random source.
    pub fn render_template(&mut self, text: &str) -> Result<String, TemplateError> {
        self.loader.evaluator().process(text, &mut self.rng)
    }

    /// Every success and failure, per kind, in processing order.
    pub fn import_summary(&self) -> String {
        let mut summary = format!("{}\n{}\n{}", self.locations, self.classes, self.items);
        if let Some(links) = &self.links {
            summary.push('\n');
            summary.push_str(&links.to_string());
        }
        summary
    }

    pub fn locations(&self) -> &IndexMap<String, Rc<Location>> {
        self.locations.registry()
    }

    pub fn char_classes(&self) -> &IndexMap<String, Rc<CharacterClass>> {
        self.classes.registry()
    }

    pub fn items(&self) -> &IndexMap<String, Rc<ItemDefinition>> {
        self.items.registry()
    }

    pub fn location_importer(&self) -> &LocationImporter {
        &self.locations
    }

    pub fn class_importer(&self) -> &CharacterClassImporter {
        &self.classes
    }

    pub fn item_importer(&self) -> &ItemImporter {
        &self.items
    }

    pub fn class_distribution(&self) -> Option<&WeightedDistribution<Rc<CharacterClass>>> {
        self.class_distribution.as_ref()
    }

    pub fn links(&self) -> Option<&LinkReport> {
        self.links.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }
}

/// Files in `dir` whose extension is in `extensions` (case-insensitive),
/// sorted by path.
pub fn list_content_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, LibraryError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let accepted = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if accepted {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
