/// Import integration tests: fixture files through the full library.

use mud_content::core::importer::{FileOutcome, LocationImporter};
use mud_content::core::library::{Library, LibraryConfig, LibraryError};
use mud_content::core::record::RecordLoader;
use mud_content::schema::catalog::Catalog;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const NONE: &[PathBuf] = &[];

fn fixture(path: &str) -> PathBuf {
    Path::new("tests/fixtures").join(path)
}

fn library(seed: u64) -> Library {
    let catalog = Catalog::load_from_ron(&fixture("catalog.ron")).unwrap();
    Library::builder().seed(seed).catalog(catalog).build()
}

fn full_library() -> Library {
    let config = LibraryConfig::load_from_ron(&fixture("library.ron")).unwrap();
    let catalog = Catalog::load_from_ron(&fixture("catalog.ron")).unwrap();
    let mut library = Library::builder().config(config).catalog(catalog).build();
    library.import_config_dirs().unwrap();
    library
}

#[test]
fn well_formed_location_imports_cleanly() {
    let mut library = library(1);
    library.import_files(&[fixture("locations/courtyard.ron")], NONE, NONE);

    assert_eq!(library.locations().len(), 1);
    let courtyard = &library.locations()["Courtyard"];
    assert_eq!(courtyard.description, "Open to the sky.");
    assert_eq!(library.location_importer().outcome().failure_count(), 0);
}

#[test]
fn templated_location_renders_macros() {
    let mut library = library(1);
    library.import_files(&[fixture("locations/hall.json")], NONE, NONE);

    let hall = &library.locations()["Great Hall"];
    assert!(!hall.description.contains("!{"));
    assert!(["dusty", "drafty", "dim"]
        .iter()
        .any(|word| hall.description.contains(word)));
    assert_eq!(hall.pending.exits.len(), 3);
    assert_eq!(hall.pending.items.len(), 3);
}

#[test]
fn nameless_record_is_a_file_failure() {
    let mut library = library(1);
    let path = fixture("broken/nameless.json");
    library.import_files(&[path.clone()], NONE, NONE);

    let outcome = library.location_importer().outcome();
    assert!(outcome.registry.is_empty());
    assert!(outcome.object_failures.is_empty());
    assert_eq!(outcome.file_failures.len(), 1);
    assert!(outcome.file_failures[&path].contains("name"));
}

#[test]
fn items_sequence_is_an_object_failure() {
    let mut library = library(1);
    library.import_files(&[fixture("broken/ruins.json")], NONE, NONE);

    let outcome = library.location_importer().outcome();
    assert!(outcome.registry.is_empty());
    assert!(outcome.file_failures.is_empty());
    assert_eq!(outcome.object_failures.len(), 1);
    assert!(outcome.object_failures["Ruins"].contains("items"));
}

#[test]
fn template_failures_are_file_failures() {
    let mut library = library(1);
    let unterminated = fixture("broken/unterminated.json");
    let unknown = fixture("broken/unknown_function.json");
    library.import_files(&[unterminated.clone(), unknown.clone()], NONE, NONE);

    let outcome = library.location_importer().outcome();
    assert!(outcome.registry.is_empty());
    assert!(outcome.file_failures[&unterminated].contains("unterminated macro"));
    assert!(outcome.file_failures[&unknown].contains("unknown function"));
}

#[test]
fn batch_continues_past_failures() {
    let mut library = library(1);
    library.import_files(
        &[
            fixture("broken/nameless.json"),
            fixture("locations/courtyard.ron"),
            fixture("broken/ruins.json"),
            fixture("locations/hall.json"),
        ],
        NONE,
        NONE,
    );

    let names: Vec<&str> = library.locations().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Courtyard", "Great Hall"]);
    let outcome = library.location_importer().outcome();
    assert_eq!(outcome.file_failures.len(), 1);
    assert_eq!(outcome.object_failures.len(), 1);
    assert_eq!(
        outcome.object_source["Great Hall"],
        fixture("locations/hall.json")
    );
}

#[test]
fn runaway_macros_fail_their_file_only() {
    let dir = tempfile::tempdir().unwrap();
    let repeat = dir.path().join("a_repeat.json");
    std::fs::write(&repeat, r#"{"name": "Echo", "description": "!{'ab' * 9223372036854775807}"}"#).unwrap();
    let nan = dir.path().join("b_nan.json");
    std::fs::write(&nan, r#"{"name": "Spin", "description": "!{vonmisesvariate(0, 1e400 - 1e400)}"}"#).unwrap();
    let deep = dir.path().join("c_deep.json");
    let nested = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
    std::fs::write(&deep, format!(r#"{{"name": "Pit", "description": "!{{{}}}"}}"#, nested)).unwrap();
    let good = dir.path().join("d_good.json");
    std::fs::write(&good, r#"{"name": "Good", "description": "Fine."}"#).unwrap();

    let mut library = library(1);
    library.import_files(&[repeat.clone(), nan.clone(), deep.clone(), good], NONE, NONE);

    let names: Vec<&str> = library.locations().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Good"]);
    let outcome = library.location_importer().outcome();
    assert_eq!(outcome.file_failures.len(), 3);
    assert!(outcome.file_failures[&repeat].contains("1 MiB"));
    assert!(outcome.file_failures[&nan].contains("finite number"));
    assert!(outcome.file_failures[&deep].contains("nested too deeply"));
}

#[test]
fn classes_resolve_and_take_frequency() {
    let mut library = library(1);
    library.import_files(
        NONE,
        &[
            fixture("classes/warrior.json"),
            fixture("classes/thief.ron"),
            fixture("classes/peasant.json"),
            fixture("broken/mage.json"),
        ],
        NONE,
    );

    let classes = library.char_classes();
    assert_eq!(classes.len(), 3);
    assert_eq!(classes["Warrior"].frequency, 3.0);
    assert_eq!(classes["Thief"].frequency, 1.5);
    assert_eq!(classes["Peasant"].frequency, 0.0);
    assert_eq!(classes["Warrior"].equip_slots.len(), 2);

    let failures = &library.class_importer().outcome().object_failures;
    assert!(failures["Mage"].contains("classes::casters"));
}

#[test]
fn class_distribution_skips_zero_frequency() {
    let mut library = library(5);
    library.import_files(
        NONE,
        &[
            fixture("classes/warrior.json"),
            fixture("classes/thief.ron"),
            fixture("classes/peasant.json"),
        ],
        NONE,
    );
    library.build_class_distribution().unwrap();

    let mut seen = HashSet::new();
    for _ in 0..200 {
        let class = library.random_class().unwrap();
        assert_ne!(class.name, "Peasant");
        seen.insert(class.name.clone());
    }
    assert_eq!(seen.len(), 2);
}

#[test]
fn only_zero_frequency_classes_fail_distribution() {
    let mut library = library(5);
    library.import_files(NONE, &[fixture("classes/peasant.json")], NONE);
    assert!(matches!(
        library.build_class_distribution(),
        Err(LibraryError::NoEligibleClasses)
    ));
}

#[test]
fn items_resolve_to_definitions() {
    let mut library = library(1);
    library.import_files(
        NONE,
        NONE,
        &[
            fixture("items/torch.json"),
            fixture("items/sword.ron"),
            fixture("items/bandage.json"),
            fixture("broken/pathless_item.json"),
        ],
    );

    let items = library.items();
    assert_eq!(items.len(), 3);
    assert_eq!(items["Torch"].item_type(), "Misc. Item");
    assert_eq!(items["IronSword"].to_string(), "Iron Sword");
    assert_eq!(items["IronSword"].item_type(), "Equippable");
    assert_eq!(items["Bandage"].item_type(), "Consumable");

    let hand = library.catalog().equip_targets().lookup("Hand").unwrap();
    assert_eq!(items["IronSword"].equip_target(), Some(hand));
    assert!(library.char_classes().is_empty());

    let failures = &library.item_importer().outcome().object_failures;
    assert!(failures["Torch"].contains("path"));
}

#[test]
fn reimport_replaces_entry_with_new_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shed.json");
    std::fs::write(&path, r#"{"name": "Shed", "description": "Old."}"#).unwrap();

    let mut library = library(1);
    library.import_files(&[path.clone()], NONE, NONE);
    let first = Rc::clone(&library.locations()["Shed"]);

    std::fs::write(&path, r#"{"name": "Shed", "description": "Rebuilt."}"#).unwrap();
    library.import_files(&[path.clone()], NONE, NONE);
    let second = Rc::clone(&library.locations()["Shed"]);

    assert_eq!(library.locations().len(), 1);
    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!(first.description, "Old.");
    assert_eq!(second.description, "Rebuilt.");

    // A failed re-import leaves the previous entry in place.
    std::fs::write(&path, r#"{"name": "Shed", "description": "x", "exits": {}}"#).unwrap();
    library.import_files(&[path], NONE, NONE);
    assert!(Rc::ptr_eq(&second, &library.locations()["Shed"]));
    assert!(library.location_importer().outcome().object_failures.contains_key("Shed"));
}

#[test]
fn import_file_reports_outcome() {
    let mut library = library(1);
    library.import_files(&[fixture("locations/cellar.json")], NONE, NONE);
    assert_eq!(library.locations()["Cellar"].description, "Cold and damp.");

    let mut importer = LocationImporter::new();
    let mut catalog = Catalog::new();
    let loader = RecordLoader::default();
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(
        importer.import_file(&fixture("broken/ruins.json"), &loader, &mut catalog, &mut rng),
        FileOutcome::ObjectFailed("Ruins".to_string())
    );
    assert_eq!(
        importer.import_file(&fixture("broken/nameless.json"), &loader, &mut catalog, &mut rng),
        FileOutcome::FileFailed
    );
    assert_eq!(
        importer.import_file(&fixture("locations/cellar.json"), &loader, &mut catalog, &mut rng),
        FileOutcome::Imported("Cellar".to_string())
    );
}

#[test]
fn config_directories_import_everything() {
    let library = full_library();
    assert_eq!(library.config().seed, Some(11));
    assert_eq!(library.locations().len(), 3);
    assert_eq!(library.char_classes().len(), 3);
    assert_eq!(library.items().len(), 3);
    assert_eq!(library.location_importer().outcome().failure_count(), 0);
    assert_eq!(library.class_importer().outcome().failure_count(), 0);
    assert_eq!(library.item_importer().outcome().failure_count(), 0);
}

#[test]
fn seeded_libraries_render_identically() {
    let a = full_library();
    let b = full_library();
    assert_eq!(
        a.locations()["Great Hall"].description,
        b.locations()["Great Hall"].description
    );
}

#[test]
fn linking_resolves_exits_and_items() {
    let mut library = full_library();
    let report = library.link_locations();

    let hall = &report.linked["Great Hall"];
    assert_eq!(hall.exits.len(), 2);
    assert_eq!(hall.find_exit("out").unwrap().destination, "Courtyard");
    let down = hall.find_exit("down").unwrap();
    assert!(down.hide_destination);
    assert!(!down.permits("Peasant"));
    assert_eq!(down.to_string(), "down");

    let item_names: Vec<&str> = hall.items.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(item_names, vec!["Torch", "IronSword"]);
    assert!((1..3).contains(&hall.items[0].1));

    assert_eq!(
        report.exit_failures["Great Hall"]["Tower"],
        "destination 'Tower' could not be found"
    );
    assert_eq!(
        report.item_failures["Great Hall"]["Crown"],
        "item 'Crown' could not be found"
    );

    let cellar = &report.linked["Cellar"];
    assert!(cellar.find_exit("up").unwrap().permits("Thief"));
    assert!(!cellar.find_exit("up").unwrap().permits("Peasant"));
    assert_eq!(cellar.items, vec![("Bandage".to_string(), 2)]);
    assert_eq!(report.linked["Courtyard"].exits.len(), 1);
}

#[test]
fn linking_distinguishes_failed_destinations() {
    let dir = tempfile::tempdir().unwrap();
    let gate = dir.path().join("gate.json");
    std::fs::write(
        &gate,
        r#"{"name": "Gate", "description": "Iron.", "exits": [{"destination": "Ruins"}]}"#,
    )
    .unwrap();

    let mut library = library(1);
    library.import_files(&[gate, fixture("broken/ruins.json")], NONE, NONE);
    let report = library.link_locations();
    assert_eq!(
        report.exit_failures["Gate"]["Ruins"],
        "destination 'Ruins' failed to import"
    );
}

#[test]
fn linking_replaces_previous_pass() {
    let mut library = library(1);
    library.import_files(&[fixture("locations/courtyard.ron")], NONE, NONE);
    assert_eq!(library.link_locations().failure_count(), 1);

    library.import_files(&[fixture("locations/hall.json")], NONE, NONE);
    let report = library.link_locations();
    assert!(!report.exit_failures.contains_key("Courtyard"));
    assert_eq!(report.linked["Courtyard"].exits.len(), 1);
}

#[test]
fn summary_reports_successes_and_failures_in_order() {
    let mut library = full_library();
    library.import_files(
        &[fixture("broken/nameless.json"), fixture("broken/ruins.json")],
        &[fixture("broken/mage.json")],
        NONE,
    );
    library.link_locations();
    let summary = library.import_summary();

    let sections = [
        "== Locations ==",
        "== Character Classes ==",
        "== Items ==",
        "EXIT FAILURES",
        "ITEM FAILURES",
    ];
    let positions: Vec<usize> = sections
        .iter()
        .map(|s| summary.find(s).unwrap_or_else(|| panic!("missing {}", s)))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    assert!(summary.contains("SUCCESS LIST (3)"));
    assert!(summary.contains("nameless.json"));
    assert!(summary.contains("Ruins"));
    assert!(summary.contains("Mage"));
    assert!(summary.contains("Great Hall -> Tower"));
    assert!(summary.contains("Great Hall [Crown]"));
}
