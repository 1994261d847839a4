/// Content Import: loads content directories and prints the import summary.
///
/// Usage: content_import [--config <file.ron>] [--catalog <file.ron>]
///                       [--locations <dir>] [--classes <dir>] [--items <dir>]
///                       [--seed <n>] [--link] [--render <file>]
///
/// `--render` prints one templated file after macro expansion and exits.
/// Log verbosity follows `RUST_LOG` (default `info`).

use mud_content::core::library::{Library, LibraryConfig};
use mud_content::schema::catalog::Catalog;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: content_import [--config <file.ron>] [--catalog <file.ron>] \
[--locations <dir>] [--classes <dir>] [--items <dir>] [--seed <n>] [--link] [--render <file>]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        process::exit(0);
    }

    let mut config_path = None;
    let mut catalog_path = None;
    let mut locations_dir = None;
    let mut classes_dir = None;
    let mut items_dir = None;
    let mut seed = None;
    let mut render_path = None;
    let mut link = false;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--config", Some(v)) => config_path = Some(PathBuf::from(v)),
            ("--catalog", Some(v)) => catalog_path = Some(PathBuf::from(v)),
            ("--locations", Some(v)) => locations_dir = Some(PathBuf::from(v)),
            ("--classes", Some(v)) => classes_dir = Some(PathBuf::from(v)),
            ("--items", Some(v)) => items_dir = Some(PathBuf::from(v)),
            ("--render", Some(v)) => render_path = Some(PathBuf::from(v)),
            ("--seed", Some(v)) => match v.parse::<u64>() {
                Ok(n) => seed = Some(n),
                Err(_) => {
                    eprintln!("ERROR: --seed expects an unsigned integer, got '{}'", v);
                    process::exit(2);
                }
            },
            ("--link", _) => {
                link = true;
                i += 1;
                continue;
            }
            (other, _) => {
                eprintln!("ERROR: unexpected argument '{}'\n{}", other, USAGE);
                process::exit(2);
            }
        }
        i += 2;
    }

    let mut config = match config_path {
        Some(ref path) => match LibraryConfig::load_from_ron(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => LibraryConfig::default(),
    };
    // Command-line directories override the config file.
    if locations_dir.is_some() {
        config.locations_dir = locations_dir;
    }
    if classes_dir.is_some() {
        config.classes_dir = classes_dir;
    }
    if items_dir.is_some() {
        config.items_dir = items_dir;
    }

    let catalog = match catalog_path {
        Some(ref path) => match Catalog::load_from_ron(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                eprintln!("ERROR: Failed to load catalog '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Catalog::new(),
    };

    let mut builder = Library::builder().config(config).catalog(catalog);
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    let mut library = builder.build();

    if let Some(path) = render_path {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("ERROR: Failed to read '{}': {}", path.display(), e);
                process::exit(1);
            }
        };
        match library.render_template(&text) {
            Ok(rendered) => {
                println!("{}", rendered);
                process::exit(0);
            }
            Err(e) => {
                eprintln!("ERROR: {}: {}", path.display(), e);
                process::exit(1);
            }
        }
    }

    if let Err(e) = library.import_config_dirs() {
        eprintln!("ERROR: Failed to list content files: {}", e);
        process::exit(1);
    }
    if link {
        library.link_locations();
    }

    println!("{}", library.import_summary());

    if !library.char_classes().is_empty() {
        match library.build_class_distribution() {
            Ok(()) => {
                if let Some(class) = library.random_class() {
                    println!("Random class: {}", class);
                }
            }
            Err(e) => println!("Class distribution: {}", e),
        }
    }
}
