//! MUD Content: templated game-content import for text adventures.
//!
//! Loads location, character-class and item records from JSON or RON files
//! whose text may embed `!{...}` macros drawing from random distributions,
//! converts them into typed registries, and reports every failure without
//! stopping the batch.

pub mod core;
pub mod schema;

pub use crate::core::library::{Library, LibraryBuilder, LibraryConfig, LibraryError};
