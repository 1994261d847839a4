pub mod distribution;
pub mod expr;
pub mod importer;
pub mod library;
pub mod linker;
pub mod record;
pub mod stochastic;
pub mod template;
