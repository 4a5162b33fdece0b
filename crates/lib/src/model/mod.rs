//! Suite, module and project model.
//!
//! The model is the input to builder creation: projects carry source sets,
//! named properties and references that the registry and resolver turn into
//! builders.

mod file;
mod types;

pub use file::{ModuleFile, ProjectFile, SuiteFile, SuiteFileError, load_suite};
pub use types::*;
