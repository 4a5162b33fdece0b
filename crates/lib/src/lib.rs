//! suitebuild-lib: incremental builds for multi-project suites.
//!
//! A suite is made of modules, each holding projects with source sets,
//! properties and references to other projects or external artifacts. This
//! crate turns that model into a graph of builders:
//! - `registry` creates the builder for each project type
//! - `resolve` turns build-time references into prerequisite builders
//! - `deps` describes the inputs of a builder and fingerprints them
//! - `context` de-duplicates builders, orders them and runs them concurrently
//! - `store` persists fingerprints and outputs so unchanged builders are skipped

pub mod builder;
pub mod consts;
pub mod context;
pub mod deps;
pub mod model;
pub mod platform;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod source;
pub mod store;
pub mod util;
