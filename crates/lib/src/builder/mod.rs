//! Builders: units of work producing output artifacts.
//!
//! A builder declares its intrinsic dependencies, discovers the builders it
//! needs to run first, and produces an exact set of output paths. The list of
//! prerequisites is held in an explicit [`Resolution`] state machine:
//!
//! ```text
//! Unresolved --resolve()--> Resolved { prerequisites, dependencies }
//!     ^                              |
//!     +---------invalidate()---------+
//! ```
//!
//! Identity is the structural [`BuilderKey`]: two builders for the same entity
//! have equal keys regardless of their prerequisite state.

mod project_file;
mod reference;
mod single_file;
#[cfg(test)]
pub mod testing;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::context::RunContext;
use crate::deps::Dependencies;
use crate::model::Reference;
use crate::resolve::ResolveError;
use crate::session::Session;
use crate::source::SourceError;

pub use project_file::{PROJECT_FILE_SUFFIX, ProjectFileBuilder, ProjectFileDocument};
pub use reference::{FileReferenceBuilder, ProjectReferenceBuilder};
pub use single_file::SingleFileBuilder;

/// Path of an artifact produced by a builder.
pub type TargetPath = PathBuf;

/// Structural identity of a builder: its kind plus the id of what it builds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BuilderKey {
  pub kind: &'static str,
  pub entity: String,
}

impl BuilderKey {
  pub fn new(kind: &'static str, entity: impl Into<String>) -> Self {
    Self {
      kind,
      entity: entity.into(),
    }
  }
}

impl fmt::Display for BuilderKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.entity)
  }
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("source set {source_set} is ambiguous, expected one file but found: {}", .candidates.join(", "))]
  AmbiguousSourceSet {
    source_set: String,
    candidates: Vec<String>,
  },

  #[error("source set {source_set} has no files")]
  EmptySourceSet { source_set: String },

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("missing artifact: {}", .path.display())]
  MissingArtifact { path: PathBuf },

  #[error("no result recorded for prerequisite {uid}")]
  MissingResult { uid: String },

  #[error(transparent)]
  Source(#[from] SourceError),

  #[error("io error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("{message}")]
  Failed { message: String },
}

impl BuildError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    BuildError::Io {
      path: path.into(),
      source,
    }
  }
}

/// Prerequisite resolution of a builder.
#[derive(Debug, Clone, Default)]
pub enum Resolution {
  #[default]
  Unresolved,
  Resolved {
    prerequisites: Vec<Arc<dyn Builder>>,
    dependencies: Dependencies,
  },
}

/// Mutable per-instance state shared by every builder implementation.
#[derive(Debug, Default)]
pub struct BuilderState {
  resolution: Mutex<Resolution>,
}

impl BuilderState {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Resolution> {
    self.resolution.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn resolution(&self) -> Resolution {
    self.lock().clone()
  }

  fn set(&self, resolution: Resolution) {
    *self.lock() = resolution;
  }
}

pub trait Builder: Send + Sync + fmt::Debug {
  fn key(&self) -> BuilderKey;

  /// Stable string identity, used as the artifact store key.
  fn uid(&self) -> String;

  fn state(&self) -> &BuilderState;

  /// Dependencies known without looking at prerequisites.
  fn intrinsic_dependencies(&self) -> Dependencies;

  /// Builders that must run before this one.
  fn discover_prerequisites(&self, session: &Session) -> Result<Vec<Arc<dyn Builder>>, BuildError>;

  /// The reference this builder satisfies, if any.
  fn reference(&self) -> Option<&Reference> {
    None
  }

  /// Produce the outputs. Called at most once per build context.
  fn run(&self, ctx: &RunContext) -> Result<BTreeSet<TargetPath>, BuildError>;

  /// Whether `run` writes files under the target directory. Stored results of
  /// such builders are only reused for the same target directory.
  fn writes_outputs(&self) -> bool {
    false
  }

  fn kind(&self) -> &'static str {
    self.key().kind
  }

  /// Attach prerequisites and fold their identity into this builder's dependencies.
  fn resolve(&self, prerequisites: Vec<Arc<dyn Builder>>) {
    let mut deps = vec![self.intrinsic_dependencies()];
    deps.extend(prerequisites.iter().map(Dependencies::prerequisite));
    self.state().set(Resolution::Resolved {
      prerequisites,
      dependencies: Dependencies::combine(deps),
    });
  }

  fn invalidate(&self) {
    self.state().set(Resolution::Unresolved);
  }

  fn is_resolved(&self) -> bool {
    matches!(self.state().resolution(), Resolution::Resolved { .. })
  }

  fn prerequisites(&self) -> Vec<Arc<dyn Builder>> {
    match self.state().resolution() {
      Resolution::Resolved { prerequisites, .. } => prerequisites,
      Resolution::Unresolved => Vec::new(),
    }
  }

  /// Intrinsic dependencies before resolution, plus one entry per prerequisite after.
  fn dependencies(&self) -> Dependencies {
    match self.state().resolution() {
      Resolution::Resolved { dependencies, .. } => dependencies,
      Resolution::Unresolved => self.intrinsic_dependencies(),
    }
  }
}
