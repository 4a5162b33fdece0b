//! Types for build context execution.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;

use crate::builder::{BuildError, Builder, BuilderKey, TargetPath};
use crate::consts::DEFAULT_TARGET_DIR;

#[derive(Debug, Error)]
pub enum ContextError {
  /// The prerequisite graph has a cycle through this builder.
  #[error("dependency cycle detected at {uid}")]
  CycleDetected { uid: String },

  /// Prerequisite discovery failed while registering a builder.
  #[error("failed to register {uid}: {source}")]
  Registration {
    uid: String,
    #[source]
    source: BuildError,
  },

  #[error("builder {uid} failed: {source}")]
  BuildFailed {
    uid: String,
    #[source]
    source: BuildError,
  },

  #[error("builder {uid} is not registered in this context")]
  NotRegistered { uid: String },
}

/// Configuration for a build context.
#[derive(Debug, Clone)]
pub struct ContextConfig {
  /// Maximum number of builders running at once.
  pub parallelism: usize,

  /// Root under which builders write their outputs.
  pub target_dir: PathBuf,
}

impl Default for ContextConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      target_dir: PathBuf::from(DEFAULT_TARGET_DIR),
    }
  }
}

fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Outcome of one `BuildContext::run` pass, keyed by builder uid.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Builders that ran in this pass.
  pub executed: BTreeMap<String, BTreeSet<TargetPath>>,

  /// Builders whose stored fingerprint was still up to date.
  pub cached: BTreeMap<String, BTreeSet<TargetPath>>,

  pub failed: BTreeMap<String, BuildError>,

  /// Builders not run because a prerequisite failed, mapped to that prerequisite's uid.
  pub skipped: BTreeMap<String, String>,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  pub fn total(&self) -> usize {
    self.executed.len() + self.cached.len() + self.failed.len() + self.skipped.len()
  }

  /// Outputs of a builder that completed in this pass.
  pub fn outputs(&self, uid: &str) -> Option<&BTreeSet<TargetPath>> {
    self.executed.get(uid).or_else(|| self.cached.get(uid))
  }

  /// Turn a failed report into an error naming the first failed builder.
  pub fn into_result(mut self) -> Result<Self, ContextError> {
    match self.failed.pop_first() {
      None => Ok(self),
      Some((uid, source)) => Err(ContextError::BuildFailed { uid, source }),
    }
  }
}

/// Whether a builder would run on the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
  /// Already completed in this context.
  Done,
  /// Stored fingerprint matches the current inputs.
  UpToDate,
  /// Inputs changed since the stored fingerprint.
  Stale,
  /// No stored record.
  New,
}

/// One builder of a dry-run plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
  pub uid: String,
  pub kind: &'static str,
  pub wave: usize,
  pub prerequisites: Vec<String>,
  pub status: PlanStatus,
  /// Short digest of the current fingerprint, when it can be computed.
  pub digest: Option<String>,
}

pub(crate) type ResultTable = Arc<RwLock<HashMap<BuilderKey, BTreeSet<TargetPath>>>>;

/// View of the context handed to a running builder.
#[derive(Debug, Clone)]
pub struct RunContext {
  target_dir: PathBuf,
  results: ResultTable,
}

impl RunContext {
  pub(crate) fn new(target_dir: PathBuf, results: ResultTable) -> Self {
    Self { target_dir, results }
  }

  /// A context with no recorded results, for running a builder on its own.
  pub fn detached(target_dir: &Path) -> Self {
    Self::new(target_dir.to_path_buf(), ResultTable::default())
  }

  pub fn target_dir(&self) -> &Path {
    &self.target_dir
  }

  /// Outputs recorded for `builder` in this pass.
  pub fn get_results(&self, builder: &dyn Builder) -> Option<BTreeSet<TargetPath>> {
    self
      .results
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&builder.key())
      .cloned()
  }

  pub fn get_dependencies(&self, builder: &dyn Builder) -> Vec<Arc<dyn Builder>> {
    builder.prerequisites()
  }

  /// Union of the outputs of every prerequisite of `builder`.
  pub fn prerequisite_outputs(&self, builder: &dyn Builder) -> Result<BTreeSet<TargetPath>, BuildError> {
    let mut outputs = BTreeSet::new();
    for prerequisite in self.get_dependencies(builder) {
      let results = self
        .get_results(prerequisite.as_ref())
        .ok_or_else(|| BuildError::MissingResult {
          uid: prerequisite.uid(),
        })?;
      outputs.extend(results);
    }
    Ok(outputs)
  }
}
