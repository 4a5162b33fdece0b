use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use tracing::debug;

use crate::context::RunContext;
use crate::deps::Dependencies;
use crate::model::Project;
use crate::session::Session;
use crate::source::{SourceFilter, SourceSet, file_name};

use super::{BuildError, Builder, BuilderKey, BuilderState, TargetPath};

/// Copies the single file of a one-file source set (e.g. `appconfig`) next
/// to the generated project outputs.
#[derive(Debug)]
pub struct SingleFileBuilder {
  project: Arc<Project>,
  source_set: String,
  state: BuilderState,
}

impl SingleFileBuilder {
  pub fn new(project: Arc<Project>, source_set: &str) -> Self {
    Self {
      project,
      source_set: source_set.to_string(),
      state: BuilderState::new(),
    }
  }

  fn qualified_name(&self) -> String {
    format!("{}/{}", self.project.id, self.source_set)
  }

  fn set(&self) -> Option<&Arc<dyn SourceSet>> {
    self.project.source_set(&self.source_set)
  }
}

impl Builder for SingleFileBuilder {
  fn key(&self) -> BuilderKey {
    BuilderKey::new("single-file", self.qualified_name())
  }

  fn uid(&self) -> String {
    self.qualified_name()
  }

  fn state(&self) -> &BuilderState {
    &self.state
  }

  fn intrinsic_dependencies(&self) -> Dependencies {
    match self.set() {
      Some(set) => Dependencies::source_content(set, SourceFilter::none()),
      None => Dependencies::None,
    }
  }

  fn writes_outputs(&self) -> bool {
    true
  }

  fn discover_prerequisites(&self, _session: &Session) -> Result<Vec<Arc<dyn Builder>>, BuildError> {
    Ok(Vec::new())
  }

  fn run(&self, ctx: &RunContext) -> Result<BTreeSet<TargetPath>, BuildError> {
    let empty = || BuildError::EmptySourceSet {
      source_set: self.qualified_name(),
    };

    let set = self.set().ok_or_else(empty)?;
    let files = set.files()?;
    let file = match files.len() {
      0 => return Err(empty()),
      1 => files.into_iter().next().ok_or_else(empty)?,
      _ => {
        return Err(BuildError::AmbiguousSourceSet {
          source_set: self.qualified_name(),
          candidates: files.into_iter().collect(),
        });
      }
    };

    let dir = ctx.target_dir().join(self.project.module()).join(self.project.name());
    fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;

    let path = dir.join(file_name(&file));
    fs::write(&path, set.read(&file)?).map_err(|e| BuildError::io(&path, e))?;

    debug!(source_set = %self.qualified_name(), path = %path.display(), "copied single file");
    Ok(BTreeSet::from([path]))
  }
}
