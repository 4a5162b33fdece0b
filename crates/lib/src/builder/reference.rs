use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::RunContext;
use crate::deps::Dependencies;
use crate::model::{Project, Reference};
use crate::session::Session;
use crate::source::{FileSource, SourceFilter, SourceSet};

use super::{BuildError, Builder, BuilderKey, BuilderState, TargetPath};

/// Satisfies a `module://` or `suite://` reference by building the target project.
///
/// The outputs are exactly the outputs of the target project's builder.
#[derive(Debug)]
pub struct ProjectReferenceBuilder {
  reference: Reference,
  target: Arc<Project>,
  state: BuilderState,
}

impl ProjectReferenceBuilder {
  pub fn new(reference: Reference, target: Arc<Project>) -> Self {
    Self {
      reference,
      target,
      state: BuilderState::new(),
    }
  }

  pub fn target(&self) -> &Arc<Project> {
    &self.target
  }
}

impl Builder for ProjectReferenceBuilder {
  fn key(&self) -> BuilderKey {
    BuilderKey::new("project-ref", self.uid())
  }

  fn uid(&self) -> String {
    format!("{}#ref:{}", self.target.id, self.reference)
  }

  fn state(&self) -> &BuilderState {
    &self.state
  }

  fn intrinsic_dependencies(&self) -> Dependencies {
    Dependencies::Reference(self.reference.clone())
  }

  fn discover_prerequisites(&self, session: &Session) -> Result<Vec<Arc<dyn Builder>>, BuildError> {
    Ok(vec![session.registry.builder_for(&self.target)?])
  }

  fn reference(&self) -> Option<&Reference> {
    Some(&self.reference)
  }

  fn run(&self, ctx: &RunContext) -> Result<BTreeSet<TargetPath>, BuildError> {
    ctx.prerequisite_outputs(self)
  }
}

/// Satisfies a `file://` reference to an artifact that already exists on disk.
#[derive(Debug)]
pub struct FileReferenceBuilder {
  reference: Reference,
  source: Arc<dyn SourceSet>,
  path: PathBuf,
  state: BuilderState,
}

impl FileReferenceBuilder {
  pub fn new(reference: Reference, path: &Path) -> Self {
    Self {
      reference,
      source: Arc::new(FileSource::new(path)),
      path: path.to_path_buf(),
      state: BuilderState::new(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Builder for FileReferenceBuilder {
  fn key(&self) -> BuilderKey {
    BuilderKey::new("file-ref", self.uid())
  }

  fn uid(&self) -> String {
    format!("{}#ref:{}", self.path.display(), self.reference)
  }

  fn state(&self) -> &BuilderState {
    &self.state
  }

  fn intrinsic_dependencies(&self) -> Dependencies {
    Dependencies::combine([
      Dependencies::Reference(self.reference.clone()),
      Dependencies::source_content(&self.source, SourceFilter::none()),
    ])
  }

  fn discover_prerequisites(&self, _session: &Session) -> Result<Vec<Arc<dyn Builder>>, BuildError> {
    Ok(Vec::new())
  }

  fn reference(&self) -> Option<&Reference> {
    Some(&self.reference)
  }

  fn run(&self, _ctx: &RunContext) -> Result<BTreeSet<TargetPath>, BuildError> {
    if !self.path.is_file() {
      return Err(BuildError::MissingArtifact {
        path: self.path.clone(),
      });
    }
    Ok(BTreeSet::from([self.path.clone()]))
  }
}
