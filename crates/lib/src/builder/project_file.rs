use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::RunContext;
use crate::deps::Dependencies;
use crate::model::{Project, ProjectType, Reference};
use crate::session::Session;
use crate::source::{SourceFilter, filtered_files};

use super::{BuildError, Builder, BuilderKey, BuilderState, TargetPath};

/// Suffix of generated project files; excluded from source fingerprints so a
/// project file written inside a source directory never invalidates itself.
pub const PROJECT_FILE_SUFFIX: &str = ".project.json";

const TRACKED_PROPERTIES: [&str; 3] = ["Name", "Type", "EffectiveVersion"];

/// Content of a generated `<project>.project.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFileDocument {
  pub project: String,
  #[serde(rename = "type")]
  pub project_type: ProjectType,
  pub version: String,
  /// Source set name to the relative paths it contains.
  pub sources: BTreeMap<String, Vec<String>>,
  /// Outputs of the build-time references.
  pub references: Vec<PathBuf>,
  /// Link-only references, recorded with their version pin.
  pub packages: Vec<Reference>,
  pub properties: BTreeMap<String, String>,
}

/// Generates the project file of one project.
#[derive(Debug)]
pub struct ProjectFileBuilder {
  project: Arc<Project>,
  state: BuilderState,
}

impl ProjectFileBuilder {
  pub fn new(project: Arc<Project>) -> Self {
    Self {
      project,
      state: BuilderState::new(),
    }
  }

  pub fn project(&self) -> &Arc<Project> {
    &self.project
  }

  fn filter() -> SourceFilter {
    SourceFilter::excluding([PROJECT_FILE_SUFFIX])
  }

  fn document(&self, references: BTreeSet<TargetPath>) -> Result<ProjectFileDocument, BuildError> {
    let mut sources = BTreeMap::new();
    for (name, set) in &self.project.source_sets {
      let files = filtered_files(set.as_ref(), &Self::filter())?;
      if !files.is_empty() {
        sources.insert(name.clone(), files.into_iter().collect());
      }
    }

    Ok(ProjectFileDocument {
      project: self.project.id.to_string(),
      project_type: self.project.project_type,
      version: self.project.effective_version().to_string(),
      sources,
      references: references.into_iter().collect(),
      packages: self.project.link_references().cloned().collect(),
      properties: self.project.properties.clone(),
    })
  }
}

impl Builder for ProjectFileBuilder {
  fn key(&self) -> BuilderKey {
    BuilderKey::new("project", self.project.id.to_string())
  }

  fn uid(&self) -> String {
    self.project.id.to_string()
  }

  fn state(&self) -> &BuilderState {
    &self.state
  }

  fn intrinsic_dependencies(&self) -> Dependencies {
    let mut deps = Vec::new();
    for (name, set) in &self.project.source_sets {
      if self.project.has_non_empty_source_set(name) {
        deps.push(Dependencies::source_structure(set, Self::filter()));
      }
    }

    let mut names: Vec<&str> = TRACKED_PROPERTIES.to_vec();
    names.extend(self.project.properties.keys().map(String::as_str));
    deps.push(Dependencies::properties(&self.project, &names));

    deps.extend(self.project.link_references().cloned().map(Dependencies::Reference));
    Dependencies::combine(deps)
  }

  fn writes_outputs(&self) -> bool {
    true
  }

  fn discover_prerequisites(&self, session: &Session) -> Result<Vec<Arc<dyn Builder>>, BuildError> {
    for reference in self.project.link_references() {
      session.references.check_link_only(reference)?;
    }

    self
      .project
      .build_references()
      .map(|reference| session.resolve_reference(reference, &self.project).map_err(BuildError::from))
      .collect()
  }

  fn run(&self, ctx: &RunContext) -> Result<BTreeSet<TargetPath>, BuildError> {
    let dir = ctx.target_dir().join(self.project.module());
    fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;

    let document = self.document(ctx.prerequisite_outputs(self)?)?;
    let path = dir.join(format!("{}{}", self.project.name(), PROJECT_FILE_SUFFIX));
    let content = serde_json::to_string_pretty(&document)?;
    fs::write(&path, content).map_err(|e| BuildError::io(&path, e))?;

    debug!(project = %self.project.id, path = %path.display(), "wrote project file");
    Ok(BTreeSet::from([path]))
  }
}
