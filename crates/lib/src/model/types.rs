//! Suite model types.
//!
//! A suite is a set of modules, each holding projects. Projects own named
//! source sets and declare references to other projects or external artifacts.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_TARGET_DIR, DEFAULT_VERSION};
use crate::source::SourceSet;

/// Identity of a project inside a suite: `<module>.<project>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId {
  pub module: String,
  pub name: String,
}

impl ProjectId {
  pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      module: module.into(),
      name: name.into(),
    }
  }
}

impl fmt::Display for ProjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.module, self.name)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
  #[default]
  Library,
  Executable,
  Test,
  Other,
}

impl ProjectType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProjectType::Library => "Library",
      ProjectType::Executable => "Executable",
      ProjectType::Test => "Test",
      ProjectType::Other => "Other",
    }
  }
}

impl fmt::Display for ProjectType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Whether a reference participates in the build graph or is only version-tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
  /// The target must be built in this pass and becomes a prerequisite.
  #[default]
  Build,
  /// Only the reference identity and version pin are tracked.
  Link,
}

/// A project's declared dependency on another project or an external artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
  /// Target URI in `scheme://target` form.
  pub uri: String,
  #[serde(default)]
  pub kind: ReferenceKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

impl Reference {
  pub fn build(uri: impl Into<String>) -> Self {
    Self {
      uri: uri.into(),
      kind: ReferenceKind::Build,
      version: None,
    }
  }

  pub fn link(uri: impl Into<String>, version: Option<&str>) -> Self {
    Self {
      uri: uri.into(),
      kind: ReferenceKind::Link,
      version: version.map(str::to_string),
    }
  }

  pub fn is_build_time(&self) -> bool {
    self.kind == ReferenceKind::Build
  }

  /// Split the URI into its scheme and target parts.
  ///
  /// Returns `None` when the URI has no `://` separator or an empty scheme.
  pub fn split_uri(&self) -> Option<(&str, &str)> {
    let (scheme, target) = self.uri.split_once("://")?;
    if scheme.is_empty() {
      return None;
    }
    Some((scheme, target))
  }
}

impl fmt::Display for Reference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.version {
      Some(version) => write!(f, "{}@{}", self.uri, version),
      None => f.write_str(&self.uri),
    }
  }
}

/// A buildable unit inside a module.
#[derive(Debug, Clone)]
pub struct Project {
  pub id: ProjectId,
  pub project_type: ProjectType,
  pub version: Option<String>,
  /// Version declared at suite level, used for `EffectiveVersion`.
  pub suite_version: Option<String>,
  pub properties: BTreeMap<String, String>,
  pub source_sets: BTreeMap<String, Arc<dyn SourceSet>>,
  pub references: Vec<Reference>,
}

impl Project {
  pub fn new(module: &str, name: &str) -> Self {
    Self {
      id: ProjectId::new(module, name),
      project_type: ProjectType::default(),
      version: None,
      suite_version: None,
      properties: BTreeMap::new(),
      source_sets: BTreeMap::new(),
      references: Vec::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.id.name
  }

  pub fn module(&self) -> &str {
    &self.id.module
  }

  pub fn with_type(mut self, project_type: ProjectType) -> Self {
    self.project_type = project_type;
    self
  }

  pub fn with_version(mut self, version: &str) -> Self {
    self.version = Some(version.to_string());
    self
  }

  pub fn with_source_set(mut self, name: &str, source_set: Arc<dyn SourceSet>) -> Self {
    self.source_sets.insert(name.to_string(), source_set);
    self
  }

  pub fn with_reference(mut self, reference: Reference) -> Self {
    self.references.push(reference);
    self
  }

  pub fn with_property(mut self, name: &str, value: &str) -> Self {
    self.properties.insert(name.to_string(), value.to_string());
    self
  }

  /// Version used for generated artifacts: project, then suite, then the default.
  pub fn effective_version(&self) -> &str {
    self
      .version
      .as_deref()
      .or(self.suite_version.as_deref())
      .unwrap_or(DEFAULT_VERSION)
  }

  /// Look up a named scalar property.
  ///
  /// Built-in names (`Name`, `Module`, `Type`, `Version`, `EffectiveVersion`)
  /// take precedence over free-form properties.
  pub fn property(&self, name: &str) -> Option<String> {
    match name {
      "Name" => Some(self.id.name.clone()),
      "Module" => Some(self.id.module.clone()),
      "Type" => Some(self.project_type.to_string()),
      "Version" => self.version.clone(),
      "EffectiveVersion" => Some(self.effective_version().to_string()),
      other => self.properties.get(other).cloned(),
    }
  }

  pub fn source_set(&self, name: &str) -> Option<&Arc<dyn SourceSet>> {
    self.source_sets.get(name)
  }

  /// True if the source set exists and currently lists at least one file.
  pub fn has_non_empty_source_set(&self, name: &str) -> bool {
    self
      .source_sets
      .get(name)
      .and_then(|set| set.files().ok())
      .is_some_and(|files| !files.is_empty())
  }

  pub fn build_references(&self) -> impl Iterator<Item = &Reference> {
    self.references.iter().filter(|r| r.is_build_time())
  }

  pub fn link_references(&self) -> impl Iterator<Item = &Reference> {
    self.references.iter().filter(|r| !r.is_build_time())
  }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
  pub name: String,
  pub projects: Vec<Arc<Project>>,
}

impl Module {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      projects: Vec::new(),
    }
  }

  pub fn project(&self, name: &str) -> Option<&Arc<Project>> {
    self.projects.iter().find(|p| p.name() == name)
  }
}

/// The root of the project model.
#[derive(Debug, Clone)]
pub struct Suite {
  pub name: String,
  pub version: Option<String>,
  pub root: PathBuf,
  pub target_dir: PathBuf,
  pub modules: Vec<Module>,
}

impl Suite {
  pub fn new(name: &str, root: &Path) -> Self {
    Self {
      name: name.to_string(),
      version: None,
      root: root.to_path_buf(),
      target_dir: root.join(DEFAULT_TARGET_DIR),
      modules: Vec::new(),
    }
  }

  /// Add a project, creating its module on first use.
  ///
  /// The suite version is propagated so `EffectiveVersion` can fall back to it.
  pub fn add_project(&mut self, mut project: Project) -> Arc<Project> {
    project.suite_version = self.version.clone();
    let project = Arc::new(project);
    let module_name = project.module().to_string();
    match self.modules.iter_mut().find(|m| m.name == module_name) {
      Some(module) => module.projects.push(project.clone()),
      None => {
        let mut module = Module::new(&module_name);
        module.projects.push(project.clone());
        self.modules.push(module);
      }
    }
    project
  }

  pub fn module(&self, name: &str) -> Option<&Module> {
    self.modules.iter().find(|m| m.name == name)
  }

  pub fn project(&self, module: &str, name: &str) -> Option<&Arc<Project>> {
    self.module(module)?.project(name)
  }

  pub fn find(&self, id: &ProjectId) -> Option<&Arc<Project>> {
    self.project(&id.module, &id.name)
  }

  pub fn projects(&self) -> impl Iterator<Item = &Arc<Project>> {
    self.modules.iter().flat_map(|m| m.projects.iter())
  }
}
