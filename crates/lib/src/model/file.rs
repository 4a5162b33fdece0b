//! Suite description file (`suite.yaml`).
//!
//! The file is a thin serde mapping onto the model types; source set
//! directories are resolved relative to the directory containing the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::DEFAULT_TARGET_DIR;
use crate::source::LocalSourceSet;

use super::types::{Project, ProjectType, Reference, Suite};

#[derive(Debug, Error)]
pub enum SuiteFileError {
  #[error("failed to read suite file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse suite file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("duplicate project {module}.{project} in suite file")]
  DuplicateProject { module: String, project: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteFile {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<PathBuf>,
  #[serde(default)]
  pub modules: Vec<ModuleFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFile {
  pub name: String,
  #[serde(default)]
  pub projects: Vec<ProjectFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
  pub name: String,
  #[serde(default, rename = "type")]
  pub project_type: ProjectType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  /// Source set name -> directory relative to the suite root.
  #[serde(default)]
  pub source_sets: BTreeMap<String, PathBuf>,
  #[serde(default)]
  pub references: Vec<Reference>,
  #[serde(default)]
  pub properties: BTreeMap<String, String>,
}

impl SuiteFile {
  pub fn parse(content: &str, path: &Path) -> Result<Self, SuiteFileError> {
    serde_yaml::from_str(content).map_err(|source| SuiteFileError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn load(path: &Path) -> Result<Self, SuiteFileError> {
    let content = fs::read_to_string(path).map_err(|source| SuiteFileError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content, path)
  }

  /// Build the in-memory suite model rooted at `root`.
  pub fn into_suite(self, root: &Path) -> Result<Suite, SuiteFileError> {
    let mut suite = Suite::new(&self.name, root);
    suite.version = self.version;
    suite.target_dir = root.join(self.target.unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR)));

    for module in self.modules {
      for project_file in module.projects {
        if suite.project(&module.name, &project_file.name).is_some() {
          return Err(SuiteFileError::DuplicateProject {
            module: module.name.clone(),
            project: project_file.name,
          });
        }

        let mut project = Project::new(&module.name, &project_file.name).with_type(project_file.project_type);
        project.version = project_file.version;
        project.properties = project_file.properties;
        project.references = project_file.references;

        for (set_name, dir) in project_file.source_sets {
          let id = format!("{}.{}/{}", module.name, project_file.name, set_name);
          project
            .source_sets
            .insert(set_name, Arc::new(LocalSourceSet::new(&id, root.join(dir))));
        }

        debug!(project = %project.id, "loaded project");
        suite.add_project(project);
      }
    }

    Ok(suite)
  }
}

/// Load `path` and build the suite rooted at the file's directory.
pub fn load_suite(path: &Path) -> Result<Suite, SuiteFileError> {
  let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
  SuiteFile::load(path)?.into_suite(&root)
}
