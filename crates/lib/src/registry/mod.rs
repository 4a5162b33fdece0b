//! Project type to builder dispatch.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::builder::{Builder, ProjectFileBuilder, SingleFileBuilder};
use crate::model::{Project, ProjectId, ProjectType};
use crate::resolve::ResolveError;

/// Source sets expected to hold exactly one file that is copied verbatim.
pub const SINGLE_FILE_SOURCE_SETS: [&str; 1] = ["appconfig"];

/// Creates the main builder of a project.
pub trait ProjectBuilderFactory: Send + Sync + fmt::Debug {
  fn create(&self, project: &Arc<Project>) -> Arc<dyn Builder>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectFileFactory;

impl ProjectBuilderFactory for ProjectFileFactory {
  fn create(&self, project: &Arc<Project>) -> Arc<dyn Builder> {
    Arc::new(ProjectFileBuilder::new(project.clone()))
  }
}

/// Maps project types to factories and caches one builder per project.
#[derive(Debug)]
pub struct BuilderRegistry {
  factories: HashMap<ProjectType, Arc<dyn ProjectBuilderFactory>>,
  fallback: Option<Arc<dyn ProjectBuilderFactory>>,
  single_file_sets: BTreeSet<String>,
  cache: Mutex<HashMap<ProjectId, Arc<dyn Builder>>>,
}

impl Default for BuilderRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl BuilderRegistry {
  /// Registry generating project files for every project type.
  pub fn new() -> Self {
    let mut registry = Self::empty().with_fallback(Arc::new(ProjectFileFactory));
    registry.single_file_sets = SINGLE_FILE_SOURCE_SETS.iter().map(|s| s.to_string()).collect();
    registry
  }

  pub fn empty() -> Self {
    Self {
      factories: HashMap::new(),
      fallback: None,
      single_file_sets: BTreeSet::new(),
      cache: Mutex::new(HashMap::new()),
    }
  }

  pub fn with_factory(mut self, project_type: ProjectType, factory: Arc<dyn ProjectBuilderFactory>) -> Self {
    self.factories.insert(project_type, factory);
    self
  }

  pub fn with_fallback(mut self, factory: Arc<dyn ProjectBuilderFactory>) -> Self {
    self.fallback = Some(factory);
    self
  }

  pub fn with_single_file_set(mut self, name: &str) -> Self {
    self.single_file_sets.insert(name.to_string());
    self
  }

  /// The main builder of `project`; repeated calls return the same instance.
  pub fn builder_for(&self, project: &Arc<Project>) -> Result<Arc<dyn Builder>, ResolveError> {
    let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(builder) = cache.get(&project.id) {
      return Ok(builder.clone());
    }

    let factory = self
      .factories
      .get(&project.project_type)
      .or(self.fallback.as_ref())
      .ok_or_else(|| ResolveError::UnsupportedProjectType {
        project: project.id.to_string(),
        project_type: project.project_type,
      })?;

    let builder = factory.create(project);
    trace!(project = %project.id, builder = %builder.key(), "created builder");
    cache.insert(project.id.clone(), builder.clone());
    Ok(builder)
  }

  /// Main builder plus one builder per declared single-file source set.
  pub fn builders_for_project(&self, project: &Arc<Project>) -> Result<Vec<Arc<dyn Builder>>, ResolveError> {
    let mut builders = vec![self.builder_for(project)?];
    for name in &self.single_file_sets {
      if project.source_set(name).is_some() {
        builders.push(Arc::new(SingleFileBuilder::new(project.clone(), name)));
      }
    }
    Ok(builders)
  }
}
