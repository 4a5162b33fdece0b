//! Dependency descriptors and fingerprints.
//!
//! A [`Dependencies`] value describes the inputs a builder's result is a pure
//! function of. Evaluating it yields a [`Fingerprint`], which is persisted next
//! to the builder's outputs and compared on the next run to decide whether the
//! cached outputs are still valid.
//!
//! Composites are unordered: two descriptors built from the same members in a
//! different order are equal and produce the same fingerprint.

mod fingerprint;

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::builder::{Builder, BuilderKey};
use crate::model::{Project, ProjectId, Reference};
use crate::source::{SourceError, SourceFilter, SourceSet, filtered_files};

pub use fingerprint::Fingerprint;

#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error("source set {source_set}: {source}")]
  Source {
    source_set: String,
    #[source]
    source: SourceError,
  },

  #[error("subtask {uid}: {source}")]
  Subtask {
    uid: String,
    #[source]
    source: Box<FingerprintError>,
  },
}

#[derive(Debug, Clone)]
pub enum Dependencies {
  /// The result never varies.
  None,
  /// Set of relative paths passing the filter; file content is ignored.
  SourceSetStructure {
    source_set: Arc<dyn SourceSet>,
    filter: SourceFilter,
  },
  /// Content hash of every file passing the filter.
  SourceSetContent {
    source_set: Arc<dyn SourceSet>,
    filter: SourceFilter,
  },
  /// Named scalar properties of a project.
  ProjectProperties {
    project: Arc<Project>,
    names: BTreeSet<String>,
  },
  /// Cascades the dependencies of another builder.
  Subtask(Arc<dyn Builder>),
  /// Identity of the concrete builder chosen to satisfy a reference.
  BuilderIdentity(Arc<dyn Builder>),
  /// A reference declaration's own identity and version pin.
  Reference(Reference),
  /// Directory the outputs are written under.
  OutputLocation(PathBuf),
  /// Unordered composite, invalid if any member is invalid.
  Multiple(Vec<Dependencies>),
}

/// Structural identity used for equality, hashing and de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum DependencyId {
  None,
  SourceSetStructure(String, SourceFilter),
  SourceSetContent(String, SourceFilter),
  ProjectProperties(ProjectId, BTreeSet<String>),
  Subtask(BuilderKey),
  BuilderIdentity(BuilderKey),
  Reference(Reference),
  OutputLocation(PathBuf),
  Multiple(BTreeSet<DependencyId>),
}

impl Dependencies {
  pub fn source_structure(source_set: &Arc<dyn SourceSet>, filter: SourceFilter) -> Self {
    Dependencies::SourceSetStructure {
      source_set: source_set.clone(),
      filter,
    }
  }

  pub fn source_content(source_set: &Arc<dyn SourceSet>, filter: SourceFilter) -> Self {
    Dependencies::SourceSetContent {
      source_set: source_set.clone(),
      filter,
    }
  }

  pub fn properties(project: &Arc<Project>, names: &[&str]) -> Self {
    Dependencies::ProjectProperties {
      project: project.clone(),
      names: names.iter().map(|n| n.to_string()).collect(),
    }
  }

  pub fn output_location(dir: &Path) -> Self {
    Dependencies::OutputLocation(dir.to_path_buf())
  }

  /// What a dependent builder must track about one of its prerequisites:
  /// that it ran, which concrete builder it was, and the reference it satisfies.
  pub fn prerequisite(builder: &Arc<dyn Builder>) -> Self {
    let mut deps = vec![
      Dependencies::Subtask(builder.clone()),
      Dependencies::BuilderIdentity(builder.clone()),
    ];
    if let Some(reference) = builder.reference() {
      deps.push(Dependencies::Reference(reference.clone()));
    }
    Dependencies::combine(deps)
  }

  /// Collapse a collection into its canonical form.
  ///
  /// Nested composites are flattened and duplicates dropped; no members
  /// yields `None` and a single member is returned as is.
  pub fn combine<I>(deps: I) -> Self
  where
    I: IntoIterator<Item = Dependencies>,
  {
    let mut members = BTreeMap::new();
    for dep in deps {
      dep.flatten_into(&mut members);
    }

    let mut values = members.into_values();
    match (values.next(), values.next()) {
      (None, _) => Dependencies::None,
      (Some(only), None) => only,
      (Some(first), Some(second)) => Dependencies::Multiple([first, second].into_iter().chain(values).collect()),
    }
  }

  fn flatten_into(self, members: &mut BTreeMap<DependencyId, Dependencies>) {
    match self {
      Dependencies::None => {}
      Dependencies::Multiple(inner) => {
        for dep in inner {
          dep.flatten_into(members);
        }
      }
      other => {
        members.entry(other.id()).or_insert(other);
      }
    }
  }

  fn id(&self) -> DependencyId {
    match self {
      Dependencies::None => DependencyId::None,
      Dependencies::SourceSetStructure { source_set, filter } => {
        DependencyId::SourceSetStructure(source_set.id().to_string(), filter.clone())
      }
      Dependencies::SourceSetContent { source_set, filter } => {
        DependencyId::SourceSetContent(source_set.id().to_string(), filter.clone())
      }
      Dependencies::ProjectProperties { project, names } => {
        DependencyId::ProjectProperties(project.id.clone(), names.clone())
      }
      Dependencies::Subtask(builder) => DependencyId::Subtask(builder.key()),
      Dependencies::BuilderIdentity(builder) => DependencyId::BuilderIdentity(builder.key()),
      Dependencies::Reference(reference) => DependencyId::Reference(reference.clone()),
      Dependencies::OutputLocation(dir) => DependencyId::OutputLocation(dir.clone()),
      Dependencies::Multiple(members) => DependencyId::Multiple(members.iter().map(Dependencies::id).collect()),
    }
  }

  pub fn is_none(&self) -> bool {
    matches!(self, Dependencies::None)
  }

  /// Number of members after collapsing; `None` counts as zero.
  pub fn len(&self) -> usize {
    match self {
      Dependencies::None => 0,
      Dependencies::Multiple(members) => members.len(),
      _ => 1,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Evaluate the current fingerprint.
  pub fn fingerprint(&self) -> Result<Fingerprint, FingerprintError> {
    match self {
      Dependencies::None => Ok(Fingerprint::None),
      Dependencies::SourceSetStructure { source_set, filter } => Ok(Fingerprint::SourceSetStructure {
        source_set: source_set.id().to_string(),
        filter: filter.identity(),
        files: filtered_files(source_set.as_ref(), filter).map_err(|e| source_error(source_set.as_ref(), e))?,
      }),
      Dependencies::SourceSetContent { source_set, filter } => {
        let paths = filtered_files(source_set.as_ref(), filter).map_err(|e| source_error(source_set.as_ref(), e))?;
        let mut files = BTreeMap::new();
        for path in paths {
          let hash = source_set
            .content_hash(&path)
            .map_err(|e| source_error(source_set.as_ref(), e))?;
          files.insert(path, hash);
        }
        Ok(Fingerprint::SourceSetContent {
          source_set: source_set.id().to_string(),
          filter: filter.identity(),
          files,
        })
      }
      Dependencies::ProjectProperties { project, names } => Ok(Fingerprint::ProjectProperties {
        project: project.id.to_string(),
        properties: names.iter().map(|name| (name.clone(), project.property(name))).collect(),
      }),
      Dependencies::Subtask(builder) => {
        let uid = builder.uid();
        let inner = builder
          .dependencies()
          .fingerprint()
          .map_err(|e| FingerprintError::Subtask {
            uid: uid.clone(),
            source: Box::new(e),
          })?;
        Ok(Fingerprint::Subtask {
          uid,
          inner: Box::new(inner),
        })
      }
      Dependencies::BuilderIdentity(builder) => Ok(Fingerprint::BuilderIdentity {
        kind: builder.key().kind.to_string(),
        uid: builder.uid(),
      }),
      Dependencies::Reference(reference) => Ok(Fingerprint::Reference {
        uri: reference.uri.clone(),
        kind: reference.kind,
        version: reference.version.clone(),
      }),
      Dependencies::OutputLocation(dir) => Ok(Fingerprint::OutputLocation {
        dir: dir.display().to_string(),
      }),
      Dependencies::Multiple(members) => Ok(Fingerprint::Multiple {
        members: members
          .iter()
          .map(Dependencies::fingerprint)
          .collect::<Result<BTreeSet<_>, _>>()?,
      }),
    }
  }

  /// Whether `previous` still describes the current inputs.
  ///
  /// Evaluation errors count as "changed". Composites stop at the first member
  /// whose fingerprint is missing from the previous set.
  pub fn is_up_to_date(&self, previous: &Fingerprint) -> bool {
    match (self, previous) {
      (Dependencies::Multiple(members), Fingerprint::Multiple { members: previous_members }) => {
        let mut current = BTreeSet::new();
        for member in members {
          match member.fingerprint() {
            Ok(fp) if previous_members.contains(&fp) => {
              current.insert(fp);
            }
            _ => return false,
          }
        }
        current == *previous_members
      }
      _ => matches!(self.fingerprint(), Ok(fp) if fp == *previous),
    }
  }
}

fn source_error(source_set: &dyn SourceSet, source: SourceError) -> FingerprintError {
  FingerprintError::Source {
    source_set: source_set.id().to_string(),
    source,
  }
}

impl PartialEq for Dependencies {
  fn eq(&self, other: &Self) -> bool {
    self.id() == other.id()
  }
}

impl Eq for Dependencies {}

impl Hash for Dependencies {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id().hash(state);
  }
}
