//! Reference resolution.
//!
//! Turns a project's declared [`Reference`] into the concrete builder that
//! satisfies it. Dispatch is a table keyed by [`Scheme`]; unknown schemes fail
//! fast with [`ResolveError::UnsupportedReference`].
//!
//! Link-only references are never resolved into builders. They are validated
//! with [`ReferenceResolver::check_link_only`] and otherwise only contribute a
//! reference fingerprint to their owner.

mod handlers;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::builder::Builder;
use crate::model::{Project, ProjectType, Reference};
use crate::session::Session;

pub use handlers::{FileReferenceHandler, ProjectReferenceHandler};

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("unsupported reference type '{scheme}' in {uri}")]
  UnsupportedReference { scheme: String, uri: String },

  #[error("project not found for reference {uri}: {project}")]
  ProjectNotFound { uri: String, project: String },

  #[error("invalid reference uri '{uri}': {message}")]
  InvalidUri { uri: String, message: String },

  #[error("no builder registered for project {project} of type {project_type}")]
  UnsupportedProjectType { project: String, project_type: ProjectType },
}

/// URI scheme of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
  /// Project in the owner's module: `module://<project>`.
  Module,
  /// Project anywhere in the suite: `suite://<module>/<project>`.
  Suite,
  /// Artifact on disk, relative to the suite root unless absolute.
  File,
  Nuget,
  Gac,
  Other(String),
}

impl Scheme {
  pub fn parse(scheme: &str) -> Self {
    match scheme.to_ascii_lowercase().as_str() {
      "module" => Scheme::Module,
      "suite" => Scheme::Suite,
      "file" => Scheme::File,
      "nuget" => Scheme::Nuget,
      "gac" => Scheme::Gac,
      _ => Scheme::Other(scheme.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Scheme::Module => "module",
      Scheme::Suite => "suite",
      Scheme::File => "file",
      Scheme::Nuget => "nuget",
      Scheme::Gac => "gac",
      Scheme::Other(other) => other,
    }
  }
}

impl fmt::Display for Scheme {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Split a reference into its scheme and target.
pub fn parse_reference(reference: &Reference) -> Result<(Scheme, &str), ResolveError> {
  let (scheme, target) = reference.split_uri().ok_or_else(|| ResolveError::InvalidUri {
    uri: reference.uri.clone(),
    message: "expected scheme://target".to_string(),
  })?;
  if target.is_empty() {
    return Err(ResolveError::InvalidUri {
      uri: reference.uri.clone(),
      message: "empty target".to_string(),
    });
  }
  Ok((Scheme::parse(scheme), target))
}

/// Creates the builder satisfying a build-time reference of one scheme.
pub trait ReferenceHandler: Send + Sync + fmt::Debug {
  fn create(
    &self,
    reference: &Reference,
    target: &str,
    owner: &Arc<Project>,
    session: &Session,
  ) -> Result<Arc<dyn Builder>, ResolveError>;
}

#[derive(Debug, Clone)]
pub struct ReferenceResolver {
  handlers: HashMap<Scheme, Arc<dyn ReferenceHandler>>,
  link_schemes: HashSet<Scheme>,
}

impl Default for ReferenceResolver {
  fn default() -> Self {
    Self::new()
  }
}

impl ReferenceResolver {
  /// Resolver with the built-in handlers; `nuget` and `gac` are link-only.
  pub fn new() -> Self {
    let project: Arc<dyn ReferenceHandler> = Arc::new(ProjectReferenceHandler);
    Self::empty()
      .with_handler(Scheme::Module, project.clone())
      .with_handler(Scheme::Suite, project)
      .with_handler(Scheme::File, Arc::new(FileReferenceHandler))
      .with_link_scheme(Scheme::Nuget)
      .with_link_scheme(Scheme::Gac)
  }

  pub fn empty() -> Self {
    Self {
      handlers: HashMap::new(),
      link_schemes: HashSet::new(),
    }
  }

  pub fn with_handler(mut self, scheme: Scheme, handler: Arc<dyn ReferenceHandler>) -> Self {
    self.register(scheme, handler);
    self
  }

  pub fn with_link_scheme(mut self, scheme: Scheme) -> Self {
    self.link_schemes.insert(scheme);
    self
  }

  pub fn register(&mut self, scheme: Scheme, handler: Arc<dyn ReferenceHandler>) {
    self.handlers.insert(scheme, handler);
  }

  pub fn supports(&self, scheme: &Scheme) -> bool {
    self.handlers.contains_key(scheme)
  }

  /// Create the builder satisfying a build-time reference.
  pub fn resolve(
    &self,
    reference: &Reference,
    owner: &Arc<Project>,
    session: &Session,
  ) -> Result<Arc<dyn Builder>, ResolveError> {
    let (scheme, target) = parse_reference(reference)?;
    let handler = self.handlers.get(&scheme).ok_or_else(|| ResolveError::UnsupportedReference {
      scheme: scheme.to_string(),
      uri: reference.uri.clone(),
    })?;

    debug!(owner = %owner.id, reference = %reference, "resolving reference");
    handler.create(reference, target, owner, session)
  }

  /// Validate a link-only reference without creating a builder.
  pub fn check_link_only(&self, reference: &Reference) -> Result<(), ResolveError> {
    let (scheme, _) = parse_reference(reference)?;
    if self.link_schemes.contains(&scheme) || self.handlers.contains_key(&scheme) {
      Ok(())
    } else {
      Err(ResolveError::UnsupportedReference {
        scheme: scheme.to_string(),
        uri: reference.uri.clone(),
      })
    }
  }
}
