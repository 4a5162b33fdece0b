//! Everything builders need while discovering prerequisites.

use std::sync::Arc;

use crate::builder::Builder;
use crate::model::{Project, Reference, Suite};
use crate::registry::BuilderRegistry;
use crate::resolve::{ReferenceResolver, ResolveError};

/// The suite being built together with the builder registry and reference resolver.
#[derive(Debug)]
pub struct Session {
  pub suite: Arc<Suite>,
  pub registry: BuilderRegistry,
  pub references: ReferenceResolver,
}

impl Session {
  pub fn new(suite: Suite) -> Self {
    Self::with_parts(Arc::new(suite), BuilderRegistry::new(), ReferenceResolver::new())
  }

  pub fn with_parts(suite: Arc<Suite>, registry: BuilderRegistry, references: ReferenceResolver) -> Self {
    Self {
      suite,
      registry,
      references,
    }
  }

  pub fn resolve_reference(
    &self,
    reference: &Reference,
    owner: &Arc<Project>,
  ) -> Result<Arc<dyn Builder>, ResolveError> {
    self.references.resolve(reference, owner, self)
  }

  /// Root builders for every project of the suite, in declaration order.
  pub fn root_builders(&self) -> Result<Vec<Arc<dyn Builder>>, ResolveError> {
    let mut builders = Vec::new();
    for project in self.suite.projects() {
      builders.extend(self.registry.builders_for_project(project)?);
    }
    Ok(builders)
  }
}
