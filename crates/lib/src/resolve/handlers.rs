use std::path::Path;
use std::sync::Arc;

use crate::builder::{Builder, FileReferenceBuilder, ProjectReferenceBuilder};
use crate::model::{Project, Reference};
use crate::session::Session;

use super::{ReferenceHandler, ResolveError, Scheme, parse_reference};

/// Handles `module://<project>` and `suite://<module>/<project>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectReferenceHandler;

impl ReferenceHandler for ProjectReferenceHandler {
  fn create(
    &self,
    reference: &Reference,
    target: &str,
    owner: &Arc<Project>,
    session: &Session,
  ) -> Result<Arc<dyn Builder>, ResolveError> {
    let (scheme, _) = parse_reference(reference)?;
    let (module, name) = match scheme {
      Scheme::Suite => target.split_once('/').ok_or_else(|| ResolveError::InvalidUri {
        uri: reference.uri.clone(),
        message: "expected suite://<module>/<project>".to_string(),
      })?,
      _ => (owner.module(), target),
    };

    let project = session
      .suite
      .project(module, name)
      .ok_or_else(|| ResolveError::ProjectNotFound {
        uri: reference.uri.clone(),
        project: format!("{module}.{name}"),
      })?;

    Ok(Arc::new(ProjectReferenceBuilder::new(reference.clone(), project.clone())))
  }
}

/// Handles `file://<path>`; relative paths are taken from the suite root.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileReferenceHandler;

impl ReferenceHandler for FileReferenceHandler {
  fn create(
    &self,
    reference: &Reference,
    target: &str,
    _owner: &Arc<Project>,
    session: &Session,
  ) -> Result<Arc<dyn Builder>, ResolveError> {
    let path = Path::new(target);
    let path = if path.is_absolute() {
      path.to_path_buf()
    } else {
      session.suite.root.join(path)
    };
    Ok(Arc::new(FileReferenceBuilder::new(reference.clone(), &path)))
  }
}
