use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::util::hash::{ContentHash, hash_file};

use super::{SourceError, SourceSet};

/// Source set backed by a directory on the local file system.
///
/// A missing root directory is treated as an empty set.
#[derive(Debug, Clone)]
pub struct LocalSourceSet {
  id: String,
  root: PathBuf,
}

impl LocalSourceSet {
  pub fn new(id: &str, root: impl Into<PathBuf>) -> Self {
    Self {
      id: id.to_string(),
      root: root.into(),
    }
  }

  fn resolve(&self, path: &str) -> PathBuf {
    path.split('/').fold(self.root.clone(), |acc, part| acc.join(part))
  }

  fn io_error(path: &str, source: io::Error) -> SourceError {
    if source.kind() == io::ErrorKind::NotFound {
      SourceError::NotFound(path.to_string())
    } else {
      SourceError::Io {
        path: path.to_string(),
        source,
      }
    }
  }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
  let rel = path.strip_prefix(root).ok()?;
  let parts: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
  if parts.is_empty() {
    return None;
  }
  Some(parts.join("/"))
}

impl SourceSet for LocalSourceSet {
  fn id(&self) -> &str {
    &self.id
  }

  fn files(&self) -> Result<BTreeSet<String>, SourceError> {
    if !self.root.exists() {
      return Ok(BTreeSet::new());
    }

    let mut files = BTreeSet::new();
    for entry in WalkDir::new(&self.root).sort_by_file_name() {
      let entry = entry.map_err(|e| SourceError::Walk {
        id: self.id.clone(),
        message: e.to_string(),
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      if let Some(rel) = relative_path(&self.root, entry.path()) {
        files.insert(rel);
      }
    }
    Ok(files)
  }

  fn read(&self, path: &str) -> Result<Vec<u8>, SourceError> {
    fs::read(self.resolve(path)).map_err(|e| Self::io_error(path, e))
  }

  fn modified(&self, path: &str) -> Result<SystemTime, SourceError> {
    fs::metadata(self.resolve(path))
      .and_then(|m| m.modified())
      .map_err(|e| Self::io_error(path, e))
  }

  fn content_hash(&self, path: &str) -> Result<ContentHash, SourceError> {
    let full = self.resolve(path);
    if !full.is_file() {
      return Err(SourceError::NotFound(path.to_string()));
    }
    hash_file(&full).map_err(|e| SourceError::Io {
      path: path.to_string(),
      source: io::Error::other(e.to_string()),
    })
  }
}
