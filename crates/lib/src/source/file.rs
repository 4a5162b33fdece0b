use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::util::hash::{ContentHash, hash_file};

use super::{SourceError, SourceSet, file_name};

/// Source set made of exactly one file on disk, addressed by its file name.
///
/// Used to fingerprint external artifacts such as `file://` references. A
/// missing file yields an empty set.
#[derive(Debug, Clone)]
pub struct FileSource {
  id: String,
  path: PathBuf,
  name: String,
}

impl FileSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let display = path.to_string_lossy().replace('\\', "/");
    let name = file_name(&display).to_string();
    Self {
      id: format!("file:{display}"),
      path,
      name,
    }
  }

  pub fn path(&self) -> &PathBuf {
    &self.path
  }

  fn check(&self, path: &str) -> Result<(), SourceError> {
    if path == self.name {
      Ok(())
    } else {
      Err(SourceError::NotFound(path.to_string()))
    }
  }

  fn io_error(&self, path: &str, source: io::Error) -> SourceError {
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

impl SourceSet for FileSource {
  fn id(&self) -> &str {
    &self.id
  }

  fn files(&self) -> Result<BTreeSet<String>, SourceError> {
    let mut files = BTreeSet::new();
    if self.path.is_file() {
      files.insert(self.name.clone());
    }
    Ok(files)
  }

  fn read(&self, path: &str) -> Result<Vec<u8>, SourceError> {
    self.check(path)?;
    fs::read(&self.path).map_err(|e| self.io_error(path, e))
  }

  fn modified(&self, path: &str) -> Result<SystemTime, SourceError> {
    self.check(path)?;
    fs::metadata(&self.path)
      .and_then(|m| m.modified())
      .map_err(|e| self.io_error(path, e))
  }

  fn content_hash(&self, path: &str) -> Result<ContentHash, SourceError> {
    self.check(path)?;
    if !self.path.is_file() {
      return Err(SourceError::NotFound(path.to_string()));
    }
    hash_file(&self.path).map_err(|e| SourceError::Io {
      path: path.to_string(),
      source: io::Error::other(e.to_string()),
    })
  }
}
