use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use super::{SourceError, SourceSet};

#[derive(Debug, Clone)]
struct MemoryFile {
  content: Vec<u8>,
  modified: SystemTime,
}

/// In-memory source set, mutable through a shared reference.
#[derive(Debug)]
pub struct MemorySourceSet {
  id: String,
  files: RwLock<BTreeMap<String, MemoryFile>>,
}

impl MemorySourceSet {
  pub fn new(id: &str) -> Self {
    Self {
      id: id.to_string(),
      files: RwLock::new(BTreeMap::new()),
    }
  }

  pub fn with_file(self, path: &str, content: impl AsRef<[u8]>) -> Self {
    self.insert(path, content);
    self
  }

  /// Insert or replace a file, bumping its timestamp.
  pub fn insert(&self, path: &str, content: impl AsRef<[u8]>) {
    let file = MemoryFile {
      content: content.as_ref().to_vec(),
      modified: SystemTime::now(),
    };
    self
      .files
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(path.to_string(), file);
  }

  pub fn remove(&self, path: &str) -> bool {
    self
      .files
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(path)
      .is_some()
  }

  fn get(&self, path: &str) -> Result<MemoryFile, SourceError> {
    self
      .files
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(path)
      .cloned()
      .ok_or_else(|| SourceError::NotFound(path.to_string()))
  }
}

impl SourceSet for MemorySourceSet {
  fn id(&self) -> &str {
    &self.id
  }

  fn files(&self) -> Result<BTreeSet<String>, SourceError> {
    Ok(self.files.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect())
  }

  fn read(&self, path: &str) -> Result<Vec<u8>, SourceError> {
    Ok(self.get(path)?.content)
  }

  fn modified(&self, path: &str) -> Result<SystemTime, SourceError> {
    Ok(self.get(path)?.modified)
  }
}
