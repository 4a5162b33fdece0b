//! Source set providers.
//!
//! A source set is a named collection of files addressed by paths relative to
//! the set's root, always using `/` as separator. Fingerprinting only needs to
//! enumerate paths, read bytes and query timestamps.

mod file;
mod filter;
mod local;
mod memory;

use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

use thiserror::Error;

use crate::util::hash::{ContentHash, hash_bytes};

pub use file::FileSource;
pub use filter::SourceFilter;
pub use local::LocalSourceSet;
pub use memory::MemorySourceSet;

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("source file not found: {0}")]
  NotFound(String),

  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to enumerate source set {id}: {message}")]
  Walk { id: String, message: String },
}

pub trait SourceSet: Send + Sync + fmt::Debug {
  /// Stable identity of the set, part of every fingerprint computed from it.
  fn id(&self) -> &str;

  /// All files currently in the set.
  fn files(&self) -> Result<BTreeSet<String>, SourceError>;

  fn read(&self, path: &str) -> Result<Vec<u8>, SourceError>;

  fn modified(&self, path: &str) -> Result<SystemTime, SourceError>;

  fn content_hash(&self, path: &str) -> Result<ContentHash, SourceError> {
    Ok(hash_bytes(&self.read(path)?))
  }
}

/// Files of `set` accepted by `filter`.
pub fn filtered_files(set: &dyn SourceSet, filter: &SourceFilter) -> Result<BTreeSet<String>, SourceError> {
  Ok(set.files()?.into_iter().filter(|path| filter.accepts(path)).collect())
}

/// File name component of a source-relative path.
pub fn file_name(path: &str) -> &str {
  path.rsplit('/').next().unwrap_or(path)
}
