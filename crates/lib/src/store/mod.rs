//! Artifact store: the persisted result cache.
//!
//! Maps a builder's stable uid to the fingerprint it last ran with and the
//! exact set of outputs it produced. Records are keyed by uid, never by
//! instance, so they survive process restarts.
//!
//! # Layout
//!
//! ```text
//! {cache_dir}/
//! ├── .lock                       # CacheLock (flock)
//! └── artifacts/
//!     └── <hash(suite root)>/
//!         └── <hash(uid)>.json    # one ArtifactRecord per builder
//! ```

mod file;
mod gc;
mod lock;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::TargetPath;
use crate::deps::Fingerprint;

pub use file::{FileArtifactStore, RECORD_VERSION, StoredRecord};
pub use gc::{GcResult, collect_garbage};
pub use lock::{CacheLock, CacheLockError, LockHolder, LockMode};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to create store directory {}: {source}", .path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {}: {source}", .path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove {}: {source}", .path.display())]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read store directory {}: {source}", .path.display())]
  List {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize record: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// What a builder produced the last time it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
  pub fingerprint: Fingerprint,
  pub outputs: BTreeSet<TargetPath>,
}

impl ArtifactRecord {
  pub fn new(fingerprint: Fingerprint, outputs: BTreeSet<TargetPath>) -> Self {
    Self { fingerprint, outputs }
  }
}

pub trait ArtifactStore: Send + Sync + fmt::Debug {
  /// The last saved record, or `None` when absent or unreadable.
  fn load(&self, uid: &str) -> Option<ArtifactRecord>;

  /// Replace the record of `uid`. Readers see either the old or the new record.
  fn save(&self, uid: &str, record: &ArtifactRecord) -> Result<(), StoreError>;

  /// Returns whether a record existed.
  fn remove(&self, uid: &str) -> Result<bool, StoreError>;

  fn uids(&self) -> Result<Vec<String>, StoreError>;
}

/// Process-local store, used for tests and `--no-cache` runs.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
  records: RwLock<HashMap<String, ArtifactRecord>>,
}

impl MemoryArtifactStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.records.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl ArtifactStore for MemoryArtifactStore {
  fn load(&self, uid: &str) -> Option<ArtifactRecord> {
    self.records.read().unwrap_or_else(PoisonError::into_inner).get(uid).cloned()
  }

  fn save(&self, uid: &str, record: &ArtifactRecord) -> Result<(), StoreError> {
    self
      .records
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(uid.to_string(), record.clone());
    Ok(())
  }

  fn remove(&self, uid: &str) -> Result<bool, StoreError> {
    Ok(
      self
        .records
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(uid)
        .is_some(),
    )
  }

  fn uids(&self) -> Result<Vec<String>, StoreError> {
    let mut uids: Vec<String> = self
      .records
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .cloned()
      .collect();
    uids.sort();
    Ok(uids)
  }
}
