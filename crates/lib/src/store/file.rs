use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::builder::TargetPath;
use crate::deps::Fingerprint;
use crate::platform::paths::suite_artifacts_dir;
use crate::util::hash::hash_key;

use super::{ArtifactRecord, ArtifactStore, StoreError};

/// Format version of persisted records; other versions load as cache misses.
pub const RECORD_VERSION: u32 = 1;

/// On-disk form of an [`ArtifactRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
  pub version: u32,
  pub uid: String,
  pub fingerprint: Fingerprint,
  pub outputs: BTreeSet<TargetPath>,
  pub saved_at_unix: u64,
}

/// One JSON file per builder uid, named after a short hash of the uid.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
  dir: PathBuf,
}

impl FileArtifactStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  /// Records of the suite rooted at `suite_root`, kept apart from every
  /// other suite sharing `cache_dir`.
  pub fn for_suite(cache_dir: &Path, suite_root: &Path) -> Self {
    Self::new(suite_artifacts_dir(cache_dir, suite_root))
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn record_path(&self, uid: &str) -> PathBuf {
    self.dir.join(format!("{}.json", hash_key(uid).0))
  }

  fn read_record(path: &Path) -> Option<StoredRecord> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "failed to read artifact record");
        return None;
      }
    };

    match serde_json::from_str::<StoredRecord>(&content) {
      Ok(record) if record.version == RECORD_VERSION => Some(record),
      Ok(record) => {
        warn!(path = %path.display(), version = record.version, "ignoring artifact record with unsupported version");
        None
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ignoring corrupt artifact record");
        None
      }
    }
  }
}

impl ArtifactStore for FileArtifactStore {
  fn load(&self, uid: &str) -> Option<ArtifactRecord> {
    let path = self.record_path(uid);
    let record = Self::read_record(&path)?;
    if record.uid != uid {
      warn!(uid, stored = %record.uid, path = %path.display(), "artifact record belongs to another uid");
      return None;
    }
    Some(ArtifactRecord::new(record.fingerprint, record.outputs))
  }

  fn save(&self, uid: &str, record: &ArtifactRecord) -> Result<(), StoreError> {
    fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
      path: self.dir.clone(),
      source,
    })?;

    let path = self.record_path(uid);
    let stored = StoredRecord {
      version: RECORD_VERSION,
      uid: uid.to_string(),
      fingerprint: record.fingerprint.clone(),
      outputs: record.outputs.clone(),
      saved_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
    };

    let write_error = |source| StoreError::Write {
      path: path.clone(),
      source,
    };

    // Readers only ever see a complete file: write a sibling temp file, then rename.
    let temp = NamedTempFile::new_in(&self.dir).map_err(write_error)?;
    {
      let mut writer = BufWriter::new(temp.as_file());
      serde_json::to_writer_pretty(&mut writer, &stored)?;
      writer.flush().map_err(write_error)?;
    }
    temp.persist(&path).map_err(|e| write_error(e.error))?;

    debug!(uid, path = %path.display(), "saved artifact record");
    Ok(())
  }

  fn remove(&self, uid: &str) -> Result<bool, StoreError> {
    let path = self.record_path(uid);
    match fs::remove_file(&path) {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(source) => Err(StoreError::Remove { path, source }),
    }
  }

  fn uids(&self) -> Result<Vec<String>, StoreError> {
    let entries = match fs::read_dir(&self.dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(StoreError::List {
          path: self.dir.clone(),
          source,
        });
      }
    };

    let mut uids: Vec<String> = entries
      .flatten()
      .map(|entry| entry.path())
      .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
      .filter_map(|path| Self::read_record(&path))
      .map(|record| record.uid)
      .collect();
    uids.sort();
    Ok(uids)
  }
}
