//! Advisory lock on the cache directory.
//!
//! Build, clean and gc take the lock exclusively and record who they are in
//! the lock file; `plan` only reads records and takes it shared.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LOCK_FILENAME: &str = ".lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// The process holding the exclusive lock, as stored in the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  /// CLI command, e.g. `build`.
  pub command: String,
  /// Suite file the command operates on.
  pub suite: Option<PathBuf>,
  pub since_unix: u64,
}

impl LockHolder {
  /// Describes the current process.
  pub fn current(command: &str, suite: Option<&Path>) -> Self {
    Self {
      pid: std::process::id(),
      command: command.to_string(),
      suite: suite.map(Path::to_path_buf),
      since_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
    }
  }
}

impl fmt::Display for LockHolder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "`{}`", self.command)?;
    if let Some(suite) = &self.suite {
      write!(f, " on {}", suite.display())?;
    }
    write!(f, " (pid {})", self.pid)
  }
}

fn describe(holder: &Option<LockHolder>) -> String {
  match holder {
    Some(holder) => format!("held by {holder}"),
    None => "held by another process".to_string(),
  }
}

#[derive(Debug, Error)]
pub enum CacheLockError {
  #[error(
    "cache {} is {}\nIf that process is gone, delete {}",
    .cache_dir.display(),
    describe(.holder),
    .lock_path.display()
  )]
  Busy {
    cache_dir: PathBuf,
    lock_path: PathBuf,
    holder: Option<LockHolder>,
  },

  #[error("cannot lock cache at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Held until dropped; closing the file releases the lock.
#[derive(Debug)]
pub struct CacheLock {
  file: File,
  lock_path: PathBuf,
  mode: LockMode,
}

impl CacheLock {
  /// Lock for readers; any number of shared locks coexist.
  pub fn shared(cache_dir: &Path) -> Result<Self, CacheLockError> {
    Self::acquire(cache_dir, LockMode::Shared)
  }

  /// Lock for a command that writes records, recording `holder` in the lock file.
  pub fn exclusive(cache_dir: &Path, holder: &LockHolder) -> Result<Self, CacheLockError> {
    let lock = Self::acquire(cache_dir, LockMode::Exclusive)?;
    lock.record(holder).map_err(|source| CacheLockError::Io {
      path: lock.lock_path.clone(),
      source,
    })?;
    Ok(lock)
  }

  fn acquire(cache_dir: &Path, mode: LockMode) -> Result<Self, CacheLockError> {
    let lock_path = cache_dir.join(LOCK_FILENAME);
    let io_error = |source| CacheLockError::Io {
      path: lock_path.clone(),
      source,
    };

    fs::create_dir_all(cache_dir).map_err(io_error)?;
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(io_error)?;

    match try_lock(&file, mode) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
        return Err(CacheLockError::Busy {
          cache_dir: cache_dir.to_path_buf(),
          lock_path: lock_path.clone(),
          holder: read_holder(&mut &file),
        });
      }
      Err(e) => return Err(io_error(e)),
    }

    debug!(path = %lock_path.display(), ?mode, "acquired cache lock");
    Ok(Self { file, lock_path, mode })
  }

  fn record(&self, holder: &LockHolder) -> io::Result<()> {
    let mut file = &self.file;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    serde_json::to_writer_pretty(&mut file, holder).map_err(io::Error::other)?;
    file.flush()
  }

  /// The holder recorded in the lock file, read through the held handle.
  pub fn holder(&self) -> Option<LockHolder> {
    read_holder(&mut &self.file)
  }

  pub fn mode(&self) -> LockMode {
    self.mode
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn read_holder(file: &mut &File) -> Option<LockHolder> {
  file.seek(SeekFrom::Start(0)).ok()?;
  let mut contents = String::new();
  file.read_to_string(&mut contents).ok()?;
  serde_json::from_str(&contents).ok()
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };
  flock(file.as_fd(), operation).map_err(io::Error::from)
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let mut flags = LOCKFILE_FAIL_IMMEDIATELY;
  if mode == LockMode::Exclusive {
    flags |= LOCKFILE_EXCLUSIVE_LOCK;
  }

  // SAFETY: a zeroed OVERLAPPED is valid and the handle stays owned by `file`.
  let locked = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(file.as_raw_handle() as HANDLE, flags, 0, 1, 0, &mut overlapped)
  };
  if locked == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
