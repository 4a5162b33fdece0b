use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use super::{ArtifactStore, StoreError};

#[derive(Debug, Default, Serialize)]
pub struct GcResult {
  pub scanned: usize,
  /// Uids whose records were removed (or would be, on a dry run).
  pub removed: Vec<String>,
  pub dry_run: bool,
}

/// Remove every record whose uid is not in `live_uids`.
pub fn collect_garbage(
  store: &dyn ArtifactStore,
  live_uids: &HashSet<String>,
  dry_run: bool,
) -> Result<GcResult, StoreError> {
  let mut result = GcResult {
    dry_run,
    ..GcResult::default()
  };

  for uid in store.uids()? {
    result.scanned += 1;
    if live_uids.contains(&uid) {
      continue;
    }

    if dry_run {
      debug!(uid = %uid, "would remove stale record");
    } else {
      store.remove(&uid)?;
      debug!(uid = %uid, "removed stale record");
    }
    result.removed.push(uid);
  }

  info!(
    scanned = result.scanned,
    removed = result.removed.len(),
    dry_run,
    "garbage collection complete"
  );
  Ok(result)
}
