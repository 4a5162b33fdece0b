//! Implementation of the `suite clean` command.
//!
//! Removes the target directory together with the stored results of the
//! suite's builders. A stored record is reused without checking that its
//! outputs still exist, so the two are always removed together.

use std::fs;
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use suitebuild_lib::context::ContextConfig;
use suitebuild_lib::store::ArtifactStore;

use crate::SuiteArgs;
use crate::output::{Summary, emit_json, headline};

use super::{live_uids, load_session, lock_exclusive, open_store, register_suite};

pub fn cmd_clean(args: &SuiteArgs) -> Result<()> {
  let _lock = lock_exclusive(args, "clean")?;

  let session = load_session(args)?;
  let target_dir = session.suite.target_dir.clone();
  let store: Arc<dyn ArtifactStore> = Arc::new(open_store(args, &session));
  let ctx = register_suite(session, store.clone(), ContextConfig::default())?;

  let mut removed = 0;
  for uid in live_uids(&ctx) {
    if store.remove(&uid).with_context(|| format!("Failed to remove record for {uid}"))? {
      debug!(uid = %uid, "removed record");
      removed += 1;
    }
  }

  let target_removed = match fs::remove_dir_all(&target_dir) {
    Ok(()) => true,
    Err(e) if e.kind() == io::ErrorKind::NotFound => false,
    Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", target_dir.display())),
  };

  if args.output.is_json() {
    emit_json(&json!({
      "target_dir": target_dir,
      "target_removed": target_removed,
      "records_removed": removed,
    }))?;
  } else {
    headline(true, "Clean complete!");
    Summary::new()
      .row("Target", target_dir.display())
      .row("Records removed", removed)
      .print();
  }

  Ok(())
}
