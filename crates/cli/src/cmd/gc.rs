use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use suitebuild_lib::context::ContextConfig;
use suitebuild_lib::store::{ArtifactStore, collect_garbage};

use crate::SuiteArgs;
use crate::output::{Summary, emit_json, format_elapsed, headline, notice};

use super::{live_uids, load_session, lock_exclusive, open_store, register_suite};

/// Drop records of builders the suite no longer produces. Only this suite's
/// records are scanned.
pub fn cmd_gc(args: &SuiteArgs, dry_run: bool) -> Result<()> {
  let start = Instant::now();

  let _lock = lock_exclusive(args, "gc")?;

  let session = load_session(args)?;
  let store: Arc<dyn ArtifactStore> = Arc::new(open_store(args, &session));
  let ctx = register_suite(session, store.clone(), ContextConfig::default())?;
  let live: HashSet<String> = live_uids(&ctx).collect();

  let result = collect_garbage(store.as_ref(), &live, dry_run).context("Garbage collection failed")?;

  if args.output.is_json() {
    return emit_json(&result);
  }

  println!();
  if dry_run {
    notice("Dry run - no changes made");
    for uid in &result.removed {
      println!("  {uid}");
    }
  } else {
    headline(true, "Garbage collection complete!");
  }
  Summary::new()
    .row("Records scanned", result.scanned)
    .row("Records removed", result.removed.len())
    .row("Duration", format_elapsed(start.elapsed()))
    .print();

  Ok(())
}
