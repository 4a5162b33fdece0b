//! Implementation of the `suite build` command.
//!
//! Loads the suite, registers a builder per project and runs the graph. Builders
//! whose stored fingerprint still matches are reported as cached.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use suitebuild_lib::context::ContextConfig;
use suitebuild_lib::store::{ArtifactStore, MemoryArtifactStore};

use crate::SuiteArgs;
use crate::output::{emit_json, print_build_report};

use super::{load_session, lock_exclusive, open_store, register_suite};

#[derive(Debug, Serialize)]
struct BuildSummary<'a> {
  executed: &'a BTreeMap<String, BTreeSet<PathBuf>>,
  cached: &'a BTreeMap<String, BTreeSet<PathBuf>>,
  failed: BTreeMap<&'a str, String>,
  skipped: &'a BTreeMap<String, String>,
  duration_ms: u128,
}

pub fn cmd_build(args: &SuiteArgs, jobs: Option<usize>, no_cache: bool, target: Option<PathBuf>) -> Result<()> {
  let start = Instant::now();

  let _lock = if no_cache {
    None
  } else {
    Some(lock_exclusive(args, "build")?)
  };

  let session = load_session(args)?;
  let store: Arc<dyn ArtifactStore> = if no_cache {
    Arc::new(MemoryArtifactStore::new())
  } else {
    Arc::new(open_store(args, &session))
  };

  let mut config = ContextConfig {
    target_dir: target.unwrap_or_else(|| session.suite.target_dir.clone()),
    ..ContextConfig::default()
  };
  if let Some(jobs) = jobs {
    config.parallelism = jobs.max(1);
  }

  let ctx = register_suite(session, store, config)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(ctx.run()).context("Build failed")?;
  let elapsed = start.elapsed();

  if args.output.is_json() {
    emit_json(&BuildSummary {
      executed: &report.executed,
      cached: &report.cached,
      failed: report.failed.iter().map(|(uid, e)| (uid.as_str(), e.to_string())).collect(),
      skipped: &report.skipped,
      duration_ms: elapsed.as_millis(),
    })?;
  } else {
    print_build_report(&report, elapsed);
  }

  if !report.is_success() {
    bail!(
      "{} builder(s) failed, {} skipped",
      report.failed.len(),
      report.skipped.len()
    );
  }

  Ok(())
}
