//! Implementation of the `suite plan` command.
//!
//! Resolves the build graph and compares each builder's current fingerprint
//! with the stored one, without running anything.

use std::sync::Arc;

use anyhow::{Context, Result};

use suitebuild_lib::context::ContextConfig;

use crate::SuiteArgs;
use crate::output::{emit_json, notice, print_plan};

use super::{load_session, lock_shared, open_store, register_suite};

pub fn cmd_plan(args: &SuiteArgs) -> Result<()> {
  let _lock = lock_shared(args)?;

  let session = load_session(args)?;
  let store = Arc::new(open_store(args, &session));
  let config = ContextConfig {
    target_dir: session.suite.target_dir.clone(),
    ..ContextConfig::default()
  };
  let ctx = register_suite(session, store, config)?;
  let plan = ctx.plan().context("Failed to plan build")?;

  if args.output.is_json() {
    return emit_json(&plan);
  }

  if plan.is_empty() {
    notice("Suite has no projects");
    return Ok(());
  }

  print_plan(&plan);
  Ok(())
}
