mod build;
mod clean;
mod gc;
mod plan;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use suitebuild_lib::context::{BuildContext, ContextConfig};
use suitebuild_lib::model::load_suite;
use suitebuild_lib::platform::paths;
use suitebuild_lib::session::Session;
use suitebuild_lib::store::{ArtifactStore, CacheLock, FileArtifactStore, LockHolder};

use crate::SuiteArgs;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use gc::cmd_gc;
pub use plan::cmd_plan;

/// Root of the cache: the lock file and the `artifacts` record directory live here.
fn cache_root(args: &SuiteArgs) -> PathBuf {
  args.cache_dir.clone().unwrap_or_else(paths::cache_dir)
}

/// Exclusive cache lock for a command that writes records or outputs.
fn lock_exclusive(args: &SuiteArgs, command: &str) -> Result<CacheLock> {
  let holder = LockHolder::current(command, Some(args.file.as_path()));
  CacheLock::exclusive(&cache_root(args), &holder).context("Failed to lock the cache")
}

fn lock_shared(args: &SuiteArgs) -> Result<CacheLock> {
  CacheLock::shared(&cache_root(args)).context("Failed to lock the cache")
}

/// Record store of the loaded suite; suites sharing a cache never see each other's records.
fn open_store(args: &SuiteArgs, session: &Session) -> FileArtifactStore {
  FileArtifactStore::for_suite(&cache_root(args), &session.suite.root)
}

fn load_session(args: &SuiteArgs) -> Result<Arc<Session>> {
  let path = dunce::canonicalize(&args.file)
    .with_context(|| format!("Suite file not found: {}", args.file.display()))?;
  let suite = load_suite(&path).with_context(|| format!("Failed to load suite: {}", path.display()))?;
  debug!(suite = %suite.name, root = %suite.root.display(), "loaded suite");
  Ok(Arc::new(Session::new(suite)))
}

/// Build context with every root builder of the suite registered.
fn register_suite(session: Arc<Session>, store: Arc<dyn ArtifactStore>, config: ContextConfig) -> Result<BuildContext> {
  let ctx = BuildContext::new(session, store, config);
  let roots = ctx.session().root_builders().context("Failed to create builders")?;
  for builder in roots {
    ctx
      .add_builder(builder)
      .context("Failed to resolve build graph")?;
  }
  Ok(ctx)
}

/// Uids of every builder the suite currently produces.
fn live_uids(ctx: &BuildContext) -> impl Iterator<Item = String> + '_ {
  ctx.builders().into_iter().map(|builder| builder.uid())
}
