//! Build context: the builder graph of one build pass.
//!
//! The context owns:
//! - a de-duplication table mapping each [`BuilderKey`] to one canonical builder
//! - the prerequisite edges between registered builders
//! - the outputs recorded for every builder that completed in this pass
//!
//! Registration is insert-if-absent, so requesting "the same" builder twice
//! returns the first instance and it runs at most once. Execution schedules
//! every builder as soon as all of its prerequisites succeeded; a failure only
//! skips the builders that transitively depend on it.

mod graph;
mod types;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

use crate::builder::{BuildError, Builder, BuilderKey, TargetPath};
use crate::deps::Dependencies;
use crate::session::Session;
use crate::store::{ArtifactRecord, ArtifactStore};

pub use graph::BuilderGraph;
pub use types::{BuildReport, ContextConfig, ContextError, PlanEntry, PlanStatus, RunContext};

use types::ResultTable;

#[derive(Debug, Default)]
struct ContextState {
  builders: HashMap<BuilderKey, Arc<dyn Builder>>,
  /// Registration order, used to keep scheduling and plans deterministic.
  order: Vec<BuilderKey>,
  edges: HashMap<BuilderKey, Vec<BuilderKey>>,
  completed: HashSet<BuilderKey>,
  /// Builders that failed or were skipped in an earlier pass, mapped to the failed uid.
  failed: HashMap<BuilderKey, String>,
}

/// How a scheduled builder finished.
enum Outcome {
  Executed(BTreeSet<TargetPath>),
  Cached(BTreeSet<TargetPath>),
}

#[derive(Debug)]
pub struct BuildContext {
  session: Arc<Session>,
  store: Arc<dyn ArtifactStore>,
  config: ContextConfig,
  state: Mutex<ContextState>,
  results: ResultTable,
  run_gate: AsyncMutex<()>,
}

impl BuildContext {
  pub fn new(session: Arc<Session>, store: Arc<dyn ArtifactStore>, config: ContextConfig) -> Self {
    Self {
      session,
      store,
      config,
      state: Mutex::new(ContextState::default()),
      results: ResultTable::default(),
      run_gate: AsyncMutex::new(()),
    }
  }

  pub fn session(&self) -> &Arc<Session> {
    &self.session
  }

  pub fn config(&self) -> &ContextConfig {
    &self.config
  }

  fn lock(&self) -> MutexGuard<'_, ContextState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a builder and, recursively, its prerequisites.
  ///
  /// Returns the canonical instance: the builder registered first under the
  /// same key. On error every builder registered by this call is removed
  /// again, leaving the context as it was.
  pub fn add_builder(&self, builder: Arc<dyn Builder>) -> Result<Arc<dyn Builder>, ContextError> {
    let mut added = Vec::new();
    let result = self.register(builder, &mut added);
    if result.is_err() {
      self.roll_back(&added);
    }
    result
  }

  fn register(
    &self,
    builder: Arc<dyn Builder>,
    added: &mut Vec<BuilderKey>,
  ) -> Result<Arc<dyn Builder>, ContextError> {
    let key = builder.key();
    {
      let mut state = self.lock();
      if let Some(existing) = state.builders.get(&key) {
        return Ok(existing.clone());
      }
      state.builders.insert(key.clone(), builder.clone());
      state.order.push(key.clone());
    }
    added.push(key);

    let count = self.resolve_prerequisites(&builder, added)?;
    debug!(builder = %builder.uid(), prerequisites = count, "registered builder");
    Ok(builder)
  }

  fn roll_back(&self, added: &[BuilderKey]) {
    let mut state = self.lock();
    for key in added {
      if let Some(builder) = state.builders.remove(key) {
        builder.invalidate();
      }
      state.edges.remove(key);
    }
    state.order.retain(|k| !added.contains(k));
    debug!(builders = added.len(), "rolled back registration");
  }

  /// Discover, register and attach the prerequisites of a registered builder.
  fn resolve_prerequisites(
    &self,
    builder: &Arc<dyn Builder>,
    added: &mut Vec<BuilderKey>,
  ) -> Result<usize, ContextError> {
    let discovered = builder
      .discover_prerequisites(&self.session)
      .map_err(|source| ContextError::Registration {
        uid: builder.uid(),
        source,
      })?;

    let mut prerequisites: Vec<Arc<dyn Builder>> = Vec::with_capacity(discovered.len());
    for prerequisite in discovered {
      let canonical = self.register(prerequisite, added)?;
      if !prerequisites.iter().any(|p| p.key() == canonical.key()) {
        prerequisites.push(canonical);
      }
    }

    let count = prerequisites.len();
    self.attach(builder, prerequisites);
    Ok(count)
  }

  fn attach(&self, builder: &Arc<dyn Builder>, prerequisites: Vec<Arc<dyn Builder>>) {
    let keys = prerequisites.iter().map(|p| p.key()).collect();
    builder.resolve(prerequisites);
    self.lock().edges.insert(builder.key(), keys);
  }

  fn canonical(&self, builder: &dyn Builder) -> Result<Arc<dyn Builder>, ContextError> {
    self
      .lock()
      .builders
      .get(&builder.key())
      .cloned()
      .ok_or_else(|| ContextError::NotRegistered { uid: builder.uid() })
  }

  /// Add an explicit prerequisite to a registered builder.
  ///
  /// The prerequisite is registered first; returns its canonical instance.
  pub fn add_prerequisite(
    &self,
    builder: &dyn Builder,
    prerequisite: Arc<dyn Builder>,
  ) -> Result<Arc<dyn Builder>, ContextError> {
    let builder = self.canonical(builder)?;
    let prerequisite = self.add_builder(prerequisite)?;

    let mut prerequisites = builder.prerequisites();
    if !prerequisites.iter().any(|p| p.key() == prerequisite.key()) {
      prerequisites.push(prerequisite.clone());
      self.attach(&builder, prerequisites);
    }
    Ok(prerequisite)
  }

  /// Detach a prerequisite; the detached builder stays registered.
  pub fn remove_prerequisite(&self, builder: &dyn Builder, prerequisite: &dyn Builder) -> Result<bool, ContextError> {
    let builder = self.canonical(builder)?;
    let key = prerequisite.key();

    let mut prerequisites = builder.prerequisites();
    let before = prerequisites.len();
    prerequisites.retain(|p| p.key() != key);
    if prerequisites.len() == before {
      return Ok(false);
    }
    self.attach(&builder, prerequisites);
    Ok(true)
  }

  /// Drop a builder's resolution and discover its prerequisites again.
  ///
  /// If rediscovery fails the previous prerequisites are restored.
  pub fn invalidate(&self, builder: &dyn Builder) -> Result<Arc<dyn Builder>, ContextError> {
    let builder = self.canonical(builder)?;
    let previous = builder.prerequisites();
    builder.invalidate();
    self.lock().edges.remove(&builder.key());

    let mut added = Vec::new();
    if let Err(e) = self.resolve_prerequisites(&builder, &mut added) {
      self.roll_back(&added);
      self.attach(&builder, previous);
      return Err(e);
    }
    Ok(builder)
  }

  /// Registered builders in registration order.
  pub fn builders(&self) -> Vec<Arc<dyn Builder>> {
    let state = self.lock();
    state.order.iter().filter_map(|k| state.builders.get(k).cloned()).collect()
  }

  pub fn get(&self, key: &BuilderKey) -> Option<Arc<dyn Builder>> {
    self.lock().builders.get(key).cloned()
  }

  pub fn get_dependencies(&self, builder: &dyn Builder) -> Result<Vec<Arc<dyn Builder>>, ContextError> {
    let state = self.lock();
    let key = builder.key();
    if !state.builders.contains_key(&key) {
      return Err(ContextError::NotRegistered { uid: builder.uid() });
    }
    Ok(
      state
        .edges
        .get(&key)
        .into_iter()
        .flatten()
        .filter_map(|k| state.builders.get(k).cloned())
        .collect(),
    )
  }

  /// Outputs recorded for `builder` in this context, if it completed.
  pub fn get_results(&self, builder: &dyn Builder) -> Option<BTreeSet<TargetPath>> {
    self.run_context().get_results(builder)
  }

  fn run_context(&self) -> RunContext {
    RunContext::new(self.config.target_dir.clone(), self.results.clone())
  }

  /// Graph snapshot of the registered builders.
  pub fn graph(&self) -> Result<BuilderGraph, ContextError> {
    let state = self.lock();
    let mut graph = BuilderGraph::new();
    for key in &state.order {
      graph.add_node(key);
    }
    for key in &state.order {
      for prerequisite in state.edges.get(key).into_iter().flatten() {
        if !state.builders.contains_key(prerequisite) {
          return Err(ContextError::NotRegistered {
            uid: prerequisite.entity.clone(),
          });
        }
        graph.add_edge(prerequisite, key);
      }
    }
    Ok(graph)
  }

  fn cycle_error(&self, key: BuilderKey) -> ContextError {
    let uid = self.get(&key).map(|b| b.uid()).unwrap_or(key.entity);
    ContextError::CycleDetected { uid }
  }

  fn lookup(&self, keys: Vec<BuilderKey>) -> Vec<Arc<dyn Builder>> {
    let state = self.lock();
    keys.iter().filter_map(|k| state.builders.get(k).cloned()).collect()
  }

  /// Registered builders, prerequisites first.
  pub fn execution_order(&self) -> Result<Vec<Arc<dyn Builder>>, ContextError> {
    let order = self.graph()?.topological_order().map_err(|k| self.cycle_error(k))?;
    Ok(self.lookup(order))
  }

  /// Registered builders grouped into levels that could run in parallel.
  pub fn execution_waves(&self) -> Result<Vec<Vec<Arc<dyn Builder>>>, ContextError> {
    let waves = self.graph()?.waves().map_err(|k| self.cycle_error(k))?;
    Ok(waves.into_iter().map(|wave| self.lookup(wave)).collect())
  }

  /// What `run` would do, without running anything.
  pub fn plan(&self) -> Result<Vec<PlanEntry>, ContextError> {
    let completed = self.lock().completed.clone();
    let mut entries = Vec::new();

    for (wave, builders) in self.execution_waves()?.into_iter().enumerate() {
      for builder in builders {
        let uid = builder.uid();
        let dependencies = cache_dependencies(builder.as_ref(), &self.config.target_dir);
        let status = if completed.contains(&builder.key()) {
          PlanStatus::Done
        } else {
          match self.store.load(&uid) {
            Some(record) if dependencies.is_up_to_date(&record.fingerprint) => PlanStatus::UpToDate,
            Some(_) => PlanStatus::Stale,
            None => PlanStatus::New,
          }
        };
        let digest = dependencies
          .fingerprint()
          .ok()
          .and_then(|fp| fp.digest().ok())
          .map(|hash| hash.0);

        entries.push(PlanEntry {
          uid,
          kind: builder.kind(),
          wave,
          prerequisites: builder.prerequisites().iter().map(|p| p.uid()).collect(),
          status,
          digest,
        });
      }
    }

    Ok(entries)
  }

  /// Run every registered builder that has not completed yet.
  ///
  /// Cycles are rejected before anything runs. Builder failures do not make
  /// this return an error; they are reported in the [`BuildReport`]
  /// (see [`BuildReport::into_result`]). Concurrent calls run one after the
  /// other, so a later call only sees what the earlier one left undone.
  pub async fn run(&self) -> Result<BuildReport, ContextError> {
    let _pass = self.run_gate.lock().await;

    let graph = self.graph()?;
    let order = graph.topological_order().map_err(|k| self.cycle_error(k))?;

    let mut report = BuildReport::default();
    let mut waiting: HashMap<BuilderKey, usize> = HashMap::new();
    let mut ready: Vec<BuilderKey> = Vec::new();
    let builders: HashMap<BuilderKey, Arc<dyn Builder>>;

    {
      let mut state = self.lock();
      builders = state.builders.clone();

      for key in &order {
        if state.completed.contains(key) || state.failed.contains_key(key) {
          continue;
        }

        let prerequisites = graph.prerequisites(key);
        if let Some(cause) = prerequisites.iter().find_map(|p| state.failed.get(p).cloned()) {
          let uid = builders[key].uid();
          warn!(builder = %uid, failed_dep = %cause, "skipping builder due to failed dependency");
          report.skipped.insert(uid, cause.clone());
          state.failed.insert(key.clone(), cause);
          continue;
        }

        let pending = prerequisites.iter().filter(|p| !state.completed.contains(*p)).count();
        if pending == 0 {
          ready.push(key.clone());
        } else {
          waiting.insert(key.clone(), pending);
        }
      }
    }

    info!(
      builders = ready.len() + waiting.len(),
      parallelism = self.config.parallelism,
      "starting build"
    );

    let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
    let mut join_set = JoinSet::new();
    let mut tasks: HashMap<task::Id, BuilderKey> = HashMap::new();

    for key in ready {
      self.spawn(&mut join_set, &mut tasks, key, &builders, &semaphore);
    }

    while let Some(joined) = join_set.join_next_with_id().await {
      let (key, result) = match joined {
        Ok((id, result)) => match tasks.remove(&id) {
          Some(key) => (key, result),
          None => continue,
        },
        Err(e) => {
          let Some(key) = tasks.remove(&e.id()) else {
            error!(error = %e, "unknown build task aborted");
            continue;
          };
          let message = if e.is_panic() {
            format!("builder {} panicked", builders[&key].uid())
          } else {
            format!("build task of {} was cancelled", builders[&key].uid())
          };
          (key, Err(BuildError::Failed { message }))
        }
      };
      let uid = builders[&key].uid();

      match result {
        Ok(outcome) => {
          let outputs = match outcome {
            Outcome::Executed(outputs) => {
              info!(builder = %uid, outputs = outputs.len(), "builder succeeded");
              report.executed.insert(uid, outputs.clone());
              outputs
            }
            Outcome::Cached(outputs) => {
              info!(builder = %uid, "builder up to date");
              report.cached.insert(uid, outputs.clone());
              outputs
            }
          };

          self
            .results
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), outputs);
          self.lock().completed.insert(key.clone());

          for dependent in graph.dependents(&key) {
            let Some(pending) = waiting.get_mut(&dependent) else {
              continue;
            };
            *pending -= 1;
            if *pending == 0 {
              waiting.remove(&dependent);
              self.spawn(&mut join_set, &mut tasks, dependent, &builders, &semaphore);
            }
          }
        }
        Err(e) => {
          error!(builder = %uid, error = %e, "builder failed");
          let mut state = self.lock();
          state.failed.insert(key.clone(), uid.clone());

          for dependent in graph.transitive_dependents(&key) {
            if waiting.remove(&dependent).is_none() {
              continue;
            }
            let dependent_uid = builders[&dependent].uid();
            warn!(builder = %dependent_uid, failed_dep = %uid, "skipping builder due to failed dependency");
            report.skipped.insert(dependent_uid, uid.clone());
            state.failed.insert(dependent, uid.clone());
          }

          report.failed.insert(uid, e);
        }
      }
    }

    info!(
      executed = report.executed.len(),
      cached = report.cached.len(),
      failed = report.failed.len(),
      skipped = report.skipped.len(),
      "build complete"
    );

    Ok(report)
  }

  fn spawn(
    &self,
    join_set: &mut JoinSet<Result<Outcome, BuildError>>,
    tasks: &mut HashMap<task::Id, BuilderKey>,
    key: BuilderKey,
    builders: &HashMap<BuilderKey, Arc<dyn Builder>>,
    semaphore: &Arc<Semaphore>,
  ) {
    let builder = builders[&key].clone();
    let store = self.store.clone();
    let ctx = self.run_context();
    let semaphore = semaphore.clone();

    let handle = join_set.spawn(async move {
      let _permit = semaphore.acquire_owned().await;
      match task::spawn_blocking(move || execute_builder(builder.as_ref(), store.as_ref(), &ctx)).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
        Err(e) => Err(BuildError::Failed {
          message: format!("build task cancelled: {e}"),
        }),
      }
    });
    tasks.insert(handle.id(), key);
  }
}

/// Dependencies a stored record must match, including the output directory
/// for builders that write under it.
fn cache_dependencies(builder: &dyn Builder, target_dir: &Path) -> Dependencies {
  let dependencies = builder.dependencies();
  if builder.writes_outputs() {
    Dependencies::combine([dependencies, Dependencies::output_location(target_dir)])
  } else {
    dependencies
  }
}

/// Run one builder unless its stored fingerprint is still up to date.
fn execute_builder(
  builder: &dyn Builder,
  store: &dyn ArtifactStore,
  ctx: &RunContext,
) -> Result<Outcome, BuildError> {
  let uid = builder.uid();
  let dependencies = cache_dependencies(builder, ctx.target_dir());

  if let Some(record) = store.load(&uid)
    && dependencies.is_up_to_date(&record.fingerprint)
  {
    debug!(builder = %uid, "fingerprint unchanged, reusing outputs");
    return Ok(Outcome::Cached(record.outputs));
  }

  let fingerprint = match dependencies.fingerprint() {
    Ok(fingerprint) => Some(fingerprint),
    Err(e) => {
      warn!(builder = %uid, error = %e, "cannot fingerprint builder, result will not be cached");
      None
    }
  };

  debug!(builder = %uid, "running builder");
  let outputs = builder.run(ctx)?;

  if let Some(fingerprint) = fingerprint
    && let Err(e) = store.save(&uid, &ArtifactRecord::new(fingerprint, outputs.clone()))
  {
    warn!(builder = %uid, error = %e, "failed to save artifact record");
  }

  Ok(Outcome::Executed(outputs))
}
