//! Configurable builder for unit tests.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::RunContext;
use crate::deps::Dependencies;
use crate::model::Reference;
use crate::session::Session;

use super::{BuildError, Builder, BuilderKey, BuilderState, TargetPath};

pub type RunLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
pub struct FakeBuilder {
  uid: String,
  dependencies: Dependencies,
  reference: Option<Reference>,
  prerequisites: Vec<Arc<dyn Builder>>,
  outputs: BTreeSet<TargetPath>,
  failure: Option<String>,
  discovery_failure: Option<String>,
  panics: bool,
  writes: bool,
  delay: Option<Duration>,
  log: Option<RunLog>,
  runs: AtomicUsize,
  observed: Mutex<BTreeSet<TargetPath>>,
  state: BuilderState,
}

impl FakeBuilder {
  pub fn new(uid: &str) -> Self {
    Self {
      uid: uid.to_string(),
      dependencies: Dependencies::None,
      reference: None,
      prerequisites: Vec::new(),
      outputs: BTreeSet::from([PathBuf::from(format!("{uid}.out"))]),
      failure: None,
      discovery_failure: None,
      panics: false,
      writes: false,
      delay: None,
      log: None,
      runs: AtomicUsize::new(0),
      observed: Mutex::new(BTreeSet::new()),
      state: BuilderState::new(),
    }
  }

  pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
    self.dependencies = dependencies;
    self
  }

  pub fn with_reference(mut self, reference: Reference) -> Self {
    self.reference = Some(reference);
    self
  }

  pub fn with_prerequisite(mut self, prerequisite: Arc<dyn Builder>) -> Self {
    self.prerequisites.push(prerequisite);
    self
  }

  pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
    self.outputs = outputs.iter().map(PathBuf::from).collect();
    self
  }

  pub fn failing(mut self, message: &str) -> Self {
    self.failure = Some(message.to_string());
    self
  }

  pub fn failing_discovery(mut self, message: &str) -> Self {
    self.discovery_failure = Some(message.to_string());
    self
  }

  pub fn panicking(mut self) -> Self {
    self.panics = true;
    self
  }

  /// Report `writes_outputs`, tying stored results to the target directory.
  pub fn writing(mut self) -> Self {
    self.writes = true;
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn with_log(mut self, log: &RunLog) -> Self {
    self.log = Some(log.clone());
    self
  }

  pub fn runs(&self) -> usize {
    self.runs.load(Ordering::SeqCst)
  }

  /// Outputs of the prerequisites as seen during the last run.
  pub fn observed(&self) -> BTreeSet<TargetPath> {
    self.observed.lock().unwrap().clone()
  }
}

impl Builder for FakeBuilder {
  fn key(&self) -> BuilderKey {
    BuilderKey::new("fake", &self.uid)
  }

  fn uid(&self) -> String {
    self.uid.clone()
  }

  fn state(&self) -> &BuilderState {
    &self.state
  }

  fn intrinsic_dependencies(&self) -> Dependencies {
    self.dependencies.clone()
  }

  fn discover_prerequisites(&self, _session: &Session) -> Result<Vec<Arc<dyn Builder>>, BuildError> {
    match &self.discovery_failure {
      Some(message) => Err(BuildError::Failed {
        message: message.clone(),
      }),
      None => Ok(self.prerequisites.clone()),
    }
  }

  fn writes_outputs(&self) -> bool {
    self.writes
  }

  fn reference(&self) -> Option<&Reference> {
    self.reference.as_ref()
  }

  fn run(&self, ctx: &RunContext) -> Result<BTreeSet<TargetPath>, BuildError> {
    self.runs.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      std::thread::sleep(delay);
    }
    if self.panics {
      panic!("{} panicked", self.uid);
    }
    if let Some(log) = &self.log {
      log.lock().unwrap().push(self.uid.clone());
    }

    *self.observed.lock().unwrap() = ctx.prerequisite_outputs(self)?;

    match &self.failure {
      Some(message) => Err(BuildError::Failed {
        message: message.clone(),
      }),
      None => Ok(self.outputs.clone()),
    }
  }
}
