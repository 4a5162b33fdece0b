//! Shared fixtures for the integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use suitebuild_lib::context::{BuildContext, ContextConfig};
use suitebuild_lib::model::{Project, Reference, Suite};
use suitebuild_lib::session::Session;
use suitebuild_lib::source::{LocalSourceSet, SourceSet};
use suitebuild_lib::store::{ArtifactStore, FileArtifactStore};
use tempfile::TempDir;

/// Workspace for one test: a suite root plus a separate cache directory.
pub struct Fixture {
  pub temp: TempDir,
}

impl Fixture {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> PathBuf {
    self.temp.path().join("suite")
  }

  pub fn target(&self) -> PathBuf {
    self.root().join("target")
  }

  pub fn store(&self) -> Arc<dyn ArtifactStore> {
    Arc::new(FileArtifactStore::new(self.temp.path().join("cache")))
  }

  pub fn write(&self, rel: &str, content: &str) -> PathBuf {
    let path = self.root().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
  }

  pub fn sources(&self, id: &str, rel: &str) -> Arc<dyn SourceSet> {
    Arc::new(LocalSourceSet::new(id, self.root().join(rel)))
  }

  /// `core.util` with two sources, `core.app` referencing it at build time
  /// and a NuGet package at link time.
  pub fn app_suite(&self, package_version: &str) -> Suite {
    self.write("util/cs/a.cs", "class A {}");
    self.write("util/cs/b.cs", "class B {}");
    self.write("app/cs/main.cs", "class Program {}");

    let mut suite = Suite::new("demo", &self.root());
    suite.add_project(Project::new("core", "util").with_source_set("cs", self.sources("core.util/cs", "util/cs")));
    suite.add_project(
      Project::new("core", "app")
        .with_source_set("cs", self.sources("core.app/cs", "app/cs"))
        .with_reference(Reference::build("module://util"))
        .with_reference(Reference::link("nuget://Newtonsoft.Json", Some(package_version))),
    );
    suite
  }

  pub fn context(&self, suite: Suite, store: Arc<dyn ArtifactStore>) -> BuildContext {
    self.context_at(suite, store, self.target())
  }

  /// Same as [`Fixture::context`], writing outputs under `target_dir`.
  pub fn context_at(&self, suite: Suite, store: Arc<dyn ArtifactStore>, target_dir: PathBuf) -> BuildContext {
    let config = ContextConfig {
      parallelism: 2,
      target_dir,
    };
    BuildContext::new(Arc::new(Session::new(suite)), store, config)
  }
}

/// Register every root builder of the session's suite.
pub fn register_all(ctx: &BuildContext) {
  for builder in ctx.session().root_builders().unwrap() {
    ctx.add_builder(builder).unwrap();
  }
}

pub fn read_json(path: &Path) -> serde_json::Value {
  serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}
