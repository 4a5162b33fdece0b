//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Two projects in one module, `app` referencing `util` at build time.
pub const APP_SUITE: &str = r#"
name: demo
version: 1.0.0
modules:
  - name: core
    projects:
      - name: util
        source_sets:
          cs: util/cs
      - name: app
        source_sets:
          cs: app/cs
        references:
          - uri: module://util
          - uri: nuget://Newtonsoft.Json
            kind: link
            version: 13.0.1
"#;

/// Isolated test environment.
///
/// Each test gets its own suite directory and cache directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Suite file plus one source file per project.
  pub fn with_app_suite() -> Self {
    let env = Self::empty();
    env.write_file("suite.yaml", APP_SUITE);
    env.write_file("util/cs/util.cs", "class Util {}");
    env.write_file("app/cs/main.cs", "class Program {}");
    env
  }

  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the suite directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.suite_dir().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn suite_dir(&self) -> PathBuf {
    let p = self.temp.path().join("suite");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Another suite directory next to the first, sharing its cache.
  pub fn add_suite(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = self.temp.path().join(name);
    for (relative_path, content) in files {
      let path = dir.join(relative_path);
      std::fs::create_dir_all(path.parent().unwrap()).unwrap();
      std::fs::write(&path, content).unwrap();
    }
    dunce::canonicalize(&dir).unwrap()
  }

  pub fn target_dir(&self) -> PathBuf {
    self.suite_dir().join("target")
  }

  pub fn cache_path(&self) -> PathBuf {
    let p = self.temp.path().join("cache");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Command for the `suite` binary running inside the suite directory with
  /// an isolated cache.
  pub fn suite_cmd(&self) -> Command {
    self.suite_cmd_in(&self.suite_dir())
  }

  /// Same as [`TestEnv::suite_cmd`], for a suite living in `dir`.
  pub fn suite_cmd_in(&self, dir: &Path) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("suite");
    cmd.current_dir(dir);
    cmd.env("SUITE_CACHE_DIR", self.cache_path());
    cmd.env_remove("RUST_LOG");
    cmd
  }
}

/// A suite with only `core.util`, reusing the uid of the app suite's project.
pub const UTIL_SUITE: &str = r#"
name: other
modules:
  - name: core
    projects:
      - name: util
        source_sets:
          cs: util/cs
"#;
