use predicates::prelude::*;

use super::common::{TestEnv, UTIL_SUITE};

#[test]
fn gc_with_empty_cache_succeeds() {
  let env = TestEnv::with_app_suite();

  env
    .suite_cmd()
    .arg("gc")
    .assert()
    .success()
    .stdout(predicate::str::contains("Garbage collection complete"));
}

#[test]
fn gc_removes_records_of_dropped_projects() {
  let env = TestEnv::with_app_suite();
  env.suite_cmd().arg("build").assert().success();

  env.write_file(
    "suite.yaml",
    r#"
name: demo
modules:
  - name: core
    projects:
      - name: util
        source_sets:
          cs: util/cs
"#,
  );

  let output = env.suite_cmd().args(["gc", "--dry-run", "-o", "json"]).output().unwrap();
  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["dry_run"], true);
  assert_eq!(result["removed"].as_array().unwrap().len(), 2);

  let output = env.suite_cmd().args(["gc", "-o", "json"]).output().unwrap();
  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["scanned"], 3);

  let output = env.suite_cmd().args(["gc", "-o", "json"]).output().unwrap();
  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["scanned"], 1);
  assert!(result["removed"].as_array().unwrap().is_empty());
}

#[test]
fn gc_leaves_other_suites_alone() {
  let env = TestEnv::with_app_suite();
  env.suite_cmd().arg("build").assert().success();

  let other = env.add_suite("other", &[("suite.yaml", UTIL_SUITE), ("util/cs/util.cs", "class Util {}")]);
  let output = env.suite_cmd_in(&other).args(["gc", "-o", "json"]).output().unwrap();
  assert!(output.status.success());
  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["scanned"], 0);

  let output = env.suite_cmd().args(["build", "-o", "json"]).output().unwrap();
  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["cached"].as_object().unwrap().len(), 3);
}
