use predicates::prelude::*;

use super::common::{TestEnv, UTIL_SUITE};

#[test]
fn build_writes_project_files() {
  let env = TestEnv::with_app_suite();

  env
    .suite_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build complete"));

  assert!(env.target_dir().join("core").join("util.project.json").exists());
  assert!(env.target_dir().join("core").join("app.project.json").exists());
}

#[test]
fn second_build_is_up_to_date() {
  let env = TestEnv::with_app_suite();
  env.suite_cmd().arg("build").assert().success();

  let output = env.suite_cmd().args(["build", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["executed"].as_object().unwrap().len(), 0);
  assert_eq!(summary["cached"].as_object().unwrap().len(), 3);
}

#[test]
fn build_into_other_target_reruns_writers() {
  let env = TestEnv::with_app_suite();
  env.suite_cmd().arg("build").assert().success();

  let elsewhere = env.temp.path().join("elsewhere");
  let output = env
    .suite_cmd()
    .args(["build", "-o", "json", "--target"])
    .arg(&elsewhere)
    .output()
    .unwrap();
  assert!(output.status.success());

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert!(summary["executed"].get("core.app").is_some());
  assert!(summary["executed"].get("core.util").is_some());
  assert!(elsewhere.join("core").join("app.project.json").exists());
  assert!(elsewhere.join("core").join("util.project.json").exists());
}

#[test]
fn suites_sharing_a_cache_build_independently() {
  let env = TestEnv::with_app_suite();
  env.suite_cmd().arg("build").assert().success();

  let other = env.add_suite("other", &[("suite.yaml", UTIL_SUITE), ("util/cs/util.cs", "class Util {}")]);
  let output = env.suite_cmd_in(&other).args(["build", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert!(summary["executed"].get("core.util").is_some());
  assert_eq!(summary["cached"].as_object().unwrap().len(), 0);
  assert!(other.join("target").join("core").join("util.project.json").exists());
}

#[test]
fn no_cache_always_builds() {
  let env = TestEnv::with_app_suite();
  env.suite_cmd().arg("build").assert().success();

  let output = env
    .suite_cmd()
    .args(["build", "--no-cache", "-o", "json"])
    .output()
    .unwrap();
  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["executed"].as_object().unwrap().len(), 3);
}

#[test]
fn missing_reference_fails() {
  let env = TestEnv::empty();
  env.write_file(
    "suite.yaml",
    r#"
name: broken
modules:
  - name: core
    projects:
      - name: app
        references:
          - uri: module://nowhere
"#,
  );

  env
    .suite_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("core.nowhere"));
}

#[test]
fn failed_builder_exits_non_zero() {
  let env = TestEnv::with_app_suite();
  env.write_file("app/config/a.config", "<configuration />");
  env.write_file("app/config/b.config", "<configuration />");
  env.write_file(
    "suite.yaml",
    r#"
name: demo
modules:
  - name: core
    projects:
      - name: app
        source_sets:
          appconfig: app/config
"#,
  );

  env
    .suite_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("ambiguous"));
}

#[test]
fn plan_lists_builders_without_building() {
  let env = TestEnv::with_app_suite();

  let output = env.suite_cmd().args(["plan", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let entries = plan.as_array().unwrap();
  assert_eq!(entries.len(), 3);
  assert!(entries.iter().all(|e| e["status"] == "new"));
  assert!(!env.target_dir().exists());

  env.suite_cmd().arg("build").assert().success();
  env
    .suite_cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("Up to date  3"));
}

#[test]
fn clean_forces_rebuild() {
  let env = TestEnv::with_app_suite();
  env.suite_cmd().arg("build").assert().success();

  env
    .suite_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Clean complete"));
  assert!(!env.target_dir().exists());

  let output = env.suite_cmd().args(["build", "-o", "json"]).output().unwrap();
  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["executed"].as_object().unwrap().len(), 3);
  assert!(env.target_dir().join("core").join("app.project.json").exists());
}
