//! End-to-end build passes over a suite on disk.

use std::fs;

use suitebuild_lib::builder::BuildError;
use suitebuild_lib::context::{ContextError, PlanStatus};
use suitebuild_lib::model::{Project, Reference, Suite};

use super::common::{Fixture, read_json, register_all};

#[tokio::test]
async fn builds_every_project() {
  let fixture = Fixture::new();
  let ctx = fixture.context(fixture.app_suite("13.0.1"), fixture.store());
  register_all(&ctx);

  let report = ctx.run().await.unwrap().into_result().unwrap();
  assert!(report.is_success());
  assert!(report.executed.contains_key("core.util"));
  assert!(report.executed.contains_key("core.app"));
  assert!(report.cached.is_empty());

  let app_file = fixture.target().join("core").join("app.project.json");
  let util_file = fixture.target().join("core").join("util.project.json");
  assert!(app_file.exists());

  let document = read_json(&app_file);
  assert_eq!(document["references"][0], util_file.display().to_string());
  assert_eq!(document["packages"][0]["uri"], "nuget://Newtonsoft.Json");

  let util = read_json(&util_file);
  assert_eq!(util["sources"]["cs"], serde_json::json!(["a.cs", "b.cs"]));
}

#[tokio::test]
async fn unchanged_sources_reuse_outputs() {
  let fixture = Fixture::new();
  let store = fixture.store();

  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  let first = ctx.run().await.unwrap();

  let ctx = fixture.context(fixture.app_suite("13.0.1"), store);
  register_all(&ctx);
  let second = ctx.run().await.unwrap();

  assert!(second.executed.is_empty());
  assert_eq!(second.cached["core.util"], first.executed["core.util"]);
  assert_eq!(second.cached["core.app"], first.executed["core.app"]);
}

#[tokio::test]
async fn other_target_dir_rewrites_project_files() {
  let fixture = Fixture::new();
  let store = fixture.store();

  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  ctx.run().await.unwrap();

  let elsewhere = fixture.temp.path().join("elsewhere");
  let ctx = fixture.context_at(fixture.app_suite("13.0.1"), store.clone(), elsewhere.clone());
  register_all(&ctx);
  let report = ctx.run().await.unwrap();

  assert!(report.executed.contains_key("core.util"));
  assert!(report.executed.contains_key("core.app"));
  assert!(elsewhere.join("core").join("app.project.json").exists());
  let outputs = report.outputs("core.app").unwrap();
  assert!(outputs.iter().all(|path| path.starts_with(&elsewhere)));

  // the record now points at `elsewhere`, so the original target is written again
  let ctx = fixture.context(fixture.app_suite("13.0.1"), store);
  register_all(&ctx);
  let report = ctx.run().await.unwrap();
  assert!(report.executed.contains_key("core.app"));
  assert!(report.outputs("core.app").unwrap().iter().all(|path| path.starts_with(fixture.target())));
}

#[tokio::test]
async fn content_edit_does_not_rebuild_project_file() {
  let fixture = Fixture::new();
  let store = fixture.store();

  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  ctx.run().await.unwrap();

  // app_suite rewrites the fixture files; edit after it
  let suite = fixture.app_suite("13.0.1");
  fixture.write("util/cs/a.cs", "class A { int x; }");
  let ctx = fixture.context(suite, store);
  register_all(&ctx);
  let report = ctx.run().await.unwrap();

  assert!(report.executed.is_empty());
}

#[tokio::test]
async fn added_source_rebuilds_dependents() {
  let fixture = Fixture::new();
  let store = fixture.store();

  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  ctx.run().await.unwrap();

  let suite = fixture.app_suite("13.0.1");
  fixture.write("util/cs/c.cs", "class C {}");
  let ctx = fixture.context(suite, store);
  register_all(&ctx);
  let report = ctx.run().await.unwrap();

  assert!(report.executed.contains_key("core.util"));
  assert!(report.executed.contains_key("core.app"));
  let util = read_json(&fixture.target().join("core").join("util.project.json"));
  assert_eq!(util["sources"]["cs"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn ambiguous_single_file_set_fails_alone() {
  let fixture = Fixture::new();
  fixture.write("app/config/app.config", "<configuration />");
  fixture.write("app/config/app.debug.config", "<configuration />");
  fixture.write("lib/config/lib.config", "<configuration />");

  let mut suite = Suite::new("demo", &fixture.root());
  for name in ["app", "lib"] {
    let set = fixture.sources(&format!("core.{name}/appconfig"), &format!("{name}/config"));
    suite.add_project(Project::new("core", name).with_source_set("appconfig", set));
  }

  let ctx = fixture.context(suite, fixture.store());
  register_all(&ctx);
  let report = ctx.run().await.unwrap();

  match &report.failed["core.app/appconfig"] {
    BuildError::AmbiguousSourceSet { candidates, .. } => assert_eq!(candidates.len(), 2),
    other => panic!("unexpected error: {other}"),
  }
  assert!(report.executed.contains_key("core.app"));
  assert!(report.executed.contains_key("core.lib/appconfig"));
  assert!(fixture.target().join("core").join("lib").join("lib.config").exists());
}

#[tokio::test]
async fn reference_cycle_is_rejected() {
  let fixture = Fixture::new();
  let mut suite = Suite::new("demo", &fixture.root());
  suite.add_project(Project::new("core", "a").with_reference(Reference::build("module://b")));
  suite.add_project(Project::new("core", "b").with_reference(Reference::build("module://a")));

  let ctx = fixture.context(suite, fixture.store());
  register_all(&ctx);

  let err = ctx.run().await.unwrap_err();
  assert!(matches!(err, ContextError::CycleDetected { .. }));
  assert!(!fixture.target().exists());
}

#[tokio::test]
async fn plan_does_not_write_outputs() {
  let fixture = Fixture::new();
  let store = fixture.store();
  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);

  let plan = ctx.plan().unwrap();
  assert_eq!(plan.len(), 3);
  assert!(plan.iter().all(|entry| entry.status == PlanStatus::New));
  assert!(plan.iter().all(|entry| entry.digest.is_some()));
  assert!(!fixture.target().exists());

  let app = plan.iter().find(|entry| entry.uid == "core.app").unwrap();
  assert_eq!(app.wave, 2);
  assert_eq!(app.prerequisites, vec!["core.util#ref:module://util".to_string()]);

  ctx.run().await.unwrap();
  fs::remove_dir_all(fixture.target()).unwrap();

  let ctx = fixture.context(fixture.app_suite("13.0.1"), store);
  register_all(&ctx);
  assert!(ctx.plan().unwrap().iter().all(|entry| entry.status == PlanStatus::UpToDate));
}
