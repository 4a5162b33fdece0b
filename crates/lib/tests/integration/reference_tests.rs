//! Build-time and link-only references through a real session.

use suitebuild_lib::builder::BuildError;
use suitebuild_lib::context::ContextError;
use suitebuild_lib::model::{Project, Reference, Suite};
use suitebuild_lib::resolve::ResolveError;

use super::common::{Fixture, register_all};

#[test]
fn build_reference_becomes_prerequisite_and_link_does_not() {
  let fixture = Fixture::new();
  let suite = fixture.app_suite("13.0.1");
  let ctx = fixture.context(suite, fixture.store());

  let app = ctx.session().suite.project("core", "app").unwrap().clone();
  let builder = ctx.session().registry.builder_for(&app).unwrap();
  ctx.add_builder(builder.clone()).unwrap();

  let prerequisites = builder.prerequisites();
  assert_eq!(prerequisites.len(), 1);
  assert_eq!(prerequisites[0].kind(), "project-ref");
  assert_eq!(prerequisites[0].prerequisites()[0].uid(), "core.util");

  let uids: Vec<String> = ctx.builders().iter().map(|b| b.uid()).collect();
  assert!(uids.iter().all(|uid| !uid.contains("nuget")));
  assert_eq!(uids.len(), 3);
}

#[tokio::test]
async fn link_version_change_rebuilds_only_owner() {
  let fixture = Fixture::new();
  let store = fixture.store();

  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  ctx.run().await.unwrap();

  let ctx = fixture.context(fixture.app_suite("13.0.2"), store);
  register_all(&ctx);
  let report = ctx.run().await.unwrap();

  assert_eq!(report.executed.keys().collect::<Vec<_>>(), vec!["core.app"]);
  assert!(report.cached.contains_key("core.util"));
}

#[test]
fn missing_project_fails_registration() {
  let fixture = Fixture::new();
  let mut suite = Suite::new("demo", &fixture.root());
  suite.add_project(Project::new("core", "app").with_reference(Reference::build("module://missing")));
  let ctx = fixture.context(suite, fixture.store());

  let builders = ctx.session().root_builders().unwrap();
  let err = ctx.add_builder(builders[0].clone()).unwrap_err();
  match err {
    ContextError::Registration {
      uid,
      source: BuildError::Resolve(ResolveError::ProjectNotFound { project, .. }),
    } => {
      assert_eq!(uid, "core.app");
      assert_eq!(project, "core.missing");
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(ctx.builders().is_empty());
}

#[test]
fn unknown_link_scheme_fails_registration() {
  let fixture = Fixture::new();
  let mut suite = Suite::new("demo", &fixture.root());
  suite.add_project(Project::new("core", "app").with_reference(Reference::link("maven://junit", None)));
  let ctx = fixture.context(suite, fixture.store());

  let builders = ctx.session().root_builders().unwrap();
  let err = ctx.add_builder(builders[0].clone()).unwrap_err();
  assert!(matches!(
    err,
    ContextError::Registration {
      source: BuildError::Resolve(ResolveError::UnsupportedReference { .. }),
      ..
    }
  ));
}

#[tokio::test]
async fn cross_module_and_file_references() {
  let fixture = Fixture::new();
  let vendor = fixture.write("libs/vendor.dll", "binary");

  let mut suite = Suite::new("demo", &fixture.root());
  suite.add_project(Project::new("shared", "model"));
  suite.add_project(
    Project::new("core", "app")
      .with_reference(Reference::build("suite://shared/model"))
      .with_reference(Reference::build("file://libs/vendor.dll")),
  );

  let ctx = fixture.context(suite, fixture.store());
  register_all(&ctx);
  let report = ctx.run().await.unwrap().into_result().unwrap();

  let app = read_app(&fixture);
  let references: Vec<String> = app["references"]
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v.as_str().unwrap().to_string())
    .collect();
  assert!(references.contains(&vendor.display().to_string()));
  assert!(references.iter().any(|r| r.ends_with("model.project.json")));
  assert!(report.executed.contains_key("shared.model"));
}

#[tokio::test]
async fn missing_file_reference_skips_owner() {
  let fixture = Fixture::new();
  let mut suite = Suite::new("demo", &fixture.root());
  suite.add_project(Project::new("core", "app").with_reference(Reference::build("file://libs/absent.dll")));
  suite.add_project(Project::new("core", "other"));

  let ctx = fixture.context(suite, fixture.store());
  register_all(&ctx);
  let report = ctx.run().await.unwrap();

  let failed: Vec<&String> = report.failed.keys().collect();
  assert_eq!(failed.len(), 1);
  assert!(matches!(report.failed[failed[0]], BuildError::MissingArtifact { .. }));
  assert_eq!(report.skipped.get("core.app"), Some(failed[0]));
  assert!(report.executed.contains_key("core.other"));
}

fn read_app(fixture: &Fixture) -> serde_json::Value {
  super::common::read_json(&fixture.target().join("core").join("app.project.json"))
}
