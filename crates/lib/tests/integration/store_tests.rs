//! Persisted records across build passes.

use std::collections::HashSet;
use std::sync::Arc;

use suitebuild_lib::store::{ArtifactStore, FileArtifactStore, MemoryArtifactStore, collect_garbage};

use super::common::{Fixture, register_all};

#[tokio::test]
async fn records_round_trip_through_disk() {
  let fixture = Fixture::new();
  let store = fixture.store();
  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  let report = ctx.run().await.unwrap();

  let reopened = FileArtifactStore::new(fixture.temp.path().join("cache"));
  let record = reopened.load("core.app").unwrap();
  assert_eq!(&record.outputs, report.outputs("core.app").unwrap());
  assert_eq!(record, store.load("core.app").unwrap());

  assert_eq!(reopened.uids().unwrap().len(), 3);
}

#[tokio::test]
async fn memory_store_always_rebuilds_fresh_contexts() {
  let fixture = Fixture::new();

  for _ in 0..2 {
    let ctx = fixture.context(fixture.app_suite("13.0.1"), Arc::new(MemoryArtifactStore::new()));
    register_all(&ctx);
    let report = ctx.run().await.unwrap();
    assert_eq!(report.executed.len(), 3);
  }
}

#[tokio::test]
async fn gc_drops_records_of_removed_projects() {
  let fixture = Fixture::new();
  let store = fixture.store();
  let ctx = fixture.context(fixture.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  ctx.run().await.unwrap();

  let live: HashSet<String> = ["core.util".to_string()].into();
  let result = collect_garbage(store.as_ref(), &live, false).unwrap();

  assert_eq!(result.scanned, 3);
  assert_eq!(result.removed.len(), 2);
  assert_eq!(store.uids().unwrap(), vec!["core.util".to_string()]);
}

#[tokio::test]
async fn suites_sharing_a_cache_keep_separate_records() {
  let first = Fixture::new();
  let second = Fixture::new();
  let cache = first.temp.path().join("cache");

  let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::for_suite(&cache, &first.root()));
  let ctx = first.context(first.app_suite("13.0.1"), store.clone());
  register_all(&ctx);
  ctx.run().await.unwrap();

  let other: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::for_suite(&cache, &second.root()));
  assert!(other.load("core.util").is_none());
  let ctx = second.context(second.app_suite("13.0.1"), other.clone());
  register_all(&ctx);
  let report = ctx.run().await.unwrap();
  assert_eq!(report.executed.len(), 3);
  assert!(second.target().join("core").join("util.project.json").exists());

  let result = collect_garbage(other.as_ref(), &HashSet::new(), false).unwrap();
  assert_eq!(result.removed.len(), 3);
  assert_eq!(store.uids().unwrap().len(), 3);
}
