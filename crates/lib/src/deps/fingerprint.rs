use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::ReferenceKind;
use crate::util::hash::{ContentHash, HashError, Hashable, ObjectHash};

/// Persisted value capturing everything a builder's output depends on.
///
/// Fingerprints only contain ordered collections so their serialized form is
/// identical across runs when nothing relevant changed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fingerprint {
  None,
  SourceSetStructure {
    source_set: String,
    filter: String,
    files: BTreeSet<String>,
  },
  SourceSetContent {
    source_set: String,
    filter: String,
    files: BTreeMap<String, ContentHash>,
  },
  ProjectProperties {
    project: String,
    properties: BTreeMap<String, Option<String>>,
  },
  Subtask {
    uid: String,
    inner: Box<Fingerprint>,
  },
  BuilderIdentity {
    kind: String,
    uid: String,
  },
  Reference {
    uri: String,
    kind: ReferenceKind,
    version: Option<String>,
  },
  OutputLocation {
    dir: String,
  },
  Multiple {
    members: BTreeSet<Fingerprint>,
  },
}

impl Hashable for Fingerprint {}

impl Fingerprint {
  /// Short digest for logs and plan output.
  pub fn digest(&self) -> Result<ObjectHash, HashError> {
    self.compute_hash()
  }
}
