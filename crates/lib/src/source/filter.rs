use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Predicate selecting which files of a source set matter.
///
/// Files whose name ends with one of the excluded suffixes are skipped;
/// matching is case-insensitive. The filter is a value so it can be part of a
/// fingerprint's identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceFilter {
  exclude_suffixes: BTreeSet<String>,
}

impl SourceFilter {
  /// Filter accepting every file.
  pub fn none() -> Self {
    Self::default()
  }

  pub fn excluding<I, S>(suffixes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self {
      exclude_suffixes: suffixes.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
    }
  }

  pub fn accepts(&self, path: &str) -> bool {
    let lower = path.to_lowercase();
    !self.exclude_suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str()))
  }

  /// Canonical textual identity, e.g. `exclude:.csproj,.user`.
  pub fn identity(&self) -> String {
    if self.exclude_suffixes.is_empty() {
      return "all".to_string();
    }
    let suffixes: Vec<&str> = self.exclude_suffixes.iter().map(String::as_str).collect();
    format!("exclude:{}", suffixes.join(","))
  }
}
