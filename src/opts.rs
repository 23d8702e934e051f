// src/opts.rs
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

/// What kind of value a recognized option carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
  /// Bare toggle, no argument. Presence means `true`.
  Flag,
  Str,
  Path,
  Int,
  /// Value-taking `true`/`false`, as opposed to a bare toggle.
  Bool,
  /// String constrained to a fixed set of permitted spellings.
  Enum(&'static [&'static str]),
  /// RFC 3339 date-time, e.g. `2025-07-01T12:00:00Z`.
  Timestamp,
}

impl ValueKind {
  pub fn takes_value(self) -> bool {
    !matches!(self, ValueKind::Flag)
  }
}

/// One recognizable command-line option. Spec sets are static tables; the
/// parser never mutates them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionSpec {
  /// Symbolic name the parsed value is stored under.
  pub key: &'static str,
  /// Short form including the leading dash, e.g. `-o`.
  pub short: Option<&'static str>,
  /// Long form including the leading dashes, e.g. `--out_dir`.
  pub long: Option<&'static str>,
  pub kind: ValueKind,
  /// Repeated occurrences accumulate into an ordered list instead of
  /// overwriting.
  pub repeatable: bool,
  pub description: &'static str,
}

impl OptionSpec {
  pub fn matches(&self, token: &str) -> bool {
    self.short == Some(token) || self.long == Some(token)
  }
}

/// Every short and long form must appear at most once within one spec set.
pub fn forms_are_unique(specs: &[OptionSpec]) -> bool {
  let mut seen: Vec<&str> = Vec::new();
  for spec in specs {
    for form in [spec.short, spec.long].into_iter().flatten() {
      if seen.contains(&form) {
        return false;
      }
      seen.push(form);
    }
  }
  true
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
  Flag(bool),
  Str(String),
  Path(PathBuf),
  Int(i64),
  Bool(bool),
  Timestamp(DateTime<FixedOffset>),
  List(Vec<OptionValue>),
}

impl fmt::Display for OptionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OptionValue::Flag(b) | OptionValue::Bool(b) => write!(f, "{b}"),
      OptionValue::Str(s) => write!(f, "{s}"),
      OptionValue::Path(p) => write!(f, "{}", p.display()),
      OptionValue::Int(i) => write!(f, "{i}"),
      OptionValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
      OptionValue::List(items) => {
        let mut first = true;
        for item in items {
          if !first {
            write!(f, ", ")?;
          }
          write!(f, "{item}")?;
          first = false;
        }
        Ok(())
      }
    }
  }
}

/// The accumulating parse result, shared by every parsing layer. Backed by
/// a BTreeMap so iteration order is deterministic for summaries and tests.
///
/// Writes are never rolled back: a later layer's failure leaves every value
/// an earlier layer stored in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMap {
  entries: BTreeMap<&'static str, OptionValue>,
}

impl OptionMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stores `value` under `key`, replacing any previous value.
  pub fn insert(&mut self, key: &'static str, value: OptionValue) {
    self.entries.insert(key, value);
  }

  /// Appends under `key`, growing an ordered list across repeated
  /// occurrences of the same option.
  pub fn append(&mut self, key: &'static str, value: OptionValue) {
    match self.entries.get_mut(key) {
      Some(OptionValue::List(items)) => items.push(value),
      _ => {
        self.entries.insert(key, OptionValue::List(vec![value]));
      }
    }
  }

  pub fn get(&self, key: &str) -> Option<&OptionValue> {
    self.entries.get(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionValue)> {
    self.entries.iter().map(|(k, v)| (*k, v))
  }

  pub fn str_value(&self, key: &str) -> Option<&str> {
    match self.entries.get(key) {
      Some(OptionValue::Str(s)) => Some(s.as_str()),
      _ => None,
    }
  }

  pub fn path(&self, key: &str) -> Option<&Path> {
    match self.entries.get(key) {
      Some(OptionValue::Path(p)) => Some(p.as_path()),
      _ => None,
    }
  }

  pub fn int(&self, key: &str) -> Option<i64> {
    match self.entries.get(key) {
      Some(OptionValue::Int(i)) => Some(*i),
      _ => None,
    }
  }

  pub fn bool_value(&self, key: &str) -> Option<bool> {
    match self.entries.get(key) {
      Some(OptionValue::Bool(b)) => Some(*b),
      _ => None,
    }
  }

  /// Toggle accessor: an absent key reads as `false`.
  pub fn flag(&self, key: &str) -> bool {
    matches!(
      self.entries.get(key),
      Some(OptionValue::Flag(true)) | Some(OptionValue::Bool(true))
    )
  }

  pub fn timestamp(&self, key: &str) -> Option<&DateTime<FixedOffset>> {
    match self.entries.get(key) {
      Some(OptionValue::Timestamp(t)) => Some(t),
      _ => None,
    }
  }

  /// Repeatable-option accessor: an absent key reads as an empty list.
  pub fn str_list(&self, key: &str) -> Vec<&str> {
    match self.entries.get(key) {
      Some(OptionValue::List(items)) => items
        .iter()
        .filter_map(|item| match item {
          OptionValue::Str(s) => Some(s.as_str()),
          _ => None,
        })
        .collect(),
      Some(OptionValue::Str(s)) => vec![s.as_str()],
      _ => Vec::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn spec(key: &'static str, short: &'static str, long: &'static str) -> OptionSpec {
    OptionSpec {
      key,
      short: Some(short),
      long: Some(long),
      kind: ValueKind::Str,
      repeatable: false,
      description: "",
    }
  }

  #[test]
  fn append_accumulates_in_order() {
    let mut map = OptionMap::new();
    map.append("executables", OptionValue::Str("ex1".to_string()));
    map.append("executables", OptionValue::Str("ex2".to_string()));
    map.append("executables", OptionValue::Str("ex3".to_string()));
    assert_eq!(map.str_list("executables"), vec!["ex1", "ex2", "ex3"]);
  }

  #[test]
  fn insert_overwrites() {
    let mut map = OptionMap::new();
    map.insert("host", OptionValue::Str("github".to_string()));
    map.insert("host", OptionValue::Str("bitbucket".to_string()));
    assert_eq!(map.str_value("host"), Some("bitbucket"));
    assert_eq!(map.len(), 1);
  }

  #[test]
  fn flag_defaults_to_false_when_absent() {
    let map = OptionMap::new();
    assert!(!map.flag("force"));
    assert!(map.str_list("executables").is_empty());
  }

  #[test]
  fn typed_accessors_reject_mismatched_variants() {
    let mut map = OptionMap::new();
    map.insert("out_dir", OptionValue::Path(PathBuf::from("/tmp/x")));
    assert_eq!(map.path("out_dir"), Some(Path::new("/tmp/x")));
    assert_eq!(map.str_value("out_dir"), None);
    assert_eq!(map.int("out_dir"), None);
  }

  #[test]
  fn duplicate_forms_are_detected() {
    let good = [spec("one", "-a", "--alpha"), spec("two", "-b", "--beta")];
    assert!(forms_are_unique(&good));

    let clash = [spec("one", "-a", "--alpha"), spec("two", "-a", "--beta")];
    assert!(!forms_are_unique(&clash));

    let long_clash = [spec("one", "-a", "--alpha"), spec("two", "-b", "--alpha")];
    assert!(!forms_are_unique(&long_clash));
  }

  #[test]
  fn list_display_joins_with_commas() {
    let value = OptionValue::List(vec![
      OptionValue::Str("ex1".to_string()),
      OptionValue::Str("ex2".to_string()),
    ]);
    assert_eq!(value.to_string(), "ex1, ex2");
  }
}
