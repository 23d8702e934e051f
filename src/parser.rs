// src/parser.rs
//
// Single-layer flag/value parsing plus leading-positional extraction. The
// layering itself (common options, then a subcommand's options over the
// leftovers) lives in nested.rs; this module only ever looks at one spec
// set at a time.

use log::trace;

use crate::error::SpawnError;
use crate::opts::{forms_are_unique, OptionMap, OptionSpec, OptionValue, ValueKind};

/// Tokens a parse layer did not consume, kept in their original relative
/// order. One in-order sequence is retained (rather than two separate
/// lists) so a later layer still sees a deferred flag next to its
/// space-separated value; `flags`/`positionals` provide the partitioned
/// views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Residual {
  tokens: Vec<String>,
}

impl Residual {
  pub fn new(tokens: Vec<String>) -> Self {
    Self { tokens }
  }

  pub fn tokens(&self) -> &[String] {
    &self.tokens
  }

  pub fn into_tokens(self) -> Vec<String> {
    self.tokens
  }

  pub fn len(&self) -> usize {
    self.tokens.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tokens.is_empty()
  }

  /// Flag-like members (tokens starting with `-`), order preserved.
  pub fn flags(&self) -> Vec<&str> {
    self
      .tokens
      .iter()
      .filter(|t| t.starts_with('-'))
      .map(String::as_str)
      .collect()
  }

  /// Non-flag members, order preserved.
  pub fn positionals(&self) -> Vec<&str> {
    self
      .tokens
      .iter()
      .filter(|t| !t.starts_with('-'))
      .map(String::as_str)
      .collect()
  }
}

/// Token cursor over a reversed argument vector; popping from the tail is
/// popping the next input token.
struct Cursor {
  rtokens: Vec<String>,
}

impl Cursor {
  fn new(mut tokens: Vec<String>) -> Self {
    tokens.reverse();
    Self { rtokens: tokens }
  }

  fn pop(&mut self) -> Option<String> {
    self.rtokens.pop()
  }

  fn next_value(&mut self, flag: &str) -> Result<String, SpawnError> {
    self.rtokens.pop().ok_or_else(|| SpawnError::MissingOptionValue {
      flag: flag.to_string(),
    })
  }
}

/// Per-token classification. Unknown flag-like tokens are deferred, never
/// errors, so a later layer gets its chance at them.
enum Outcome<'s> {
  Recognized {
    spec: &'s OptionSpec,
    /// The flag text as typed, for error messages.
    flag: String,
    /// Value attached with `=`, when present.
    attached: Option<String>,
  },
  Deferred,
  Positional,
}

fn classify<'s>(token: &str, specs: &'s [OptionSpec]) -> Outcome<'s> {
  if let Some(spec) = specs.iter().find(|s| s.matches(token)) {
    return Outcome::Recognized {
      spec,
      flag: token.to_string(),
      attached: None,
    };
  }
  if token.starts_with("--") {
    if let Some((flag, value)) = token.split_once('=') {
      if let Some(spec) = specs.iter().find(|s| s.long == Some(flag)) {
        return Outcome::Recognized {
          spec,
          flag: flag.to_string(),
          attached: Some(value.to_string()),
        };
      }
    }
  }
  if token.starts_with('-') {
    Outcome::Deferred
  } else {
    Outcome::Positional
  }
}

fn convert_value(spec: &OptionSpec, flag: &str, raw: &str) -> Result<OptionValue, SpawnError> {
  let invalid = || SpawnError::InvalidOptionValue {
    flag: flag.to_string(),
    value: raw.to_string(),
  };
  match spec.kind {
    // A toggle was handed a `=value`.
    ValueKind::Flag => Err(invalid()),
    ValueKind::Str => Ok(OptionValue::Str(raw.to_string())),
    ValueKind::Path => Ok(OptionValue::Path(raw.into())),
    ValueKind::Int => raw.parse::<i64>().map(OptionValue::Int).map_err(|_| invalid()),
    ValueKind::Bool => match raw {
      "true" => Ok(OptionValue::Bool(true)),
      "false" => Ok(OptionValue::Bool(false)),
      _ => Err(invalid()),
    },
    ValueKind::Enum(allowed) => {
      if allowed.contains(&raw) {
        Ok(OptionValue::Str(raw.to_string()))
      } else {
        Err(invalid())
      }
    }
    ValueKind::Timestamp => chrono::DateTime::parse_from_rfc3339(raw)
      .map(OptionValue::Timestamp)
      .map_err(|_| invalid()),
  }
}

fn resolve_value(
  spec: &OptionSpec,
  flag: &str,
  attached: Option<String>,
  cursor: &mut Cursor,
) -> Result<Option<OptionValue>, SpawnError> {
  match (spec.kind.takes_value(), attached) {
    (true, Some(raw)) => convert_value(spec, flag, &raw).map(Some),
    (true, None) => {
      // The next token is consumed unconditionally, flag-like or not.
      // Only end of input yields a missing-argument error.
      let raw = cursor.next_value(flag)?;
      convert_value(spec, flag, &raw).map(Some)
    }
    (false, Some(raw)) => Err(SpawnError::InvalidOptionValue {
      flag: flag.to_string(),
      value: raw,
    }),
    (false, None) => Ok(None),
  }
}

fn store(spec: &OptionSpec, value: Option<OptionValue>, into: &mut OptionMap) {
  let value = value.unwrap_or(OptionValue::Flag(true));
  if spec.repeatable {
    into.append(spec.key, value);
  } else {
    into.insert(spec.key, value);
  }
}

/// Scans `tokens` left to right against one spec set, writing recognized
/// values into `into` and returning everything else as the residual.
///
/// A recognized flag with a bad or absent value aborts the layer
/// immediately; values already written stay written. Unrecognized
/// flag-like tokens and positional tokens are not errors here, they are
/// carried in the residual for whoever parses next.
pub fn parse_flags(
  tokens: &[String],
  specs: &[OptionSpec],
  into: &mut OptionMap,
) -> Result<Residual, SpawnError> {
  debug_assert!(forms_are_unique(specs), "duplicate short/long forms in option spec set");

  let mut cursor = Cursor::new(tokens.to_vec());
  let mut residual = Vec::new();
  while let Some(token) = cursor.pop() {
    match classify(&token, specs) {
      Outcome::Recognized { spec, flag, attached } => {
        let value = resolve_value(spec, &flag, attached, &mut cursor)?;
        store(spec, value, into);
      }
      Outcome::Deferred => {
        trace!("deferring unrecognized flag {token}");
        residual.push(token);
      }
      Outcome::Positional => residual.push(token),
    }
  }
  Ok(Residual::new(residual))
}

/// Pulls `required_count` positional values off the front of `tokens`.
///
/// Positionals are front-loaded only: the first `required_count` tokens
/// must exist and must not look like flags. Nothing is consumed on
/// failure.
pub fn extract_positionals(
  tokens: &[String],
  required_count: usize,
) -> Result<(Vec<String>, Vec<String>), SpawnError> {
  if tokens.len() < required_count || tokens[..required_count].iter().any(|t| t.starts_with('-')) {
    return Err(SpawnError::MissingPositional);
  }
  let (front, rest) = tokens.split_at(required_count);
  Ok((front.to_vec(), rest.to_vec()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  static TEST_SPECS: &[OptionSpec] = &[
    OptionSpec {
      key: "notodos",
      short: Some("-n"),
      long: Some("--notodos"),
      kind: ValueKind::Flag,
      repeatable: false,
      description: "Suppress TODO messages",
    },
    OptionSpec {
      key: "out_dir",
      short: Some("-o"),
      long: Some("--out_dir"),
      kind: ValueKind::Path,
      repeatable: false,
      description: "Output directory",
    },
    OptionSpec {
      key: "time",
      short: Some("-t"),
      long: Some("--time"),
      kind: ValueKind::Timestamp,
      repeatable: false,
      description: "A point in time",
    },
    OptionSpec {
      key: "word",
      short: Some("-w"),
      long: Some("--word"),
      kind: ValueKind::Str,
      repeatable: true,
      description: "A word, may repeat",
    },
    OptionSpec {
      key: "xray",
      short: Some("-x"),
      long: Some("--xray"),
      kind: ValueKind::Flag,
      repeatable: false,
      description: "A toggle",
    },
  ];

  fn toks(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn parses_toggle_short_form() {
    let mut map = OptionMap::new();
    let residual = parse_flags(&toks(&["-n"]), TEST_SPECS, &mut map).unwrap();
    assert!(map.flag("notodos"));
    assert!(residual.is_empty());
  }

  #[test]
  fn repeated_occurrences_accumulate_in_input_order() {
    let mut map = OptionMap::new();
    parse_flags(
      &toks(&["-w", "word1", "-w", "word2", "--word", "word3"]),
      TEST_SPECS,
      &mut map,
    )
    .unwrap();
    assert_eq!(map.str_list("word"), vec!["word1", "word2", "word3"]);
  }

  #[test]
  fn parses_path_short_form() {
    let mut map = OptionMap::new();
    parse_flags(&toks(&["-o", "/etc/hosts"]), TEST_SPECS, &mut map).unwrap();
    assert_eq!(map.path("out_dir"), Some(Path::new("/etc/hosts")));
  }

  #[test]
  fn parses_toggle_and_path_short_forms() {
    let mut map = OptionMap::new();
    parse_flags(&toks(&["-x", "-o", "/etc/hosts"]), TEST_SPECS, &mut map).unwrap();
    assert!(map.flag("xray"));
    assert_eq!(map.path("out_dir"), Some(Path::new("/etc/hosts")));
  }

  #[test]
  fn parses_path_long_form_with_equals() {
    let mut map = OptionMap::new();
    parse_flags(&toks(&["--out_dir=/etc/hosts"]), TEST_SPECS, &mut map).unwrap();
    assert_eq!(map.path("out_dir"), Some(Path::new("/etc/hosts")));
  }

  #[test]
  fn parses_path_long_form_with_next_token() {
    let mut map = OptionMap::new();
    parse_flags(&toks(&["--out_dir", "/etc/hosts"]), TEST_SPECS, &mut map).unwrap();
    assert_eq!(map.path("out_dir"), Some(Path::new("/etc/hosts")));
  }

  #[test]
  fn parses_rfc3339_time() {
    let mut map = OptionMap::new();
    parse_flags(&toks(&["-x", "-t", "2025-07-01T12:00:00Z"]), TEST_SPECS, &mut map).unwrap();
    let expected = chrono::DateTime::parse_from_rfc3339("2025-07-01T12:00:00Z").unwrap();
    assert_eq!(map.timestamp("time"), Some(&expected));
  }

  #[test]
  fn parses_mixed_long_and_short_forms() {
    let mut map = OptionMap::new();
    parse_flags(
      &toks(&["-o", "/etc/hosts", "--time=2025-07-01T12:00:00Z"]),
      TEST_SPECS,
      &mut map,
    )
    .unwrap();
    assert_eq!(map.path("out_dir"), Some(Path::new("/etc/hosts")));
    assert!(map.timestamp("time").is_some());
  }

  #[test]
  fn value_taking_flag_at_end_of_input_is_missing_argument() {
    let mut map = OptionMap::new();
    let err = parse_flags(&toks(&["-o"]), TEST_SPECS, &mut map).unwrap_err();
    assert!(matches!(err, SpawnError::MissingOptionValue { .. }));
    assert_eq!(err.to_string(), "missing argument: -o");
  }

  #[test]
  fn bad_time_aborts_layer_and_keeps_earlier_writes() {
    let mut map = OptionMap::new();
    let err = parse_flags(&toks(&["-n", "-t", "bogus", "-x"]), TEST_SPECS, &mut map).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: -t bogus");
    // The write before the failure survives; nothing after it ran.
    assert!(map.flag("notodos"));
    assert!(!map.contains("xray"));
  }

  #[test]
  fn value_attached_to_toggle_is_invalid() {
    let mut map = OptionMap::new();
    let err = parse_flags(&toks(&["--xray=yes"]), TEST_SPECS, &mut map).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: --xray yes");
  }

  #[test]
  fn unknown_flags_and_positionals_defer_in_input_order() {
    let mut map = OptionMap::new();
    let residual = parse_flags(&toks(&["-z", "stray", "-q", "-n"]), TEST_SPECS, &mut map).unwrap();
    assert!(map.flag("notodos"));
    assert_eq!(residual.tokens(), ["-z", "stray", "-q"]);
    assert_eq!(residual.flags(), vec!["-z", "-q"]);
    assert_eq!(residual.positionals(), vec!["stray"]);
  }

  #[test]
  fn reparsing_own_residual_changes_nothing() {
    let mut map = OptionMap::new();
    let residual =
      parse_flags(&toks(&["-z", "-n", "stray", "-q"]), TEST_SPECS, &mut map).unwrap();

    let before = map.clone();
    let again = parse_flags(residual.tokens(), TEST_SPECS, &mut map).unwrap();
    assert_eq!(map, before);
    assert_eq!(again, residual);
  }

  #[test]
  fn value_consumes_next_token_even_if_flag_like() {
    let mut map = OptionMap::new();
    parse_flags(&toks(&["-o", "-x"]), TEST_SPECS, &mut map).unwrap();
    assert_eq!(map.path("out_dir"), Some(Path::new("-x")));
    assert!(!map.flag("xray"));
  }

  #[test]
  fn int_bool_and_enum_values_convert_or_reject() {
    static EXTRA: &[OptionSpec] = &[
      OptionSpec {
        key: "depth",
        short: Some("-d"),
        long: Some("--depth"),
        kind: ValueKind::Int,
        repeatable: false,
        description: "",
      },
      OptionSpec {
        key: "banner",
        short: None,
        long: Some("--banner"),
        kind: ValueKind::Bool,
        repeatable: false,
        description: "",
      },
      OptionSpec {
        key: "loglevel",
        short: Some("-L"),
        long: Some("--loglevel"),
        kind: ValueKind::Enum(&["debug", "info", "quiet"]),
        repeatable: false,
        description: "",
      },
    ];

    let mut map = OptionMap::new();
    parse_flags(
      &toks(&["--depth=3", "--banner", "true", "-L", "debug"]),
      EXTRA,
      &mut map,
    )
    .unwrap();
    assert_eq!(map.int("depth"), Some(3));
    assert_eq!(map.bool_value("banner"), Some(true));
    assert_eq!(map.str_value("loglevel"), Some("debug"));

    let mut map = OptionMap::new();
    let err = parse_flags(&toks(&["--depth", "three"]), EXTRA, &mut map).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: --depth three");

    let mut map = OptionMap::new();
    let err = parse_flags(&toks(&["-L", "bogus"]), EXTRA, &mut map).unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: -L bogus");

    let mut map = OptionMap::new();
    let err = parse_flags(&toks(&["--banner=maybe"]), EXTRA, &mut map).unwrap_err();
    assert!(matches!(err, SpawnError::InvalidOptionValue { .. }));
  }

  #[test]
  fn extracts_two_leading_positionals() {
    let (values, rest) = extract_positionals(&toks(&["ruby", "test", "-o", "/tmp"]), 2).unwrap();
    assert_eq!(values, ["ruby", "test"]);
    assert_eq!(rest, ["-o", "/tmp"]);
  }

  #[test]
  fn too_few_tokens_is_missing_positional() {
    let err = extract_positionals(&toks(&["ruby"]), 2).unwrap_err();
    assert!(matches!(err, SpawnError::MissingPositional));
  }

  #[test]
  fn flag_like_leading_token_is_missing_positional() {
    let err = extract_positionals(&toks(&["-o", "value"]), 2).unwrap_err();
    assert!(matches!(err, SpawnError::MissingPositional));
  }
}
