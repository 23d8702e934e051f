// src/nested.rs
//
// The layered parse: leading positionals, then the common option set, then
// the matched subcommand's own option set over whatever the common layer
// left behind. All layers write into one shared OptionMap.

use std::process;

use log::debug;

use crate::error::SpawnError;
use crate::opts::{OptionMap, OptionSpec, OptionValue};
use crate::parser::{extract_positionals, parse_flags, Residual};

/// Leading positional values every invocation must carry: the gem type and
/// the gem name.
pub const POSITIONAL_COUNT: usize = 2;

pub const GEM_TYPE_KEY: &str = "gem_type";
pub const GEM_NAME_KEY: &str = "gem_name";

/// A named subcommand and the option set private to it. Built once from
/// static tables, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubCmd {
  name: &'static str,
  specs: &'static [OptionSpec],
}

impl SubCmd {
  pub const fn new(name: &'static str, specs: &'static [OptionSpec]) -> Self {
    Self { name, specs }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn specs(&self) -> &'static [OptionSpec] {
    self.specs
  }
}

/// Linear scan by exact name, first match wins.
pub fn find_subcommand<'s>(registry: &'s [SubCmd], name: &str) -> Option<&'s SubCmd> {
  registry.iter().find(|sub| sub.name() == name)
}

/// Prints errors and usage, and decides whether a failure ends the process.
///
/// In fatal mode `report` never returns; in lenient mode it returns the
/// exact text it printed, so callers (tests in particular) can assert on
/// the message instead of dying with it.
pub struct Reporter {
  usage: String,
  fatal: bool,
}

impl Reporter {
  pub fn new(usage: impl Into<String>, fatal: bool) -> Self {
    Self {
      usage: usage.into(),
      fatal,
    }
  }

  pub fn is_fatal(&self) -> bool {
    self.fatal
  }

  pub fn usage(&self) -> &str {
    &self.usage
  }

  /// Help requested by the user, not an error path.
  pub fn print_usage(&self) {
    println!("{}", self.usage);
  }

  pub fn report(&self, error: &SpawnError) -> String {
    let message = format!("Error: {error}\n\n{}", self.usage);
    eprintln!("{message}");
    if self.fatal {
      process::exit(error.exit_code());
    }
    message
  }
}

/// The orchestrator. Explicit configuration handed in by the caller; no
/// module-level registries, so every invocation is a function of its
/// arguments plus the injected reporter.
pub struct NestedParser<'a> {
  common_specs: &'static [OptionSpec],
  subcommands: &'a [SubCmd],
  reporter: &'a Reporter,
}

impl<'a> NestedParser<'a> {
  pub fn new(
    common_specs: &'static [OptionSpec],
    subcommands: &'a [SubCmd],
    reporter: &'a Reporter,
  ) -> Self {
    debug_assert!(
      {
        let mut names: Vec<&str> = subcommands.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.windows(2).all(|w| w[0] != w[1])
      },
      "duplicate subcommand names in registry"
    );
    Self {
      common_specs,
      subcommands,
      reporter,
    }
  }

  /// Runs the full layered parse over `argv`, writing into `into`.
  ///
  /// Phases, in order: extract the two leading positionals (stored under
  /// `gem_type`/`gem_name`), parse the common option set, then, when
  /// subcommands are registered, dispatch on the gem type and parse the
  /// matched subcommand's option set against the common layer's residual.
  /// The returned residual is whatever the last layer left unconsumed;
  /// deciding whether leftovers are fatal belongs to the caller.
  ///
  /// Each failure is routed through the reporter exactly once. Values
  /// written before the failing token stay in the map.
  pub fn parse(&self, argv: &[String], into: &mut OptionMap) -> Result<Residual, SpawnError> {
    // --- 1. Leading positionals ---
    let (positionals, remaining) =
      extract_positionals(argv, POSITIONAL_COUNT).map_err(|e| self.fail(e))?;
    let category = positionals[0].clone();
    into.insert(GEM_TYPE_KEY, OptionValue::Str(positionals[0].clone()));
    into.insert(GEM_NAME_KEY, OptionValue::Str(positionals[1].clone()));

    // --- 2. Common options ---
    let residual = parse_flags(&remaining, self.common_specs, into).map_err(|e| self.fail(e))?;

    // --- 3. Subcommand dispatch ---
    if self.subcommands.is_empty() {
      debug!("no subcommands registered, plain invocation");
      return Ok(residual);
    }
    let Some(sub) = find_subcommand(self.subcommands, &category) else {
      return Err(self.fail(SpawnError::UnknownSubcommand { name: category }));
    };

    // --- 4. Subcommand options over the common layer's leftovers ---
    debug!("dispatching to subcommand '{}'", sub.name());
    parse_flags(residual.tokens(), sub.specs(), into).map_err(|e| self.fail(e))
  }

  fn fail(&self, error: SpawnError) -> SpawnError {
    self.reporter.report(&error);
    error
  }
}
