// src/cli.rs
//
// The production command-line surface: the option tables for
// `gemspawn <gem_type> NAME [OPTIONS]`, the usage text, and the driver
// that runs the layered parse and applies application-level defaults.

use log::LevelFilter;

use crate::config::default_out_dir;
use crate::error::SpawnError;
use crate::generate;
use crate::nested::{NestedParser, Reporter, SubCmd, GEM_NAME_KEY, GEM_TYPE_KEY};
use crate::opts::{OptionMap, OptionSpec, OptionValue, ValueKind};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HOSTS: &[&str] = &["github", "gitlab", "bitbucket"];

/// Log levels, in order from chattiest to silent. The default is `info`.
pub const LOGLEVELS: &[&str] = &[
  "trace", "debug", "verbose", "info", "warning", "error", "fatal", "panic", "quiet",
];

/// Options shared by every gem type.
pub static COMMON_OPTIONS: &[OptionSpec] = &[
  OptionSpec {
    key: "executable",
    short: Some("-e"),
    long: Some("--executable"),
    kind: ValueKind::Str,
    repeatable: true,
    description: "Include an executable with the given name for the gem",
  },
  OptionSpec {
    key: "force",
    short: Some("-f"),
    long: Some("--force"),
    kind: ValueKind::Flag,
    repeatable: false,
    description: "Overwrite output directory",
  },
  OptionSpec {
    key: "help",
    short: Some("-h"),
    long: Some("--help"),
    kind: ValueKind::Flag,
    repeatable: false,
    description: "Display this help message and exit",
  },
  OptionSpec {
    key: "host",
    short: Some("-H"),
    long: Some("--host"),
    kind: ValueKind::Enum(HOSTS),
    repeatable: false,
    description: "Repository host",
  },
  OptionSpec {
    key: "loglevel",
    short: Some("-L"),
    long: Some("--loglevel"),
    kind: ValueKind::Enum(LOGLEVELS),
    repeatable: false,
    description: "Log level",
  },
  OptionSpec {
    key: "out_dir",
    short: Some("-o"),
    long: Some("--out_dir"),
    kind: ValueKind::Path,
    repeatable: false,
    description: "Output directory for the gem",
  },
  OptionSpec {
    key: "private",
    short: Some("-p"),
    long: Some("--private"),
    kind: ValueKind::Flag,
    repeatable: false,
    description: "Publish the gem to a private repository",
  },
  OptionSpec {
    key: "notodos",
    short: Some("-n"),
    long: Some("--notodos"),
    kind: ValueKind::Flag,
    repeatable: false,
    description: "Suppress TODO messages in generated code",
  },
];

/// The plain Ruby gem type has no options of its own.
pub static RUBY_OPTIONS: &[OptionSpec] = &[];

// All of these can appear several times on one command line, except
// -K/--hooks.
pub static JEKYLL_OPTIONS: &[OptionSpec] = &[
  OptionSpec {
    key: "block",
    short: Some("-b"),
    long: Some("--block"),
    kind: ValueKind::Str,
    repeatable: true,
    description: "Specifies the name of a Jekyll block tag",
  },
  OptionSpec {
    key: "blockn",
    short: Some("-B"),
    long: Some("--blockn"),
    kind: ValueKind::Str,
    repeatable: true,
    description: "Specifies the name of a Jekyll no-arg block tag",
  },
  OptionSpec {
    key: "filter",
    short: Some("-F"),
    long: Some("--filter"),
    kind: ValueKind::Str,
    repeatable: true,
    description: "Specifies the name of a Jekyll/Liquid filter module",
  },
  OptionSpec {
    key: "generator",
    short: Some("-g"),
    long: Some("--generator"),
    kind: ValueKind::Str,
    repeatable: true,
    description: "Specifies the name of a Jekyll generator",
  },
  OptionSpec {
    key: "hooks",
    short: Some("-K"),
    long: Some("--hooks"),
    kind: ValueKind::Str,
    repeatable: false,
    description: "Generate Jekyll hooks",
  },
  OptionSpec {
    key: "tag",
    short: Some("-t"),
    long: Some("--tag"),
    kind: ValueKind::Str,
    repeatable: true,
    description: "Specifies the name of a Jekyll tag",
  },
  OptionSpec {
    key: "tagn",
    short: Some("-T"),
    long: Some("--tagn"),
    kind: ValueKind::Str,
    repeatable: true,
    description: "Specifies the name of a Jekyll no-arg tag",
  },
];

pub static SUBCOMMANDS: &[SubCmd] = &[
  SubCmd::new("ruby", RUBY_OPTIONS),
  SubCmd::new("jekyll", JEKYLL_OPTIONS),
];

pub fn usage() -> String {
  format!(
    "\
gemspawn v{VERSION}: Creates scaffolding for a Ruby gem or a Jekyll plugin.
(Jekyll plugins are a specialized type of Ruby gem.)

gemspawn ruby NAME [OPTIONS]    # Creates the scaffold for a new Ruby gem called NAME.
gemspawn jekyll NAME [OPTIONS]  # Creates the scaffold for a new Jekyll plugin called NAME.

The following OPTIONS are available for all gem types:
  -f, --force                       # Delete output directory if it exists before generating output
  -h, --help                        # Display this help message and exit
  -H HOST, --host=HOST              # Repository host. Default: github
                                    # Possible values: {hosts}
  -L LOGLEVEL, --loglevel=LOGLEVEL  # Possible values: {loglevels}.
                                    # Default: info
  -o OUT_DIR, --out_dir=OUT_DIR     # Output directory for the gem. Default: ~/gemspawn_generated/NAME
  -n, --notodos                     # Suppress TODO: messages in generated code. Default: false
  -p, --private                     # Publish the gem to a private repository. Default: false
Each of these OPTIONs can be invoked multiple times:
  -e NAME1, --executable=NAME1      # Include an executable with the given name for the gem

The following options are only available for Jekyll plugins.
  -K HOOKS, --hooks=HOOKS                # Generate Jekyll hooks.
Each of these OPTIONs can be invoked multiple times:
  -b BLOCK1, --block=BLOCK1              # Specifies the name of a Jekyll block tag.
  -B BLOCK1, --blockn=BLOCK1             # Specifies the name of a Jekyll no-arg block tag.
  -F FILTER1, --filter=FILTER1           # Specifies the name of a Jekyll/Liquid filter module.
  -g GENERATOR1, --generator=GENERATOR1  # Specifies the name of a Jekyll generator.
  -t TAG1, --tag=TAG1                    # Specifies the name of a Jekyll tag.
  -T TAG1, --tagn=TAG1                   # Specifies the name of a Jekyll no-arg tag.",
    hosts = HOSTS.join(", "),
    loglevels = LOGLEVELS.join(", "),
  )
}

/// Values every parse starts from, before any option is seen.
pub fn seed_defaults(options: &mut OptionMap) {
  options.insert("host", OptionValue::Str("github".to_string()));
  options.insert("loglevel", OptionValue::Str("info".to_string()));
}

/// Parses a full production command line: seeds the defaults, runs the
/// layered parse, rejects leftovers, and fills in the output directory
/// when `-o` was not given.
pub fn parse_command_line(argv: &[String], reporter: &Reporter) -> Result<OptionMap, SpawnError> {
  let parser = NestedParser::new(COMMON_OPTIONS, SUBCOMMANDS, reporter);
  let mut options = OptionMap::new();
  seed_defaults(&mut options);
  let residual = parser.parse(argv, &mut options)?;

  // Leftover tokens after both layers are a hard usage error at this
  // level, even though the parser itself does not care.
  if !residual.is_empty() {
    let err = SpawnError::UnconsumedResidual {
      tokens: residual.into_tokens(),
    };
    reporter.report(&err);
    return Err(err);
  }

  if let Err(err) = generate::validate_gem_name(options.str_value(GEM_NAME_KEY).unwrap_or_default())
  {
    reporter.report(&err);
    return Err(err);
  }

  if !options.contains("out_dir") {
    let gem_name = options.str_value(GEM_NAME_KEY).unwrap_or_default().to_string();
    options.insert("out_dir", OptionValue::Path(default_out_dir(&gem_name)));
  }
  Ok(options)
}

/// Maps the user-facing log level names onto the log crate's filter.
pub fn level_filter_from(loglevel: &str) -> LevelFilter {
  match loglevel {
    "trace" => LevelFilter::Trace,
    "debug" | "verbose" => LevelFilter::Debug,
    "info" => LevelFilter::Info,
    "warning" => LevelFilter::Warn,
    "error" | "fatal" | "panic" => LevelFilter::Error,
    "quiet" => LevelFilter::Off,
    _ => LevelFilter::Info,
  }
}

/// Whether the chosen log level is `info` or chattier.
pub fn at_least_info(loglevel: &str) -> bool {
  let level = LOGLEVELS.iter().position(|l| *l == loglevel);
  let info = LOGLEVELS.iter().position(|l| *l == "info");
  matches!((level, info), (Some(a), Some(b)) if a <= b)
}

/// Renders the option summary block shown before generation starts.
pub fn summarize(options: &OptionMap) -> String {
  let executables = options.str_list("executable");
  let executable_msg = if executables.is_empty() {
    "No executables will be included".to_string()
  } else if executables.len() > 1 {
    format!("Executables called {} will be included", executables.join(", "))
  } else {
    format!("An executable called {} will be included", executables[0])
  };
  let force_msg = if options.flag("force") {
    "Any pre-existing content in the output directory will be deleted before generating new output."
  } else {
    "Pre-existing content in the output directory will abort the program."
  };
  let mut summary = format!(
    "\
Options:
 - Gem type: {gem_type}
 - Loglevel {loglevel}
 - Output directory: '{out_dir}'
 - {force_msg}
 - {executable_msg}
 - Git host: {host}
 - A {visibility} git repository will be created
 - TODOs {todos} be included in the source code
",
    gem_type = options.str_value(GEM_TYPE_KEY).unwrap_or_default(),
    loglevel = options.str_value("loglevel").unwrap_or_default(),
    out_dir = options
      .path("out_dir")
      .map(|p| p.display().to_string())
      .unwrap_or_default(),
    host = options.str_value("host").unwrap_or_default(),
    visibility = if options.flag("private") { "private" } else { "public" },
    todos = if options.flag("notodos") { "will not" } else { "will" },
  );
  summary.push_str(&jekyll_summary(options));
  summary
}

/// Extra summary lines for any Jekyll plugin pieces that were requested.
/// Empty when none were.
fn jekyll_summary(options: &OptionMap) -> String {
  let kinds = [
    ("tag", "Tag"),
    ("tagn", "TagN"),
    ("block", "Block"),
    ("blockn", "BlockN"),
    ("filter", "Filter"),
    ("generator", "Generator"),
    ("hooks", "Hook"),
  ];
  let mut lines = String::new();
  for (key, name) in kinds {
    let values = options.str_list(key);
    if values.is_empty() {
      continue;
    }
    if values.len() > 1 {
      lines.push_str(&format!(
        " - {}s called {} will be generated\n",
        name,
        values.join(", ")
      ));
    } else {
      lines.push_str(&format!(
        " - A {} called {} will be generated\n",
        name.to_lowercase(),
        values[0]
      ));
    }
  }
  if lines.is_empty() {
    String::new()
  } else {
    format!("JekyllOptions:\n{lines}\n")
  }
}
