// src/generate.rs
//
// Scaffold generation: name validation, output directory preparation,
// the %name% substitution map, and the Ruby/Jekyll scaffold pipelines.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Datelike;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use heck::ToPascalCase;
use log::{debug, info, warn};

use crate::cli;
use crate::config;
use crate::error::SpawnError;
use crate::nested::{GEM_NAME_KEY, GEM_TYPE_KEY};
use crate::opts::OptionMap;
use crate::repository::{self, Repository};
use crate::utils;

#[cfg(feature = "regex")] // Conditionally compile regex logic
use regex::Regex;

const GEM_SERVER_URL: &str = "https://rubygems.org";

pub fn run_generate(options: &OptionMap) -> Result<(), SpawnError> {
  let gem_type = options.str_value(GEM_TYPE_KEY).unwrap_or_default().to_string();
  let gem_name = options.str_value(GEM_NAME_KEY).unwrap_or_default().to_string();
  let executables = options.str_list("executable");
  let force = options.flag("force");
  let out_dir = options
    .path("out_dir")
    .map(Path::to_path_buf)
    .unwrap_or_else(|| config::default_out_dir(&gem_name));

  // --- 1. Locate the scaffold templates ---
  let templates_dir = config::determine_templates_dir()?;
  if fs::read_dir(&templates_dir)?.next().is_none() {
    return Err(SpawnError::TemplateDirNotFound(templates_dir));
  }
  debug!("Templates dir: {}", templates_dir.display());

  // --- 2. Prepare the output directory ---
  prepare_output_dir(&out_dir, force, false)?;

  // --- 3. Report what will be done ---
  let loglevel = options.str_value("loglevel").unwrap_or_default();
  if cli::at_least_info(loglevel) {
    print!("{}", cli::summarize(options));
  }

  // --- 4. Resolve the repository identity ---
  let host_id = options.str_value("host").unwrap_or_default();
  let host = repository::find_host(host_id).ok_or_else(|| {
    SpawnError::GenerationError(format!("no host with id {host_id} is known"))
  })?;
  let user = repository::repository_user_name(host)?;
  let repository = Repository::new(host, &gem_name, options.flag("private"), &user);
  let (user_name, user_email) = git_identity()?;

  // --- 5. Generate the scaffold ---
  let mut substitutions = substitution_map(options, &repository, &user_name, &user_email);
  info!(
    "Creating a scaffold for a new Ruby gem named {} in {}.",
    gem_name,
    out_dir.display()
  );
  utils::copy_scaffold_dir(
    &templates_dir.join("common/gem_scaffold"),
    &out_dir,
    &substitutions,
    &["spec"],
    force,
  )?;
  if !executables.is_empty() {
    utils::copy_scaffold_dir(
      &templates_dir.join("common/executable_scaffold"),
      &out_dir,
      &substitutions,
      &[],
      force,
    )?;
  }
  utils::copy_template_file(
    &templates_dir.join("common/LICENCE.txt"),
    &out_dir.join("LICENCE.txt"),
    &substitutions,
    force,
  )?;
  if gem_type == "jekyll" {
    create_jekyll_scaffolds(options, &templates_dir, &out_dir, &mut substitutions, force)?;
  }

  // --- 6. Turn the scaffold into a git repository ---
  repository::initialize_repository(&repository, &out_dir, !executables.is_empty())?;

  // --- 7. Report leftover work and what was generated ---
  if !options.flag("notodos") {
    println!("{}", utils::todos_report(&out_dir, &gem_name));
  }
  let files = utils::list_generated_files(&out_dir)?;
  if files.is_empty() {
    warn!("No files were generated");
  } else {
    println!();
    for file in &files {
      println!("{}", file.display());
    }
  }
  Ok(())
}

// --- Gem names ---

/// Checks a gem name the way RubyGems does: it must start with a letter
/// or digit, may contain letters, digits, underscores and hyphens, and
/// must contain at least one letter.
pub fn validate_gem_name(name: &str) -> Result<(), SpawnError> {
  let has_letter = name.chars().any(|c| c.is_ascii_alphabetic());
  if name.is_empty() || !has_letter || !name_has_valid_shape(name) {
    return Err(SpawnError::InvalidGemName {
      name: name.to_string(),
    });
  }
  Ok(())
}

#[cfg(feature = "regex")]
fn name_has_valid_shape(name: &str) -> bool {
  Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").map_or(false, |regex| regex.is_match(name))
}

#[cfg(not(feature = "regex"))]
fn name_has_valid_shape(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphanumeric() => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn class_name(gem_name: &str) -> String {
  gem_name.to_pascal_case()
}

pub fn module_name(gem_name: &str) -> String {
  format!("{}Module", class_name(gem_name))
}

// --- Output directory ---

/// Makes sure `out_dir` exists and is empty. A pre-existing non-empty
/// directory is removed under `--force`, otherwise only after the user
/// confirms; declining aborts the run.
pub fn prepare_output_dir(out_dir: &Path, force: bool, dry_run: bool) -> Result<(), SpawnError> {
  let exists_nonempty = out_dir.is_dir() && out_dir.read_dir()?.next().is_some();
  if exists_nonempty {
    let overwrite = force
      || Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
          "Do you want to overwrite the contents of {}?",
          out_dir.display()
        ))
        .default(false)
        .interact()?;
    if !overwrite {
      return Err(SpawnError::Aborted);
    }
    if dry_run {
      info!("Dry run: skipping the removal of {}", out_dir.display());
    } else {
      info!("Removing {}", out_dir.display());
      fs::remove_dir_all(out_dir)?;
    }
  }
  if !dry_run {
    fs::create_dir_all(out_dir).map_err(|e| SpawnError::OutputDirCreation {
      path: out_dir.to_path_buf(),
      source: e,
    })?;
  }
  Ok(())
}

// --- Substitutions ---

/// The git identity the gemspec is signed with. Generation cannot
/// proceed without one.
fn git_identity() -> Result<(String, String), SpawnError> {
  let user_name = config::git_config_global("user.name").ok_or_else(|| {
    SpawnError::GenerationError(
      "no git user name has been configured yet; \
       run: git config --global user.name \"Your Name\""
        .to_string(),
    )
  })?;
  let user_email = config::git_config_global("user.email").ok_or_else(|| {
    SpawnError::GenerationError(
      "no git user email has been configured yet; \
       run: git config --global user.email \"your.email@example.com\""
        .to_string(),
    )
  })?;
  Ok((user_name, user_email))
}

/// Builds the `%name%` substitution map applied to scaffold paths and
/// contents.
fn substitution_map(
  options: &OptionMap,
  repository: &Repository,
  user_name: &str,
  user_email: &str,
) -> BTreeMap<String, String> {
  let gem_name = options.str_value(GEM_NAME_KEY).unwrap_or_default();
  let todo = if options.flag("notodos") { "" } else { "TODO: " };
  let executables = options
    .str_list("executable")
    .iter()
    .map(|name| format!("'{name}'"))
    .collect::<Vec<_>>()
    .join(", ");
  let mut substitutions = BTreeMap::new();
  let mut insert = |key: &str, value: String| {
    substitutions.insert(format!("%{key}%"), value);
  };
  insert("gem_name", gem_name.to_string());
  insert("class_name", class_name(gem_name));
  insert("module_name", module_name(gem_name));
  insert("host_domain", repository.host.domain.to_string());
  insert("user", repository.user.clone());
  insert("user_name", user_name.to_string());
  insert("user_email", user_email.to_string());
  insert("url", repository.url());
  insert("gem_server_url", GEM_SERVER_URL.to_string());
  insert("executables", executables);
  insert("year", chrono::Local::now().year().to_string());
  insert("todo", todo.to_string());
  substitutions
}

// --- Jekyll plugin scaffolds ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKind {
  Boolean,
  Str,
  Numeric,
}

impl ParameterKind {
  fn as_str(self) -> &'static str {
    match self {
      ParameterKind::Boolean => "boolean",
      ParameterKind::Str => "string",
      ParameterKind::Numeric => "numeric",
    }
  }
}

/// One invocation option of a Jekyll/Liquid tag, as gathered from the
/// user.
#[derive(Clone, Debug)]
pub struct TagParameter {
  pub name: String,
  pub kind: ParameterKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagKind {
  Tag,
  Block,
}

fn create_jekyll_scaffolds(
  options: &OptionMap,
  templates_dir: &Path,
  out_dir: &Path,
  substitutions: &mut BTreeMap<String, String>,
  force: bool,
) -> Result<(), SpawnError> {
  let gem_name = options.str_value(GEM_NAME_KEY).unwrap_or_default();
  info!(
    "Creating a Jekyll scaffold for a new gem named {} in {}",
    gem_name,
    out_dir.display()
  );
  utils::copy_scaffold_dir(
    &templates_dir.join("jekyll/common_scaffold"),
    out_dir,
    substitutions,
    &[],
    force,
  )?;
  utils::copy_scaffold_dir(
    &templates_dir.join("jekyll/demo"),
    out_dir,
    substitutions,
    &[],
    force,
  )?;

  let demo_index = out_dir.join("demo/index.html");
  for name in options.str_list("block") {
    let parameters = ask_option_names_types(name)?;
    set_piece_names(substitutions, "block_name", name, &parameters);
    info!(
      "Creating Jekyll block tag {} scaffold within {}",
      name,
      class_name(name)
    );
    utils::copy_scaffold_dir(
      &templates_dir.join("jekyll/block_scaffold"),
      out_dir,
      substitutions,
      &[],
      force,
    )?;
    utils::append_to_file(&demo_index, &demo_example(name, &parameters, TagKind::Block))?;
  }
  for name in options.str_list("blockn") {
    set_piece_names(substitutions, "block_name", name, &[]);
    info!(
      "Creating Jekyll block tag no_arg {} scaffold within {}",
      name,
      class_name(name)
    );
    utils::copy_scaffold_dir(
      &templates_dir.join("jekyll/block_no_arg_scaffold"),
      out_dir,
      substitutions,
      &[],
      force,
    )?;
    utils::append_to_file(&demo_index, &demo_example(name, &[], TagKind::Block))?;
  }
  for name in options.str_list("filter") {
    let inputs = ask_filter_inputs(name)?;
    set_piece_names(substitutions, "filter_name", name, &[]);
    set_filter_trailing(substitutions, &class_name(gem_name), &inputs);
    info!("Creating a new Jekyll filter method scaffold {}", name);
    utils::copy_scaffold_dir(
      &templates_dir.join("jekyll/filter_scaffold"),
      out_dir,
      substitutions,
      &[],
      force,
    )?;
    utils::append_to_file(
      &demo_index,
      &filter_example(name, &demo_filter_params(&inputs)),
    )?;
  }
  for name in options.str_list("generator") {
    set_piece_names(substitutions, "generator_name", name, &[]);
    info!(
      "Creating a new Jekyll generator class scaffold {}",
      class_name(name)
    );
    utils::copy_scaffold_dir(
      &templates_dir.join("jekyll/generator_scaffold"),
      out_dir,
      substitutions,
      &[],
      force,
    )?;
  }
  if let Some(name) = options.str_value("hooks") {
    set_piece_names(substitutions, "plugin_name", name, &[]);
    info!("Creating a new Jekyll hook scaffold");
    utils::copy_scaffold_dir(
      &templates_dir.join("jekyll/hooks_scaffold"),
      out_dir,
      substitutions,
      &[],
      force,
    )?;
  }
  for name in options.str_list("tag") {
    let parameters = ask_option_names_types(name)?;
    set_piece_names(substitutions, "tag_name", name, &parameters);
    info!(
      "Creating Jekyll tag {} scaffold within {}",
      name,
      class_name(name)
    );
    utils::copy_scaffold_dir(
      &templates_dir.join("jekyll/tag_scaffold"),
      out_dir,
      substitutions,
      &[],
      force,
    )?;
    utils::append_to_file(&demo_index, &demo_example(name, &parameters, TagKind::Tag))?;
  }
  for name in options.str_list("tagn") {
    set_piece_names(substitutions, "tag_name", name, &[]);
    info!(
      "Creating Jekyll tag no_arg {} scaffold within {}",
      name,
      class_name(name)
    );
    utils::copy_scaffold_dir(
      &templates_dir.join("jekyll/tag_no_arg_scaffold"),
      out_dir,
      substitutions,
      &[],
      force,
    )?;
    utils::append_to_file(&demo_index, &demo_example(name, &[], TagKind::Tag))?;
  }
  Ok(())
}

/// Records the current piece's name, class name, and parameter notes in
/// the substitution map. Later pieces overwrite earlier ones.
fn set_piece_names(
  substitutions: &mut BTreeMap<String, String>,
  name_key: &str,
  name: &str,
  parameters: &[TagParameter],
) {
  substitutions.insert(format!("%{name_key}%"), name.to_string());
  substitutions.insert("%jekyll_class_name%".to_string(), class_name(name));
  substitutions.insert("%parameter_docs%".to_string(), parameter_docs(parameters));
}

fn parameter_docs(parameters: &[TagParameter]) -> String {
  if parameters.is_empty() {
    return "# This tag has no invocation options.".to_string();
  }
  let mut docs = String::from("# Invocation options:");
  for parameter in parameters {
    docs.push_str(&format!("\n#   {} ({})", parameter.name, parameter.kind.as_str()));
  }
  docs
}

fn set_filter_trailing(
  substitutions: &mut BTreeMap<String, String>,
  class_name: &str,
  inputs: &[String],
) {
  let (trailing_args, trailing_params, dump1, dump2) = if inputs.is_empty() {
    (String::new(), String::new(), String::new(), String::new())
  } else {
    let joined = inputs.join(", ");
    let dump1 = inputs
      .iter()
      .map(|arg| format!("{class_name}.logger.debug {{ \"{arg} = #{{{arg}}}\" }}"))
      .collect::<Vec<_>>()
      .join("\n    ");
    let lspace = "\n      ";
    let dump2 = format!(
      "{lspace}{}",
      inputs
        .iter()
        .map(|arg| format!("{arg} = #{{{arg}}}"))
        .collect::<Vec<_>>()
        .join(lspace)
    );
    (format!(", {joined}"), format!(": {joined}"), dump1, dump2)
  };
  substitutions.insert("%trailing_args%".to_string(), trailing_args);
  substitutions.insert("%trailing_params%".to_string(), trailing_params);
  substitutions.insert("%trailing_dump1%".to_string(), dump1);
  substitutions.insert("%trailing_dump2%".to_string(), dump2);
}

/// Parameter values the demo page passes to a filter, rendered as
/// `: 'name_value', ...`, or empty when the filter has no extra inputs.
fn demo_filter_params(inputs: &[String]) -> String {
  if inputs.is_empty() {
    return String::new();
  }
  format!(
    ": {}",
    inputs
      .iter()
      .map(|input| format!("'{input}_value'"))
      .collect::<Vec<_>>()
      .join(", ")
  )
}

/// Asks which invocation options the given tag accepts and of what type
/// each one is.
fn ask_option_names_types(tag: &str) -> Result<Vec<TagParameter>, SpawnError> {
  let theme = ColorfulTheme::default();
  let line: String = Input::with_theme(&theme)
    .with_prompt(format!(
      "Please list the names of the options for the {tag} Jekyll/Liquid tag:"
    ))
    .allow_empty(true)
    .interact_text()?;

  let kinds = [
    ParameterKind::Boolean,
    ParameterKind::Str,
    ParameterKind::Numeric,
  ];
  let kind_names: Vec<&str> = kinds.iter().map(|kind| kind.as_str()).collect();
  let mut parameters = Vec::new();
  for name in line.split([' ', ',', '\t']).filter(|name| !name.is_empty()) {
    let selection = Select::with_theme(&theme)
      .with_prompt(format!("What is the type of {name}?"))
      .items(&kind_names)
      .default(1) // string
      .interact()?;
    parameters.push(TagParameter {
      name: name.to_string(),
      kind: kinds[selection],
    });
  }
  Ok(parameters)
}

fn ask_filter_inputs(filter_name: &str) -> Result<Vec<String>, SpawnError> {
  let line: String = Input::with_theme(&ColorfulTheme::default())
    .with_prompt(format!(
      "Jekyll filters have at least one input. \
       What are the names of additional inputs for {filter_name}, if any?"
    ))
    .allow_empty(true)
    .interact_text()?;
  Ok(
    line
      .split([' ', ',', '\t'])
      .filter(|name| !name.is_empty())
      .map(str::to_string)
      .collect(),
  )
}

/// Every way the demo page invokes a tag: one example per subset of its
/// parameters, smallest subsets first.
fn combinations(parameters: &[TagParameter]) -> Vec<Vec<String>> {
  (0..=parameters.len())
    .flat_map(|n| choose(parameters, n))
    .collect()
}

fn choose(parameters: &[TagParameter], n: usize) -> Vec<Vec<String>> {
  if n == 0 {
    return vec![Vec::new()];
  }
  if n > parameters.len() {
    return Vec::new();
  }
  let mut result = Vec::new();
  for (i, parameter) in parameters.iter().enumerate() {
    if parameters.len() - i < n {
      break;
    }
    for mut rest in choose(&parameters[i + 1..], n - 1) {
      rest.insert(0, render_parameter(parameter));
      result.push(rest);
    }
  }
  result
}

fn render_parameter(parameter: &TagParameter) -> String {
  match parameter.kind {
    ParameterKind::Boolean => parameter.name.clone(),
    ParameterKind::Str => format!("{}='somevalue'", parameter.name),
    ParameterKind::Numeric => format!("{}=1234", parameter.name),
  }
}

/// Renders the demo page examples for a tag or block: an `h2` heading
/// followed by one fenced region per parameter combination.
fn demo_example(tag: &str, parameters: &[TagParameter], kind: TagKind) -> String {
  let mut first = true;
  let examples: Vec<String> = combinations(parameters)
    .into_iter()
    .map(|combination| {
      let options = combination.join(" ");
      let label = if options.is_empty() {
        " (invoked without parameters)".to_string()
      } else {
        options.clone()
      };
      let close_tag = match kind {
        TagKind::Tag => String::new(),
        TagKind::Block => format!(
          "\nThis is line 1 of the block content.<br>\nThis is line 2.\n{{% end{tag} %}}\n"
        ),
      };
      let example = format!(
        "<!-- #region {tag} {label} -->\n\
         <h3 id=\"{tag}\" class=\"code\">{tag} {label}</h3>\n\
         {{% {tag} {options} %}}{close_tag}\n\
         <!-- endregion -->\n"
      );
      if first {
        first = false;
        format!("<h2 id=\"tag_{tag}\" class='code'>{tag}</h2>\n{example}")
      } else {
        example
      }
    })
    .collect();
  examples.join("\n\n")
}

fn filter_example(filter_name: &str, trailing_params: &str) -> String {
  format!(
    "<h2 id=\"filter_{filter_name}\" class='code'>{filter_name}</h2>\n\
     {{{{ \"TODO: Provide filter input here\" | {filter_name}{trailing_params} }}}}\n"
  )
}
