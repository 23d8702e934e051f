// src/utils.rs
//
// Shared plumbing: %name% substitution, scaffold directory copying,
// shell command execution, and the TODO accounting reported after a
// gem has been generated.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Output;

use duct::cmd;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, trace, warn};
use walkdir::WalkDir;

use crate::error::SpawnError;

/// Replaces every `%name%` marker in `content`. The substitution map is
/// keyed by the full marker, percent signs included.
pub fn substitute(content: &str, substitutions: &BTreeMap<String, String>) -> String {
  let mut current_content = content.to_string();
  for (marker, value) in substitutions {
    current_content = current_content.replace(marker, value);
  }
  current_content
}

/// File extensions copied byte for byte instead of being run through
/// substitution.
const BINARY_EXTENSIONS: &[&str] = &["gif", "ico", "jpeg", "jpg", "png", "pdf", "woff", "woff2"];

fn is_binary(path: &Path) -> bool {
  path
    .extension()
    .and_then(|os| os.to_str())
    .map_or(false, |ext| {
      BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    })
}

/// Applies substitutions to each segment of a relative path, so scaffold
/// entries like `lib/%gem_name%.rb` land under their final names.
fn substituted_relative_path(relative: &Path, substitutions: &BTreeMap<String, String>) -> PathBuf {
  let mut substituted = PathBuf::new();
  for component in relative.components() {
    if let Some(segment) = component.as_os_str().to_str() {
      substituted.push(substitute(segment, substitutions));
    } else {
      warn!("Non-UTF8 path component: {:?}", component);
      substituted.push(component.as_os_str());
    }
  }
  substituted
}

/// Copies a scaffold directory into `out_dir`, substituting `%name%`
/// markers in both path segments and text file contents. Entries whose
/// file name appears in `exclude` are skipped, directories together with
/// their contents. Pre-existing files are only overwritten when `force`
/// is set. Returns the number of files written.
pub fn copy_scaffold_dir(
  scaffold_dir: &Path,
  out_dir: &Path,
  substitutions: &BTreeMap<String, String>,
  exclude: &[&str],
  force: bool,
) -> Result<u64, SpawnError> {
  debug!(
    "Copying scaffold from {} to {}",
    scaffold_dir.display(),
    out_dir.display()
  );

  // --- Pass 1: Count files respecting exclusions ---
  let mut file_count: u64 = 0;
  let mut count_walker = WalkDir::new(scaffold_dir).into_iter();
  loop {
    let entry = match count_walker.next() {
      Some(Ok(e)) => e,
      Some(Err(walk_err)) => {
        warn!("Error accessing path during count: {}", walk_err);
        if let Some(path) = walk_err.path() {
          if path.is_dir() {
            count_walker.skip_current_dir();
          }
        }
        continue;
      }
      None => break,
    };
    if entry.path() == scaffold_dir {
      continue;
    }
    if let Some(entry_name) = entry.path().file_name().and_then(|n| n.to_str()) {
      if exclude.contains(&entry_name) {
        if entry.file_type().is_dir() {
          count_walker.skip_current_dir();
        }
        continue;
      }
    }
    if entry.file_type().is_file() {
      file_count += 1;
    }
  }
  debug!("Total files to process: {}", file_count);

  // --- Setup Progress Bar ---
  let pb = ProgressBar::new(file_count);
  pb.set_style(
    ProgressStyle::default_bar()
      .template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
      )
      .expect("Failed to set progress bar style")
      .progress_chars("#>-"),
  );
  pb.set_message("Copying files...");

  // --- Pass 2: Copy files with progress ---
  let mut files_written: u64 = 0;
  let mut walker = WalkDir::new(scaffold_dir).into_iter();
  loop {
    let entry = match walker.next() {
      Some(Ok(e)) => e,
      Some(Err(walk_err)) => {
        warn!("Error accessing path during walk: {}", walk_err);
        if let Some(path) = walk_err.path() {
          if path.is_dir() {
            walker.skip_current_dir();
          }
        }
        continue;
      }
      None => break,
    };

    let current_path = entry.path();
    if current_path == scaffold_dir {
      continue;
    }

    if let Some(entry_name) = current_path.file_name().and_then(|n| n.to_str()) {
      if exclude.contains(&entry_name) {
        debug!("Excluding entry '{}'", current_path.display());
        if entry.file_type().is_dir() {
          walker.skip_current_dir();
        }
        continue;
      }
    }

    let relative_path = match current_path.strip_prefix(scaffold_dir) {
      Ok(p) => p,
      Err(e) => {
        warn!(
          "Failed to strip prefix {} from {}: {}. Skipping.",
          scaffold_dir.display(),
          current_path.display(),
          e
        );
        continue;
      }
    };

    let output_entry_path = out_dir.join(substituted_relative_path(relative_path, substitutions));

    // A destination path that still carries a marker means a name was
    // missing from the substitution map.
    if output_entry_path.to_string_lossy().contains('%') {
      return Err(SpawnError::GenerationError(format!(
        "destination path {} contains a '%' character, which probably means interpolation failed",
        output_entry_path.display()
      )));
    }

    if entry.file_type().is_dir() {
      trace!("Creating directory: {}", output_entry_path.display());
      fs::create_dir_all(&output_entry_path).map_err(|e| SpawnError::OutputDirCreation {
        path: output_entry_path.clone(),
        source: e,
      })?;
    } else if entry.file_type().is_file() {
      pb.set_message(format!("Processing {}", relative_path.display()));

      if let Some(parent) = output_entry_path.parent() {
        if !parent.exists() {
          fs::create_dir_all(parent)?;
        }
      }

      if output_entry_path.exists() && !force {
        warn!(
          "Not overwriting {} because --force was not specified.",
          output_entry_path.display()
        );
        pb.inc(1);
        continue;
      }

      if is_binary(relative_path) {
        trace!("Copying binary file to: {}", output_entry_path.display());
        fs::copy(current_path, &output_entry_path)?;
      } else {
        let content = match fs::read_to_string(current_path) {
          Ok(s) => s,
          Err(e) => {
            if e.kind() == ErrorKind::InvalidData {
              error!(
                "Failed to read '{}' as UTF-8 text. Check file encoding or if it should be binary.",
                current_path.display()
              );
            } else {
              error!("IO Error reading '{}': {}", current_path.display(), e);
            }
            return Err(SpawnError::Io(e));
          }
        };
        trace!("Writing substituted file to: {}", output_entry_path.display());
        fs::write(&output_entry_path, substitute(&content, substitutions))?;
        // Scaffolds carry executable scripts, so source modes survive.
        fs::set_permissions(&output_entry_path, fs::metadata(current_path)?.permissions())?;
      }
      files_written += 1;
      pb.inc(1);
    } else {
      debug!(
        "Skipping non-file/non-directory entry: {}",
        current_path.display()
      );
    }
  }

  pb.finish_with_message("File processing complete.");
  Ok(files_written)
}

/// Copies a single scaffold file, substituting markers in its content.
/// Returns false when the destination already exists and `force` is not
/// set.
pub fn copy_template_file(
  src: &Path,
  dest: &Path,
  substitutions: &BTreeMap<String, String>,
  force: bool,
) -> Result<bool, SpawnError> {
  if dest.exists() && !force {
    warn!(
      "Not overwriting {} because --force was not specified.",
      dest.display()
    );
    return Ok(false);
  }
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).map_err(|e| SpawnError::OutputDirCreation {
      path: parent.to_path_buf(),
      source: e,
    })?;
  }
  let content = fs::read_to_string(src)?;
  fs::write(dest, substitute(&content, substitutions))?;
  fs::set_permissions(dest, fs::metadata(src)?.permissions())?;
  Ok(true)
}

/// Appends `content` to `path`, creating the file if needed.
pub fn append_to_file(path: &Path, content: &str) -> Result<(), SpawnError> {
  let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
  file.write_all(content.as_bytes())?;
  Ok(())
}

/// Runs a shell command and captures its output. A non-zero exit status
/// is an error only when `abort_on_failure` is set; otherwise it is
/// logged and the `Output` returned for the caller to inspect.
pub fn run_command(
  step_name: &str,
  command: &str,
  working_dir: &Path,
  abort_on_failure: bool,
) -> Result<Output, SpawnError> {
  info!(
    "Executing step '{}': `{}` in {}",
    step_name,
    command,
    working_dir.display()
  );

  let expression = cmd!("sh", "-c", command)
    .dir(working_dir)
    .stdout_capture() // duct reads captures in background threads
    .stderr_capture()
    .unchecked(); // Ok(Output) on non-zero exit

  let handle = match expression.start() {
    Ok(h) => h,
    Err(e) => {
      error!("Failed to start command for step '{}': {}", step_name, e);
      if e.kind() == ErrorKind::NotFound {
        return Err(SpawnError::CommandExecError {
          step_name: step_name.to_string(),
          source: format!("Command/shell not found for step '{}': {}", step_name, e).into(),
        });
      }
      return Err(SpawnError::command_exec_error(step_name, e));
    }
  };

  let output = match handle.wait() {
    Ok(output) => output.clone(),
    Err(wait_error) => {
      error!("Error waiting for step '{}': {}", step_name, wait_error);
      return Err(SpawnError::command_exec_error(step_name, wait_error));
    }
  };

  debug!("Step '{}' finished. Status: {:?}", step_name, output.status);
  if log::log_enabled!(log::Level::Trace) {
    trace!(
      "Step '{}' stdout:\n{}",
      step_name,
      String::from_utf8_lossy(&output.stdout)
    );
    trace!(
      "Step '{}' stderr:\n{}",
      step_name,
      String::from_utf8_lossy(&output.stderr)
    );
  }

  if !output.status.success() {
    let stderr_string = String::from_utf8_lossy(&output.stderr).to_string();
    if abort_on_failure {
      return Err(SpawnError::CommandFailedStatus {
        step_name: step_name.to_string(),
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: stderr_string,
      });
    }
    warn!(
      "Step '{}' failed with {}. Stderr: {}",
      step_name,
      output.status,
      stderr_string.lines().next().unwrap_or("<empty stderr>")
    );
  }
  Ok(output)
}

/// Counts the `TODO` markers in the given file. A missing file counts as
/// zero.
pub fn todos_count(path: &Path) -> usize {
  if !path.exists() {
    warn!(
      "{} does not exist, there are no TODOs to count.",
      path.display()
    );
    return 0;
  }
  match fs::read_to_string(path) {
    Ok(content) => content.matches("TODO").count(),
    Err(e) => {
      warn!("Could not read {}: {}", path.display(), e);
      0
    }
  }
}

/// Reports how many TODOs remain in the gemspec and README of a freshly
/// generated gem.
pub fn todos_report(out_dir: &Path, gem_name: &str) -> String {
  let gemspec_todos = todos_count(&out_dir.join(format!("{gem_name}.gemspec")));
  let readme_todos = todos_count(&out_dir.join("README.md"));
  if gemspec_todos == 0 && readme_todos == 0 {
    return "There are no TODOs. You can run 'bundle' from within your new gem project now."
      .to_string();
  }

  let mut msg = String::from("Please complete");
  if gemspec_todos > 0 {
    msg.push_str(&format!(" the {gemspec_todos} TODOs in {gem_name}.gemspec"));
  }
  if gemspec_todos > 0 && readme_todos > 0 {
    msg.push_str(" and");
  }
  if readme_todos > 0 {
    msg.push_str(&format!(" the {readme_todos} TODOs in README.md."));
  }
  msg
}

/// Lists every file below `dir`, as paths relative to `dir`, in sorted
/// order.
pub fn list_generated_files(dir: &Path) -> Result<Vec<PathBuf>, SpawnError> {
  let mut files = Vec::new();
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(|e| SpawnError::WalkDirError {
      path: dir.to_path_buf(),
      source: e,
    })?;
    if entry.file_type().is_file() {
      if let Ok(relative) = entry.path().strip_prefix(dir) {
        files.push(relative.to_path_buf());
      }
    }
  }
  Ok(files)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::os::unix::fs::PermissionsExt;
  use tempfile::tempdir;

  fn subs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (format!("%{k}%"), v.to_string()))
      .collect()
  }

  #[test]
  fn substitute_replaces_every_occurrence() {
    let map = subs(&[("gem_name", "my_gem"), ("class_name", "MyGem")]);
    let content = "gem '%gem_name%'\nmodule %class_name%\n  # %gem_name% again\nend\n";
    assert_eq!(
      substitute(content, &map),
      "gem 'my_gem'\nmodule MyGem\n  # my_gem again\nend\n"
    );
  }

  #[test]
  fn unknown_markers_pass_through_content_untouched() {
    let map = subs(&[("gem_name", "my_gem")]);
    assert_eq!(substitute("%other% %gem_name%", &map), "%other% my_gem");
  }

  #[test]
  fn copies_scaffold_substituting_paths_and_contents() {
    let scaffold = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::create_dir_all(scaffold.path().join("lib/%gem_name%")).unwrap();
    fs::write(
      scaffold.path().join("%gem_name%.gemspec"),
      "Gem::Specification.new { |s| s.name = '%gem_name%' }\n",
    )
    .unwrap();
    fs::write(
      scaffold.path().join("lib/%gem_name%/version.rb"),
      "module %class_name%\n  VERSION = '0.1.0'.freeze\nend\n",
    )
    .unwrap();

    let map = subs(&[("gem_name", "my_gem"), ("class_name", "MyGem")]);
    let written = copy_scaffold_dir(scaffold.path(), out.path(), &map, &[], false).unwrap();

    assert_eq!(written, 2);
    let gemspec = fs::read_to_string(out.path().join("my_gem.gemspec")).unwrap();
    assert!(gemspec.contains("s.name = 'my_gem'"));
    let version = fs::read_to_string(out.path().join("lib/my_gem/version.rb")).unwrap();
    assert!(version.starts_with("module MyGem"));
  }

  #[test]
  fn excluded_directories_are_not_copied() {
    let scaffold = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::create_dir_all(scaffold.path().join("spec")).unwrap();
    fs::write(scaffold.path().join("spec/x_spec.rb"), "describe\n").unwrap();
    fs::write(scaffold.path().join("Rakefile"), "task :default\n").unwrap();

    let map = subs(&[]);
    let written = copy_scaffold_dir(scaffold.path(), out.path(), &map, &["spec"], false).unwrap();

    assert_eq!(written, 1);
    assert!(out.path().join("Rakefile").exists());
    assert!(!out.path().join("spec").exists());
  }

  #[test]
  fn existing_files_survive_without_force() {
    let scaffold = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(scaffold.path().join("README.md"), "new content\n").unwrap();
    fs::write(out.path().join("README.md"), "precious\n").unwrap();

    let map = subs(&[]);
    let written = copy_scaffold_dir(scaffold.path(), out.path(), &map, &[], false).unwrap();

    assert_eq!(written, 0);
    assert_eq!(
      fs::read_to_string(out.path().join("README.md")).unwrap(),
      "precious\n"
    );
  }

  #[test]
  fn force_overwrites_existing_files() {
    let scaffold = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(scaffold.path().join("README.md"), "new content\n").unwrap();
    fs::write(out.path().join("README.md"), "stale\n").unwrap();

    let map = subs(&[]);
    let written = copy_scaffold_dir(scaffold.path(), out.path(), &map, &[], true).unwrap();

    assert_eq!(written, 1);
    assert_eq!(
      fs::read_to_string(out.path().join("README.md")).unwrap(),
      "new content\n"
    );
  }

  #[test]
  fn unresolved_path_marker_fails_the_copy() {
    let scaffold = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(scaffold.path().join("%mystery%.rb"), "puts 'hi'\n").unwrap();

    let map = subs(&[("gem_name", "my_gem")]);
    let err = copy_scaffold_dir(scaffold.path(), out.path(), &map, &[], false).unwrap_err();
    assert!(err.to_string().contains("interpolation failed"));
  }

  #[test]
  fn file_modes_are_preserved() {
    let scaffold = tempdir().unwrap();
    let out = tempdir().unwrap();
    let script = scaffold.path().join("setup");
    fs::write(&script, "#!/bin/sh\necho %gem_name%\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let map = subs(&[("gem_name", "my_gem")]);
    copy_scaffold_dir(scaffold.path(), out.path(), &map, &[], false).unwrap();

    let mode = fs::metadata(out.path().join("setup")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
  }

  #[test]
  fn copy_template_file_substitutes_and_respects_force() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("LICENCE.txt");
    let dest = dir.path().join("out/LICENCE.txt");
    fs::write(&src, "Copyright %year% %user_name%\n").unwrap();

    let map = subs(&[("year", "2024"), ("user_name", "Fred Flintstone")]);
    assert!(copy_template_file(&src, &dest, &map, false).unwrap());
    assert_eq!(
      fs::read_to_string(&dest).unwrap(),
      "Copyright 2024 Fred Flintstone\n"
    );

    fs::write(&dest, "edited\n").unwrap();
    assert!(!copy_template_file(&src, &dest, &map, false).unwrap());
    assert_eq!(fs::read_to_string(&dest).unwrap(), "edited\n");
  }

  #[test]
  fn append_to_file_creates_then_extends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.html");
    append_to_file(&path, "<h2>first</h2>\n").unwrap();
    append_to_file(&path, "<h2>second</h2>\n").unwrap();
    assert_eq!(
      fs::read_to_string(&path).unwrap(),
      "<h2>first</h2>\n<h2>second</h2>\n"
    );
  }

  #[test]
  fn run_command_captures_stdout() {
    let dir = tempdir().unwrap();
    let output = run_command("greet", "echo hello", dir.path(), true).unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
  }

  #[test]
  fn failing_command_aborts_when_asked_to() {
    let dir = tempdir().unwrap();
    let err = run_command("boom", "exit 3", dir.path(), true).unwrap_err();
    match err {
      SpawnError::CommandFailedStatus { step_name, status, .. } => {
        assert_eq!(step_name, "boom");
        assert_eq!(status.code(), Some(3));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn failing_command_is_tolerated_otherwise() {
    let dir = tempdir().unwrap();
    let output = run_command("boom", "exit 3", dir.path(), false).unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(3));
  }

  #[test]
  fn todos_are_counted_per_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("README.md");
    fs::write(&path, "TODO: one\nnothing\nTODO: two and TODO three\n").unwrap();
    assert_eq!(todos_count(&path), 3);
    assert_eq!(todos_count(&dir.path().join("absent.md")), 0);
  }

  #[test]
  fn todos_report_covers_both_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("test.gemspec"), "TODO a\nTODO b\n").unwrap();
    fs::write(dir.path().join("README.md"), "TODO c\n").unwrap();
    assert_eq!(
      todos_report(dir.path(), "test"),
      "Please complete the 2 TODOs in test.gemspec and the 1 TODOs in README.md."
    );
  }

  #[test]
  fn todos_report_when_everything_is_done() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("test.gemspec"), "all done\n").unwrap();
    fs::write(dir.path().join("README.md"), "ship it\n").unwrap();
    assert_eq!(
      todos_report(dir.path(), "test"),
      "There are no TODOs. You can run 'bundle' from within your new gem project now."
    );
  }

  #[test]
  fn generated_files_are_listed_relative_and_sorted() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/a.rb"), "").unwrap();
    fs::write(dir.path().join("Gemfile"), "").unwrap();
    let files = list_generated_files(dir.path()).unwrap();
    assert_eq!(
      files,
      vec![PathBuf::from("Gemfile"), PathBuf::from("lib/a.rb")]
    );
  }
}
