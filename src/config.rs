// src/config.rs
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use log::warn;
use serde::Deserialize;

use crate::error::SpawnError;
use crate::utils::run_command;

/// Directory under the home directory that receives generated gems when
/// neither `-o` nor the `my_gems` environment variable says otherwise.
pub const DEFAULT_OUT_DIR_BASE: &str = "gemspawn_generated";

/// One entry of the GitHub CLI's `hosts.yml`, keyed by domain. The file
/// carries more fields than these (git_protocol and friends); they are
/// ignored.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GhHostEntry {
  #[serde(default)]
  pub user: Option<String>,
  #[serde(default)]
  pub oauth_token: Option<String>,
}

pub type GhHosts = BTreeMap<String, GhHostEntry>;

pub fn parse_gh_hosts(yaml: &str) -> Result<GhHosts, SpawnError> {
  Ok(serde_yaml::from_str(yaml)?)
}

/// Reads `~/.config/gh/hosts.yml` when present. A missing file is not an
/// error, just `None`.
pub fn github_config() -> Result<Option<GhHosts>, SpawnError> {
  let Some(user_dirs) = UserDirs::new() else {
    return Ok(None);
  };
  let path = user_dirs.home_dir().join(".config/gh/hosts.yml");
  if !path.is_file() {
    return Ok(None);
  }
  let content = fs::read_to_string(&path)?;
  Ok(Some(parse_gh_hosts(&content)?))
}

pub fn github_user(hosts: &GhHosts) -> Option<&str> {
  hosts.get("github.com").and_then(|entry| entry.user.as_deref())
}

pub fn github_token(hosts: &GhHosts) -> Option<&str> {
  hosts
    .get("github.com")
    .and_then(|entry| entry.oauth_token.as_deref())
}

/// Reads one key from the user's global git configuration. An unset key
/// and a failing `git` invocation both read as `None`.
pub fn git_config_global(key: &str) -> Option<String> {
  let command = format!("git config --global {key}");
  match run_command("git config", &command, Path::new("."), false) {
    Ok(output) if output.status.success() => {
      let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
      if value.is_empty() {
        None
      } else {
        Some(value)
      }
    }
    Ok(_) => None,
    Err(e) => {
      warn!("Could not read git configuration key {key}: {e}");
      None
    }
  }
}

pub fn set_git_config_global(key: &str, value: &str) -> Result<(), SpawnError> {
  let command = format!("git config --global {key} '{value}'");
  run_command("git config", &command, Path::new("."), true).map(|_| ())
}

/// Locates the templates directory shipped with the tool.
/// Order of preference:
/// 1. GEMSPAWN_TEMPLATES_DIR environment variable
/// 2. templates/ subdirectory relative to the executable
/// 3. templates/ subdirectory relative to the current working directory (fallback)
pub fn determine_templates_dir() -> Result<PathBuf, SpawnError> {
  if let Ok(dir) = env::var("GEMSPAWN_TEMPLATES_DIR") {
    let path = PathBuf::from(dir);
    if path.is_dir() {
      return Ok(path);
    }
    return Err(SpawnError::InvalidTemplatePath(path));
  }

  // Relative to executable
  if let Ok(mut exe_path) = env::current_exe() {
    exe_path.pop(); // Remove the executable name
    let path = exe_path.join("templates");
    if path.is_dir() {
      return Ok(path);
    }
  }

  // Relative to current working directory as a last resort
  let path = PathBuf::from("templates");
  if path.is_dir() {
    return Ok(path);
  }

  Err(SpawnError::CannotDetermineTemplatesDir)
}

/// Default output directory for a gem: `$my_gems/NAME` when the `my_gems`
/// environment variable is set, else `~/gemspawn_generated/NAME`.
pub fn default_out_dir(gem_name: &str) -> PathBuf {
  let my_gems = env::var("my_gems").ok();
  let home = UserDirs::new()
    .map(|dirs| dirs.home_dir().to_path_buf())
    .unwrap_or_else(|| PathBuf::from("."));
  out_dir_from(my_gems.as_deref(), &home, gem_name)
}

fn out_dir_from(my_gems: Option<&str>, home: &Path, gem_name: &str) -> PathBuf {
  match my_gems {
    Some(base) if !base.is_empty() => PathBuf::from(base).join(gem_name),
    _ => home.join(DEFAULT_OUT_DIR_BASE).join(gem_name),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_gh_hosts_and_ignores_extra_fields() {
    let yaml = "\
github.com:
  user: octocat
  oauth_token: gho_sekrit
  git_protocol: https
";
    let hosts = parse_gh_hosts(yaml).unwrap();
    assert_eq!(github_user(&hosts), Some("octocat"));
    assert_eq!(github_token(&hosts), Some("gho_sekrit"));
  }

  #[test]
  fn gh_hosts_without_token_reads_as_none() {
    let yaml = "\
github.com:
  user: octocat
";
    let hosts = parse_gh_hosts(yaml).unwrap();
    assert_eq!(github_user(&hosts), Some("octocat"));
    assert_eq!(github_token(&hosts), None);
  }

  #[test]
  fn out_dir_prefers_my_gems_base() {
    let home = Path::new("/home/someone");
    assert_eq!(
      out_dir_from(Some("/work/gems"), home, "my_gem"),
      PathBuf::from("/work/gems/my_gem")
    );
    assert_eq!(
      out_dir_from(None, home, "my_gem"),
      PathBuf::from("/home/someone/gemspawn_generated/my_gem")
    );
    assert_eq!(
      out_dir_from(Some(""), home, "my_gem"),
      PathBuf::from("/home/someone/gemspawn_generated/my_gem")
    );
  }
}
