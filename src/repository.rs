// src/repository.rs
//
// Git hosting: the known repository hosts, the derived clone and browse
// URLs, and the local/remote repository bootstrap that runs after a
// scaffold has been generated.

use std::fs;
use std::path::Path;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use log::info;

use crate::config;
use crate::error::SpawnError;
use crate::utils::run_command;

/// A git hosting service a generated gem can be published to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Host {
  pub id: &'static str,
  pub domain: &'static str,
  pub label: &'static str,
}

pub const HOSTS: &[Host] = &[
  Host {
    id: "github",
    domain: "github.com",
    label: "GitHub",
  },
  Host {
    id: "gitlab",
    domain: "gitlab.com",
    label: "GitLab",
  },
  Host {
    id: "bitbucket",
    domain: "bitbucket.org",
    label: "BitBucket",
  },
];

pub fn find_host(id: &str) -> Option<&'static Host> {
  HOSTS.iter().find(|host| host.id == id)
}

/// Identity of the repository to create for a new gem.
#[derive(Clone, Debug)]
pub struct Repository {
  pub host: &'static Host,
  pub name: String,
  pub private: bool,
  pub user: String,
}

impl Repository {
  pub fn new(host: &'static Host, name: &str, private: bool, user: &str) -> Self {
    Repository {
      host,
      name: name.to_string(),
      private,
      user: user.to_string(),
    }
  }

  pub fn origin(&self) -> String {
    format!("git@{}:{}/{}.git", self.host.domain, self.user, self.name)
  }

  pub fn url(&self) -> String {
    format!("https://{}/{}/{}", self.host.domain, self.user, self.name)
  }

  pub fn public(&self) -> bool {
    !self.private
  }
}

/// Resolves the user name for the given host: the `gemspawn.<host>user`
/// git config entry, then the GitHub CLI's `hosts.yml`, then a prompt.
/// Whatever was resolved is written back to the git config for next time.
pub fn repository_user_name(host: &Host) -> Result<String, SpawnError> {
  let git_config_key = format!("gemspawn.{}user", host.id);
  let configured = config::git_config_global(&git_config_key);

  let mut user = configured.clone().filter(|u| !u.is_empty());
  if user.is_none() {
    if let Some(gh_hosts) = config::github_config()? {
      user = config::github_user(&gh_hosts).map(str::to_string);
    }
  }
  let user = match user {
    Some(user) => user,
    None => Input::with_theme(&ColorfulTheme::default())
      .with_prompt(format!("What is your {} user name?", host.id))
      .interact_text()?,
  };
  if configured.as_deref() != Some(user.as_str()) {
    config::set_git_config_global(&git_config_key, &user)?;
  }
  Ok(user)
}

pub fn create_local_git_repository(out_dir: &Path) -> Result<(), SpawnError> {
  info!("Creating the local git repository");
  run_command("git init", "git init", out_dir, true)?;
  run_command("git add", "git add .", out_dir, true)?;
  // The commit fails when no git identity is configured; the scaffold is
  // still usable, so generation continues.
  run_command(
    "git commit",
    "git commit -aqm 'Initial commit'",
    out_dir,
    false,
  )?;
  Ok(())
}

pub fn create_remote_git_repository(
  repository: &Repository,
  out_dir: &Path,
) -> Result<(), SpawnError> {
  info!("Creating a remote {} repository", repository.host.id);
  match repository.host.id {
    "github" => {
      let mut token = None;
      if let Some(gh_hosts) = config::github_config()? {
        token = config::github_token(&gh_hosts).map(str::to_string);
      }
      let token = match token {
        Some(token) => token,
        None => Password::with_theme(&ColorfulTheme::default())
          .with_prompt("What is your Github personal access token")
          .interact()?,
      };
      let curl_command = format!(
        "curl --request POST --user '{user}:{token}' https://api.github.com/user/repos \
         -d '{{\"name\":\"{name}\", \"private\":{private}}}'",
        user = repository.user,
        name = repository.name,
        private = repository.private,
      );
      run_command("create github repository", &curl_command, out_dir, true)?;
    }
    "bitbucket" => {
      let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Please enter your Bitbucket password")
        .interact()?;
      let fork_policy = if repository.public() {
        "allow_forks"
      } else {
        "no_public_forks"
      };
      let curl_command = format!(
        "curl --request POST --user {user}:{password} \
         https://api.bitbucket.org/2.0/repositories/{user}/{name} \
         -d '{{\"scm\":\"git\", \"fork_policy\":\"{fork_policy}\", \"is_private\":\"{private}\"}}'",
        user = repository.user,
        name = repository.name,
        private = repository.private,
      );
      run_command("create bitbucket repository", &curl_command, out_dir, true)?;
    }
    other => {
      return Err(SpawnError::RemoteNotImplemented {
        host: other.to_string(),
      });
    }
  }
  run_command(
    "git remote",
    &format!("git remote add origin {}", repository.origin()),
    out_dir,
    true,
  )?;
  info!(
    "Pushing initial commit to remote {} repository",
    repository.host.id
  );
  run_command("git push", "git push -u origin master", out_dir, true)?;
  Ok(())
}

/// Turns a freshly generated scaffold into a git repository: marks the
/// scripts executable, commits locally, and optionally creates and
/// pushes to a remote repository after asking the user.
pub fn initialize_repository(
  repository: &Repository,
  out_dir: &Path,
  has_executables: bool,
) -> Result<(), SpawnError> {
  info!("Preparing a git repository in {}", out_dir.display());
  run_command("chmod bin", "chmod +x bin/*", out_dir, false)?;
  if has_executables {
    run_command("chmod exe", "chmod +x exe/*", out_dir, false)?;
  }
  create_local_git_repository(out_dir)?;
  let gemfile_lock = out_dir.join("Gemfile.lock");
  if gemfile_lock.exists() {
    fs::remove_file(&gemfile_lock)?;
  }
  let create_repo = Confirm::with_theme(&ColorfulTheme::default())
    .with_prompt(format!(
      "Do you want to create a repository on {} named {}?",
      repository.host.label, repository.name
    ))
    .default(false)
    .interact()?;
  if create_repo {
    create_remote_git_repository(repository, out_dir)?;
  }
  info!("The {} gem was created.", repository.name);
  info!("Remember to run bin/setup in the new gem directory");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn every_known_host_resolves() {
    assert_eq!(find_host("github").unwrap().domain, "github.com");
    assert_eq!(find_host("gitlab").unwrap().label, "GitLab");
    assert_eq!(find_host("bitbucket").unwrap().domain, "bitbucket.org");
    assert!(find_host("sourceforge").is_none());
  }

  #[test]
  fn origin_and_url_follow_the_host_domain() {
    let repository = Repository::new(find_host("github").unwrap(), "my_gem", false, "fred");
    assert_eq!(repository.origin(), "git@github.com:fred/my_gem.git");
    assert_eq!(repository.url(), "https://github.com/fred/my_gem");
    assert!(repository.public());

    let private = Repository::new(find_host("bitbucket").unwrap(), "my_gem", true, "fred");
    assert_eq!(private.origin(), "git@bitbucket.org:fred/my_gem.git");
    assert!(!private.public());
  }

  #[test]
  fn gitlab_remotes_are_not_supported_yet() {
    let dir = tempdir().unwrap();
    let repository = Repository::new(find_host("gitlab").unwrap(), "my_gem", false, "fred");
    let err = create_remote_git_repository(&repository, dir.path()).unwrap_err();
    assert_eq!(
      err.to_string(),
      "Support for gitlab has not been implemented yet"
    );
  }

  #[test]
  fn local_repository_bootstrap_creates_a_git_dir() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
    create_local_git_repository(dir.path()).unwrap();
    assert!(dir.path().join(".git").exists());
  }
}
