// src/error.rs
use std::{path::PathBuf, process::ExitStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpawnError {
  #[error("IO Error: {0}")]
  Io(#[from] std::io::Error),

  #[error("YAML Parsing Error: {0}")]
  YamlParse(#[from] serde_yaml::Error),

  // Parse failures keep optparse's lowercase register because they are
  // echoed verbatim to the terminal, prefixed by the reporter.
  #[error("the gem kind and name must be specified before any options")]
  MissingPositional,

  #[error("unrecognized gem type '{name}'")]
  UnknownSubcommand { name: String },

  #[error("invalid argument: {flag} {value}")]
  InvalidOptionValue { flag: String, value: String },

  #[error("missing argument: {flag}")]
  MissingOptionValue { flag: String },

  #[error("invalid syntax: {}", tokens.join(" "))]
  UnconsumedResidual { tokens: Vec<String> },

  #[error("'{name}' is an invalid gem name")]
  InvalidGemName { name: String },

  #[error("The templates directory '{0}' does not exist or is empty")]
  TemplateDirNotFound(PathBuf),

  #[error("Invalid template path (not a directory): {0}")]
  InvalidTemplatePath(PathBuf),

  #[error("Could not determine templates directory")]
  CannotDetermineTemplatesDir,

  #[error("Failed to create output directory '{path}': {source}")]
  OutputDirCreation {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Error during gem generation: {0}")]
  GenerationError(String),

  #[error("Error walking directory '{path}': {source}")]
  WalkDirError {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("Command Execution Error for step '{step_name}': {source}")]
  CommandExecError {
    step_name: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>, // Box to handle different error types
  },
  #[error("Command for step '{step_name}' failed with status {status}. Stderr: {stderr}")]
  CommandFailedStatus {
    step_name: String,
    status: ExitStatus, // Store the actual status
    stdout: String,
    stderr: String,
  },
  #[error("Support for {host} has not been implemented yet")]
  RemoteNotImplemented { host: String },

  #[error("Aborted at the user's request")]
  Aborted,

  #[error("User interaction failed: {0}")]
  DialoguerError(#[from] dialoguer::Error),
}

impl SpawnError {
  /// Process exit code this failure maps to: 2 for an unrecognized gem type
  /// or unusable templates directory, 5 for leftover command-line tokens,
  /// 1 for everything else.
  pub fn exit_code(&self) -> i32 {
    match self {
      SpawnError::UnknownSubcommand { .. }
      | SpawnError::TemplateDirNotFound(_)
      | SpawnError::InvalidTemplatePath(_)
      | SpawnError::CannotDetermineTemplatesDir => 2,
      SpawnError::UnconsumedResidual { .. } => 5,
      _ => 1,
    }
  }

  // Helper to convert generic command errors
  pub(crate) fn command_exec_error<E>(step_name: &str, error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    SpawnError::CommandExecError {
      step_name: step_name.to_string(),
      source: Box::new(error),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_errors_use_optparse_wording() {
    let err = SpawnError::InvalidOptionValue {
      flag: "--host".to_string(),
      value: "sourceforge".to_string(),
    };
    assert_eq!(err.to_string(), "invalid argument: --host sourceforge");

    let err = SpawnError::MissingOptionValue { flag: "-o".to_string() };
    assert_eq!(err.to_string(), "missing argument: -o");

    let err = SpawnError::UnconsumedResidual {
      tokens: vec!["-y".to_string(), "extra".to_string()],
    };
    assert_eq!(err.to_string(), "invalid syntax: -y extra");
  }

  #[test]
  fn exit_codes_follow_failure_family() {
    assert_eq!(SpawnError::MissingPositional.exit_code(), 1);
    assert_eq!(
      SpawnError::UnknownSubcommand { name: "python".to_string() }.exit_code(),
      2
    );
    assert_eq!(
      SpawnError::UnconsumedResidual { tokens: vec!["-y".to_string()] }.exit_code(),
      5
    );
    assert_eq!(
      SpawnError::InvalidGemName { name: "-bad".to_string() }.exit_code(),
      1
    );
  }
}
