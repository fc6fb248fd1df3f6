//! Host preconditions and system prerequisites.
//!
//! Validates the host before any work is done: root privileges, a supported
//! distribution, installed system packages and the tools recipes rely on.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::RunConfig;
use crate::consts::{REQUIRED_TOOLS, SUPPORTED_OS_IDS, SYSTEM_PACKAGES};
use crate::exec::{CommandRunner, CommandSpec};

#[derive(Debug, Error)]
pub enum PreflightError {
  #[error("this installer must be run as root")]
  NotRoot,

  #[error("unsupported operating system: {0} (Debian or Ubuntu required)")]
  UnsupportedOs(String),

  #[error("failed to read {path}: {source}")]
  OsRelease {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("installing system prerequisites failed: `{command}` exited with {code:?}")]
  Prerequisites { command: String, code: Option<i32> },

  #[error("{0}")]
  Spawn(String),

  #[error("missing required host tools:\n{0}")]
  MissingTools(String),
}

/// Whether the effective user is root.
#[cfg(unix)]
pub fn is_root() -> bool {
  rustix::process::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
  false
}

pub fn check_root() -> Result<(), PreflightError> {
  if is_root() { Ok(()) } else { Err(PreflightError::NotRoot) }
}

/// Check `/etc/os-release` (or `path`) describes a Debian-family system.
pub fn check_os(path: &Path) -> Result<(), PreflightError> {
  let contents = fs::read_to_string(path).map_err(|source| PreflightError::OsRelease {
    path: path.display().to_string(),
    source,
  })?;
  check_os_release(&contents)
}

/// Accepts os-release contents whose `ID` or `ID_LIKE` names a supported distribution.
pub fn check_os_release(contents: &str) -> Result<(), PreflightError> {
  let mut ids = Vec::new();
  let mut name = None;

  for line in contents.lines() {
    let Some((key, value)) = line.split_once('=') else {
      continue;
    };
    let value = value.trim().trim_matches('"').trim_matches('\'');
    match key.trim() {
      "ID" | "ID_LIKE" => ids.extend(value.split_whitespace().map(str::to_lowercase)),
      "PRETTY_NAME" => name = Some(value.to_string()),
      _ => {}
    }
  }

  if ids.iter().any(|id| SUPPORTED_OS_IDS.contains(&id.as_str())) {
    Ok(())
  } else {
    Err(PreflightError::UnsupportedOs(
      name.or_else(|| ids.first().cloned()).unwrap_or_else(|| "unknown".to_string()),
    ))
  }
}

/// Install system packages through apt, refreshing the index outside CI mode.
pub async fn ensure_prerequisites<R: CommandRunner>(runner: &R, config: &RunConfig) -> Result<(), PreflightError> {
  if config.skip_dependencies {
    info!("skipping system prerequisites");
    return Ok(());
  }

  let mut commands = Vec::new();
  if !config.ci {
    commands.push(CommandSpec::new("apt-get").arg("update"));
  }
  commands.push(
    CommandSpec::new("apt-get")
      .args(["install", "-y", "--no-install-recommends"])
      .args(SYSTEM_PACKAGES.iter().copied())
      .env("DEBIAN_FRONTEND", "noninteractive"),
  );

  for command in &commands {
    let output = runner
      .run(command)
      .await
      .map_err(|e| PreflightError::Spawn(e.to_string()))?;
    if !output.success() {
      return Err(PreflightError::Prerequisites {
        command: command.to_string(),
        code: output.code,
      });
    }
  }

  info!(packages = SYSTEM_PACKAGES.len(), "system prerequisites installed");
  Ok(())
}

/// Check that specific tools are available.
///
/// Each tuple is (command, package providing it).
pub fn check_required_tools<R: CommandRunner>(runner: &R, tools: &[(&str, &str)]) -> Result<(), PreflightError> {
  let missing: Vec<String> = tools
    .iter()
    .filter(|(tool, _)| !runner.command_exists(tool))
    .map(|(tool, package)| format!("  {tool} (install: {package})"))
    .collect();

  if missing.is_empty() {
    Ok(())
  } else {
    Err(PreflightError::MissingTools(missing.join("\n")))
  }
}

/// Check all tools the build recipes need.
pub fn check_host_tools<R: CommandRunner>(runner: &R) -> Result<(), PreflightError> {
  check_required_tools(runner, REQUIRED_TOOLS)
}
