//! Structured command execution and the build log.
//!
//! Every external tool invocation goes through a `CommandRunner` and comes
//! back as a `CommandOutput` carrying the exit code and captured streams.
//! The production runner appends all captured output to the build log.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExecError {
  /// The program could not be started.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to write build log {path}: {source}")]
  Log {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {arg}")?;
    }
    Ok(())
  }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// `None` when the process was killed by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Last lines of stderr (or stdout when stderr is empty), for error context.
  pub fn tail(&self, lines: usize) -> String {
    let source = if self.stderr.trim().is_empty() {
      &self.stdout
    } else {
      &self.stderr
    };
    let all: Vec<&str> = source.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
  }
}

/// Runs external programs.
pub trait CommandRunner {
  fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<CommandOutput, ExecError>>;

  /// Whether `program` can be found on `PATH`.
  fn command_exists(&self, program: &str) -> bool;
}

/// Append-only sink for captured tool output.
#[derive(Debug, Clone)]
pub struct BuildLog {
  path: PathBuf,
}

impl BuildLog {
  /// Start a fresh log at `path`, deleting any previous contents.
  pub fn create(path: &Path) -> Result<Self, ExecError> {
    let log_err = |source| ExecError::Log {
      path: path.to_path_buf(),
      source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(log_err)?;
    }
    match fs::remove_file(path) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(log_err(e)),
    }
    OpenOptions::new().create(true).append(true).open(path).map_err(log_err)?;

    Ok(Self { path: path.to_path_buf() })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn append(&self, text: &str) -> Result<(), ExecError> {
    let log_err = |source| ExecError::Log {
      path: self.path.clone(),
      source,
    };
    let mut file = OpenOptions::new().append(true).open(&self.path).map_err(log_err)?;
    file.write_all(text.as_bytes()).map_err(log_err)?;
    if !text.ends_with('\n') {
      file.write_all(b"\n").map_err(log_err)?;
    }
    Ok(())
  }
}

/// Runs commands on the host, recording their output in the build log.
#[derive(Debug, Clone)]
pub struct SystemRunner {
  log: Option<BuildLog>,
}

impl SystemRunner {
  pub fn new(log: BuildLog) -> Self {
    Self { log: Some(log) }
  }

  /// A runner that records nothing.
  pub fn unlogged() -> Self {
    Self { log: None }
  }

  fn record(&self, spec: &CommandSpec, output: &CommandOutput) -> Result<(), ExecError> {
    let Some(log) = &self.log else {
      return Ok(());
    };
    let cwd = spec.cwd.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| ".".to_string());
    log.append(&format!("$ {spec}  (in {cwd})"))?;
    if !output.stdout.is_empty() {
      log.append(&output.stdout)?;
    }
    if !output.stderr.is_empty() {
      log.append(&output.stderr)?;
    }
    log.append(&format!("# exit code: {:?}", output.code))
  }
}

impl CommandRunner for SystemRunner {
  async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
    info!(cmd = %spec, "executing command");

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).envs(&spec.env).kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
      command.current_dir(cwd);
    }

    let output = command.output().await.map_err(|source| ExecError::Spawn {
      program: spec.program.clone(),
      source,
    })?;

    let output = CommandOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.success() {
      debug!(cmd = %spec, code = ?output.code, stderr = %output.tail(20), "command failed");
    }

    self.record(spec, &output)?;
    Ok(output)
  }

  fn command_exists(&self, program: &str) -> bool {
    which::which(program).is_ok()
  }
}
