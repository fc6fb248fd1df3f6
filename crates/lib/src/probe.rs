//! Read-only inspection of what is installed on the host.
//!
//! Library versions come from the resolved target of the shared library
//! symlink (`libheif.so -> libheif.so.1 -> libheif.so.1.17.6`); ImageMagick's
//! version comes from `magick -version`. Nothing here writes to the host.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::component::Component;
use crate::consts::LIB_SUBDIRS;
use crate::exec::{CommandRunner, CommandSpec};
use crate::version::Version;

/// Answers questions about the host's current state.
pub trait HostProbe {
  /// Installed version of `component`, `None` when not installed.
  fn installed_version(&self, component: Component) -> impl Future<Output = Option<String>>;

  /// Version of the cmake on `PATH`, `None` when missing or unparseable.
  fn toolchain_version(&self) -> impl Future<Output = Option<Version>>;
}

/// Probe backed by the real filesystem and tools.
#[derive(Debug)]
pub struct SystemProbe<'a, R> {
  prefix: PathBuf,
  runner: &'a R,
}

impl<'a, R: CommandRunner> SystemProbe<'a, R> {
  pub fn new(prefix: &Path, runner: &'a R) -> Self {
    Self {
      prefix: prefix.to_path_buf(),
      runner,
    }
  }

  /// Path to the installed `magick` binary.
  pub fn magick_path(&self) -> PathBuf {
    self.prefix.join("bin").join("magick")
  }

  fn library_version(&self, library: &str) -> Option<String> {
    for subdir in LIB_SUBDIRS {
      let link = self.prefix.join(subdir).join(library);
      if fs::symlink_metadata(&link).is_err() {
        continue;
      }
      let resolved = match fs::canonicalize(&link) {
        Ok(path) => path,
        Err(e) => {
          warn!(path = %link.display(), error = %e, "dangling library symlink");
          continue;
        }
      };
      let file_name = resolved.file_name()?.to_string_lossy().into_owned();
      debug!(link = %link.display(), target = %file_name, "resolved library symlink");
      if let Some(version) = parse_library_version(library, &file_name) {
        return Some(version);
      }
    }
    None
  }
}

impl<R: CommandRunner> HostProbe for SystemProbe<'_, R> {
  async fn installed_version(&self, component: Component) -> Option<String> {
    if let Some(library) = component.library_name() {
      return self.library_version(library);
    }

    let magick = self.magick_path();
    if !magick.exists() {
      return None;
    }
    let spec = CommandSpec::new(magick.to_string_lossy()).arg("-version");
    match self.runner.run(&spec).await {
      Ok(output) if output.success() => parse_magick_version(&output.stdout),
      Ok(output) => {
        warn!(code = ?output.code, "magick -version failed");
        None
      }
      Err(e) => {
        warn!(error = %e, "could not run magick");
        None
      }
    }
  }

  async fn toolchain_version(&self) -> Option<Version> {
    let output = self.runner.run(&CommandSpec::new("cmake").arg("--version")).await.ok()?;
    if !output.success() {
      return None;
    }
    parse_cmake_version(&output.stdout)
  }
}

/// Version suffix of a resolved shared library file name.
///
/// `parse_library_version("libaom.so", "libaom.so.3.8.0") == Some("3.8.0")`.
pub fn parse_library_version(library: &str, file_name: &str) -> Option<String> {
  let suffix = file_name.strip_prefix(library)?.strip_prefix('.')?;
  Version::parse(suffix).ok()?;
  Some(suffix.to_string())
}

/// Version token from `magick -version` output, e.g. `7.1.1-15`.
pub fn parse_magick_version(output: &str) -> Option<String> {
  output
    .lines()
    .find_map(|line| line.trim().strip_prefix("Version: ImageMagick "))
    .and_then(|rest| rest.split_whitespace().next())
    .map(str::to_string)
}

/// Version from `cmake --version` output.
pub fn parse_cmake_version(output: &str) -> Option<Version> {
  output
    .lines()
    .find_map(|line| line.trim().strip_prefix("cmake version "))
    .and_then(|rest| Version::parse(rest).ok())
}
