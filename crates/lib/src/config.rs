//! Immutable run configuration.
//!
//! Built once from the command line before anything else happens and only
//! ever borrowed afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::component::Component;
use crate::consts::{DEFAULT_LOG_FILE, DEFAULT_MANIFEST_URL, DEFAULT_PREFIX, DEFAULT_WORK_DIR};

/// Per-component user overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentOptions {
  /// Explicit target version, bypassing the manifest.
  pub version: Option<String>,
  /// Never build this component.
  pub skip: bool,
}

/// ImageMagick configure options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMagickOptions {
  pub quantum_depth: u8,
  pub opencl: bool,
  pub static_build: bool,
}

impl Default for ImageMagickOptions {
  fn default() -> Self {
    Self {
      quantum_depth: 16,
      opencl: false,
      static_build: false,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
  /// Rebuild every component regardless of installed versions.
  pub force: bool,
  pub components: BTreeMap<Component, ComponentOptions>,
  pub imagemagick: ImageMagickOptions,
  /// Do not install system packages.
  pub skip_dependencies: bool,
  /// Non-interactive mode: no update notice, no package index refresh.
  pub ci: bool,
  /// Resolve and decide only; never build.
  pub dry_run: bool,
  pub verify_signature: bool,
  pub log_file: PathBuf,
  pub work_dir: PathBuf,
  pub prefix: PathBuf,
  pub manifest_url: String,
  /// The installer binary whose signature is checked.
  pub installer_path: PathBuf,
  /// Parallel jobs passed to make / cmake.
  pub jobs: usize,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      force: false,
      components: BTreeMap::new(),
      imagemagick: ImageMagickOptions::default(),
      skip_dependencies: false,
      ci: false,
      dry_run: false,
      verify_signature: true,
      log_file: PathBuf::from(DEFAULT_LOG_FILE),
      work_dir: PathBuf::from(DEFAULT_WORK_DIR),
      prefix: PathBuf::from(DEFAULT_PREFIX),
      manifest_url: DEFAULT_MANIFEST_URL.to_string(),
      installer_path: PathBuf::new(),
      jobs: default_jobs(),
    }
  }
}

impl RunConfig {
  /// Overrides for `component`, or the defaults when none were given.
  pub fn component(&self, component: Component) -> ComponentOptions {
    self.components.get(&component).cloned().unwrap_or_default()
  }

  pub fn is_skipped(&self, component: Component) -> bool {
    self.component(component).skip
  }

  /// URL of a manifest resource, e.g. `{base}/aom/version`.
  pub fn manifest_resource(&self, name: &str, resource: &str) -> String {
    format!("{}/{}/{}", self.manifest_url.trim_end_matches('/'), name, resource)
  }
}

/// Host parallelism, falling back to a single job.
pub fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
