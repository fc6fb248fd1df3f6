//! In-process fakes for the host capability traits.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::component::Component;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use crate::fetch::{FetchError, Fetcher};
use crate::oracle::ResolvedTarget;
use crate::probe::HostProbe;
use crate::version::Version;

/// Serves canned bodies by URL; anything else is a 404.
#[derive(Debug, Default)]
pub struct FakeFetcher {
  bodies: HashMap<String, Vec<u8>>,
}

impl FakeFetcher {
  pub fn with_bytes(mut self, url: &str, body: Vec<u8>) -> Self {
    self.bodies.insert(url.to_string(), body);
    self
  }

  pub fn with_text(self, url: &str, body: &str) -> Self {
    self.with_bytes(url, body.as_bytes().to_vec())
  }
}

impl Fetcher for FakeFetcher {
  async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    self.bodies.get(url).cloned().ok_or_else(|| FetchError::FetchFailed {
      url: url.to_string(),
      message: "HTTP 404 Not Found".to_string(),
    })
  }
}

/// Fake command runner and host probe sharing one view of installed state.
///
/// An install command run from a `{component}-{version}` source directory
/// marks that component installed with the version registered by `installs`.
#[derive(Debug)]
pub struct FakeHost {
  installed: RefCell<BTreeMap<Component, String>>,
  installs: BTreeMap<Component, String>,
  cmake: Option<Version>,
  fail_on: Option<String>,
  commands: RefCell<Vec<CommandSpec>>,
}

impl Default for FakeHost {
  fn default() -> Self {
    Self {
      installed: RefCell::new(BTreeMap::new()),
      installs: BTreeMap::new(),
      cmake: Some(Version::from_segments(&[3, 28, 3])),
      fail_on: None,
      commands: RefCell::new(Vec::new()),
    }
  }
}

impl FakeHost {
  pub fn with_installed(self, component: Component, version: &str) -> Self {
    self.installed.borrow_mut().insert(component, version.to_string());
    self
  }

  pub fn with_all_installed(self, targets: &BTreeMap<Component, ResolvedTarget>) -> Self {
    for (component, target) in targets {
      self.installed.borrow_mut().insert(*component, target.version.clone());
    }
    self
  }

  /// Installing `component` leaves `version` on the host.
  pub fn installs(mut self, component: Component, version: &str) -> Self {
    self.installs.insert(component, version.to_string());
    self
  }

  pub fn with_cmake(mut self, version: Option<&str>) -> Self {
    self.cmake = version.map(|v| Version::parse(v).unwrap());
    self
  }

  /// Any command whose rendering contains `pattern` exits with code 2.
  pub fn fail_on(mut self, pattern: &str) -> Self {
    self.fail_on = Some(pattern.to_string());
    self
  }

  pub fn commands(&self) -> Vec<CommandSpec> {
    self.commands.borrow().clone()
  }

  pub fn programs(&self) -> Vec<String> {
    self.commands.borrow().iter().map(|c| c.program.clone()).collect()
  }

  fn record_install(&self, spec: &CommandSpec) {
    let is_install = spec.args.iter().any(|a| a == "--install" || a == "install");
    if !is_install || spec.program == "apt-get" {
      return;
    }
    let Some(dir) = spec.cwd.as_ref().and_then(|c| c.file_name()) else {
      return;
    };
    let dir = dir.to_string_lossy();
    for (component, version) in &self.installs {
      if dir.starts_with(&format!("{component}-")) {
        self.installed.borrow_mut().insert(*component, version.clone());
      }
    }
  }
}

impl CommandRunner for FakeHost {
  async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
    self.commands.borrow_mut().push(spec.clone());

    let failing = self.fail_on.as_ref().is_some_and(|p| spec.to_string().contains(p.as_str()));
    if failing {
      return Ok(CommandOutput {
        code: Some(2),
        stdout: String::new(),
        stderr: "error: boom".to_string(),
      });
    }

    self.record_install(spec);
    Ok(CommandOutput {
      code: Some(0),
      ..CommandOutput::default()
    })
  }

  fn command_exists(&self, _program: &str) -> bool {
    true
  }
}

impl HostProbe for FakeHost {
  async fn installed_version(&self, component: Component) -> Option<String> {
    self.installed.borrow().get(&component).cloned()
  }

  async fn toolchain_version(&self) -> Option<Version> {
    self.cmake
  }
}

/// Gzip-compressed tarball containing `files` (path, contents).
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
  for (path, contents) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap()
}

/// A typical set of resolved targets without hashes.
pub fn all_targets() -> BTreeMap<Component, ResolvedTarget> {
  [
    (Component::Aom, "3.8.0"),
    (Component::Libheif, "1.17.6"),
    (Component::JpegXl, "0.9.0"),
    (Component::ImageMagick, "7.1.1-15"),
  ]
  .into_iter()
  .map(|(c, v)| {
    (
      c,
      ResolvedTarget {
        version: v.to_string(),
        hash: None,
      },
    )
  })
  .collect()
}

/// Fetcher serving a minimal source archive for every target.
pub fn archives_for(targets: &BTreeMap<Component, ResolvedTarget>) -> FakeFetcher {
  targets.iter().fold(FakeFetcher::default(), |fetcher, (component, target)| {
    let top = format!("{component}-{}/README", target.version);
    fetcher.with_bytes(&component.archive_url(&target.version), tar_gz(&[(&top, "source")]))
  })
}
