//! Shared fixtures: a signed installer, a mock manifest and a scripted host.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signer, SigningKey};
use imbuild_lib::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use imbuild_lib::probe::HostProbe;
use imbuild_lib::{Component, RunConfig, Version};
use mockito::{Mock, ServerGuard};
use sha2::{Digest, Sha512};
use tempfile::TempDir;

pub const INSTALLER: &[u8] = b"imbuild test installer";

pub const TARGETS: [(Component, &str); 4] = [
  (Component::Aom, "3.8.0"),
  (Component::Libheif, "1.17.6"),
  (Component::JpegXl, "0.9.0"),
  (Component::ImageMagick, "7.1.1-15"),
];

/// Temporary installer binary plus the key that signed it.
pub struct SignedInstaller {
  pub dir: TempDir,
  pub key: SigningKey,
}

impl SignedInstaller {
  pub fn new() -> Self {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("imbuild"), INSTALLER).unwrap();
    Self {
      dir,
      key: SigningKey::from_bytes(&[42u8; 32]),
    }
  }

  pub fn path(&self) -> PathBuf {
    self.dir.path().join("imbuild")
  }

  pub fn signature(&self) -> Vec<u8> {
    self.key.sign(&Sha512::digest(INSTALLER)).to_bytes().to_vec()
  }

  pub fn public_key_hex(&self) -> String {
    hex::encode(self.key.verifying_key().to_bytes())
  }
}

/// Serve the signature, the public key and every component's target version.
pub async fn serve_manifest(server: &mut ServerGuard, installer: &SignedInstaller) -> Vec<Mock> {
  let mut mocks = vec![
    server
      .mock("GET", "/imbuild/imbuild.sig")
      .with_body(installer.signature())
      .create_async()
      .await,
    server
      .mock("GET", "/imbuild/public.pem")
      .with_body(installer.public_key_hex())
      .create_async()
      .await,
  ];
  for (component, version) in TARGETS {
    mocks.push(
      server
        .mock("GET", format!("/{}/version", component.as_str()).as_str())
        .with_body(format!("{version}\n"))
        .create_async()
        .await,
    );
  }
  mocks
}

pub fn config(server: &ServerGuard, installer: &SignedInstaller, work_dir: &Path) -> RunConfig {
  RunConfig {
    ci: true,
    manifest_url: server.url(),
    installer_path: installer.path(),
    work_dir: work_dir.to_path_buf(),
    prefix: work_dir.join("prefix"),
    ..RunConfig::default()
  }
}

/// Host with a fixed installed state that records every command.
#[derive(Default)]
pub struct ScriptedHost {
  pub installed: BTreeMap<Component, String>,
  pub commands: RefCell<Vec<CommandSpec>>,
}

impl ScriptedHost {
  pub fn up_to_date() -> Self {
    Self {
      installed: TARGETS.iter().map(|(c, v)| (*c, v.to_string())).collect(),
      ..Self::default()
    }
  }

  pub fn programs(&self) -> Vec<String> {
    self.commands.borrow().iter().map(|c| c.program.clone()).collect()
  }
}

impl CommandRunner for ScriptedHost {
  async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
    self.commands.borrow_mut().push(spec.clone());
    Ok(CommandOutput {
      code: Some(0),
      ..CommandOutput::default()
    })
  }

  fn command_exists(&self, _program: &str) -> bool {
    true
  }
}

impl HostProbe for ScriptedHost {
  async fn installed_version(&self, component: Component) -> Option<String> {
    self.installed.get(&component).cloned()
  }

  async fn toolchain_version(&self) -> Option<Version> {
    Some(Version::from_segments(&[3, 28]))
  }
}
