//! Target version resolution.
//!
//! Each component's target version comes from an explicit override when one
//! is given, otherwise from the manifest's `{component}/version` resource.
//! The `{component}/hash` resource supplies the expected archive digest; it
//! is optional, and a missing hash never stops the run.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::component::Component;
use crate::config::RunConfig;
use crate::consts::INSTALLER_MANIFEST_NAME;
use crate::fetch::{FetchError, Fetcher};
use crate::version::{Version, VersionError};

#[derive(Debug, Error)]
pub enum OracleError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("manifest returned an empty version")]
  Empty,

  #[error(transparent)]
  Malformed(#[from] VersionError),
}

/// Target version and expected digest for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
  pub version: String,
  pub hash: Option<String>,
}

pub struct VersionOracle<'a, F> {
  config: &'a RunConfig,
  fetcher: &'a F,
}

impl<'a, F: Fetcher> VersionOracle<'a, F> {
  pub fn new(config: &'a RunConfig, fetcher: &'a F) -> Self {
    Self { config, fetcher }
  }

  /// Resolve `component`'s target version and expected hash.
  pub async fn resolve(&self, component: Component) -> Result<ResolvedTarget, OracleError> {
    let name = component.as_str();

    let version = match self.config.component(component).version {
      Some(version) => {
        info!(component = %component, version = %version, "using version override");
        version.trim().to_string()
      }
      None => {
        let url = self.config.manifest_resource(name, "version");
        self.fetcher.fetch_text(&url).await?
      }
    };

    if version.is_empty() {
      return Err(OracleError::Empty);
    }
    Version::parse_target(&version)?;

    let hash = self.resolve_hash(component, &version).await;
    debug!(component = %component, version = %version, hash = ?hash, "resolved target");

    Ok(ResolvedTarget { version, hash })
  }

  /// The manifest hash applies to the manifest version only; an override
  /// that differs from it has no known digest.
  async fn resolve_hash(&self, component: Component, version: &str) -> Option<String> {
    let name = component.as_str();

    if self.config.component(component).version.is_some() {
      let manifest_version = self
        .fetcher
        .fetch_text(&self.config.manifest_resource(name, "version"))
        .await
        .ok()?;
      if manifest_version != version {
        debug!(component = %component, "override differs from manifest, no hash available");
        return None;
      }
    }

    match self.fetcher.fetch_text(&self.config.manifest_resource(name, "hash")).await {
      Ok(hash) if !hash.is_empty() => Some(hash),
      Ok(_) => None,
      Err(e) => {
        warn!(component = %component, error = %e, "no archive hash available");
        None
      }
    }
  }

  /// Newer installer version published in the manifest, if any.
  pub async fn installer_update(&self, current: &str) -> Option<String> {
    let url = self.config.manifest_resource(INSTALLER_MANIFEST_NAME, "version");
    let latest = match self.fetcher.fetch_text(&url).await {
      Ok(latest) => latest,
      Err(e) => {
        debug!(error = %e, "could not check for installer updates");
        return None;
      }
    };
    let newer = Version::parse(&latest).ok()? > Version::parse(current).ok()?;
    newer.then_some(latest)
  }
}
