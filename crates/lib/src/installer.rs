//! A complete installer run.
//!
//! Order of operations:
//! 1. installer update check (outside CI mode)
//! 2. integrity gate, unless disabled
//! 3. target version resolution for every component that may be touched
//! 4. system prerequisites and host tool check (skipped in dry-run mode)
//! 5. the pipeline (or, in dry-run mode, its plan)
//! 6. installation verification

use std::collections::BTreeMap;
use std::fs;

use serde::Serialize;
use tracing::{info, warn};

use crate::component::Component;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use crate::fetch::Fetcher;
use crate::integrity::IntegrityVerifier;
use crate::oracle::{ResolvedTarget, VersionOracle};
use crate::pipeline::{Pipeline, PipelineObserver, PlannedStage};
use crate::preflight::{check_host_tools, ensure_prerequisites};
use crate::probe::HostProbe;
use crate::stage::StageResult;
use crate::verify::{Verification, verify_installation};

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub dry_run: bool,
  /// Newer installer version announced by the manifest.
  pub update_available: Option<String>,
  pub signature_verified: bool,
  /// Stage results in build order; empty for dry runs.
  pub stages: Vec<StageResult>,
  /// Stage decisions for dry runs; empty otherwise.
  pub plan: Vec<PlannedStage>,
  pub verification: Option<Verification>,
}

impl RunReport {
  pub fn built(&self) -> impl Iterator<Item = &StageResult> {
    self.stages.iter().filter(|r| r.succeeded())
  }
}

/// Execute a full run against the given host capabilities.
pub async fn run<F, R, P, O>(config: &RunConfig, fetcher: &F, runner: &R, probe: &P, observer: &mut O) -> Result<RunReport>
where
  F: Fetcher,
  R: CommandRunner,
  P: HostProbe,
  O: PipelineObserver,
{
  let oracle = VersionOracle::new(config, fetcher);

  let update_available = if config.ci {
    None
  } else {
    oracle.installer_update(env!("CARGO_PKG_VERSION")).await
  };

  if config.verify_signature {
    IntegrityVerifier::new(config, fetcher).verify().await?;
  } else {
    warn!("installer signature verification disabled");
  }

  let targets = resolve_targets(config, &oracle).await?;

  if !config.dry_run {
    ensure_prerequisites(runner, config).await?;
    check_host_tools(runner)?;
  }

  let pipeline = Pipeline::new(config, fetcher, runner, probe, &targets);
  let mut report = RunReport {
    dry_run: config.dry_run,
    update_available,
    signature_verified: config.verify_signature,
    stages: Vec::new(),
    plan: Vec::new(),
    verification: None,
  };

  if config.dry_run {
    report.plan = pipeline.plan().await?;
    return Ok(report);
  }

  fs::create_dir_all(&config.work_dir)?;
  let work = tempfile::Builder::new()
    .prefix("build-")
    .tempdir_in(&config.work_dir)?;
  info!(dir = %work.path().display(), "using work directory");

  report.stages = pipeline.run(work.path(), observer).await?;

  if let Some(target) = targets.get(&Component::ImageMagick) {
    report.verification = Some(verify_installation(probe, &target.version).await);
  }

  Ok(report)
}

/// Resolve targets for every component that is not user-skipped.
///
/// User-skipped components are still looked up, but a failure there is not
/// fatal since no decision depends on their target.
async fn resolve_targets<F: Fetcher>(
  config: &RunConfig,
  oracle: &VersionOracle<'_, F>,
) -> Result<BTreeMap<Component, ResolvedTarget>> {
  let mut targets = BTreeMap::new();

  for component in Component::ALL {
    let required = config.force || !config.is_skipped(component);
    match oracle.resolve(component).await {
      Ok(target) => {
        info!(component = %component, version = %target.version, "target resolved");
        targets.insert(component, target);
      }
      Err(source) if required => return Err(Error::VersionUnresolved { component, source }),
      Err(e) => warn!(component = %component, error = %e, "skipped component has no target"),
    }
  }

  Ok(targets)
}
