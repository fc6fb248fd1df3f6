//! A single component's build stage.
//!
//! States: `Pending -> {Skipped | Building} -> {Succeeded | Failed}`; the
//! pipeline reports each transition to its observer.
//! `Building` runs fetch, hash check, extract, the component recipe and
//! `ldconfig` as one fail-fast sequence. A hash mismatch is reported but
//! does not stop the sequence.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::archive::unpack_tar_gz;
use crate::component::Component;
use crate::config::RunConfig;
use crate::decision::BuildDecision;
use crate::exec::CommandRunner;
use crate::fetch::{Fetcher, HashCheck, check_hash, url_to_filename};
use crate::pipeline::PipelineObserver;
use crate::probe::HostProbe;
use crate::recipe::{RecipeStep, ldconfig, recipe};
use crate::version::VersionSpec;

/// Lines of tool output kept in a failure detail.
const FAILURE_TAIL_LINES: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageState {
  Pending,
  Skipped,
  Building,
  Succeeded,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum StageOutcome {
  Skipped,
  Succeeded,
  Failed { step: String, detail: String },
}

impl StageOutcome {
  pub fn state(&self) -> StageState {
    match self {
      Self::Skipped => StageState::Skipped,
      Self::Succeeded => StageState::Succeeded,
      Self::Failed { .. } => StageState::Failed,
    }
  }
}

impl fmt::Display for StageOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Skipped => write!(f, "skipped"),
      Self::Succeeded => write!(f, "ok"),
      Self::Failed { step, .. } => write!(f, "failed during {step}"),
    }
  }
}

/// What happened to one component during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
  pub component: Component,
  /// `None` only for user-skipped components whose target was never resolved.
  pub spec: Option<VersionSpec>,
  pub decision: BuildDecision,
  pub outcome: StageOutcome,
  /// Archive digest check; `None` when nothing was downloaded.
  pub hash_check: Option<HashCheck>,
}

impl StageResult {
  pub fn skipped(component: Component, spec: Option<VersionSpec>, decision: BuildDecision) -> Self {
    Self {
      component,
      spec,
      decision,
      outcome: StageOutcome::Skipped,
      hash_check: None,
    }
  }

  pub fn succeeded(&self) -> bool {
    self.outcome == StageOutcome::Succeeded
  }

  pub fn failed(&self) -> bool {
    matches!(self.outcome, StageOutcome::Failed { .. })
  }
}

struct StepFailure {
  step: String,
  detail: String,
}

impl StepFailure {
  fn new(step: &str, detail: impl Into<String>) -> Self {
    Self {
      step: step.to_string(),
      detail: detail.into(),
    }
  }
}

/// Builds one component whose decision was `Build`.
pub struct BuildStage<'a, F, R, P> {
  pub config: &'a RunConfig,
  pub fetcher: &'a F,
  pub runner: &'a R,
  pub probe: &'a P,
  /// Scratch directory owned by the run; archives and sources go here.
  pub work_dir: &'a Path,
}

impl<F: Fetcher, R: CommandRunner, P: HostProbe> BuildStage<'_, F, R, P> {
  /// Run the build sequence, returning a `Succeeded` or `Failed` result.
  pub async fn build<O: PipelineObserver>(&self, spec: VersionSpec, observer: &mut O) -> StageResult {
    let component = spec.component;
    let mut state = StageState::Building;
    info!(component = %component, version = %spec.target_version, state = ?state, "building");

    let mut hash_check = None;
    let outcome = match self.run_steps(&spec, &mut hash_check, observer).await {
      Ok(()) => {
        state = StageState::Succeeded;
        StageOutcome::Succeeded
      }
      Err(failure) => {
        state = StageState::Failed;
        error!(component = %component, step = %failure.step, detail = %failure.detail, "build failed");
        StageOutcome::Failed {
          step: failure.step,
          detail: failure.detail,
        }
      }
    };
    debug!(component = %component, state = ?state, "stage finished");

    StageResult {
      component,
      spec: Some(spec),
      decision: BuildDecision::Build,
      outcome,
      hash_check,
    }
  }

  async fn run_steps<O: PipelineObserver>(
    &self,
    spec: &VersionSpec,
    hash_check: &mut Option<HashCheck>,
    observer: &mut O,
  ) -> Result<(), StepFailure> {
    let component = spec.component;
    let version = &spec.target_version;

    observer.step_started(component, "fetch");
    let url = component.archive_url(version);
    let bytes = self
      .fetcher
      .fetch(&url)
      .await
      .map_err(|e| StepFailure::new("fetch", e.to_string()))?;

    observer.step_started(component, "verify");
    let check = check_hash(spec.expected_hash.as_deref(), &bytes);
    if let HashCheck::Mismatch { expected, actual } = &check {
      warn!(component = %component, expected = %expected, actual = %actual, "archive hash mismatch, continuing");
    }
    observer.hash_checked(component, &check);
    *hash_check = Some(check);

    observer.step_started(component, "extract");
    let downloads = self.work_dir.join("downloads");
    let archive = downloads.join(url_to_filename(&url));
    let source_dir = self.work_dir.join(format!("{component}-{version}"));
    fs::create_dir_all(&downloads).map_err(|e| StepFailure::new("extract", e.to_string()))?;
    fs::write(&archive, &bytes).map_err(|e| StepFailure::new("extract", e.to_string()))?;
    unpack_tar_gz(&archive, &source_dir).map_err(|e| StepFailure::new("extract", e.to_string()))?;

    let mut steps = recipe(component, &source_dir, self.config);
    steps.push(ldconfig());
    for step in &steps {
      observer.step_started(component, step.name);
      self.run_step(step).await?;
    }

    if self.probe.installed_version(component).await.is_none() {
      return Err(StepFailure::new("install", "expected output missing after install"));
    }

    Ok(())
  }

  async fn run_step(&self, step: &RecipeStep) -> Result<(), StepFailure> {
    let output = self
      .runner
      .run(&step.command)
      .await
      .map_err(|e| StepFailure::new(step.name, e.to_string()))?;

    if !output.success() {
      let detail = format!(
        "`{}` exited with {}\n{}",
        step.command,
        output.code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
        output.tail(FAILURE_TAIL_LINES)
      );
      return Err(StepFailure::new(step.name, detail));
    }
    Ok(())
  }
}
