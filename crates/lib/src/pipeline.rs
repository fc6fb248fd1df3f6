//! Sequential, fail-fast build pipeline.
//!
//! Stages run strictly one after another in `Component::ALL` order. Each
//! decision is taken only after every earlier stage is terminal, because it
//! reads host state those stages may have changed. The first failed stage
//! halts the pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::component::Component;
use crate::config::RunConfig;
use crate::decision::{BuildDecision, DecisionInput, SkipReason, decide, toolchain_satisfies};
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use crate::fetch::{Fetcher, HashCheck};
use crate::oracle::{OracleError, ResolvedTarget};
use crate::probe::HostProbe;
use crate::stage::{BuildStage, StageOutcome, StageResult, StageState};
use crate::version::VersionSpec;

/// Receives progress as the pipeline runs.
pub trait PipelineObserver {
  fn state_changed(&mut self, _component: Component, _state: StageState) {}
  fn stage_started(&mut self, _component: Component, _decision: &BuildDecision, _spec: Option<&VersionSpec>) {}
  fn step_started(&mut self, _component: Component, _step: &str) {}
  fn hash_checked(&mut self, _component: Component, _check: &HashCheck) {}
  fn stage_finished(&mut self, _result: &StageResult) {}
}

impl PipelineObserver for () {}

/// Decision for one stage in a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
  pub component: Component,
  pub spec: Option<VersionSpec>,
  pub decision: BuildDecision,
}

pub struct Pipeline<'a, F, R, P> {
  config: &'a RunConfig,
  fetcher: &'a F,
  runner: &'a R,
  probe: &'a P,
  targets: &'a BTreeMap<Component, ResolvedTarget>,
}

impl<'a, F: Fetcher, R: CommandRunner, P: HostProbe> Pipeline<'a, F, R, P> {
  pub fn new(
    config: &'a RunConfig,
    fetcher: &'a F,
    runner: &'a R,
    probe: &'a P,
    targets: &'a BTreeMap<Component, ResolvedTarget>,
  ) -> Self {
    Self {
      config,
      fetcher,
      runner,
      probe,
      targets,
    }
  }

  /// Run every stage, building into `work_dir`.
  ///
  /// Returns all stage results on success, or `Error::StageFailed` for the
  /// first stage that failed; later stages are never entered.
  pub async fn run<O: PipelineObserver>(&self, work_dir: &Path, observer: &mut O) -> Result<Vec<StageResult>> {
    let mut results: Vec<StageResult> = Vec::with_capacity(Component::ALL.len());

    for component in Component::ALL {
      transition(observer, component, StageState::Pending);
      let changed = |dep: Component| results.iter().any(|r| r.component == dep && r.succeeded());
      let (spec, decision) = self.evaluate(component, changed, |_| false).await?;
      observer.stage_started(component, &decision, spec.as_ref());

      let result = match (decision, spec) {
        (BuildDecision::Build, Some(spec)) => {
          transition(observer, component, StageState::Building);
          let stage = BuildStage {
            config: self.config,
            fetcher: self.fetcher,
            runner: self.runner,
            probe: self.probe,
            work_dir,
          };
          stage.build(spec, observer).await
        }
        (decision, spec) => {
          info!(component = %component, decision = ?decision, "skipping");
          StageResult::skipped(component, spec, decision)
        }
      };
      transition(observer, component, result.outcome.state());
      observer.stage_finished(&result);

      if let StageOutcome::Failed { step, detail } = &result.outcome {
        return Err(Error::StageFailed {
          component,
          step: step.clone(),
          detail: detail.clone(),
        });
      }
      results.push(result);
    }

    info!(
      built = results.iter().filter(|r| r.succeeded()).count(),
      skipped = results.iter().filter(|r| r.outcome == StageOutcome::Skipped).count(),
      "pipeline complete"
    );
    Ok(results)
  }

  /// Decide every stage without building, assuming planned builds succeed.
  pub async fn plan(&self) -> Result<Vec<PlannedStage>> {
    let mut planned: Vec<PlannedStage> = Vec::with_capacity(Component::ALL.len());

    for component in Component::ALL {
      let will_build = |dep: Component| planned.iter().any(|p| p.component == dep && p.decision.is_build());
      let (spec, decision) = self.evaluate(component, will_build, will_build).await?;
      planned.push(PlannedStage {
        component,
        spec,
        decision,
      });
    }

    Ok(planned)
  }

  /// Gather decision inputs for `component` from config and fresh host state.
  ///
  /// `upstream_changed(dep)` reports whether `dep` was (or will be) rebuilt;
  /// `assume_installed(dep)` lets a dry run treat planned builds as installed.
  async fn evaluate(
    &self,
    component: Component,
    upstream_changed: impl Fn(Component) -> bool,
    assume_installed: impl Fn(Component) -> bool,
  ) -> Result<(Option<VersionSpec>, BuildDecision)> {
    let options = self.config.component(component);
    let force = self.config.force;

    let Some(target) = self.targets.get(&component) else {
      if options.skip && !force {
        return Ok((None, BuildDecision::Skip(SkipReason::UserForcedSkip)));
      }
      return Err(Error::VersionUnresolved {
        component,
        source: OracleError::Empty,
      });
    };

    let installed = self.probe.installed_version(component).await;

    let mut dependency_satisfied = true;
    for dep in component.hard_dependencies() {
      if !assume_installed(*dep) && self.probe.installed_version(*dep).await.is_none() {
        debug!(component = %component, dependency = %dep, "hard dependency not installed");
        dependency_satisfied = false;
      }
    }

    let toolchain_ok = match component.min_cmake() {
      Some(min) => toolchain_satisfies(Some(min), self.probe.toolchain_version().await),
      None => true,
    };

    let upstream = component.links_against().iter().any(|dep| upstream_changed(*dep));

    let decision = decide(&DecisionInput {
      installed: installed.as_deref(),
      target: &target.version,
      force,
      skip: options.skip,
      dependency_satisfied,
      upstream_changed: upstream,
      toolchain_ok,
    });
    debug!(component = %component, installed = ?installed, target = %target.version, decision = ?decision, "decided");

    let spec = VersionSpec {
      component,
      target_version: target.version.clone(),
      expected_hash: target.hash.clone(),
      installed_version: installed,
    };
    Ok((Some(spec), decision))
  }
}

fn transition<O: PipelineObserver>(observer: &mut O, component: Component, state: StageState) {
  debug!(component = %component, state = ?state, "stage state");
  observer.state_changed(component, state);
}
