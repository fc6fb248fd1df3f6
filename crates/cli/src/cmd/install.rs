//! Implementation of the `imbuild` run.
//!
//! Turns parsed arguments into a `RunConfig`, performs the host checks that
//! must pass before anything is fetched, then drives the library run on a
//! single-threaded runtime until it finishes or Ctrl-C arrives.

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use imbuild_lib::exec::{BuildLog, SystemRunner};
use imbuild_lib::fetch::{HashCheck, HttpFetcher};
use imbuild_lib::preflight::{check_os, check_root};
use imbuild_lib::probe::SystemProbe;
use imbuild_lib::version::VersionSpec;
use imbuild_lib::{
  BuildDecision, Component, ComponentOptions, Error, ImageMagickOptions, PipelineObserver, RunConfig, RunReport,
  StageOutcome, StageResult, run,
};

use crate::Cli;
use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning,
  symbols, truncate_hash,
};

/// Execute a full run and report the outcome.
///
/// Returns `ExitCode::FAILURE` after printing context for any fatal run
/// error; `Err` is reserved for failures outside the run itself.
pub fn cmd_install(cli: &Cli) -> Result<ExitCode> {
  let config = run_config(cli)?;
  let started = Instant::now();

  if !config.dry_run {
    check_root()?;
  }
  check_os(&cli.os_release)?;

  // Dry runs never write the build log
  let runner = if config.dry_run {
    SystemRunner::unlogged()
  } else {
    let log = BuildLog::create(&config.log_file)?;
    debug!(path = %log.path().display(), "build log created");
    SystemRunner::new(log)
  };
  let fetcher = HttpFetcher::new();
  let probe = SystemProbe::new(&config.prefix, &runner);
  let mut progress = Progress::new(cli.output);

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;

  let result = rt.block_on(async {
    tokio::select! {
      result = run(&config, &fetcher, &runner, &probe, &mut progress) => result,
      _ = tokio::signal::ctrl_c() => Err(Error::Interrupted),
    }
  });

  match result {
    Ok(report) => {
      if cli.output.is_json() {
        print_json(&report)?;
      } else {
        print_summary(&report, started);
      }
      Ok(ExitCode::SUCCESS)
    }
    Err(err) => {
      print_error(&err.to_string());
      if !config.dry_run {
        print_info(&format!("Build log: {}", config.log_file.display()));
      }
      Ok(ExitCode::FAILURE)
    }
  }
}

fn run_config(cli: &Cli) -> Result<RunConfig> {
  let overrides = [
    (Component::Aom, &cli.aom_version, cli.skip_aom),
    (Component::Libheif, &cli.libheif_version, cli.skip_libheif),
    (Component::JpegXl, &cli.jpegxl_version, cli.skip_jpegxl),
    (Component::ImageMagick, &cli.imagemagick_version, cli.skip_imagemagick),
  ];
  let components: BTreeMap<Component, ComponentOptions> = overrides
    .into_iter()
    .map(|(component, version, skip)| {
      (
        component,
        ComponentOptions {
          version: version.clone(),
          skip,
        },
      )
    })
    .collect();

  let defaults = RunConfig::default();
  Ok(RunConfig {
    force: cli.force,
    components,
    imagemagick: ImageMagickOptions {
      quantum_depth: cli.imagemagick_quantum_depth,
      opencl: cli.imagemagick_opencl,
      static_build: cli.imagemagick_static,
    },
    skip_dependencies: cli.skip_dependencies,
    ci: cli.ci,
    dry_run: cli.dry_run,
    verify_signature: !cli.no_sig_verify,
    log_file: cli.log_file.clone(),
    work_dir: cli.work_dir.clone(),
    prefix: cli.prefix.clone(),
    manifest_url: cli.manifest_url.clone(),
    installer_path: std::env::current_exe().context("Failed to locate the running installer")?,
    jobs: cli.jobs.unwrap_or(defaults.jobs).max(1),
  })
}

/// Per-stage progress lines; silent in JSON mode.
struct Progress {
  format: OutputFormat,
}

impl Progress {
  fn new(format: OutputFormat) -> Self {
    Self { format }
  }

  fn quiet(&self) -> bool {
    self.format.is_json()
  }
}

impl PipelineObserver for Progress {
  fn stage_started(&mut self, component: Component, decision: &BuildDecision, spec: Option<&VersionSpec>) {
    if self.quiet() {
      return;
    }
    let version = spec.map(|s| s.target_version.as_str()).unwrap_or("-");
    match decision {
      BuildDecision::Skip(reason) => print_info(&format!("{component} {version}: skipped ({reason})")),
      BuildDecision::Build => print_info(&format!("{component} {version}: building")),
    }
  }

  fn step_started(&mut self, component: Component, step: &str) {
    debug!(component = %component, step = %step, "step");
  }

  fn hash_checked(&mut self, component: Component, check: &HashCheck) {
    if self.quiet() {
      return;
    }
    if let HashCheck::Mismatch { expected, actual } = check {
      print_warning(&format!(
        "{component}: archive hash mismatch (expected {}, got {}), continuing",
        truncate_hash(expected),
        truncate_hash(actual)
      ));
    }
  }

  fn stage_finished(&mut self, result: &StageResult) {
    if self.quiet() {
      return;
    }
    match &result.outcome {
      StageOutcome::Succeeded => print_success(&format!("{} installed", result.component)),
      StageOutcome::Failed { step, .. } => print_error(&format!("{} failed during {step}", result.component)),
      StageOutcome::Skipped => {}
    }
  }
}

fn print_summary(report: &RunReport, started: Instant) {
  println!();

  if report.dry_run {
    println!("Plan:");
    for stage in &report.plan {
      let version = stage.spec.as_ref().map(|s| s.target_version.as_str()).unwrap_or("-");
      let installed = stage
        .spec
        .as_ref()
        .and_then(|s| s.installed_version.as_deref())
        .unwrap_or("none");
      let action = match stage.decision {
        BuildDecision::Build => format!("{} build", symbols::ARROW),
        BuildDecision::Skip(reason) => format!("{} skip ({reason})", symbols::INFO),
      };
      println!("  {action} {} {version} (installed: {installed})", stage.component);
    }
  } else {
    println!("Summary:");
    for stage in &report.stages {
      let version = stage.spec.as_ref().map(|s| s.target_version.as_str()).unwrap_or("-");
      let marker = match stage.outcome {
        StageOutcome::Succeeded => symbols::SUCCESS,
        StageOutcome::Skipped => symbols::INFO,
        StageOutcome::Failed { .. } => symbols::ERROR,
      };
      println!("  {marker} {} {version}: {}", stage.component, stage.outcome);
    }
    print_stat("Built", &report.built().count().to_string());
  }

  print_stat("Duration", &format_duration(started.elapsed()));

  if let Some(verification) = &report.verification {
    println!();
    if verification.success {
      print_success(&format!("ImageMagick {} is installed", verification.expected));
    } else {
      print_warning(&format!(
        "ImageMagick reports {}, expected {}",
        verification.reported.as_deref().unwrap_or("nothing"),
        verification.expected
      ));
    }
  }

  if let Some(latest) = &report.update_available {
    print_info(&format!(
      "imbuild {latest} is available (running {})",
      env!("CARGO_PKG_VERSION")
    ));
  }
}
