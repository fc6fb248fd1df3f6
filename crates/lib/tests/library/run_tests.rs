use imbuild_lib::fetch::HttpFetcher;
use imbuild_lib::{BuildDecision, Component, ComponentOptions, Error, SkipReason, StageOutcome, run};
use tempfile::TempDir;

use super::common::*;

#[tokio::test]
async fn up_to_date_host_builds_nothing_and_verifies() {
  let mut server = mockito::Server::new_async().await;
  let installer = SignedInstaller::new();
  let _mocks = serve_manifest(&mut server, &installer).await;
  let work = TempDir::new().unwrap();
  let config = config(&server, &installer, work.path());
  let host = ScriptedHost::up_to_date();

  let report = run(&config, &HttpFetcher::new(), &host, &host, &mut ()).await.unwrap();

  assert!(report.signature_verified);
  assert_eq!(report.stages.len(), 4);
  assert!(report.stages.iter().all(|s| s.outcome == StageOutcome::Skipped));
  assert!(report.verification.as_ref().unwrap().success);
  // only prerequisites ran: CI mode installs packages without refreshing the index
  assert_eq!(host.programs(), vec!["apt-get"]);
  // the scoped build directory is gone
  assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn bad_signature_stops_before_any_command() {
  let mut server = mockito::Server::new_async().await;
  let installer = SignedInstaller::new();
  let _mocks = serve_manifest(&mut server, &installer).await;
  std::fs::write(installer.path(), b"tampered installer").unwrap();
  let work = TempDir::new().unwrap();
  let config = config(&server, &installer, work.path());
  let host = ScriptedHost::default();

  let result = run(&config, &HttpFetcher::new(), &host, &host, &mut ()).await;

  assert!(matches!(result, Err(Error::IntegrityCheckFailed(_))));
  assert!(host.programs().is_empty());
}

#[tokio::test]
async fn disabled_signature_check_skips_the_gate() {
  let mut server = mockito::Server::new_async().await;
  let installer = SignedInstaller::new();
  let _mocks = serve_manifest(&mut server, &installer).await;
  std::fs::write(installer.path(), b"tampered installer").unwrap();
  let work = TempDir::new().unwrap();
  let mut config = config(&server, &installer, work.path());
  config.verify_signature = false;
  config.skip_dependencies = true;
  let host = ScriptedHost::up_to_date();

  let report = run(&config, &HttpFetcher::new(), &host, &host, &mut ()).await.unwrap();

  assert!(!report.signature_verified);
  assert!(host.programs().is_empty());
}

#[tokio::test]
async fn unresolvable_version_is_fatal() {
  let mut server = mockito::Server::new_async().await;
  let installer = SignedInstaller::new();
  let _sig = server
    .mock("GET", "/imbuild/imbuild.sig")
    .with_body(installer.signature())
    .create_async()
    .await;
  let _key = server
    .mock("GET", "/imbuild/public.pem")
    .with_body(installer.public_key_hex())
    .create_async()
    .await;
  let work = TempDir::new().unwrap();
  let config = config(&server, &installer, work.path());
  let host = ScriptedHost::default();

  let result = run(&config, &HttpFetcher::new(), &host, &host, &mut ()).await;

  assert!(matches!(
    result,
    Err(Error::VersionUnresolved {
      component: Component::Aom,
      ..
    })
  ));
  assert!(host.programs().is_empty());
}

#[tokio::test]
async fn dry_run_plans_without_running_commands() {
  let mut server = mockito::Server::new_async().await;
  let installer = SignedInstaller::new();
  let _mocks = serve_manifest(&mut server, &installer).await;
  let work = TempDir::new().unwrap();
  let mut config = config(&server, &installer, work.path());
  config.dry_run = true;
  config.components.insert(
    Component::JpegXl,
    ComponentOptions {
      version: None,
      skip: true,
    },
  );
  let host = ScriptedHost::default();

  let report = run(&config, &HttpFetcher::new(), &host, &host, &mut ()).await.unwrap();

  let decisions: Vec<_> = report.plan.iter().map(|p| (p.component, p.decision)).collect();
  assert_eq!(
    decisions,
    vec![
      (Component::Aom, BuildDecision::Build),
      (Component::Libheif, BuildDecision::Build),
      (Component::JpegXl, BuildDecision::Skip(SkipReason::UserForcedSkip)),
      (Component::ImageMagick, BuildDecision::Build),
    ]
  );
  assert!(report.stages.is_empty());
  assert!(host.programs().is_empty());
}
