//! Post-pipeline installation check.

use tracing::{info, warn};

use crate::component::Component;
use crate::probe::HostProbe;

/// Result of re-running the primary tool after the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Verification {
  pub expected: String,
  pub reported: Option<String>,
  pub success: bool,
}

/// Check that ImageMagick is installed and reports `expected`.
///
/// Only informs the final report; nothing is retried or rolled back.
pub async fn verify_installation<P: HostProbe>(probe: &P, expected: &str) -> Verification {
  let reported = probe.installed_version(Component::ImageMagick).await;
  let success = reported.as_deref().is_some_and(|v| v.contains(expected));

  if success {
    info!(version = %expected, "installation verified");
  } else {
    warn!(expected = %expected, reported = ?reported, "installation verification failed");
  }

  Verification {
    expected: expected.to_string(),
    reported,
    success,
  }
}
