//! Top-level error taxonomy for a run.
//!
//! Every variant is fatal: the run stops and the process exits non-zero.
//! Archive hash mismatches and a failed final verification are not errors;
//! they are recorded on the stage result and the run report respectively.

use thiserror::Error;

use crate::component::Component;
use crate::integrity::IntegrityError;
use crate::oracle::OracleError;
use crate::preflight::PreflightError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// Not root, unsupported OS, missing host tools, or prerequisites failed.
  #[error("precondition failed: {0}")]
  PreconditionFailed(#[from] PreflightError),

  /// The installer's own signature did not verify.
  #[error("integrity check failed: {0}")]
  IntegrityCheckFailed(#[from] IntegrityError),

  /// No target version could be determined for a component.
  #[error("could not resolve target version for {component}: {source}")]
  VersionUnresolved {
    component: Component,
    #[source]
    source: OracleError,
  },

  /// A build step of a component failed.
  #[error("{component} failed during {step}: {detail}")]
  StageFailed {
    component: Component,
    step: String,
    detail: String,
  },

  /// The run was interrupted before reaching a terminal state.
  #[error("interrupted")]
  Interrupted,

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
