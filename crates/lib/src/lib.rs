//! imbuild-lib: build orchestration for ImageMagick and its codec libraries.
//!
//! This crate decides which of the four components need (re)building on a
//! Debian-family host and drives their builds in dependency order:
//! - `Component`: the fixed set of components and their build order
//! - `Version`: dotted numeric versions and their total order
//! - `VersionOracle`: target versions and archive hashes from the remote manifest
//! - `IntegrityVerifier`: signature gate over the running installer
//! - `Pipeline`: sequential, fail-fast execution of the build stages
//! - `installer::run`: the whole run, from the integrity gate to final verification

pub mod archive;
pub mod component;
pub mod config;
pub mod consts;
pub mod decision;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod installer;
pub mod integrity;
pub mod oracle;
pub mod pipeline;
pub mod preflight;
pub mod probe;
pub mod recipe;
pub mod stage;
pub mod verify;
pub mod version;

#[cfg(test)]
pub mod testutil;

pub use component::Component;
pub use config::{ComponentOptions, ImageMagickOptions, RunConfig};
pub use decision::{BuildDecision, DecisionInput, SkipReason, decide};
pub use error::{Error, Result};
pub use installer::{RunReport, run};
pub use pipeline::{Pipeline, PipelineObserver};
pub use stage::{StageOutcome, StageResult};
pub use version::{Version, VersionError, VersionSpec, compare_versions};
