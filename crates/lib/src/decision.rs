//! Build-or-skip decisions.
//!
//! `decide` is a pure function of its input; the same input always yields the
//! same decision. Precedence, first match wins:
//! 1. skip flag (unless forced)
//! 2. missing hard dependency
//! 3. toolchain below the component's minimum
//! 4. force flag or a rebuilt upstream component
//! 5. installed version compared with the target

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
  UserForcedSkip,
  AlreadyUpToDate,
  MissingHardDependency,
  InsufficientToolchainVersion,
}

impl SkipReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::UserForcedSkip => "user-forced-skip",
      Self::AlreadyUpToDate => "already-up-to-date",
      Self::MissingHardDependency => "missing-hard-dependency",
      Self::InsufficientToolchainVersion => "insufficient-toolchain-version",
    }
  }
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "kebab-case")]
pub enum BuildDecision {
  Skip(SkipReason),
  Build,
}

impl BuildDecision {
  pub fn is_build(&self) -> bool {
    matches!(self, BuildDecision::Build)
  }
}

/// Everything a stage decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionInput<'a> {
  pub installed: Option<&'a str>,
  pub target: &'a str,
  pub force: bool,
  pub skip: bool,
  /// Every hard dependency is installed.
  pub dependency_satisfied: bool,
  /// A component this one links against was rebuilt during this run.
  pub upstream_changed: bool,
  /// The host toolchain meets the component's minimum, if it has one.
  pub toolchain_ok: bool,
}

pub fn decide(input: &DecisionInput<'_>) -> BuildDecision {
  if input.skip && !input.force {
    return BuildDecision::Skip(SkipReason::UserForcedSkip);
  }
  if !input.dependency_satisfied {
    return BuildDecision::Skip(SkipReason::MissingHardDependency);
  }
  if !input.toolchain_ok {
    return BuildDecision::Skip(SkipReason::InsufficientToolchainVersion);
  }
  if input.force || input.upstream_changed {
    return BuildDecision::Build;
  }

  let Some(installed) = input.installed else {
    return BuildDecision::Build;
  };

  let target = match Version::parse(input.target) {
    Ok(v) => v,
    Err(e) => {
      warn!(error = %e, "unparseable target version, building");
      return BuildDecision::Build;
    }
  };
  match Version::parse(installed) {
    Ok(current) if current.cmp(&target) != Ordering::Less => BuildDecision::Skip(SkipReason::AlreadyUpToDate),
    Ok(_) => BuildDecision::Build,
    Err(e) => {
      warn!(error = %e, "unparseable installed version, rebuilding");
      BuildDecision::Build
    }
  }
}

/// Whether `found` satisfies an optional minimum toolchain version.
pub fn toolchain_satisfies(minimum: Option<Version>, found: Option<Version>) -> bool {
  match (minimum, found) {
    (None, _) => true,
    (Some(min), Some(found)) => found >= min,
    (Some(_), None) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn input<'a>(installed: Option<&'a str>, target: &'a str) -> DecisionInput<'a> {
    DecisionInput {
      installed,
      target,
      force: false,
      skip: false,
      dependency_satisfied: true,
      upstream_changed: false,
      toolchain_ok: true,
    }
  }

  #[test]
  fn up_to_date_is_skipped() {
    assert_eq!(
      decide(&input(Some("3.6.0"), "3.6.0")),
      BuildDecision::Skip(SkipReason::AlreadyUpToDate)
    );
    assert_eq!(
      decide(&input(Some("3.7.0"), "3.6.0")),
      BuildDecision::Skip(SkipReason::AlreadyUpToDate)
    );
  }

  #[test]
  fn older_or_missing_is_built() {
    assert_eq!(decide(&input(Some("7.1.0"), "7.1.1")), BuildDecision::Build);
    assert_eq!(decide(&input(None, "7.1.1")), BuildDecision::Build);
  }

  #[test]
  fn revision_suffix_on_installed_counts_as_equal() {
    assert_eq!(
      decide(&input(Some("7.1.1-15"), "7.1.1")),
      BuildDecision::Skip(SkipReason::AlreadyUpToDate)
    );
  }

  #[test]
  fn skip_flag_wins_over_version_state() {
    for installed in [None, Some("1.0.0"), Some("99.0.0")] {
      let decision = decide(&DecisionInput {
        skip: true,
        ..input(installed, "1.17.6")
      });
      assert_eq!(decision, BuildDecision::Skip(SkipReason::UserForcedSkip));
    }
  }

  #[test]
  fn missing_dependency_blocks_even_forced_builds() {
    let decision = decide(&DecisionInput {
      force: true,
      dependency_satisfied: false,
      ..input(None, "1.17.6")
    });
    assert_eq!(decision, BuildDecision::Skip(SkipReason::MissingHardDependency));
  }

  #[test]
  fn missing_dependency_reported_before_toolchain() {
    let decision = decide(&DecisionInput {
      dependency_satisfied: false,
      toolchain_ok: false,
      ..input(None, "1.17.6")
    });
    assert_eq!(decision, BuildDecision::Skip(SkipReason::MissingHardDependency));
  }

  #[test]
  fn old_toolchain_is_skipped() {
    let decision = decide(&DecisionInput {
      toolchain_ok: false,
      ..input(None, "0.9.0")
    });
    assert_eq!(decision, BuildDecision::Skip(SkipReason::InsufficientToolchainVersion));
  }

  #[test]
  fn upstream_change_forces_rebuild() {
    let decision = decide(&DecisionInput {
      upstream_changed: true,
      ..input(Some("1.17.6"), "1.17.6")
    });
    assert_eq!(decision, BuildDecision::Build);
  }

  #[test]
  fn unparseable_installed_version_rebuilds() {
    assert_eq!(decide(&input(Some("garbage"), "3.8.0")), BuildDecision::Build);
  }

  #[test]
  fn toolchain_minimums() {
    let min = Some(Version::from_segments(&[3, 16]));
    assert!(toolchain_satisfies(None, None));
    assert!(toolchain_satisfies(min, Some(Version::from_segments(&[3, 25, 1]))));
    assert!(!toolchain_satisfies(min, Some(Version::from_segments(&[3, 13]))));
    assert!(!toolchain_satisfies(min, None));
  }

  fn any_installed() -> impl Strategy<Value = Option<String>> {
    prop::option::of((0u64..20, 0u64..20).prop_map(|(a, b)| format!("{a}.{b}")))
  }

  proptest! {
    #[test]
    fn force_always_builds(
      installed in any_installed(),
      target in (0u64..20, 0u64..20).prop_map(|(a, b)| format!("{a}.{b}")),
      skip: bool,
      upstream: bool,
    ) {
      let decision = decide(&DecisionInput {
        force: true,
        skip,
        upstream_changed: upstream,
        ..input(installed.as_deref(), &target)
      });
      prop_assert_eq!(decision, BuildDecision::Build);
    }

    #[test]
    fn decision_is_deterministic(
      installed in any_installed(),
      force: bool,
      skip: bool,
      dep: bool,
      upstream: bool,
      toolchain: bool,
    ) {
      let di = DecisionInput {
        installed: installed.as_deref(),
        target: "5.5",
        force,
        skip,
        dependency_satisfied: dep,
        upstream_changed: upstream,
        toolchain_ok: toolchain,
      };
      prop_assert_eq!(decide(&di), decide(&di));
    }
  }
}
