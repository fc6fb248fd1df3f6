//! Dotted numeric versions.
//!
//! Versions have one to four numeric segments; missing segments compare as
//! zero, so `1.2` equals `1.2.0.0`. Anything from the first character that is
//! neither a digit nor a dot onwards is a revision suffix and is ignored for
//! ordering: `7.1.0-15` orders equal to `7.1.0`.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::component::Component;

const MAX_SEGMENTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
  #[error("malformed version '{input}': {reason}")]
  MalformedVersion { input: String, reason: String },
}

fn is_target_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | '-')
}

/// A parsed version, compared numerically segment by segment.
#[derive(Debug, Clone, Copy)]
pub struct Version {
  segments: [u64; MAX_SEGMENTS],
  len: usize,
}

impl Version {
  /// Build a version from explicit segments (at most four are kept).
  pub fn from_segments(segments: &[u64]) -> Self {
    let len = segments.len().clamp(1, MAX_SEGMENTS);
    let mut out = [0; MAX_SEGMENTS];
    for (slot, value) in out.iter_mut().zip(segments) {
      *slot = *value;
    }
    Self { segments: out, len }
  }

  /// Parse a version string, ignoring a leading `v` and any revision suffix.
  pub fn parse(input: &str) -> Result<Self, VersionError> {
    let malformed = |reason: &str| VersionError::MalformedVersion {
      input: input.to_string(),
      reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    let end = trimmed
      .find(|c: char| !(c.is_ascii_digit() || c == '.'))
      .unwrap_or(trimmed.len());
    let numeric = &trimmed[..end];

    if numeric.is_empty() {
      return Err(malformed("no numeric segments"));
    }

    let parts: Vec<&str> = numeric.split('.').collect();
    if parts.len() > MAX_SEGMENTS {
      return Err(malformed("more than four segments"));
    }

    let mut segments = [0; MAX_SEGMENTS];
    for (slot, part) in segments.iter_mut().zip(&parts) {
      if part.is_empty() {
        return Err(malformed("empty segment"));
      }
      *slot = part.parse().map_err(|_| malformed("segment out of range"))?;
    }

    Ok(Self {
      segments,
      len: parts.len(),
    })
  }

  /// Parse a version that will name files and URLs. On top of [`Version::parse`],
  /// the whole string, suffix included, may only use `[0-9A-Za-z.+~-]`.
  pub fn parse_target(input: &str) -> Result<Self, VersionError> {
    if let Some(c) = input.chars().find(|c| !is_target_char(*c)) {
      return Err(VersionError::MalformedVersion {
        input: input.to_string(),
        reason: format!("unexpected character {c:?}"),
      });
    }
    Self::parse(input)
  }

  pub fn segments(&self) -> &[u64] {
    &self.segments[..self.len]
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.segments == other.segments
  }
}

impl Eq for Version {}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    self.segments.cmp(&other.segments)
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text: Vec<String> = self.segments().iter().map(u64::to_string).collect();
    write!(f, "{}", text.join("."))
  }
}

impl std::str::FromStr for Version {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

/// Compare two version strings.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
  Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

/// Everything known about one component's versions for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSpec {
  pub component: Component,
  /// Version to build; never empty once resolved.
  pub target_version: String,
  /// Expected archive digest, when the manifest provides one.
  pub expected_hash: Option<String>,
  /// Version currently on the host, `None` when not installed.
  pub installed_version: Option<String>,
}
