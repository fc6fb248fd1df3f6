//! The four components and their fixed relationships.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// A component built by the pipeline.
///
/// Variants are declared in build order; `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
  Aom,
  Libheif,
  JpegXl,
  #[serde(rename = "imagemagick")]
  ImageMagick,
}

impl Component {
  /// All components in build order.
  pub const ALL: [Component; 4] = [
    Component::Aom,
    Component::Libheif,
    Component::JpegXl,
    Component::ImageMagick,
  ];

  /// The manifest / CLI identifier.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Aom => "aom",
      Self::Libheif => "libheif",
      Self::JpegXl => "jpeg-xl",
      Self::ImageMagick => "imagemagick",
    }
  }

  /// Zero-based position in the build order.
  pub fn position(&self) -> usize {
    *self as usize
  }

  /// Source archive for `version`.
  pub fn archive_url(&self, version: &str) -> String {
    match self {
      Self::Aom => format!("https://storage.googleapis.com/aom-releases/libaom-{version}.tar.gz"),
      Self::Libheif => {
        format!("https://github.com/strukturag/libheif/releases/download/v{version}/libheif-{version}.tar.gz")
      }
      Self::JpegXl => format!("https://github.com/libjxl/libjxl/archive/refs/tags/v{version}.tar.gz"),
      Self::ImageMagick => format!("https://github.com/ImageMagick/ImageMagick/archive/refs/tags/{version}.tar.gz"),
    }
  }

  /// Components that must already be installed before this one can build.
  pub fn hard_dependencies(&self) -> &'static [Component] {
    match self {
      Self::Libheif => &[Component::Aom],
      _ => &[],
    }
  }

  /// Components whose rebuild invalidates this one's installed build.
  pub fn links_against(&self) -> &'static [Component] {
    match self {
      Self::Aom | Self::JpegXl => &[],
      Self::Libheif => &[Component::Aom],
      Self::ImageMagick => &[Component::Aom, Component::Libheif, Component::JpegXl],
    }
  }

  /// Minimum cmake version needed to build this component, if it uses cmake.
  pub fn min_cmake(&self) -> Option<Version> {
    match self {
      Self::Aom => Some(Version::from_segments(&[3, 9])),
      Self::Libheif => Some(Version::from_segments(&[3, 16])),
      Self::JpegXl => Some(Version::from_segments(&[3, 10])),
      Self::ImageMagick => None,
    }
  }

  /// Shared library name whose symlink target reveals the installed version.
  pub fn library_name(&self) -> Option<&'static str> {
    match self {
      Self::Aom => Some("libaom.so"),
      Self::Libheif => Some("libheif.so"),
      Self::JpegXl => Some("libjxl.so"),
      Self::ImageMagick => None,
    }
  }
}

impl fmt::Display for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn build_order_is_fixed() {
    let names: Vec<_> = Component::ALL.iter().map(|c| c.as_str()).collect();
    assert_eq!(names, vec!["aom", "libheif", "jpeg-xl", "imagemagick"]);
    for (idx, component) in Component::ALL.iter().enumerate() {
      assert_eq!(component.position(), idx);
    }
  }

  #[test]
  fn dependencies_point_upstream() {
    // Anything a component depends on must be built before it
    for component in Component::ALL {
      for dep in component.hard_dependencies().iter().chain(component.links_against()) {
        assert!(dep < &component, "{dep} must precede {component}");
      }
    }
  }

  #[test]
  fn only_libheif_has_a_hard_dependency() {
    assert_eq!(Component::Libheif.hard_dependencies(), &[Component::Aom]);
    assert!(Component::ImageMagick.hard_dependencies().is_empty());
  }

  #[test]
  fn archive_url_embeds_version() {
    assert_eq!(
      Component::ImageMagick.archive_url("7.1.1-15"),
      "https://github.com/ImageMagick/ImageMagick/archive/refs/tags/7.1.1-15.tar.gz"
    );
    assert!(Component::Libheif.archive_url("1.17.6").ends_with("/v1.17.6/libheif-1.17.6.tar.gz"));
  }

  #[test]
  fn serializes_as_identifier() {
    for component in Component::ALL {
      assert_eq!(serde_json::to_string(&component).unwrap(), format!("\"{}\"", component.as_str()));
    }
  }
}
