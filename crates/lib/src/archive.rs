//! Source archive extraction.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component as PathComponent, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("failed to read archive {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("archive entry escapes destination: {0}")]
  UnsafeEntry(PathBuf),

  #[error("archive {0} contained no files")]
  Empty(PathBuf),
}

/// Unpack a `.tar.gz` into `dest`, stripping the single top-level directory.
pub fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let read_err = |source| ArchiveError::Read {
    path: archive_path.to_path_buf(),
    source,
  };

  fs::create_dir_all(dest).map_err(read_err)?;

  let file = File::open(archive_path).map_err(read_err)?;
  let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
  let mut unpacked = 0usize;

  for entry in archive.entries().map_err(read_err)? {
    let mut entry = entry.map_err(read_err)?;
    let path = entry.path().map_err(read_err)?.into_owned();

    // Strip the first component (e.g. libheif-1.17.6/)
    let stripped: PathBuf = path.components().skip(1).collect();

    if stripped.as_os_str().is_empty() {
      continue;
    }

    if stripped.components().any(|c| !matches!(c, PathComponent::Normal(_))) {
      return Err(ArchiveError::UnsafeEntry(path));
    }

    let dest_path = dest.join(&stripped);

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent).map_err(read_err)?;
    }

    entry.unpack(&dest_path).map_err(read_err)?;
    unpacked += 1;
  }

  if unpacked == 0 {
    return Err(ArchiveError::Empty(archive_path.to_path_buf()));
  }

  info!(archive = %archive_path.display(), dest = %dest.display(), entries = unpacked, "unpacked archive");
  Ok(())
}
