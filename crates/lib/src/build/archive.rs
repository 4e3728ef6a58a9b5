//! Filesystem steps of the build: bytecode cleaning, archive writing and
//! header injection.
//!
//! Archives contain regular files only, sorted by member name, each stamped
//! with the fixed archive epoch (1980-01-01) so that rebuilding an unchanged
//! tree produces the same member list and data.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::consts::{APP_NAME, BYTECODE_EXTENSION};
use crate::ignore::IgnoreSet;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("failed to traverse {}: {source}", path.display())]
  Walk { path: PathBuf, source: walkdir::Error },

  #[error("failed to remove {}: {source}", path.display())]
  Remove { path: PathBuf, source: io::Error },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to write archive {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },

  #[error("failed to add {member} to archive: {source}")]
  Member { member: String, source: zip::result::ZipError },

  #[error("failed to finalize archive {}: {source}", path.display())]
  Finish { path: PathBuf, source: zip::result::ZipError },

  #[error("launcher {} matches an ignore pattern and would be left out of the archive", path.display())]
  LauncherIgnored { path: PathBuf },
}

/// Compression applied to archive members.
#[cfg(feature = "deflate")]
pub fn compression_method() -> CompressionMethod {
  CompressionMethod::Deflated
}

/// Compression applied to archive members.
#[cfg(not(feature = "deflate"))]
pub fn compression_method() -> CompressionMethod {
  CompressionMethod::Stored
}

/// Delete every compiled bytecode file under `source_dir`.
///
/// Returns the removed paths.
pub fn clean_bytecode(source_dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
  let mut removed = Vec::new();

  for entry in WalkDir::new(source_dir) {
    let entry = entry.map_err(|e| ArchiveError::Walk {
      path: source_dir.to_path_buf(),
      source: e,
    })?;

    let is_bytecode = entry.file_type().is_file()
      && entry.path().extension().and_then(|e| e.to_str()) == Some(BYTECODE_EXTENSION);
    if !is_bytecode {
      continue;
    }

    debug!(path = %entry.path().display(), "removing bytecode");
    fs::remove_file(entry.path()).map_err(|e| ArchiveError::Remove {
      path: entry.path().to_path_buf(),
      source: e,
    })?;
    removed.push(entry.into_path());
  }

  Ok(removed)
}

/// Summary of a written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
  /// Member names in archive order.
  pub members: Vec<String>,
  pub compression: CompressionMethod,
}

/// Archive every non-ignored regular file under `source_dir` into `dest`.
///
/// Member names are paths relative to `source_dir` with `/` separators.
/// Ignored directories are not descended into. The archive is written to a
/// temporary file next to `dest` and renamed into place once complete.
pub fn write_archive(source_dir: &Path, dest: &Path, ignore: &IgnoreSet) -> Result<ArchiveSummary, ArchiveError> {
  let write_err = |source| ArchiveError::Write {
    path: dest.to_path_buf(),
    source,
  };

  let compression = compression_method();
  debug!(method = ?compression, "compressing archive members");

  let options = SimpleFileOptions::default()
    .compression_method(compression)
    .last_modified_time(DateTime::default());

  let temp = temp_file_beside(dest).map_err(write_err)?;
  let mut zip = ZipWriter::new(BufWriter::new(temp));
  let mut members = Vec::new();

  let walker = WalkDir::new(source_dir)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.depth() == 0 || !ignore.is_ignored(e.path(), source_dir));

  for entry in walker {
    let entry = entry.map_err(|e| ArchiveError::Walk {
      path: source_dir.to_path_buf(),
      source: e,
    })?;

    if entry.depth() == 0 || !entry.path().is_file() {
      continue;
    }

    let member = member_name(entry.path(), source_dir);
    debug!(member = %member, "adding to archive");

    let file_options = options.unix_permissions(file_mode(entry.path()));
    zip.start_file(member.as_str(), file_options).map_err(|e| ArchiveError::Member {
      member: member.clone(),
      source: e,
    })?;

    let mut file = File::open(entry.path()).map_err(|e| ArchiveError::Read {
      path: entry.path().to_path_buf(),
      source: e,
    })?;
    io::copy(&mut file, &mut zip).map_err(write_err)?;

    members.push(member);
  }

  let writer = zip.finish().map_err(|e| ArchiveError::Finish {
    path: dest.to_path_buf(),
    source: e,
  })?;
  let temp = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
  temp.persist(dest).map_err(|e| write_err(e.error))?;

  Ok(ArchiveSummary { members, compression })
}

/// Rewrite `dest` so it starts with `header` and a newline.
///
/// The archive bytes follow unchanged; readers locate members from the
/// trailing central directory and skip the leading line.
pub fn inject_header(dest: &Path, header: &str) -> Result<(), ArchiveError> {
  let write_err = |source| ArchiveError::Write {
    path: dest.to_path_buf(),
    source,
  };

  let mut archive = File::open(dest).map_err(|e| ArchiveError::Read {
    path: dest.to_path_buf(),
    source: e,
  })?;

  let temp = temp_file_beside(dest).map_err(write_err)?;
  let mut out = BufWriter::new(temp);
  out.write_all(header.as_bytes()).map_err(write_err)?;
  out.write_all(b"\n").map_err(write_err)?;
  io::copy(&mut archive, &mut out).map_err(write_err)?;

  let temp = out.into_inner().map_err(|e| write_err(e.into_error()))?;
  temp.persist(dest).map_err(|e| write_err(e.error))?;

  debug!(path = %dest.display(), header = %header, "injected header");
  Ok(())
}

fn temp_file_beside(dest: &Path) -> io::Result<NamedTempFile> {
  let dir = match dest.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  tempfile::Builder::new()
    .prefix(&format!(".{APP_NAME}-"))
    .suffix(".tmp")
    .tempfile_in(dir)
}

fn member_name(path: &Path, source_dir: &Path) -> String {
  let relative = path.strip_prefix(source_dir).unwrap_or(path);
  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
  use std::os::unix::fs::PermissionsExt;

  fs::metadata(path).map(|m| m.permissions().mode() & 0o777).unwrap_or(0o644)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
  0o644
}
