//! Tracking and teardown of files a build generates in the source tree.
//!
//! Only paths recorded here are ever removed. Teardown runs explicitly at the
//! end of every build and again when the tracker is dropped, so nothing
//! recorded outlives its owner even if a build is abandoned half way.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Append-only list of paths created as side effects of one build.
#[derive(Debug, Default)]
pub struct GeneratedFiles {
  paths: Vec<PathBuf>,
}

/// Result of a teardown pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Teardown {
  pub removed: Vec<PathBuf>,
  /// Paths that could not be removed, with the error message.
  pub failed: Vec<(PathBuf, String)>,
}

impl GeneratedFiles {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, path: impl Into<PathBuf>) {
    let path = path.into();
    debug!(path = %path.display(), "recording generated path");
    self.paths.push(path);
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  /// Remove every recorded path in recording order and clear the list.
  ///
  /// Directories are removed recursively. Paths that are already gone are
  /// skipped. Removal errors are logged and reported, never propagated.
  pub fn teardown(&mut self) -> Teardown {
    let mut result = Teardown::default();

    for path in self.paths.drain(..) {
      match remove_path(&path) {
        Ok(true) => {
          debug!(path = %path.display(), "removed generated path");
          result.removed.push(path);
        }
        Ok(false) => {}
        Err(e) => {
          warn!(path = %path.display(), error = %e, "failed to remove generated path");
          result.failed.push((path, e.to_string()));
        }
      }
    }

    result
  }
}

impl Drop for GeneratedFiles {
  fn drop(&mut self) {
    if !self.paths.is_empty() {
      self.teardown();
    }
  }
}

/// Returns `Ok(false)` when there was nothing to remove.
fn remove_path(path: &Path) -> io::Result<bool> {
  let metadata = match fs::symlink_metadata(path) {
    Ok(m) => m,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
    Err(e) => return Err(e),
  };

  let removed = if metadata.is_dir() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  };

  match removed {
    Ok(()) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}
