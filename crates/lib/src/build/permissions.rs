//! Executable permission for the finished archive.
//!
//! ## Platform Behavior
//!
//! - **Unix**: sets mode 0755 so owner, group and others may execute it
//! - **Windows**: no permission bits to set; the call succeeds without change

use std::io;
use std::path::Path;

use tracing::debug;

/// Mode given to archives on Unix.
pub const ARCHIVE_MODE: u32 = 0o755;

#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  debug!(path = %path.display(), mode = %format!("{ARCHIVE_MODE:o}"), "setting executable permission");
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(ARCHIVE_MODE))
}

#[cfg(not(unix))]
pub fn set_executable(path: &Path) -> io::Result<()> {
  debug!(path = %path.display(), "no executable bit on this platform, skipping");
  Ok(())
}
