//! Test utilities for zapper-lib.
//!
//! Helpers that stand in for the external installer so tests never touch the
//! network or a real pip.

use std::path::{Path, PathBuf};

/// Name of the log file the fake installer appends its arguments to.
pub const INSTALLER_LOG: &str = "installer.log";

/// Body of the fake installer.
///
/// Understands `install <spec>... --target=<dir>` and
/// `install -r <manifest> --target=<dir>`. Each installed spec becomes a
/// `<target>/<spec>/__init__.py` package. Specs starting with `broken` fail,
/// specs starting with `slow` hang.
#[cfg(unix)]
const FAKE_INSTALLER: &str = r##"
echo "$*" >> "$(dirname "$0")/installer.log"
target=""
manifest=""
specs=""
expect_manifest=0
for arg in "$@"; do
  if [ "$expect_manifest" = 1 ]; then
    manifest="$arg"
    expect_manifest=0
    continue
  fi
  case "$arg" in
    install) ;;
    -r) expect_manifest=1 ;;
    --target=*) target="${arg#--target=}" ;;
    *) specs="$specs $arg" ;;
  esac
done
if [ -n "$manifest" ]; then
  specs="$specs $(cat "$manifest")"
fi
for spec in $specs; do
  case "$spec" in
    broken*) echo "ERROR: No matching distribution found for $spec" >&2; exit 1 ;;
    slow*) sleep 30 ;;
  esac
  mkdir -p "$target/$spec"
  echo "# $spec" > "$target/$spec/__init__.py"
done
echo "Successfully installed$specs"
"##;

/// Write an executable `/bin/sh` script named `name` into `dir`.
///
/// The script pins its own PATH so tests that modify the process PATH do not
/// affect it.
#[cfg(unix)]
pub fn shell_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  let script = format!("#!/bin/sh\nPATH=/usr/bin:/bin\nexport PATH\n{body}");
  std::fs::write(&path, script).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Write the fake installer into `dir` and return its path.
#[cfg(unix)]
pub fn fake_installer(dir: &Path) -> PathBuf {
  shell_script(dir, "fake-pip", FAKE_INSTALLER)
}

/// Everything the fake installer in `dir` was invoked with, one call per line.
pub fn installer_log(dir: &Path) -> String {
  std::fs::read_to_string(dir.join(INSTALLER_LOG)).unwrap_or_default()
}
