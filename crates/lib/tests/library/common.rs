//! Shared helpers for library integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use walkdir::WalkDir;
use zapper_lib::BuildSpec;

/// Installer stand-in: `install <spec>... --target=<dir>` and
/// `install -r <file> --target=<dir>`. Every spec becomes a package directory
/// with an `__init__.py`; specs starting with `broken` fail.
const FAKE_INSTALLER: &str = r##"#!/bin/sh
PATH=/usr/bin:/bin
export PATH
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
  esac
  mkdir -p "$target/$spec"
  echo "NAME = '$spec'" > "$target/$spec/__init__.py"
done
"##;

/// Isolated project layout: `<temp>/myapp` is the source tree, `<temp>/dist`
/// receives archives and `<temp>/tools` holds the fake installer.
pub struct Project {
  pub temp: TempDir,
  pub src: PathBuf,
  pub dist: PathBuf,
  pub tools: PathBuf,
}

impl Project {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let src = root.join("myapp");
    let dist = root.join("dist");
    let tools = root.join("tools");
    for dir in [&src, &dist, &tools] {
      fs::create_dir_all(dir).unwrap();
    }
    Self { temp, src, dist, tools }
  }

  /// Write a file relative to the source tree.
  pub fn write(&self, relative_path: &str, content: &str) {
    let path = self.src.join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  /// Spec for `entry_point` with the fake installer and `dist` as destination.
  pub fn spec(&self, entry_point: &str) -> BuildSpec {
    let mut spec = BuildSpec::new(&self.src, entry_point);
    spec.dest_dir = Some(self.dist.clone());
    spec.installer.program = self.fake_installer().to_string_lossy().into_owned();
    spec.installer.timeout = Duration::from_secs(30);
    spec
  }

  #[cfg(unix)]
  pub fn fake_installer(&self) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = self.tools.join("fake-pip");
    if !path.exists() {
      fs::write(&path, FAKE_INSTALLER).unwrap();
      fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
  }

  #[cfg(not(unix))]
  pub fn fake_installer(&self) -> PathBuf {
    self.tools.join("fake-pip.exe")
  }

  pub fn installer_log(&self) -> String {
    fs::read_to_string(self.tools.join("installer.log")).unwrap_or_default()
  }

  /// Every path under the source tree, relative to it.
  pub fn source_listing(&self) -> BTreeSet<PathBuf> {
    WalkDir::new(&self.src)
      .min_depth(1)
      .into_iter()
      .map(|e| e.unwrap().path().strip_prefix(&self.src).unwrap().to_path_buf())
      .collect()
  }
}

/// Archive bytes with the header line removed.
pub fn archive_body(path: &Path) -> Vec<u8> {
  let bytes = fs::read(path).unwrap();
  let start = bytes.iter().position(|b| *b == b'\n').unwrap() + 1;
  bytes[start..].to_vec()
}

pub fn archive_members(path: &Path) -> Vec<String> {
  let archive = zip::ZipArchive::new(Cursor::new(archive_body(path))).unwrap();
  archive.file_names().map(str::to_string).collect()
}

pub fn read_member(path: &Path, name: &str) -> String {
  let mut archive = zip::ZipArchive::new(Cursor::new(archive_body(path))).unwrap();
  let mut content = String::new();
  archive.by_name(name).unwrap().read_to_string(&mut content).unwrap();
  content
}

/// A Python interpreter to run archives with, if one is installed.
pub fn python() -> Option<&'static str> {
  ["python3", "python"].into_iter().find(|candidate| {
    std::process::Command::new(candidate)
      .arg("--version")
      .output()
      .map(|o| o.status.success())
      .unwrap_or(false)
  })
}
