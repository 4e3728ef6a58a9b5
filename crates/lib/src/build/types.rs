//! Types for archive builds.
//!
//! This module defines the build configuration, the pipeline stages and
//! states, the error types and the report returned by a successful build.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::build::archive::ArchiveError;
use crate::consts::{ARCHIVE_EXTENSION, DEFAULT_SHEBANG, LAUNCHER_FILE_NAME, REQUIREMENTS_FILE_NAME, VENDOR_DIR_NAME};
use crate::deps::{InstallError, InstallerConfig};
use crate::entrypoint::EntryPointError;
use crate::ignore::IgnoreSet;

/// Fully resolved configuration for one archive target.
#[derive(Debug, Clone)]
pub struct BuildSpec {
  /// Directory being packaged.
  pub source_dir: PathBuf,
  /// Directory the archive is written to. Defaults to the parent of `source_dir`.
  pub dest_dir: Option<PathBuf>,
  /// Archive file name. Defaults to `<source basename>.pyz`.
  pub archive_name: Option<String>,
  /// `module.path:callable [args]`
  pub entry_point: String,
  /// Package specifiers installed one by one.
  pub dependencies: Vec<String>,
  /// Requirements manifest. Relative paths resolve against `source_dir`.
  pub requirements_manifest: Option<PathBuf>,
  pub ignore: IgnoreSet,
  /// Remove compiled bytecode from the tree before packaging.
  pub clean_bytecode: bool,
  /// First line of the archive.
  pub shebang: String,
  pub installer: InstallerConfig,
  /// Diagnostic output only.
  pub verbose: bool,
}

impl BuildSpec {
  /// A spec with every optional setting at its default.
  pub fn new(source_dir: impl Into<PathBuf>, entry_point: impl Into<String>) -> Self {
    Self {
      source_dir: source_dir.into(),
      dest_dir: None,
      archive_name: None,
      entry_point: entry_point.into(),
      dependencies: Vec::new(),
      requirements_manifest: None,
      ignore: IgnoreSet::default(),
      clean_bytecode: true,
      shebang: DEFAULT_SHEBANG.to_string(),
      installer: InstallerConfig::default(),
      verbose: false,
    }
  }

  /// The archive file name, explicit or derived from the source directory.
  pub fn archive_name(&self) -> Result<String, SpecError> {
    let name = match &self.archive_name {
      Some(name) => name.clone(),
      None => {
        let base = self
          .source_dir
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .filter(|n| !n.is_empty())
          .ok_or_else(|| SpecError::NoArchiveName {
            path: self.source_dir.clone(),
          })?;
        format!("{base}.{ARCHIVE_EXTENSION}")
      }
    };

    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
      (Some(Component::Normal(_)), None) => Ok(name),
      _ => Err(SpecError::InvalidArchiveName { name }),
    }
  }

  /// Directory the archive is written to.
  pub fn destination_dir(&self) -> PathBuf {
    match &self.dest_dir {
      Some(dir) => dir.clone(),
      None => match self.source_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
      },
    }
  }

  /// Canonicalise `source_dir` in place and return the archive path.
  ///
  /// The source must be a readable directory and the destination directory
  /// must exist. The archive may not land inside the source tree. Only
  /// metadata is read; nothing on disk changes.
  pub fn resolve_paths(&mut self) -> Result<PathBuf, SpecError> {
    let source = &self.source_dir;
    let invalid = |reason: String| SpecError::SourcePathInvalid {
      path: source.clone(),
      reason,
    };

    let canonical = dunce::canonicalize(source).map_err(|e| invalid(e.to_string()))?;
    if !canonical.is_dir() {
      return Err(invalid("not a directory".to_string()));
    }
    std::fs::read_dir(&canonical).map_err(|e| invalid(e.to_string()))?;
    self.source_dir = canonical;

    let archive_name = self.archive_name()?;
    let dest_dir = self.destination_dir();
    let dest_dir = dunce::canonicalize(&dest_dir).map_err(|e| SpecError::DestinationInvalid {
      path: dest_dir.clone(),
      reason: e.to_string(),
    })?;
    if !dest_dir.is_dir() {
      return Err(SpecError::DestinationInvalid {
        path: dest_dir,
        reason: "not a directory".to_string(),
      });
    }

    let destination = dest_dir.join(archive_name);
    if destination.starts_with(&self.source_dir) {
      return Err(SpecError::DestinationInsideSource {
        dest: destination,
        source_dir: self.source_dir.clone(),
      });
    }

    debug!(source = %self.source_dir.display(), destination = %destination.display(), "resolved paths");
    Ok(destination)
  }

  /// Full path of the archive, computed from the paths as given.
  pub fn destination(&self) -> Result<PathBuf, SpecError> {
    Ok(self.destination_dir().join(self.archive_name()?))
  }

  pub fn vendor_dir(&self) -> PathBuf {
    self.source_dir.join(VENDOR_DIR_NAME)
  }

  pub fn launcher_path(&self) -> PathBuf {
    self.source_dir.join(LAUNCHER_FILE_NAME)
  }

  /// The requirements manifest to install from, if any.
  ///
  /// An explicit manifest always applies. Without one, `requirements.txt` in
  /// the source directory is used unless explicit dependencies were given.
  pub fn manifest_path(&self) -> Option<PathBuf> {
    match &self.requirements_manifest {
      Some(path) if path.is_absolute() => Some(path.clone()),
      Some(path) => Some(self.source_dir.join(path)),
      None if self.dependencies.is_empty() => Some(self.source_dir.join(REQUIREMENTS_FILE_NAME)),
      None => None,
    }
  }
}

/// A step of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStage {
  Validate,
  CleanBytecode,
  SynthesizeEntryPoint,
  InstallDependencies,
  Archive,
  InjectHeader,
  SetPermissions,
}

impl fmt::Display for BuildStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      BuildStage::Validate => "validate",
      BuildStage::CleanBytecode => "clean bytecode",
      BuildStage::SynthesizeEntryPoint => "synthesize entry point",
      BuildStage::InstallDependencies => "install dependencies",
      BuildStage::Archive => "archive",
      BuildStage::InjectHeader => "inject header",
      BuildStage::SetPermissions => "set permissions",
    };
    f.write_str(name)
  }
}

/// Where a builder is in its pipeline.
///
/// States advance strictly in declaration order. Any failure moves to
/// `Failed` with the stage that was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
  Init,
  ByteCodeCleaned,
  EntrySynthesized,
  DependenciesInstalled,
  Archived,
  HeaderInjected,
  PermissionsSet,
  Done,
  Failed(BuildStage),
}

/// Problems with the build configuration itself.
#[derive(Debug, Error)]
pub enum SpecError {
  #[error("\"{}\" does not exist or is not readable: {reason}", path.display())]
  SourcePathInvalid { path: PathBuf, reason: String },

  #[error("unable to derive an archive name from {}", path.display())]
  NoArchiveName { path: PathBuf },

  #[error("archive name \"{name}\" must be a plain file name")]
  InvalidArchiveName { name: String },

  #[error("destination directory {} is not usable: {reason}", path.display())]
  DestinationInvalid { path: PathBuf, reason: String },

  #[error("destination {} is inside the source directory {}", dest.display(), source_dir.display())]
  DestinationInsideSource { dest: PathBuf, source_dir: PathBuf },
}

/// The failure of a single stage.
#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Spec(#[from] SpecError),

  #[error(transparent)]
  EntryPoint(#[from] EntryPointError),

  #[error(transparent)]
  Install(#[from] InstallError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),
}

/// A failed build: which target, which stage, and why.
#[derive(Debug, Error)]
#[error("build of {} failed during {stage}: {error}", source_dir.display())]
pub struct BuildError {
  pub source_dir: PathBuf,
  pub stage: BuildStage,
  #[source]
  pub error: StageError,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
  pub source_dir: PathBuf,
  pub archive: PathBuf,
  /// Archive member names in archive order.
  pub members: Vec<String>,
  /// Size of the finished archive including its header line.
  pub bytes: u64,
  pub compression: String,
  pub entry_point: String,
  /// Specifiers installed individually.
  pub dependencies: Vec<String>,
  /// Manifest installed with `-r`, if one existed.
  pub manifest: Option<PathBuf>,
  pub bytecode_removed: usize,
}
