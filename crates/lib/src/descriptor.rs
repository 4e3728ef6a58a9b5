//! Build descriptor loading.
//!
//! A source directory declares its archive targets in a YAML file named
//! `build`, `build.yml` or `build.yaml`. Everything lives under a top-level
//! `zapper` key, which holds either one target or a list of them:
//!
//! ```yaml
//! zapper:
//!   entry_point: app:main
//!   requirements:
//!     - requests
//!   ignore:
//!     - tests
//! ```
//!
//! Targets are resolved into [`BuildSpec`]s with command-line overrides
//! applied first, then descriptor values, then the environment, then
//! built-in defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::build::BuildSpec;
use crate::consts::{DESCRIPTOR_FILE_NAMES, DESCRIPTOR_ROOT_KEY, INSTALLER_ENV};
use crate::ignore::{IgnoreMode, IgnoreSet};

#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("build file not found in source directory {}", dir.display())]
  Missing { dir: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("{} is not a valid build file: {source}", path.display())]
  Malformed { path: PathBuf, source: serde_yaml::Error },

  #[error("{} does not contain a \"{DESCRIPTOR_ROOT_KEY}\" key", path.display())]
  MissingRootKey { path: PathBuf },

  #[error("{} declares no build targets", path.display())]
  NoTargets { path: PathBuf },

  #[error("invalid install_timeout \"{value}\" in {}: {source}", path.display())]
  InvalidTimeout {
    path: PathBuf,
    value: String,
    source: humantime::DurationError,
  },
}

fn default_true() -> bool {
  true
}

/// One archive target as written in the build file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
  pub entry_point: String,
  #[serde(default)]
  pub app_name: Option<String>,
  #[serde(default)]
  pub requirements: Vec<String>,
  #[serde(default)]
  pub requirements_txt: Option<PathBuf>,
  /// An absent or empty list keeps the default ignore set.
  #[serde(default)]
  pub ignore: Vec<String>,
  #[serde(default)]
  pub ignore_mode: IgnoreMode,
  #[serde(default = "default_true")]
  pub clean_pyc: bool,
  #[serde(default)]
  pub python_shebang: Option<String>,
  #[serde(default)]
  pub installer: Option<String>,
  #[serde(default)]
  pub install_timeout: Option<String>,
}

/// A parsed build file.
#[derive(Debug, Clone)]
pub struct Descriptor {
  pub path: PathBuf,
  pub targets: Vec<TargetConfig>,
}

/// Settings given on the command line. They win over the build file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub dest_dir: Option<PathBuf>,
  pub installer: Option<String>,
  pub install_timeout: Option<Duration>,
  pub verbose: bool,
}

/// First build file present in `source_dir`, in name order.
pub fn find_descriptor(source_dir: &Path) -> Option<PathBuf> {
  DESCRIPTOR_FILE_NAMES
    .iter()
    .map(|name| source_dir.join(name))
    .find(|path| path.is_file())
}

impl Descriptor {
  /// Find and parse the build file in `source_dir`.
  pub fn load(source_dir: &Path) -> Result<Self, DescriptorError> {
    let path = find_descriptor(source_dir).ok_or_else(|| DescriptorError::Missing {
      dir: source_dir.to_path_buf(),
    })?;
    debug!(path = %path.display(), "reading build file");

    let contents = fs::read_to_string(&path).map_err(|e| DescriptorError::Read {
      path: path.clone(),
      source: e,
    })?;
    Self::parse(path, &contents)
  }

  /// Parse build file contents. `path` is used for error messages only.
  pub fn parse(path: PathBuf, contents: &str) -> Result<Self, DescriptorError> {
    let malformed = |source| DescriptorError::Malformed {
      path: path.clone(),
      source,
    };

    let document: serde_yaml::Value = serde_yaml::from_str(contents).map_err(malformed)?;
    let root = document
      .get(DESCRIPTOR_ROOT_KEY)
      .cloned()
      .ok_or_else(|| DescriptorError::MissingRootKey { path: path.clone() })?;

    let targets = if root.is_sequence() {
      serde_yaml::from_value::<Vec<TargetConfig>>(root).map_err(malformed)?
    } else {
      vec![serde_yaml::from_value::<TargetConfig>(root).map_err(malformed)?]
    };

    if targets.is_empty() {
      return Err(DescriptorError::NoTargets { path });
    }

    debug!(path = %path.display(), targets = targets.len(), "parsed build file");
    Ok(Self { path, targets })
  }

  /// Resolve every target into a build spec for `source_dir`.
  pub fn specs(&self, source_dir: &Path, overrides: &Overrides) -> Result<Vec<BuildSpec>, DescriptorError> {
    self
      .targets
      .iter()
      .map(|target| target.to_spec(&self.path, source_dir, overrides))
      .collect()
  }
}

impl TargetConfig {
  fn to_spec(&self, descriptor: &Path, source_dir: &Path, overrides: &Overrides) -> Result<BuildSpec, DescriptorError> {
    let mut spec = BuildSpec::new(source_dir, self.entry_point.clone());

    spec.dest_dir = overrides.dest_dir.clone();
    spec.archive_name = self.app_name.clone();
    spec.dependencies = self.requirements.clone();
    spec.requirements_manifest = self.requirements_txt.clone();
    if !self.ignore.is_empty() {
      spec.ignore = IgnoreSet::new(self.ignore.iter().cloned(), self.ignore_mode);
    } else if self.ignore_mode != IgnoreMode::default() {
      spec.ignore = IgnoreSet::new(spec.ignore.patterns().iter().cloned(), self.ignore_mode);
    }
    spec.clean_bytecode = self.clean_pyc;
    if let Some(shebang) = &self.python_shebang {
      spec.shebang = shebang.clone();
    }
    spec.verbose = overrides.verbose;

    if let Some(program) = overrides
      .installer
      .clone()
      .or_else(|| self.installer.clone())
      .or_else(|| std::env::var(INSTALLER_ENV).ok().filter(|p| !p.is_empty()))
    {
      spec.installer.program = program;
    }

    if let Some(timeout) = overrides.install_timeout {
      spec.installer.timeout = timeout;
    } else if let Some(value) = &self.install_timeout {
      spec.installer.timeout = humantime::parse_duration(value).map_err(|e| DescriptorError::InvalidTimeout {
        path: descriptor.to_path_buf(),
        value: value.clone(),
        source: e,
      })?;
    }

    Ok(spec)
  }
}

/// Load the build file in `source_dir` and resolve all of its targets.
pub fn resolve_targets(source_dir: &Path, overrides: &Overrides) -> Result<Vec<BuildSpec>, DescriptorError> {
  Descriptor::load(source_dir)?.specs(source_dir, overrides)
}
