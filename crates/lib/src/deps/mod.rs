//! Dependency installation into the vendor directory.
//!
//! Third-party packages are installed by an external installer (pip by
//! default) targeting `<source>/vendor`, which is then archived alongside the
//! application. Explicit package specifiers are installed one at a time; a
//! requirements manifest is installed with a single `-r` invocation.
//!
//! Every invocation is attempted even when an earlier one fails. Failures are
//! collected and reported together once all invocations have run.

mod command;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::build::generated::GeneratedFiles;
use crate::consts::{DEFAULT_INSTALL_TIMEOUT, DEFAULT_INSTALLER};

pub use command::{CommandFailure, InstallCommand};

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("required program \"{program}\" not found on PATH")]
  ToolMissing { program: String },

  #[error("failed to create vendor directory {}: {source}", path.display())]
  CreateVendor { path: PathBuf, source: std::io::Error },

  #[error("{} dependency install(s) failed: {}", failures.len(), summarize(failures))]
  Failed { failures: Vec<InstallFailure> },
}

/// One installer invocation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFailure {
  /// The package specifier, or `-r <manifest>` for manifest installs.
  pub target: String,
  pub failure: CommandFailure,
}

impl fmt::Display for InstallFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.target, self.failure)
  }
}

fn summarize(failures: &[InstallFailure]) -> String {
  failures.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Which installer to run and how long to let each invocation take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerConfig {
  /// Program name looked up on PATH, or a path to the program.
  pub program: String,
  pub timeout: Duration,
}

impl Default for InstallerConfig {
  fn default() -> Self {
    Self {
      program: DEFAULT_INSTALLER.to_string(),
      timeout: DEFAULT_INSTALL_TIMEOUT,
    }
  }
}

/// What to install and where.
#[derive(Debug, Clone)]
pub struct InstallRequest<'a> {
  pub vendor_dir: &'a Path,
  pub specs: &'a [String],
  pub manifest: Option<&'a Path>,
  pub installer: &'a InstallerConfig,
  /// Log installer output at `info` instead of `debug`.
  pub verbose: bool,
}

/// Summary of a successful install run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
  /// Specifiers installed individually.
  pub installed: Vec<String>,
  /// Manifest installed with `-r`, if one existed.
  pub manifest: Option<PathBuf>,
  pub vendor_created: bool,
}

/// Install `request.specs` and `request.manifest` into `request.vendor_dir`.
///
/// A vendor directory created here is recorded in `generated` so the caller's
/// teardown removes it; an existing vendor directory is reused untouched. A
/// configured manifest that does not exist is skipped silently.
pub async fn install_dependencies(
  request: &InstallRequest<'_>,
  generated: &mut GeneratedFiles,
) -> Result<InstallOutcome, InstallError> {
  let program = find_executable(&request.installer.program).ok_or_else(|| InstallError::ToolMissing {
    program: request.installer.program.clone(),
  })?;
  debug!(program = %program.display(), "resolved installer");

  let manifest = match request.manifest {
    Some(path) if path.is_file() => Some(path),
    Some(path) => {
      debug!(path = %path.display(), "requirements manifest not found, skipping");
      None
    }
    None => None,
  };

  let mut outcome = InstallOutcome::default();

  if request.specs.is_empty() && manifest.is_none() {
    debug!("no dependencies to install");
    return Ok(outcome);
  }

  if !request.vendor_dir.exists() {
    debug!(path = %request.vendor_dir.display(), "creating vendor directory");
    std::fs::create_dir_all(request.vendor_dir).map_err(|e| InstallError::CreateVendor {
      path: request.vendor_dir.to_path_buf(),
      source: e,
    })?;
    generated.record(request.vendor_dir);
    outcome.vendor_created = true;
  }

  let mut failures = Vec::new();

  for spec in request.specs {
    info!(spec = %spec, "installing dependency");
    let cmd = InstallCommand::for_spec(&program, spec, request.vendor_dir);
    match cmd.run(request.installer.timeout).await {
      Ok(output) => {
        log_output(spec, &output, request.verbose);
        outcome.installed.push(spec.clone());
      }
      Err(failure) => {
        warn!(spec = %spec, error = %failure, "dependency install failed, continuing");
        if let CommandFailure::Exit { output, .. } = &failure {
          log_output(spec, output, request.verbose);
        }
        failures.push(InstallFailure {
          target: spec.clone(),
          failure,
        });
      }
    }
  }

  if let Some(manifest) = manifest {
    let target = format!("-r {}", manifest.display());
    info!(manifest = %manifest.display(), "installing requirements manifest");
    let cmd = InstallCommand::for_manifest(&program, manifest, request.vendor_dir);
    match cmd.run(request.installer.timeout).await {
      Ok(output) => {
        log_output(&target, &output, request.verbose);
        outcome.manifest = Some(manifest.to_path_buf());
      }
      Err(failure) => {
        warn!(manifest = %manifest.display(), error = %failure, "manifest install failed");
        if let CommandFailure::Exit { output, .. } = &failure {
          log_output(&target, output, request.verbose);
        }
        failures.push(InstallFailure { target, failure });
      }
    }
  }

  if !failures.is_empty() {
    return Err(InstallError::Failed { failures });
  }

  Ok(outcome)
}

fn log_output(target: &str, output: &str, verbose: bool) {
  let output = output.trim();
  if output.is_empty() {
    return;
  }
  if verbose {
    info!(target = %target, output = %output, "installer output");
  } else {
    debug!(target = %target, output = %output, "installer output");
  }
}

/// Locate `program` the way a shell would.
///
/// A program containing a path separator is checked directly; a bare name is
/// searched for in each `PATH` entry.
pub fn find_executable(program: &str) -> Option<PathBuf> {
  let candidate = Path::new(program);
  if candidate.components().count() > 1 {
    return is_executable(candidate).then(|| candidate.to_path_buf());
  }

  let path = std::env::var_os("PATH")?;
  std::env::split_paths(&path)
    .map(|dir| dir.join(program))
    .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;

  std::fs::metadata(path)
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}
