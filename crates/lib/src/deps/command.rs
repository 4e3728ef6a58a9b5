//! Installer sub-process execution.
//!
//! Runs one installer invocation with captured output and a hard timeout.
//! The child is killed when the timeout elapses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// How a single installer invocation ended, when it did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
  /// The process could not be started.
  Spawn { message: String },
  /// The process exited unsuccessfully. `output` is stdout followed by stderr.
  Exit { code: Option<i32>, output: String },
  /// The process did not finish within the timeout and was killed.
  TimedOut { timeout: Duration },
}

impl std::fmt::Display for CommandFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CommandFailure::Spawn { message } => write!(f, "failed to start: {message}"),
      CommandFailure::Exit { code: Some(code), .. } => write!(f, "exited with code {code}"),
      CommandFailure::Exit { code: None, .. } => write!(f, "terminated by signal"),
      CommandFailure::TimedOut { timeout } => {
        write!(f, "timed out after {}", humantime::format_duration(*timeout))
      }
    }
  }
}

/// A fully specified installer invocation.
#[derive(Debug, Clone)]
pub struct InstallCommand {
  pub program: PathBuf,
  pub args: Vec<String>,
}

impl InstallCommand {
  /// `<program> install <spec> --target=<vendor>`
  pub fn for_spec(program: &Path, spec: &str, vendor: &Path) -> Self {
    Self {
      program: program.to_path_buf(),
      args: vec!["install".to_string(), spec.to_string(), target_arg(vendor)],
    }
  }

  /// `<program> install -r <manifest> --target=<vendor>`
  pub fn for_manifest(program: &Path, manifest: &Path, vendor: &Path) -> Self {
    Self {
      program: program.to_path_buf(),
      args: vec![
        "install".to_string(),
        "-r".to_string(),
        manifest.to_string_lossy().into_owned(),
        target_arg(vendor),
      ],
    }
  }

  /// Run to completion. Returns the combined stdout and stderr on success.
  pub async fn run(&self, timeout: Duration) -> Result<String, CommandFailure> {
    debug!(program = %self.program.display(), args = ?self.args, "spawning installer");

    let child = Command::new(&self.program)
      .args(&self.args)
      .stdin(std::process::Stdio::null())
      .kill_on_drop(true)
      .output();

    let output = match tokio::time::timeout(timeout, child).await {
      Ok(Ok(output)) => output,
      Ok(Err(e)) => return Err(CommandFailure::Spawn { message: e.to_string() }),
      Err(_) => return Err(CommandFailure::TimedOut { timeout }),
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
      return Err(CommandFailure::Exit {
        code: output.status.code(),
        output: combined,
      });
    }

    Ok(combined)
  }
}

fn target_arg(vendor: &Path) -> String {
  format!("--target={}", vendor.display())
}
