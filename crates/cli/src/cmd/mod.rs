mod build;
mod plan;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;

use zapper_lib::BuildSpec;
use zapper_lib::descriptor::{Overrides, resolve_targets};

use crate::output::OutputFormat;

pub use build::cmd_build;
pub use plan::cmd_plan;

/// Arguments shared by every command that reads a build file.
#[derive(Args, Debug)]
pub struct TargetArgs {
  /// Path to the app to build
  pub src_path: PathBuf,

  /// Directory the archives are written to (default: parent of SRC_PATH)
  pub dest_path: Option<PathBuf>,

  /// Installer program used for dependencies (default: $ZAPPER_INSTALLER, then pip)
  #[arg(long)]
  pub installer: Option<String>,

  /// Time limit for each installer run (e.g., "90s", "5m")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub install_timeout: Option<Duration>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

impl TargetArgs {
  fn overrides(&self, verbose: bool) -> Overrides {
    Overrides {
      dest_dir: self.dest_path.clone(),
      installer: self.installer.clone(),
      install_timeout: self.install_timeout,
      verbose,
    }
  }

  /// Read the build file and resolve every target it declares.
  fn resolve(&self, verbose: bool) -> Result<Vec<BuildSpec>> {
    if !self.src_path.is_dir() {
      bail!("\"{}\" does not exist or is not readable", self.src_path.display());
    }

    resolve_targets(&self.src_path, &self.overrides(verbose))
      .with_context(|| format!("Failed to read build file in {}", self.src_path.display()))
  }
}
