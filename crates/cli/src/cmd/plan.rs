//! Implementation of the `zapper plan` command.
//!
//! Resolves every target in the build file the same way `build` does and
//! prints the result. Nothing on disk is touched.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use zapper_lib::{BuildSpec, EntryPoint, IgnoreMode};

use super::TargetArgs;
use crate::output::{format_list, print_info, print_json, print_stat, symbols};

/// One resolved archive target.
#[derive(Debug, Serialize)]
struct TargetPlan {
  source_dir: PathBuf,
  destination: PathBuf,
  entry_point: String,
  dependencies: Vec<String>,
  manifest: Option<PathBuf>,
  ignore: Vec<String>,
  ignore_mode: IgnoreMode,
  clean_bytecode: bool,
  shebang: String,
  installer: String,
  install_timeout: String,
}

impl TargetPlan {
  fn from_spec(spec: &BuildSpec) -> Result<Self> {
    let entry_point: EntryPoint = spec.entry_point.parse().context("Invalid entry point")?;
    let mut spec = spec.clone();
    let destination = spec.resolve_paths().context("Invalid archive destination")?;

    Ok(Self {
      source_dir: spec.source_dir.clone(),
      destination,
      entry_point: entry_point.to_string(),
      dependencies: spec.dependencies.clone(),
      manifest: spec.manifest_path().filter(|p| p.is_file()),
      ignore: spec.ignore.patterns().to_vec(),
      ignore_mode: spec.ignore.mode(),
      clean_bytecode: spec.clean_bytecode,
      shebang: spec.shebang.clone(),
      installer: spec.installer.program.clone(),
      install_timeout: humantime::format_duration(spec.installer.timeout).to_string(),
    })
  }
}

pub fn cmd_plan(args: &TargetArgs, verbose: bool) -> Result<()> {
  let plans = args
    .resolve(verbose)?
    .iter()
    .map(TargetPlan::from_spec)
    .collect::<Result<Vec<_>>>()?;

  if args.output.is_json() {
    return print_json(&plans);
  }

  for plan in &plans {
    print_info(&format!(
      "{} {} {}",
      plan.source_dir.display(),
      symbols::ARROW,
      plan.destination.display()
    ));
    print_stat("Entry point", &plan.entry_point);
    print_stat("Dependencies", &format_list(&plan.dependencies));
    print_stat(
      "Manifest",
      &plan
        .manifest
        .as_ref()
        .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
    );
    print_stat("Ignore", &format!("{} ({:?})", format_list(&plan.ignore), plan.ignore_mode));
    print_stat("Clean bytecode", &plan.clean_bytecode.to_string());
    print_stat("Header", &plan.shebang);
    print_stat("Installer", &format!("{} (timeout {})", plan.installer, plan.install_timeout));
  }

  Ok(())
}
