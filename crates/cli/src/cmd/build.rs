//! Implementation of the `zapper build` command.
//!
//! Reads the build file in the source directory and builds each declared
//! archive in order. The first failing target stops the run.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use zapper_lib::ArchiveBuilder;

use super::TargetArgs;
use crate::output::{format_bytes, format_duration, print_json, print_stat, print_success};

pub fn cmd_build(args: &TargetArgs, verbose: bool) -> Result<()> {
  let specs = args.resolve(verbose)?;
  info!(targets = specs.len(), "resolved build targets");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let mut reports = Vec::with_capacity(specs.len());

  for spec in specs {
    let start = Instant::now();
    let mut builder = ArchiveBuilder::new(spec);
    let report = rt.block_on(builder.build()).context("Build failed")?;

    if !args.output.is_json() {
      print_success(&format!("Built {}", report.archive.display()));
      print_stat("Entry point", &report.entry_point);
      print_stat("Members", &report.members.len().to_string());
      print_stat("Size", &format_bytes(report.bytes));
      print_stat("Duration", &format_duration(start.elapsed()));
    }

    reports.push(report);
  }

  if args.output.is_json() {
    print_json(&reports)?;
  }

  Ok(())
}
