//! Archive builds.
//!
//! An [`ArchiveBuilder`] turns one [`BuildSpec`] into one executable archive.
//! The pipeline is strictly sequential; each step relies on the filesystem
//! state left by the one before it:
//!
//! 1. validate the source and destination paths
//! 2. remove compiled bytecode (optional)
//! 3. write the launcher into the source tree
//! 4. install dependencies into the vendor directory
//! 5. archive every non-ignored file
//! 6. prepend the interpreter header
//! 7. mark the archive executable
//!
//! Files generated in the source tree along the way are recorded and removed
//! once the pipeline ends, whether it succeeded or not. Anything that existed
//! before the build is left alone.
//!
//! # Submodules
//!
//! - [`archive`] - bytecode cleaning, archive writing, header injection
//! - [`generated`] - tracking and teardown of generated paths
//! - [`permissions`] - executable bit on the finished archive

pub mod archive;
pub mod generated;
pub mod permissions;
mod types;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::deps::{InstallRequest, install_dependencies};
use crate::entrypoint::{EntryPointError, synthesize_launcher};

pub use generated::GeneratedFiles;
pub use types::*;

/// Builds a single archive target.
///
/// The builder owns the list of paths it generated. That list is torn down at
/// the end of every [`build`](Self::build) call and again when the builder
/// is dropped.
#[derive(Debug)]
pub struct ArchiveBuilder {
  spec: BuildSpec,
  state: BuildState,
  destination: Option<PathBuf>,
  generated: GeneratedFiles,
}

impl ArchiveBuilder {
  pub fn new(spec: BuildSpec) -> Self {
    Self {
      spec,
      state: BuildState::Init,
      destination: None,
      generated: GeneratedFiles::new(),
    }
  }

  pub fn spec(&self) -> &BuildSpec {
    &self.spec
  }

  pub fn state(&self) -> BuildState {
    self.state
  }

  /// Archive path resolved by the most recent build, if it got that far.
  pub fn destination(&self) -> Option<&Path> {
    self.destination.as_deref()
  }

  /// Paths currently recorded for teardown.
  pub fn generated(&self) -> &[PathBuf] {
    self.generated.paths()
  }

  /// Run the full pipeline.
  ///
  /// Every call is a complete rebuild. Generated files are removed before
  /// this returns, on success and on failure.
  pub async fn build(&mut self) -> Result<BuildReport, BuildError> {
    self.state = BuildState::Init;
    info!(source = %self.spec.source_dir.display(), "building archive");

    let result = self.run_pipeline().await;

    let teardown = self.generated.teardown();
    if !teardown.failed.is_empty() {
      warn!(count = teardown.failed.len(), "some generated paths could not be removed");
    }

    match result {
      Ok(report) => {
        self.state = BuildState::Done;
        info!(archive = %report.archive.display(), members = report.members.len(), "archive built");
        Ok(report)
      }
      Err(e) => {
        self.state = BuildState::Failed(e.stage);
        Err(e)
      }
    }
  }

  async fn run_pipeline(&mut self) -> Result<BuildReport, BuildError> {
    let destination = self.validate().map_err(|e| self.fail(BuildStage::Validate, e))?;
    self.destination = Some(destination.clone());

    let mut bytecode_removed = 0;
    if self.spec.clean_bytecode {
      debug!("cleaning bytecode");
      bytecode_removed = archive::clean_bytecode(&self.spec.source_dir)
        .map_err(|e| self.fail(BuildStage::CleanBytecode, e))?
        .len();
    }
    self.state = BuildState::ByteCodeCleaned;

    let launcher = self.spec.launcher_path();
    let entry_point = match synthesize_launcher(&self.spec.entry_point, &launcher) {
      Ok(entry_point) => {
        self.generated.record(&launcher);
        entry_point
      }
      Err(e) => {
        // A failed write may have left a partial launcher behind.
        if matches!(e, EntryPointError::Write { .. }) {
          self.generated.record(&launcher);
        }
        return Err(self.fail(BuildStage::SynthesizeEntryPoint, e));
      }
    };
    self.state = BuildState::EntrySynthesized;

    let vendor_dir = self.spec.vendor_dir();
    let manifest = self.spec.manifest_path();
    let request = InstallRequest {
      vendor_dir: &vendor_dir,
      specs: &self.spec.dependencies,
      manifest: manifest.as_deref(),
      installer: &self.spec.installer,
      verbose: self.spec.verbose,
    };
    let installed = install_dependencies(&request, &mut self.generated)
      .await
      .map_err(|e| self.fail(BuildStage::InstallDependencies, e))?;
    self.state = BuildState::DependenciesInstalled;

    if self.spec.ignore.is_ignored(&launcher, &self.spec.source_dir) {
      return Err(self.fail(BuildStage::Archive, archive::ArchiveError::LauncherIgnored { path: launcher }));
    }

    info!(path = %destination.display(), "writing archive");
    let summary = archive::write_archive(&self.spec.source_dir, &destination, &self.spec.ignore)
      .map_err(|e| self.fail(BuildStage::Archive, e))?;
    self.state = BuildState::Archived;

    archive::inject_header(&destination, &self.spec.shebang).map_err(|e| self.fail(BuildStage::InjectHeader, e))?;
    self.state = BuildState::HeaderInjected;

    if let Err(e) = permissions::set_executable(&destination) {
      warn!(path = %destination.display(), error = %e, "failed to set executable permission");
    }
    self.state = BuildState::PermissionsSet;

    let bytes = std::fs::metadata(&destination).map(|m| m.len()).unwrap_or(0);

    Ok(BuildReport {
      source_dir: self.spec.source_dir.clone(),
      archive: destination,
      members: summary.members,
      bytes,
      compression: format!("{:?}", summary.compression),
      entry_point: entry_point.to_string(),
      dependencies: installed.installed,
      manifest: installed.manifest,
      bytecode_removed,
    })
  }

  /// Nothing on disk is modified before this succeeds.
  fn validate(&mut self) -> Result<PathBuf, SpecError> {
    self.spec.resolve_paths()
  }

  fn fail(&self, stage: BuildStage, error: impl Into<StageError>) -> BuildError {
    let error = error.into();
    warn!(source = %self.spec.source_dir.display(), stage = %stage, error = %error, "build stage failed");
    BuildError {
      source_dir: self.spec.source_dir.clone(),
      stage,
      error,
    }
  }
}
