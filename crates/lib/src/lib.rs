//! zapper-lib: archive assembly for self-executing Python zipapps
//!
//! This crate turns a source directory plus a build description into one
//! executable archive:
//! - `BuildSpec`: fully resolved configuration for a single archive target
//! - `ArchiveBuilder`: runs the build pipeline and tears down what it generated
//! - `IgnoreSet`: decides which paths stay out of the archive
//! - `EntryPoint`: parsed `module:callable args` launcher target
//! - `descriptor`: reads the `build` file that declares archive targets

pub mod build;
pub mod consts;
pub mod deps;
pub mod descriptor;
pub mod entrypoint;
pub mod ignore;
pub mod template;
pub mod util;

pub use build::{ArchiveBuilder, BuildError, BuildReport, BuildSpec, BuildStage, BuildState};
pub use entrypoint::EntryPoint;
pub use ignore::{IgnoreMode, IgnoreSet};
