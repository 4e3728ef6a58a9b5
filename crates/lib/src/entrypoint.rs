//! Entry-point parsing and launcher synthesis.
//!
//! An entry point is written as `module.path:callable`, optionally followed by
//! whitespace and an argument string:
//!
//! ```
//! use zapper_lib::EntryPoint;
//!
//! let ep: EntryPoint = "pkg.mod:run --x 1".parse().unwrap();
//! assert_eq!(ep.module_path, "pkg.mod");
//! assert_eq!(ep.callable_name, "run");
//! assert_eq!(ep.argument_string.as_deref(), Some("--x 1"));
//! ```
//!
//! The launcher rendered from it imports the module and exits with the
//! callable's return value. The callable receives one argument, the argument
//! string split shell-style into a list, or no argument when there is none.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::template::{self, LAUNCHER_TEMPLATE, TemplateError, Vars};

#[derive(Debug, Error)]
pub enum EntryPointError {
  #[error("\"{spec}\" is a malformed entry point ({reason}); expected \"module_name:main_function [args]\"")]
  Malformed { spec: String, reason: &'static str },

  #[error("launcher already exists: {}", path.display())]
  LauncherExists { path: PathBuf },

  #[error(transparent)]
  Template(#[from] TemplateError),

  #[error("failed to write launcher {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },
}

/// A parsed `module:callable [args]` entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
  pub module_path: String,
  pub callable_name: String,
  /// Raw argument string, split shell-style by the launcher at run time.
  pub argument_string: Option<String>,
}

impl FromStr for EntryPoint {
  type Err = EntryPointError;

  fn from_str(spec: &str) -> Result<Self, Self::Err> {
    let malformed = |reason| EntryPointError::Malformed {
      spec: spec.to_string(),
      reason,
    };

    let trimmed = spec.trim();
    let (head, argument_string) = match trimmed.split_once(char::is_whitespace) {
      Some((head, rest)) => {
        let rest = rest.trim_start();
        (head, (!rest.is_empty()).then(|| rest.to_string()))
      }
      None => (trimmed, None),
    };

    let mut parts = head.split(':');
    let (module_path, callable_name) = match (parts.next(), parts.next(), parts.next()) {
      (Some(module), Some(callable), None) => (module, callable),
      _ => return Err(malformed("exactly one ':' is required")),
    };

    if module_path.is_empty() || callable_name.is_empty() {
      return Err(malformed("module and callable must both be non-empty"));
    }
    if !module_path.split('.').all(is_identifier) {
      return Err(malformed("module path must be dotted identifiers"));
    }
    if !is_identifier(callable_name) {
      return Err(malformed("callable must be an identifier"));
    }

    Ok(Self {
      module_path: module_path.to_string(),
      callable_name: callable_name.to_string(),
      argument_string,
    })
  }
}

impl fmt::Display for EntryPoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.module_path, self.callable_name)?;
    if let Some(args) = &self.argument_string {
      write!(f, " {args}")?;
    }
    Ok(())
  }
}

impl EntryPoint {
  /// Render the launcher source for this entry point.
  pub fn render_launcher(&self) -> Result<String, TemplateError> {
    let argument_string = match &self.argument_string {
      Some(args) => python_string_literal(args),
      None => "None".to_string(),
    };

    let vars: Vars<'_> = [
      ("module_path", self.module_path.clone()),
      ("callable_name", self.callable_name.clone()),
      ("argument_string", argument_string),
    ]
    .into_iter()
    .collect();

    template::render(LAUNCHER_TEMPLATE, &vars)
  }
}

/// Parse `spec` and write its launcher to `output_path`.
///
/// Never overwrites: if `output_path` already exists the call fails with
/// [`EntryPointError::LauncherExists`] and the file is left untouched.
pub fn synthesize_launcher(spec: &str, output_path: &Path) -> Result<EntryPoint, EntryPointError> {
  let entry_point: EntryPoint = spec.parse()?;
  let content = entry_point.render_launcher()?;

  debug!(
    module = %entry_point.module_path,
    callable = %entry_point.callable_name,
    args = ?entry_point.argument_string,
    path = %output_path.display(),
    "writing launcher"
  );

  let mut file = OpenOptions::new()
    .write(true)
    .create_new(true)
    .open(output_path)
    .map_err(|e| match e.kind() {
      io::ErrorKind::AlreadyExists => EntryPointError::LauncherExists {
        path: output_path.to_path_buf(),
      },
      _ => EntryPointError::Write {
        path: output_path.to_path_buf(),
        source: e,
      },
    })?;

  file.write_all(content.as_bytes()).map_err(|e| EntryPointError::Write {
    path: output_path.to_path_buf(),
    source: e,
  })?;

  Ok(entry_point)
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) if c == '_' || c.is_ascii_alphabetic() => chars.all(|c| c == '_' || c.is_ascii_alphanumeric()),
    _ => false,
  }
}

/// Quote `s` as a single-quoted Python string literal.
fn python_string_literal(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('\'');
  for c in s.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '\'' => out.push_str("\\'"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out.push('\'');
  out
}
