//! Ignore-pattern matching for archive traversal.
//!
//! A candidate path is ignored when any pattern matches it under one of
//! these rules:
//!
//! 1. the pattern is a substring of the absolute path
//! 2. the pattern is a substring of the path relative to the source directory
//! 3. the pattern equals the path's basename
//! 4. the pattern equals one whole segment of the relative path
//!
//! Rules 1 and 2 are loose: `env` also matches `environment.py`. They are the
//! default for compatibility with existing build files. [`IgnoreMode::Segments`]
//! applies rules 3 and 4 only.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_IGNORE;

/// Which matching rules an [`IgnoreSet`] applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreMode {
  /// Substring, basename and segment matching.
  #[default]
  Loose,
  /// Basename and exact segment matching only.
  Segments,
}

/// Patterns that keep paths out of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreSet {
  patterns: Vec<String>,
  mode: IgnoreMode,
}

impl Default for IgnoreSet {
  fn default() -> Self {
    Self::new(DEFAULT_IGNORE.iter().map(|p| p.to_string()), IgnoreMode::Loose)
  }
}

impl IgnoreSet {
  /// Empty patterns are dropped: as a substring they would match every path.
  pub fn new<I>(patterns: I, mode: IgnoreMode) -> Self
  where
    I: IntoIterator<Item = String>,
  {
    let mut set = Self {
      patterns: Vec::new(),
      mode,
    };
    for pattern in patterns {
      set.insert(pattern);
    }
    set
  }

  pub fn patterns(&self) -> &[String] {
    &self.patterns
  }

  pub fn mode(&self) -> IgnoreMode {
    self.mode
  }

  /// Add a pattern. Adding never un-ignores a path that was ignored before.
  pub fn insert(&mut self, pattern: impl Into<String>) {
    let pattern = pattern.into();
    if !pattern.is_empty() && !self.patterns.contains(&pattern) {
      self.patterns.push(pattern);
    }
  }

  /// Returns true if `candidate` must be left out of the archive.
  ///
  /// `candidate` is expected to live under `source_dir`; if it does not, the
  /// relative-path rules see the candidate path unchanged.
  pub fn is_ignored(&self, candidate: &Path, source_dir: &Path) -> bool {
    is_ignored(candidate, source_dir, &self.patterns, self.mode)
  }
}

/// Free-standing form of [`IgnoreSet::is_ignored`].
pub fn is_ignored<S: AsRef<str>>(candidate: &Path, source_dir: &Path, patterns: &[S], mode: IgnoreMode) -> bool {
  let relative = candidate.strip_prefix(source_dir).unwrap_or(candidate);
  let segments: Vec<String> = relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();
  let relative_str = segments.join("/");
  let absolute_str = candidate.to_string_lossy();
  let basename = candidate.file_name().map(|n| n.to_string_lossy());

  patterns.iter().map(AsRef::as_ref).filter(|p| !p.is_empty()).any(|pattern| {
    if mode == IgnoreMode::Loose && (absolute_str.contains(pattern) || relative_str.contains(pattern)) {
      return true;
    }

    if basename.as_deref() == Some(pattern) {
      return true;
    }

    segments.iter().any(|segment| segment == pattern)
  })
}
