//! Named text templates with `{{ variable }}` substitution.
//!
//! Templates are compiled into the crate and looked up by name. Rendering
//! fails if the template references a variable that was not supplied, so a
//! generated file can never contain an unexpanded placeholder.
//!
//! # Syntax
//!
//! - `{{ name }}` - replaced by the value of `name` (whitespace inside the
//!   braces is ignored)
//! - `{{{{` - a literal `{{`
//!
//! A single `{` passes through unchanged.

use std::collections::BTreeMap;

use thiserror::Error;

/// Name of the launcher template.
pub const LAUNCHER_TEMPLATE: &str = "__main__.py";

const TEMPLATES: &[(&str, &str)] = &[(
  LAUNCHER_TEMPLATE,
  include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/__main__.py.tmpl")),
)];

/// Variables available to a template.
pub type Vars<'a> = BTreeMap<&'a str, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("template not found: {0}")]
  Missing(String),

  #[error("undefined variable '{variable}' in template {template}")]
  UndefinedVariable { template: String, variable: String },

  #[error("unclosed placeholder at position {position} in template {template}")]
  Unclosed { template: String, position: usize },
}

/// Look up a compiled-in template by name.
pub fn lookup(name: &str) -> Result<&'static str, TemplateError> {
  TEMPLATES
    .iter()
    .find(|(template_name, _)| *template_name == name)
    .map(|(_, source)| *source)
    .ok_or_else(|| TemplateError::Missing(name.to_string()))
}

/// Render the named template with `vars`.
pub fn render(name: &str, vars: &Vars<'_>) -> Result<String, TemplateError> {
  render_source(name, lookup(name)?, vars)
}

/// Render template text directly. `name` is only used in error messages.
pub fn render_source(name: &str, source: &str, vars: &Vars<'_>) -> Result<String, TemplateError> {
  let mut out = String::with_capacity(source.len());
  let mut rest = source;
  let mut offset = 0;

  while let Some(start) = rest.find("{{") {
    out.push_str(&rest[..start]);
    let after_open = &rest[start + 2..];

    if let Some(stripped) = after_open.strip_prefix("{{") {
      out.push_str("{{");
      offset += start + 4;
      rest = stripped;
      continue;
    }

    let end = after_open.find("}}").ok_or_else(|| TemplateError::Unclosed {
      template: name.to_string(),
      position: offset + start,
    })?;

    let variable = after_open[..end].trim();
    let value = vars.get(variable).ok_or_else(|| TemplateError::UndefinedVariable {
      template: name.to_string(),
      variable: variable.to_string(),
    })?;
    out.push_str(value);

    offset += start + 2 + end + 2;
    rest = &after_open[end + 2..];
  }

  out.push_str(rest);
  Ok(out)
}
