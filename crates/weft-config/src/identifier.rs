use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of a registered definition.
///
/// Displayed as `project/domain/name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
  pub project: String,
  pub domain: String,
  pub name: String,
  pub version: String,
}

impl Identifier {
  pub fn new(
    project: impl Into<String>,
    domain: impl Into<String>,
    name: impl Into<String>,
    version: impl Into<String>,
  ) -> Self {
    Self {
      project: project.into(),
      domain: domain.into(),
      name: name.into(),
      version: version.into(),
    }
  }

  /// Name of the first empty part, if any.
  pub fn empty_part(&self) -> Option<&'static str> {
    [
      ("project", &self.project),
      ("domain", &self.domain),
      ("name", &self.name),
      ("version", &self.version),
    ]
    .into_iter()
    .find(|(_, value)| value.is_empty())
    .map(|(part, _)| part)
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}/{}/{}@{}",
      self.project, self.domain, self.name, self.version
    )
  }
}

/// Selects identifiers by project and domain, and optionally by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierFilter {
  pub project: String,
  pub domain: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

impl IdentifierFilter {
  pub fn new(project: impl Into<String>, domain: impl Into<String>) -> Self {
    Self {
      project: project.into(),
      domain: domain.into(),
      name: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn matches(&self, id: &Identifier) -> bool {
    id.project == self.project
      && id.domain == self.domain
      && self.name.as_ref().is_none_or(|name| *name == id.name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    let id = Identifier::new("flytesnacks", "development", "pay_wf", "v1");
    assert_eq!(id.to_string(), "flytesnacks/development/pay_wf@v1");
  }

  #[test]
  fn test_empty_part() {
    assert_eq!(Identifier::new("p", "d", "n", "v").empty_part(), None);
    assert_eq!(Identifier::new("p", "", "n", "").empty_part(), Some("domain"));
  }

  #[test]
  fn test_filter_matches() {
    let id = Identifier::new("p", "d", "wf", "v1");
    assert!(IdentifierFilter::new("p", "d").matches(&id));
    assert!(IdentifierFilter::new("p", "d").with_name("wf").matches(&id));
    assert!(!IdentifierFilter::new("p", "d").with_name("other").matches(&id));
    assert!(!IdentifierFilter::new("p", "prod").matches(&id));
  }
}
