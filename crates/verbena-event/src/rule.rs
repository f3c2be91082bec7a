use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::envelope::EventEnvelope;

/// The detail-type filter of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypePattern {
  /// Match every detail-type (the explicit any-type sentinel).
  Any,
  /// Match only the listed detail-types.
  OneOf(HashSet<String>),
}

impl TypePattern {
  /// Build a `OneOf` pattern from anything yielding strings.
  pub fn one_of<I, S>(types: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::OneOf(types.into_iter().map(Into::into).collect())
  }

  fn matches(&self, detail_type: &str) -> bool {
    match self {
      Self::Any => true,
      Self::OneOf(types) => types.contains(detail_type),
    }
  }
}

/// A content-based routing rule binding matching envelopes to a workflow.
///
/// A rule matches an envelope iff the envelope source is in `sources` and the
/// detail-type passes `types`. Matching is exact and case-sensitive; rules
/// are independent filters, so registration order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
  pub name: String,
  pub sources: HashSet<String>,
  pub types: TypePattern,
  /// The workflow id this rule dispatches to.
  pub target: String,
}

impl Rule {
  pub fn new<I, S>(
    name: impl Into<String>,
    sources: I,
    types: TypePattern,
    target: impl Into<String>,
  ) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      name: name.into(),
      sources: sources.into_iter().map(Into::into).collect(),
      types,
      target: target.into(),
    }
  }

  /// Check whether this rule matches the envelope.
  pub fn matches(&self, envelope: &EventEnvelope) -> bool {
    self.sources.contains(&envelope.source) && self.types.matches(&envelope.detail_type)
  }
}
