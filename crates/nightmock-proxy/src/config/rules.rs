//! Routing rule configuration: which requests are mocked, passed, or recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do with a request that a rule (or the fallback policy) selects.
///
/// Serialized with the labels the admin UI shows (`"Return Mock"`,
/// `"Pass Only"`, `"Pass + Record"`). Any other label is kept verbatim as
/// [`RuleAction::Unknown`] so it survives a config round-trip, but it never
/// drives a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleAction {
    /// Serve a recorded variant (or a synthetic 404) without contacting upstream
    ReturnMock,
    /// Forward to upstream, never record
    PassOnly,
    /// Forward to upstream and record the response
    PassAndRecord,
    /// Unrecognized action label
    Unknown(String),
}

impl RuleAction {
    pub fn is_known(&self) -> bool {
        !matches!(self, RuleAction::Unknown(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuleAction::ReturnMock => "Return Mock",
            RuleAction::PassOnly => "Pass Only",
            RuleAction::PassAndRecord => "Pass + Record",
            RuleAction::Unknown(label) => label,
        }
    }
}

impl From<String> for RuleAction {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Return Mock" | "ReturnMock" => RuleAction::ReturnMock,
            "Pass Only" | "PassOnly" => RuleAction::PassOnly,
            "Pass + Record" | "PassAndRecord" => RuleAction::PassAndRecord,
            _ => RuleAction::Unknown(label),
        }
    }
}

impl From<&str> for RuleAction {
    fn from(label: &str) -> Self {
        RuleAction::from(label.to_string())
    }
}

impl From<RuleAction> for String {
    fn from(action: RuleAction) -> Self {
        match action {
            RuleAction::Unknown(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single routing rule. Rules are evaluated in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Optional method token, then a path pattern: `"GET /orders/*"`, `"/health"`
    pub pattern: String,
    pub action: RuleAction,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(pattern: impl Into<String>, action: RuleAction) -> Self {
        Self {
            enabled: true,
            pattern: pattern.into(),
            action,
        }
    }
}
