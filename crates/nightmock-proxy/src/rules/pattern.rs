//! Rule pattern compilation and matching.

use regex::Regex;

use crate::config::{Rule, RuleAction};

/// How the path part of a pattern is matched.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Matches every path, including CONNECT authorities
    Any,
    /// Pattern contained `*`; anchored regex where `*` is `.*`
    Glob(Regex),
    /// Plain pattern; matches the path itself, anything below it, and any
    /// path starting with it as raw text
    Prefix(String),
}

impl PathMatcher {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        if pattern == "/" {
            return Ok(PathMatcher::Any);
        }
        if pattern.contains('*') {
            let escaped = regex::escape(pattern).replace(r"\*", ".*");
            return Ok(PathMatcher::Glob(Regex::new(&format!("^{escaped}$"))?));
        }
        Ok(PathMatcher::Prefix(pattern.to_string()))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Any => true,
            PathMatcher::Glob(regex) => regex.is_match(path),
            // Equality and `pattern/` children are both covered by the raw
            // prefix test, so `/api` also matches `/apiv2`.
            PathMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// Split an optional leading method token off a pattern: `"GET /a"` gives
/// `(Some("GET"), "/a")`.
pub fn split_method(pattern: &str) -> (Option<String>, &str) {
    let trimmed = pattern.trim();
    if let Some((head, rest)) = trimmed.split_once(char::is_whitespace) {
        let rest = rest.trim_start();
        if !head.is_empty() && !rest.is_empty() && head.chars().all(|c| c.is_ascii_alphabetic()) {
            return (Some(head.to_ascii_uppercase()), rest);
        }
    }
    (None, trimmed)
}

/// A rule ready for per-request evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub index: usize,
    pub enabled: bool,
    pub pattern: String,
    pub action: RuleAction,
    method: Option<String>,
    path: PathMatcher,
}

impl CompiledRule {
    pub fn compile(index: usize, rule: &Rule) -> Result<Self, regex::Error> {
        let (method, path_pattern) = split_method(&rule.pattern);
        Ok(Self {
            index,
            enabled: rule.enabled,
            pattern: rule.pattern.clone(),
            action: rule.action.clone(),
            method,
            path: PathMatcher::compile(path_pattern)?,
        })
    }

    /// Whether the pattern matches. `path` is the pathname only, no query.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        if let Some(expected) = &self.method {
            if !expected.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        self.path.matches(path)
    }
}
