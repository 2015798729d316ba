//! Rule evaluation: mock, pass, or pass-and-record per request.

use std::sync::Arc;

use tracing::debug;

use super::decision::{Decision, MockResponse};
use super::pattern::CompiledRule;
use crate::config::{Config, RuleAction};
use crate::fingerprint::Fingerprint;
use crate::recording::{Record, VariantStore};
use crate::selection::SelectionStore;

const NOT_RECORDED: &str = "Not found in recorded data";
const NOT_RECORDED_OFFLINE: &str = "Not found in recorded data (offline mode)";

/// Action used when no rule matches: the configured fallback when it is a
/// known action, otherwise derived from the legacy mode flags.
pub fn resolve_fallback(config: &Config) -> RuleAction {
    match &config.fallback {
        Some(action) if action.is_known() => action.clone(),
        _ if config.offline_mode => RuleAction::ReturnMock,
        _ if config.record_only_mode => RuleAction::PassAndRecord,
        _ => RuleAction::PassAndRecord,
    }
}

/// First enabled rule with a known action whose pattern matches, else the
/// fallback. Returns the action and the deciding rule's pattern.
pub fn resolve_action(
    config: &Config,
    rules: &[CompiledRule],
    method: &str,
    path: &str,
) -> (RuleAction, Option<String>) {
    let matched = rules
        .iter()
        .filter(|rule| rule.enabled && rule.action.is_known())
        .find(|rule| rule.matches(method, path));

    match matched {
        Some(rule) => {
            debug!("Rule #{} '{}' matched {} {}", rule.index, rule.pattern, method, path);
            (rule.action.clone(), Some(rule.pattern.clone()))
        }
        None => (resolve_fallback(config), None),
    }
}

/// Produces [`Decision`]s, sourcing mocks from pins and recorded variants.
pub struct DecisionEngine {
    store: Arc<VariantStore>,
    selections: Arc<SelectionStore>,
}

impl DecisionEngine {
    pub fn new(store: Arc<VariantStore>, selections: Arc<SelectionStore>) -> Self {
        Self { store, selections }
    }

    /// Decide for a request. `path` is the request pathname used for rule
    /// matching; `fingerprint` locates recorded variants.
    pub fn decide(
        &self,
        config: &Config,
        rules: &[CompiledRule],
        method: &str,
        path: &str,
        fingerprint: &Fingerprint,
    ) -> Decision {
        let (action, applied_rule) = resolve_action(config, rules, method, path);
        // Only a matched rule or a configured fallback overrides the 5xx policy.
        let explicit = applied_rule.is_some()
            || config.fallback.as_ref().is_some_and(|a| a.is_known());
        match action {
            RuleAction::PassOnly | RuleAction::PassAndRecord if config.offline_mode => {
                debug!("Offline mode, serving recorded data instead of forwarding");
                self.mock_decision(fingerprint, applied_rule, true)
            }
            RuleAction::PassOnly => Decision::forward(explicit.then_some(false), applied_rule),
            RuleAction::PassAndRecord => Decision::forward(explicit.then_some(true), applied_rule),
            // resolve_action never yields an unknown action
            RuleAction::ReturnMock | RuleAction::Unknown(_) => {
                self.mock_decision(fingerprint, applied_rule, config.offline_mode)
            }
        }
    }

    fn mock_decision(
        &self,
        fingerprint: &Fingerprint,
        applied_rule: Option<String>,
        offline: bool,
    ) -> Decision {
        match self.cached_record(fingerprint) {
            Some((record, pinned)) => {
                Decision::serve(MockResponse::from_record(&record), applied_rule, pinned)
            }
            None => {
                let message = if offline { NOT_RECORDED_OFFLINE } else { NOT_RECORDED };
                Decision::serve(MockResponse::json_error(404, message), applied_rule, false)
            }
        }
    }

    /// The record to serve for a fingerprint: the pinned variant if the pin
    /// is live, else the default variant. The flag tells whether it was pinned.
    pub fn cached_record(&self, fingerprint: &Fingerprint) -> Option<(Record, bool)> {
        if let Some(record) = self.selections.find_selected_record(fingerprint, &self.store) {
            return Some((record, true));
        }
        self.store
            .default_record(fingerprint)
            .map(|record| (record, false))
    }
}
