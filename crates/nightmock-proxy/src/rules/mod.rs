//! Rule engine: ordered glob rules and a fallback policy decide whether a
//! request is mocked, passed through, or passed and recorded.

mod decision;
mod engine;
mod pattern;
mod presets;

use tracing::warn;

use crate::config::Rule;

pub use decision::{Decision, MockResponse, MOCK_MARKER_HEADER, MOCK_MARKER_VALUE};
pub use engine::{resolve_action, resolve_fallback, DecisionEngine};
pub use pattern::{split_method, CompiledRule, PathMatcher};
pub use presets::{PresetError, PresetStore, RulePreset};

/// Compile rules in order. A rule whose pattern cannot be compiled is
/// dropped with a warning.
pub fn compile_rules(rules: &[Rule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| match CompiledRule::compile(index, rule) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                warn!("Skipping rule #{} '{}': {}", index, rule.pattern, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleAction;

    #[test]
    fn test_compile_preserves_order() {
        let rules = vec![
            Rule::new("/b", RuleAction::PassOnly),
            Rule::new("/a", RuleAction::ReturnMock),
        ];
        let compiled = compile_rules(&rules);
        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[0].pattern, "/b");
        assert_eq!(compiled[1].index, 1);
    }
}
