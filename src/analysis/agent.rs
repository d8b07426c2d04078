//! Agent-name policy: which agent handled a call, judged from its source path.

use serde::{Deserialize, Serialize};

/// Name used when no rule matches
pub const UNKNOWN_AGENT: &str = "Unknown";

/// Maps a record's source path to a human-readable agent name.
pub trait AgentLookup: Send + Sync {
    fn agent_name(&self, source_path: &str) -> String;
}

/// One `substring -> name` rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRule {
    pub pattern: String,
    pub name: String,
}

impl AgentRule {
    pub fn new(pattern: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            name: name.into(),
        }
    }
}

/// Ordered substring rules; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringAgentLookup {
    rules: Vec<AgentRule>,
    default_name: String,
}

impl SubstringAgentLookup {
    pub fn new(rules: Vec<AgentRule>, default_name: impl Into<String>) -> Self {
        Self {
            rules,
            default_name: default_name.into(),
        }
    }

    /// Agents known to the first deployment
    pub fn default_rules() -> Vec<AgentRule> {
        vec![
            AgentRule::new("henrik", "Henrik"),
            AgentRule::new("linus", "Linus"),
            AgentRule::new("alexander", "Alexander"),
            AgentRule::new("axel", "Axel"),
        ]
    }

    pub fn rules(&self) -> &[AgentRule] {
        &self.rules
    }
}

impl Default for SubstringAgentLookup {
    fn default() -> Self {
        Self::new(Self::default_rules(), UNKNOWN_AGENT)
    }
}

impl AgentLookup for SubstringAgentLookup {
    fn agent_name(&self, source_path: &str) -> String {
        self.rules
            .iter()
            .find(|rule| source_path.contains(rule.pattern.as_str()))
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| self.default_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_match() {
        let lookup = SubstringAgentLookup::default();
        assert_eq!(lookup.agent_name("calls/linus_042.wav"), "Linus");
        assert_eq!(lookup.agent_name("henrik-2024-01-01.json"), "Henrik");
        assert_eq!(lookup.agent_name("temp/axel_7.json"), "Axel");
    }

    #[test]
    fn test_unmatched_uses_default() {
        let lookup = SubstringAgentLookup::default();
        assert_eq!(lookup.agent_name("calls/unknown_caller.wav"), UNKNOWN_AGENT);
        assert_eq!(lookup.agent_name(""), UNKNOWN_AGENT);
    }

    #[test]
    fn test_first_rule_wins() {
        // "alexander" is listed before "axel"; a path containing both picks the earlier rule
        let lookup = SubstringAgentLookup::default();
        assert_eq!(lookup.agent_name("alexander_axel.json"), "Alexander");
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let lookup = SubstringAgentLookup::default();
        assert_eq!(lookup.agent_name("LINUS_1.json"), UNKNOWN_AGENT);
    }

    #[test]
    fn test_custom_rules_and_default() {
        let lookup = SubstringAgentLookup::new(vec![AgentRule::new("support", "Support desk")], "Okänt");
        assert_eq!(lookup.agent_name("support/1.json"), "Support desk");
        assert_eq!(lookup.agent_name("linus/1.json"), "Okänt");
        assert_eq!(lookup.rules().len(), 1);
    }
}
