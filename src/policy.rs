// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Declarative lifecycle policies.
//!
//! A [`Policy`] pairs a selector (tag and/or key pattern) with a lifecycle
//! action (set a TTL, or invalidate). Rules are immutable once loaded:
//! [`PolicyEngine::new`] compiles every key pattern up front and rejects
//! the whole rule set if any pattern is invalid, so evaluation can never
//! silently skip a rule at runtime.
//!
//! Evaluation walks rules in descending priority order and stops at the
//! first rule whose selector matches; this is a strategy table, not a
//! constraint solver.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy '{id}' has invalid key pattern '{pattern}': {source}")]
    InvalidPattern {
        id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Lifecycle action a policy prescribes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PolicyAction {
    /// Pin the entry's lifetime to this many seconds.
    Ttl { duration_seconds: u64 },
    /// Remove the entry.
    Invalidate,
}

/// One declarative rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    /// Tag the item must carry for this rule to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Regex the item's key must match for this rule to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pattern: Option<String>,
    pub action: PolicyAction,
    pub priority: i32,
}

/// Outcome of evaluating an item against the rule set.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    Ttl {
        duration_seconds: u64,
        policy_id: String,
    },
    Invalidate {
        policy_id: String,
    },
    /// No rule matched.
    None,
}

struct CompiledPolicy {
    policy: Policy,
    key_regex: Option<Regex>,
}

impl CompiledPolicy {
    /// Conjunctive across all selector fields present on the rule.
    fn matches(&self, key: &str, tags: &[String]) -> bool {
        if let Some(ref tag) = self.policy.tag {
            if !tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(ref re) = self.key_regex {
            if !re.is_match(key) {
                return false;
            }
        }
        true
    }
}

/// Pre-sorted, pre-compiled rule set.
pub struct PolicyEngine {
    rules: Vec<CompiledPolicy>,
}

impl PolicyEngine {
    /// Compile and sort a rule set. Fails if any key pattern is not a valid
    /// regex; a rule set that loads is a rule set that evaluates.
    pub fn new(mut policies: Vec<Policy>) -> Result<Self, PolicyError> {
        // Descending priority; first match wins during evaluation
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut rules = Vec::with_capacity(policies.len());
        for policy in policies {
            let key_regex = match policy.key_pattern {
                Some(ref pattern) => {
                    Some(Regex::new(pattern).map_err(|source| PolicyError::InvalidPattern {
                        id: policy.id.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?)
                }
                None => None,
            };
            rules.push(CompiledPolicy { policy, key_regex });
        }

        Ok(Self { rules })
    }

    /// Number of loaded rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate an item. Highest-priority matching rule wins; no match
    /// returns [`PolicyDecision::None`].
    #[must_use]
    pub fn evaluate(&self, key: &str, tags: &[String]) -> PolicyDecision {
        for rule in &self.rules {
            if rule.matches(key, tags) {
                debug!(
                    policy_id = %rule.policy.id,
                    priority = rule.policy.priority,
                    key,
                    "Policy matched"
                );
                return match rule.policy.action {
                    PolicyAction::Ttl { duration_seconds } => PolicyDecision::Ttl {
                        duration_seconds,
                        policy_id: rule.policy.id.clone(),
                    },
                    PolicyAction::Invalidate => PolicyDecision::Invalidate {
                        policy_id: rule.policy.id.clone(),
                    },
                };
            }
        }
        PolicyDecision::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ttl_policy(id: &str, priority: i32, tag: Option<&str>, pattern: Option<&str>) -> Policy {
        Policy {
            id: id.to_string(),
            tag: tag.map(String::from),
            key_pattern: pattern.map(String::from),
            action: PolicyAction::Ttl { duration_seconds: 300 },
            priority,
        }
    }

    #[test]
    fn test_empty_rule_set_returns_none() {
        let engine = PolicyEngine::new(vec![]).unwrap();
        assert_eq!(engine.evaluate("any-key", &[]), PolicyDecision::None);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_invalid_pattern_rejected_at_load() {
        let result = PolicyEngine::new(vec![ttl_policy("bad", 1, None, Some("[unclosed"))]);

        let err = result.err().expect("load should fail");
        let msg = err.to_string();
        assert!(msg.contains("bad"));
        assert!(msg.contains("[unclosed"));
    }

    #[test]
    fn test_highest_priority_wins() {
        let engine = PolicyEngine::new(vec![
            Policy {
                id: "low".into(),
                tag: None,
                key_pattern: Some("^chat:".into()),
                action: PolicyAction::Ttl { duration_seconds: 60 },
                priority: 1,
            },
            Policy {
                id: "high".into(),
                tag: None,
                key_pattern: Some("^chat:".into()),
                action: PolicyAction::Invalidate,
                priority: 10,
            },
        ])
        .unwrap();

        assert_eq!(
            engine.evaluate("chat:abc", &[]),
            PolicyDecision::Invalidate { policy_id: "high".into() }
        );
    }

    #[test]
    fn test_first_match_stops_iteration() {
        // Both rules match; only the higher-priority TTL applies (no union)
        let engine = PolicyEngine::new(vec![
            Policy {
                id: "pin-ttl".into(),
                tag: Some("pricing".into()),
                key_pattern: None,
                action: PolicyAction::Ttl { duration_seconds: 120 },
                priority: 5,
            },
            Policy {
                id: "drop".into(),
                tag: Some("pricing".into()),
                key_pattern: None,
                action: PolicyAction::Invalidate,
                priority: 1,
            },
        ])
        .unwrap();

        let decision = engine.evaluate("k", &["pricing".into()]);
        assert_eq!(
            decision,
            PolicyDecision::Ttl { duration_seconds: 120, policy_id: "pin-ttl".into() }
        );
    }

    #[test]
    fn test_selector_is_conjunctive() {
        let engine = PolicyEngine::new(vec![ttl_policy(
            "both",
            1,
            Some("docs"),
            Some("^page:"),
        )])
        .unwrap();

        // Tag matches, pattern doesn't
        assert_eq!(engine.evaluate("chat:1", &["docs".into()]), PolicyDecision::None);
        // Pattern matches, tag doesn't
        assert_eq!(engine.evaluate("page:1", &["news".into()]), PolicyDecision::None);
        // Both match
        assert!(matches!(
            engine.evaluate("page:1", &["docs".into()]),
            PolicyDecision::Ttl { .. }
        ));
    }

    #[test]
    fn test_rule_without_selectors_matches_everything() {
        let engine = PolicyEngine::new(vec![ttl_policy("catchall", 0, None, None)]).unwrap();

        assert!(matches!(
            engine.evaluate("anything", &[]),
            PolicyDecision::Ttl { .. }
        ));
    }

    #[test]
    fn test_tag_membership_on_item_tag_set() {
        let engine = PolicyEngine::new(vec![ttl_policy("tagged", 1, Some("hot"), None)]).unwrap();

        let tags = vec!["cold".to_string(), "hot".to_string()];
        assert!(matches!(engine.evaluate("k", &tags), PolicyDecision::Ttl { .. }));
        assert_eq!(engine.evaluate("k", &["cold".into()]), PolicyDecision::None);
    }

    #[test]
    fn test_policies_roundtrip_as_config() {
        let json = r#"[
            {"id": "news", "key_pattern": "^news:", "action": {"type": "ttl", "duration_seconds": 300}, "priority": 2},
            {"id": "purge", "tag": "deprecated", "action": {"type": "invalidate"}, "priority": 9}
        ]"#;
        let policies: Vec<Policy> = serde_json::from_str(json).unwrap();
        let engine = PolicyEngine::new(policies).unwrap();

        assert_eq!(engine.len(), 2);
        assert_eq!(
            engine.evaluate("x", &["deprecated".into()]),
            PolicyDecision::Invalidate { policy_id: "purge".into() }
        );
    }
}
