//! Resolved per-run configuration handed to the engine by its caller.
//!
//! Config discovery and file loading are the caller's concern; this module
//! only defines the resolved shape plus a TOML helper for callers that use
//! the conventional format:
//!
//! ```toml
//! [rules.self-assignment]
//! severity = "error"
//!
//! [rules.too-many-arguments.options]
//! max = 4
//!
//! [departments]
//! style = false
//!
//! [[suppressions]]
//! target = "lint"
//! start_line = 10
//! end_line = 12
//! ```

use crate::rule::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolved configuration for one engine run: per-rule settings, bulk
/// department toggles, and line-range suppression directives. Read-only to
/// rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub rules: HashMap<String, RuleSettings>,

    #[serde(default)]
    pub departments: HashMap<String, bool>,

    #[serde(default)]
    pub suppressions: Vec<SuppressionDirective>,
}

/// Per-rule overrides; anything unset falls back to the rule's declared
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSettings {
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub severity: Option<Severity>,

    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

/// Disables one rule, one department, or everything (`"all"`) over an
/// inclusive 1-indexed line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionDirective {
    /// A rule id, a department name, or `"all"`.
    pub target: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl SuppressionDirective {
    pub fn new(target: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            target: target.into(),
            start_line,
            end_line,
        }
    }

    /// Whether this directive silences a diagnostic from `rule_id` /
    /// `department` located at `line`.
    pub fn matches(&self, rule_id: &str, department: &str, line: usize) -> bool {
        self.covers(line)
            && (self.target == "all" || self.target == rule_id || self.target == department)
    }

    fn covers(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

impl RuleConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: RuleConfig = toml::from_str(text)?;
        for directive in &config.suppressions {
            if directive.start_line == 0 || directive.start_line > directive.end_line {
                anyhow::bail!(
                    "invalid suppression range {}..{} for '{}' (lines are 1-indexed, start <= end)",
                    directive.start_line,
                    directive.end_line,
                    directive.target
                );
            }
        }
        Ok(config)
    }

    /// Settings for one rule, if the configuration mentions it.
    pub fn rule(&self, rule_id: &str) -> Option<&RuleSettings> {
        self.rules.get(rule_id)
    }

    /// Department-level enable override, if the configuration has one.
    pub fn department_enabled(&self, department: &str) -> Option<bool> {
        self.departments.get(department).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_empty() {
        let config = RuleConfig::default();
        assert!(config.rules.is_empty());
        assert!(config.departments.is_empty());
        assert!(config.suppressions.is_empty());
    }

    #[test]
    fn test_from_toml() {
        let config = RuleConfig::from_toml_str(
            r#"
[rules.self-assignment]
enabled = true
severity = "error"

[rules.too-many-arguments.options]
max = 4

[departments]
style = false

[[suppressions]]
target = "all"
start_line = 3
end_line = 5
"#,
        )
        .unwrap();

        let settings = config.rule("self-assignment").unwrap();
        assert_eq!(settings.enabled, Some(true));
        assert_eq!(settings.severity, Some(Severity::Error));

        let options = &config.rule("too-many-arguments").unwrap().options;
        assert_eq!(options.get("max"), Some(&serde_json::json!(4)));

        assert_eq!(config.department_enabled("style"), Some(false));
        assert_eq!(config.department_enabled("lint"), None);
        assert_eq!(config.suppressions.len(), 1);
    }

    #[test]
    fn test_invalid_suppression_range_rejected() {
        let result = RuleConfig::from_toml_str(
            r#"
[[suppressions]]
target = "lint"
start_line = 9
end_line = 2
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_directive_matching() {
        let d = SuppressionDirective::new("self-assignment", 10, 12);
        assert!(d.matches("self-assignment", "lint", 10));
        assert!(d.matches("self-assignment", "lint", 12));
        assert!(!d.matches("self-assignment", "lint", 13));
        assert!(!d.matches("other-rule", "lint", 11));

        let d = SuppressionDirective::new("lint", 1, 2);
        assert!(d.matches("self-assignment", "lint", 1));
        assert!(!d.matches("self-assignment", "style", 1));

        let d = SuppressionDirective::new("all", 1, 1);
        assert!(d.matches("anything", "anywhere", 1));
    }
}
