//! Rule registry: the resolved, immutable rule set for a run.
//!
//! Built once from the full rule list plus configuration, then shared
//! read-only across every file (and thread) the run touches. The registry
//! resolves enabled state, severity overrides, and option maps ahead of
//! time so the dispatcher never consults raw configuration.

use crate::config::RuleConfig;
use crate::error::{Error, Result};
use crate::rule::{Diagnostic, Rule, Severity};
use crate::tree::Span;
use std::collections::{HashMap, HashSet};

/// How strictly registry build validates configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    /// Unknown rule ids, options, or departments fail the build.
    #[default]
    Strict,
    /// Unknown references are logged and surfaced as warning diagnostics.
    Lenient,
}

pub(crate) struct Entry {
    pub(crate) rule: Box<dyn Rule>,
    pub(crate) severity: Severity,
    pub(crate) options: HashMap<String, serde_json::Value>,
}

/// The active rule set, indexed by subscribed node kind. Immutable and
/// safe to share across threads.
pub struct Registry {
    entries: Vec<Entry>,
    by_kind: HashMap<String, Vec<usize>>,
    warnings: Vec<Diagnostic>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("rules", &self.rule_ids().collect::<Vec<_>>())
            .field("kinds", &self.by_kind.len())
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

impl Registry {
    /// Build a registry from a rule list and configuration.
    ///
    /// Rules disabled by configuration (rule-level `enabled = false`, or a
    /// department-level disable with no rule-level override) are dropped.
    /// The index preserves declaration order so diagnostic output is
    /// reproducible across runs.
    pub fn build(
        rules: Vec<Box<dyn Rule>>,
        config: &RuleConfig,
        validation: Validation,
    ) -> Result<Self> {
        let mut seen_ids = HashSet::new();
        for rule in &rules {
            if !seen_ids.insert(rule.id()) {
                return Err(Error::DuplicateRule {
                    rule_id: rule.id().to_string(),
                });
            }
        }

        let mut warnings = Vec::new();
        validate_config(&rules, config, validation, &mut warnings)?;

        let mut entries = Vec::new();
        let mut by_kind: HashMap<String, Vec<usize>> = HashMap::new();

        for rule in rules {
            let settings = config.rule(rule.id());
            let enabled = settings
                .and_then(|s| s.enabled)
                .or_else(|| config.department_enabled(rule.department()))
                .unwrap_or_else(|| rule.default_enabled());
            if !enabled {
                continue;
            }

            let severity = settings
                .and_then(|s| s.severity)
                .unwrap_or_else(|| rule.default_severity());
            let options = settings.map(|s| s.options.clone()).unwrap_or_default();

            let index = entries.len();
            for kind in rule.subscriptions() {
                by_kind.entry((*kind).to_string()).or_default().push(index);
            }
            entries.push(Entry {
                rule,
                severity,
                options,
            });
        }

        Ok(Self {
            entries,
            by_kind,
            warnings,
        })
    }

    /// Configuration problems found during a lenient build, as
    /// `invalid-config` warning diagnostics. Empty after a strict build.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a rule with the given id survived configuration.
    pub fn has_rule(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.rule.id() == id)
    }

    /// Ids of all active rules, in declaration order.
    pub fn rule_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.rule.id())
    }

    pub(crate) fn rules_for(&self, kind: &str) -> &[usize] {
        self.by_kind.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn entry(&self, index: usize) -> &Entry {
        &self.entries[index]
    }
}

fn validate_config(
    rules: &[Box<dyn Rule>],
    config: &RuleConfig,
    validation: Validation,
    warnings: &mut Vec<Diagnostic>,
) -> Result<()> {
    let known_departments: HashSet<&str> = rules.iter().map(|r| r.department()).collect();

    for (rule_id, settings) in &config.rules {
        let Some(rule) = rules.iter().find(|r| r.id() == rule_id) else {
            let err = Error::UnknownRule {
                rule_id: rule_id.clone(),
            };
            report_config_problem(err, validation, warnings)?;
            continue;
        };
        for option in settings.options.keys() {
            if !rule.known_options().contains(&option.as_str()) {
                let err = Error::UnknownOption {
                    rule_id: rule_id.clone(),
                    option: option.clone(),
                };
                report_config_problem(err, validation, warnings)?;
            }
        }
    }

    for department in config.departments.keys() {
        if !known_departments.contains(department.as_str()) {
            let err = Error::UnknownDepartment {
                department: department.clone(),
            };
            report_config_problem(err, validation, warnings)?;
        }
    }

    Ok(())
}

fn report_config_problem(
    err: Error,
    validation: Validation,
    warnings: &mut Vec<Diagnostic>,
) -> Result<()> {
    match validation {
        Validation::Strict => Err(err),
        Validation::Lenient => {
            log::warn!("ignoring configuration problem: {err}");
            warnings.push(Diagnostic {
                rule_id: "invalid-config",
                department: "config",
                severity: Severity::Warning,
                message: err.to_string(),
                span: Span::new(0, 0),
                line: 1,
                column: 1,
                fix: None,
            });
            Ok(())
        }
    }
}
