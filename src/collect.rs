//! Diagnostic collection: dedup, suppression, ordering.
//!
//! Collection runs in two phases so redundant suppression directives can
//! be detected: the first phase gathers candidates pre-suppression and
//! tallies, per directive, how many diagnostics it would silence; the
//! second drops the silenced ones and flags every directive that did no
//! work with a `redundant-suppression` meta-diagnostic. The whole thing is
//! a pure function of its inputs.

use crate::config::RuleConfig;
use crate::rule::{Diagnostic, Severity};
use crate::tree::Span;
use std::collections::HashSet;

/// Rule id carried by redundant-suppression meta-diagnostics.
pub const REDUNDANT_SUPPRESSION: &str = "redundant-suppression";

/// Filter, deduplicate, and order raw diagnostics from a dispatcher run.
///
/// - exact (rule id, span, message) repeats collapse to one, as overlapping
///   pattern captures can report the same finding twice
/// - diagnostics inside a matching suppression range are dropped
/// - directives that suppressed nothing produce one meta-diagnostic each
/// - output is sorted by (line, column, rule id) for reproducible runs
pub fn collect(raw: Vec<Diagnostic>, config: &RuleConfig) -> Vec<Diagnostic> {
    let mut seen: HashSet<(&'static str, Span, String)> = HashSet::new();
    let mut candidates = Vec::with_capacity(raw.len());
    for diagnostic in raw {
        let key = (
            diagnostic.rule_id,
            diagnostic.span,
            diagnostic.message.clone(),
        );
        if seen.insert(key) {
            candidates.push(diagnostic);
        }
    }

    let mut hits = vec![0usize; config.suppressions.len()];
    let mut kept = Vec::with_capacity(candidates.len());
    for diagnostic in candidates {
        let mut suppressed = false;
        for (index, directive) in config.suppressions.iter().enumerate() {
            if directive.matches(diagnostic.rule_id, diagnostic.department, diagnostic.line) {
                hits[index] += 1;
                suppressed = true;
            }
        }
        if !suppressed {
            kept.push(diagnostic);
        }
    }

    for (index, directive) in config.suppressions.iter().enumerate() {
        if hits[index] == 0 {
            kept.push(Diagnostic {
                rule_id: REDUNDANT_SUPPRESSION,
                department: "suppression",
                severity: Severity::Warning,
                message: format!(
                    "suppression of '{}' over lines {}-{} matched no diagnostics",
                    directive.target, directive.start_line, directive.end_line
                ),
                span: Span::new(0, 0),
                line: directive.start_line,
                column: 1,
                fix: None,
            });
        }
    }

    kept.sort_by(|a, b| {
        (a.line, a.column, a.rule_id).cmp(&(b.line, b.column, b.rule_id))
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuppressionDirective;
    use pretty_assertions::assert_eq;

    fn diag(rule_id: &'static str, department: &'static str, line: usize) -> Diagnostic {
        Diagnostic {
            rule_id,
            department,
            severity: Severity::Warning,
            message: format!("{rule_id} fired"),
            span: Span::new(line * 10, line * 10 + 1),
            line,
            column: 1,
            fix: None,
        }
    }

    fn config_with(suppressions: Vec<SuppressionDirective>) -> RuleConfig {
        RuleConfig {
            suppressions,
            ..RuleConfig::default()
        }
    }

    #[test]
    fn test_suppression_inside_range_drops_diagnostic() {
        let config = config_with(vec![SuppressionDirective::new("foo", 10, 12)]);
        let raw = vec![diag("foo", "lint", 11), diag("foo", "lint", 13)];
        let out = collect(raw, &config);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, 13);
    }

    #[test]
    fn test_department_and_all_targets() {
        let config = config_with(vec![
            SuppressionDirective::new("lint", 1, 1),
            SuppressionDirective::new("all", 2, 2),
        ]);
        let raw = vec![
            diag("foo", "lint", 1),
            diag("bar", "style", 2),
            diag("baz", "style", 3),
        ];
        let out = collect(raw, &config);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rule_id, "baz");
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let raw = vec![diag("foo", "lint", 1), diag("foo", "lint", 1)];
        let out = collect(raw, &RuleConfig::default());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_no_dedup_across_rule_ids() {
        // Two rules flagging the same range stay distinct, ordered by id.
        let mut a = diag("zzz-rule", "lint", 1);
        let mut b = diag("aaa-rule", "lint", 1);
        a.span = Span::new(0, 1);
        b.span = Span::new(0, 1);
        a.message = "same range".into();
        b.message = "same range".into();
        let out = collect(vec![a, b], &RuleConfig::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].rule_id, "aaa-rule");
        assert_eq!(out[1].rule_id, "zzz-rule");
    }

    #[test]
    fn test_sorted_by_location_then_rule() {
        let raw = vec![
            diag("b-rule", "lint", 5),
            diag("a-rule", "lint", 2),
            diag("c-rule", "lint", 2),
        ];
        let out = collect(raw, &RuleConfig::default());
        let order: Vec<(usize, &str)> = out.iter().map(|d| (d.line, d.rule_id)).collect();
        assert_eq!(
            order,
            vec![(2, "a-rule"), (2, "c-rule"), (5, "b-rule")]
        );
    }

    #[test]
    fn test_redundant_directive_flagged_once() {
        let config = config_with(vec![SuppressionDirective::new("foo", 10, 12)]);
        let out = collect(Vec::new(), &config);
        assert_eq!(out.len(), 1);
        let meta = &out[0];
        assert_eq!(meta.rule_id, REDUNDANT_SUPPRESSION);
        assert_eq!(meta.line, 10);
        assert!(meta.message.contains("'foo'"));
        assert!(meta.message.contains("10-12"));
    }

    #[test]
    fn test_useful_directive_not_flagged() {
        let config = config_with(vec![SuppressionDirective::new("foo", 10, 12)]);
        let out = collect(vec![diag("foo", "lint", 10)], &config);
        assert!(out.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let config = config_with(vec![
            SuppressionDirective::new("foo", 1, 2),
            SuppressionDirective::new("unused", 50, 60),
        ]);
        let raw = vec![
            diag("foo", "lint", 1),
            diag("bar", "lint", 3),
            diag("bar", "lint", 3),
        ];
        let first = collect(raw.clone(), &config);
        let second = collect(raw, &config);
        assert_eq!(first, second);
    }
}
