//! Integration tests for the precinct engine.
//!
//! Drives the public API end to end over a tiny assignment language
//! (`name = expr`, one statement per line) with a handful of demo rules.

use precinct::{
    analyze, analyze_all, analyze_and_correct, CheckContext, Diagnostic, Edit, Fix, Flow, Node,
    NodeValue, ParseFailure, Parser, Pattern, Registry, Rule, RuleConfig, Severity, Span,
    SuppressionDirective, SyntaxTree, TreeBuilder, Validation,
};

/// Parses `name = expr` lines into (file (assign (ident|int) (ident|int))*).
struct AssignParser;

fn lines_with_offsets(source: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let mut offset = 0;
    source.split('\n').map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        (start, line)
    })
}

impl AssignParser {
    fn leaf(b: &mut TreeBuilder, start: usize, text: &str) -> precinct::NodeId {
        let span = Span::new(start, start + text.len());
        if text.chars().all(|c| c.is_ascii_digit()) {
            b.leaf_value("int", span, NodeValue::Int(text.parse().unwrap()))
        } else {
            b.leaf_value("ident", span, NodeValue::Str(text.to_string()))
        }
    }
}

impl Parser for AssignParser {
    fn parse(&self, source: &str) -> Result<SyntaxTree, ParseFailure> {
        let mut b = TreeBuilder::new();
        let mut stmts = Vec::new();
        for (line_start, line) in lines_with_offsets(source) {
            if line.trim().is_empty() {
                continue;
            }
            let Some(eq) = line.find('=') else {
                return Err(ParseFailure::at(line_start, "expected 'name = expr'"));
            };
            let lhs_text = line[..eq].trim();
            let rhs_text = line[eq + 1..].trim();
            if lhs_text.is_empty() || rhs_text.is_empty() {
                return Err(ParseFailure::at(line_start, "missing assignment operand"));
            }
            let lhs_start = line_start + line[..eq].find(lhs_text).unwrap();
            let rhs_start = line_start + eq + 1 + line[eq + 1..].find(rhs_text).unwrap();
            let lhs = Self::leaf(&mut b, lhs_start, lhs_text);
            let rhs = Self::leaf(&mut b, rhs_start, rhs_text);
            let span = Span::new(lhs_start, rhs_start + rhs_text.len());
            stmts.push(b.node("assign", span, vec![lhs, rhs]));
        }
        let root = b.node("file", Span::new(0, source.len()), stmts);
        b.finish(root, source)
            .map_err(|e| ParseFailure::new(e.to_string()))
    }
}

fn parse(source: &str) -> SyntaxTree {
    AssignParser.parse(source).expect("test source parses")
}

/// Flags `x = x`, with a safe fix removing the statement.
struct SelfAssignmentRule {
    pattern: Pattern,
}

impl SelfAssignmentRule {
    fn new() -> Self {
        Self {
            pattern: Pattern::compile("(assign $lhs $rhs)").unwrap(),
        }
    }
}

impl Rule for SelfAssignmentRule {
    fn id(&self) -> &'static str {
        "self-assignment"
    }
    fn department(&self) -> &'static str {
        "lint"
    }
    fn description(&self) -> &'static str {
        "Detects a variable assigned to itself"
    }
    fn default_severity(&self) -> Severity {
        Severity::Warning
    }
    fn subscriptions(&self) -> &'static [&'static str] {
        &["assign"]
    }
    fn check(&self, node: Node<'_>, ctx: &mut CheckContext<'_>) -> Flow {
        if let Some(bindings) = self.pattern.matches(node) {
            let lhs = bindings.node("lhs").unwrap();
            let rhs = bindings.node("rhs").unwrap();
            if lhs.structural_eq(rhs) {
                ctx.report_with_fix(
                    node.span(),
                    format!("`{}` is assigned to itself", lhs.text()),
                    Fix::safe(vec![Edit::delete(node.span())]),
                );
            }
        }
        Flow::Continue
    }
}

/// Flags all-uppercase identifiers.
struct ShoutyNameRule;

impl Rule for ShoutyNameRule {
    fn id(&self) -> &'static str {
        "shouty-name"
    }
    fn department(&self) -> &'static str {
        "style"
    }
    fn description(&self) -> &'static str {
        "Detects all-uppercase identifiers"
    }
    fn default_severity(&self) -> Severity {
        Severity::Info
    }
    fn subscriptions(&self) -> &'static [&'static str] {
        &["ident"]
    }
    fn check(&self, node: Node<'_>, ctx: &mut CheckContext<'_>) -> Flow {
        let text = node.text();
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_uppercase()) {
            ctx.report(node.span(), format!("`{text}` is shouting"));
        }
        Flow::Continue
    }
}

/// Flags identifiers longer than the configured `max` (default 3).
struct LongNameRule;

impl Rule for LongNameRule {
    fn id(&self) -> &'static str {
        "long-name"
    }
    fn department(&self) -> &'static str {
        "style"
    }
    fn description(&self) -> &'static str {
        "Detects overly long identifiers"
    }
    fn default_severity(&self) -> Severity {
        Severity::Info
    }
    fn known_options(&self) -> &'static [&'static str] {
        &["max"]
    }
    fn subscriptions(&self) -> &'static [&'static str] {
        &["ident"]
    }
    fn check(&self, node: Node<'_>, ctx: &mut CheckContext<'_>) -> Flow {
        let max = ctx
            .option("max")
            .and_then(|v| v.as_u64())
            .unwrap_or(3) as usize;
        let text = node.text();
        if text.len() > max {
            ctx.report(node.span(), format!("`{text}` is longer than {max} characters"));
        }
        Flow::Continue
    }
}

fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SelfAssignmentRule::new()),
        Box::new(ShoutyNameRule),
        Box::new(LongNameRule),
    ]
}

fn registry_with(config: &RuleConfig) -> Registry {
    Registry::build(all_rules(), config, Validation::Strict).unwrap()
}

#[test]
fn test_self_assignment_scenario() {
    let config = RuleConfig::default();
    let registry = registry_with(&config);
    let tree = parse("x = x");

    let diagnostics = analyze(&tree, &registry, &config).unwrap();

    assert_eq!(diagnostics.len(), 1, "got: {diagnostics:?}");
    let d = &diagnostics[0];
    assert_eq!(d.rule_id, "self-assignment");
    assert_eq!(d.span, Span::new(0, 5));
    assert_eq!((d.line, d.column), (1, 1));
}

#[test]
fn test_no_diagnostics_for_clean_source() {
    let config = RuleConfig::default();
    let registry = registry_with(&config);
    let tree = parse("x = y\ny = 4");

    let diagnostics = analyze(&tree, &registry, &config).unwrap();
    assert!(diagnostics.is_empty(), "got: {diagnostics:?}");
}

#[test]
fn test_same_range_from_two_rules_stays_distinct() {
    let config = RuleConfig::default();
    let registry = registry_with(&config);
    let tree = parse("XXXX = y");

    let diagnostics = analyze(&tree, &registry, &config).unwrap();

    // Both rules flag the same identifier; no cross-rule dedup, and the
    // tie breaks on rule id.
    let flagged: Vec<(&str, Span)> = diagnostics.iter().map(|d| (d.rule_id, d.span)).collect();
    assert_eq!(
        flagged,
        vec![
            ("long-name", Span::new(0, 4)),
            ("shouty-name", Span::new(0, 4)),
        ]
    );
}

#[test]
fn test_rule_option_changes_behavior() {
    let config = RuleConfig::from_toml_str("[rules.long-name.options]\nmax = 10\n").unwrap();
    let registry = registry_with(&config);
    let tree = parse("sensible = y");

    let diagnostics = analyze(&tree, &registry, &config).unwrap();
    assert!(diagnostics.iter().all(|d| d.rule_id != "long-name"));
}

#[test]
fn test_department_disable_via_toml() {
    let config = RuleConfig::from_toml_str("[departments]\nstyle = false\n").unwrap();
    let registry = registry_with(&config);
    let tree = parse("XXXX = XXXX");

    let diagnostics = analyze(&tree, &registry, &config).unwrap();
    // Style rules are gone; lint still runs.
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].rule_id, "self-assignment");
}

#[test]
fn test_suppression_round_trip() {
    let mut config = RuleConfig::default();
    config
        .suppressions
        .push(SuppressionDirective::new("self-assignment", 1, 1));
    let registry = registry_with(&config);
    let tree = parse("x = x\ny = z\nw = w");

    let diagnostics = analyze(&tree, &registry, &config).unwrap();

    // Line 1 suppressed, line 3 reported exactly once.
    let selfs: Vec<&Diagnostic> = diagnostics
        .iter()
        .filter(|d| d.rule_id == "self-assignment")
        .collect();
    assert_eq!(selfs.len(), 1);
    assert_eq!(selfs[0].line, 3);
}

#[test]
fn test_redundant_suppression_reported() {
    let mut config = RuleConfig::default();
    config
        .suppressions
        .push(SuppressionDirective::new("self-assignment", 10, 12));
    let registry = registry_with(&config);
    let tree = parse("x = y");

    let diagnostics = analyze(&tree, &registry, &config).unwrap();

    assert_eq!(diagnostics.len(), 1);
    let meta = &diagnostics[0];
    assert_eq!(meta.rule_id, "redundant-suppression");
    assert_eq!(meta.line, 10);
    assert!(meta.message.contains("self-assignment"));
}

#[test]
fn test_correction_end_to_end() {
    let config = RuleConfig::default();
    let registry = registry_with(&config);

    let result = analyze_and_correct("x = x\ny = z", &AssignParser, &registry, &config).unwrap();

    assert_eq!(result.corrected_text, "\ny = z");
    assert_eq!(result.iterations, 1);
    assert_eq!(result.applied.len(), 1);
    assert_eq!(result.applied[0].rule_id, "self-assignment");
    assert!(result.diagnostics.is_empty());
    assert!(result.unresolved_conflicts.is_empty());
    assert!(!result.rolled_back);
}

#[test]
fn test_correction_output_always_reparses() {
    let config = RuleConfig::default();
    let registry = registry_with(&config);

    let result =
        analyze_and_correct("a = a\nb = b\nc = c", &AssignParser, &registry, &config).unwrap();

    assert!(AssignParser.parse(&result.corrected_text).is_ok());
    assert_eq!(result.applied.len(), 3);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_parallel_analysis_preserves_input_order() {
    let config = RuleConfig::default();
    let registry = registry_with(&config);
    let trees: Vec<SyntaxTree> = vec![parse("x = x"), parse("a = b"), parse("c = c\nd = d")];

    let results = analyze_all(&trees, &registry, &config).unwrap();

    let counts: Vec<usize> = results.iter().map(Vec::len).collect();
    assert_eq!(counts, vec![1, 0, 2]);
}

#[test]
fn test_lenient_build_reports_config_problems() {
    let config = RuleConfig::from_toml_str("[rules.no-such-rule]\nenabled = false\n").unwrap();
    let registry = Registry::build(all_rules(), &config, Validation::Lenient).unwrap();

    assert_eq!(registry.warnings().len(), 1);
    assert!(registry.warnings()[0].message.contains("no-such-rule"));
    // All real rules survive.
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_strict_build_rejects_config_problems() {
    let config = RuleConfig::from_toml_str("[rules.no-such-rule]\nenabled = false\n").unwrap();
    let err = Registry::build(all_rules(), &config, Validation::Strict).unwrap_err();
    assert!(err.to_string().contains("no-such-rule"));
}
