//! The rule contract and the diagnostic/fix types rules produce.
//!
//! A rule is plain data plus behavior: static metadata (id, department,
//! subscribed node kinds, default severity) and a check function invoked
//! once per subscribed node during traversal. Rules are stateless across
//! files; anything a rule needs to remember within one file (e.g. seen
//! signatures for duplicate detection) lives in the per-traversal scratch
//! slot handed to it through [`CheckContext`].

use crate::tree::{Node, Span, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Severity levels for diagnostics. `Fatal` is reserved for the engine
/// itself (rule crashes); rules report `Info` through `Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "deny" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// A diagnostic reported by a rule (or by the engine on a rule's behalf).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub rule_id: &'static str,
    pub department: &'static str,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub fix: Option<Fix>,
}

/// Whether a fix can be applied without changing program behavior.
/// Unsafe fixes are excluded from correction unless explicitly opted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Applicability {
    #[default]
    Safe,
    Unsafe,
}

/// A proposed correction: one or more edits that apply atomically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    pub applicability: Applicability,
    pub edits: Vec<Edit>,
}

impl Fix {
    /// A fix that preserves behavior and may be applied automatically.
    pub fn safe(edits: Vec<Edit>) -> Self {
        Self {
            applicability: Applicability::Safe,
            edits,
        }
    }

    /// A fix that may change behavior; applied only on explicit opt-in.
    pub fn unsafe_(edits: Vec<Edit>) -> Self {
        Self {
            applicability: Applicability::Unsafe,
            edits,
        }
    }
}

/// A single text replacement over a byte range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edit {
    pub span: Span,
    pub replacement: String,
}

impl Edit {
    pub fn replace(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn delete(span: Span) -> Self {
        Self {
            span,
            replacement: String::new(),
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self {
            span: Span::new(offset, offset),
            replacement: text.into(),
        }
    }
}

/// What the dispatcher should do after a rule checked a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep descending into this node's children.
    #[default]
    Continue,
    /// Do not visit this node's children (e.g. generated code blocks).
    SkipSubtree,
}

/// The Rule trait - implement this to add new checks.
pub trait Rule: Send + Sync {
    /// Unique identifier for this rule (e.g. "self-assignment").
    fn id(&self) -> &'static str;

    /// Department the rule belongs to (e.g. "lint", "style"), used for
    /// bulk enable/disable and suppression directives.
    fn department(&self) -> &'static str;

    /// Description of what this rule checks.
    fn description(&self) -> &'static str;

    /// Default severity level.
    fn default_severity(&self) -> Severity;

    /// Whether the rule runs when the configuration does not mention it.
    fn default_enabled(&self) -> bool {
        true
    }

    /// Option names this rule understands; configuration setting anything
    /// else is rejected during registry build.
    fn known_options(&self) -> &'static [&'static str] {
        &[]
    }

    /// Node kinds this rule wants to visit.
    fn subscriptions(&self) -> &'static [&'static str];

    /// Check one subscribed node, reporting findings through `ctx`.
    fn check(&self, node: Node<'_>, ctx: &mut CheckContext<'_>) -> Flow;
}

/// Per-traversal scratch storage, keyed by (rule id, value type).
///
/// Created fresh for each file's dispatch run, so per-file caches can never
/// leak across files or across concurrent engine invocations.
#[derive(Default)]
pub struct Scratch {
    slots: HashMap<(&'static str, TypeId), Box<dyn Any + Send>>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut<T: Default + Send + 'static>(&mut self, rule_id: &'static str) -> &mut T {
        self.slots
            .entry((rule_id, TypeId::of::<T>()))
            .or_insert_with(|| Box::<T>::default())
            .downcast_mut::<T>()
            .expect("scratch slot type is keyed by TypeId")
    }
}

/// Context handed to a rule for one node visit.
///
/// Carries the resolved per-rule configuration and a sink for diagnostics;
/// `report*` fills in rule attribution and location so rules only supply
/// a span and a message.
pub struct CheckContext<'a> {
    tree: &'a SyntaxTree,
    rule_id: &'static str,
    department: &'static str,
    severity: Severity,
    options: &'a HashMap<String, serde_json::Value>,
    scratch: &'a mut Scratch,
    out: &'a mut Vec<Diagnostic>,
}

impl<'a> CheckContext<'a> {
    pub(crate) fn new(
        tree: &'a SyntaxTree,
        rule_id: &'static str,
        department: &'static str,
        severity: Severity,
        options: &'a HashMap<String, serde_json::Value>,
        scratch: &'a mut Scratch,
        out: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            tree,
            rule_id,
            department,
            severity,
            options,
            scratch,
            out,
        }
    }

    /// The source text of the file under analysis.
    pub fn source(&self) -> &'a str {
        self.tree.source()
    }

    /// The tree under analysis.
    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }

    /// The severity diagnostics from this rule will carry, after any
    /// configuration override.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// A configured option value for this rule.
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.options.get(name)
    }

    /// Per-traversal scratch state for this rule, created on first access
    /// and dropped when the file's traversal ends.
    pub fn scratch_mut<T: Default + Send + 'static>(&mut self) -> &mut T {
        self.scratch.get_mut::<T>(self.rule_id)
    }

    /// Report a diagnostic at `span`.
    pub fn report(&mut self, span: Span, message: impl Into<String>) {
        self.report_inner(span, message.into(), None);
    }

    /// Report a diagnostic carrying a proposed fix.
    pub fn report_with_fix(&mut self, span: Span, message: impl Into<String>, fix: Fix) {
        self.report_inner(span, message.into(), Some(fix));
    }

    fn report_inner(&mut self, span: Span, message: String, fix: Option<Fix>) {
        let (line, column) = self.tree.line_col(span.start);
        self.out.push(Diagnostic {
            rule_id: self.rule_id,
            department: self.department,
            severity: self.severity,
            message,
            span,
            line,
            column,
            fix,
        });
    }
}
