//! Single-traversal dispatcher: walks a tree once and fans each node out
//! to the rules subscribed to its kind.
//!
//! Rules run to completion in registry order; a panicking rule is caught
//! and converted into a fatal diagnostic attributed to that rule so one
//! bad rule can never abort analysis of the rest of the file. Traversal is
//! strictly sequential and deterministic within a file; cancellation is
//! cooperative and only observed between node visits.

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::rule::{CheckContext, Diagnostic, Flow, Scratch, Severity};
use crate::tree::{Node, SyntaxTree};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation handle. Checked between node visits, never
/// mid-rule: once a rule's check begins it runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from another thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Extract a human-readable message from a panic payload.
///
/// Panic payloads can be String, &str, or other types; fall back to a
/// placeholder for anything else.
fn extract_panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "(unknown panic payload)".to_string()
}

/// Drives one file's analysis over an immutable registry.
pub struct Dispatcher<'r> {
    registry: &'r Registry,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Traverse the tree, invoking subscribed rules per node. Returns the
    /// raw (unsuppressed, unsorted) diagnostics.
    pub fn run(&self, tree: &SyntaxTree) -> Result<Vec<Diagnostic>> {
        self.run_with_cancel(tree, &CancelToken::new())
    }

    /// Like [`run`](Self::run), but checks `cancel` between node visits
    /// and returns [`Error::Cancelled`] when it fires.
    pub fn run_with_cancel(
        &self,
        tree: &SyntaxTree,
        cancel: &CancelToken,
    ) -> Result<Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        // Scratch lives exactly as long as this traversal, so per-file
        // rule caches reset between files by construction.
        let mut scratch = Scratch::new();

        let mut stack: Vec<Node<'_>> = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut skip_subtree = false;
            for &index in self.registry.rules_for(node.kind()) {
                let entry = self.registry.entry(index);
                let rule = entry.rule.as_ref();

                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let mut out = Vec::new();
                    let mut ctx = CheckContext::new(
                        tree,
                        rule.id(),
                        rule.department(),
                        entry.severity,
                        &entry.options,
                        &mut scratch,
                        &mut out,
                    );
                    let flow = rule.check(node, &mut ctx);
                    (out, flow)
                }));

                match outcome {
                    Ok((out, flow)) => {
                        diagnostics.extend(out);
                        if flow == Flow::SkipSubtree {
                            skip_subtree = true;
                        }
                    }
                    Err(payload) => {
                        // Partial reports from the crashed invocation are
                        // discarded along with the closure's local sink.
                        let message = extract_panic_message(&payload);
                        log::warn!("rule '{}' panicked: {message}", rule.id());
                        let (line, column) = tree.line_col(node.span().start);
                        diagnostics.push(Diagnostic {
                            rule_id: rule.id(),
                            department: rule.department(),
                            severity: Severity::Fatal,
                            message: format!("internal error in rule: {message}"),
                            span: node.span(),
                            line,
                            column,
                            fix: None,
                        });
                    }
                }
            }

            if !skip_subtree {
                // Reverse so the explicit stack yields children left to
                // right, i.e. pre-order.
                let children: Vec<Node<'_>> = node.children().collect();
                stack.extend(children.into_iter().rev());
            }
        }

        Ok(diagnostics)
    }
}
