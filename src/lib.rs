//! precinct: a pluggable static-analysis rule engine.
//!
//! The engine walks a caller-provided syntax tree once, dispatches each
//! node to the rules subscribed to its kind, collects suppression-aware
//! diagnostics, and optionally derives safe, minimal source corrections.
//! Parsing, file discovery, and configuration loading stay with the
//! caller; the engine only needs an already-built [`SyntaxTree`], a
//! resolved [`RuleConfig`], and (for correction) a [`Parser`] to
//! re-validate corrected text.
//!
//! ```ignore
//! let registry = Registry::build(rules, &config, Validation::Strict)?;
//! let diagnostics = precinct::analyze(&tree, &registry, &config)?;
//! ```

pub mod collect;
pub mod config;
pub mod correct;
pub mod dispatch;
pub mod error;
pub mod pattern;
pub mod registry;
pub mod rule;
pub mod tree;

pub use config::{RuleConfig, RuleSettings, SuppressionDirective};
pub use correct::{CorrectionResult, Corrector, PassOutcome};
pub use dispatch::{CancelToken, Dispatcher};
pub use error::{Error, ParseFailure, Result};
pub use pattern::{Bindings, Capture, Pattern};
pub use registry::{Registry, Validation};
pub use rule::{
    Applicability, CheckContext, Diagnostic, Edit, Fix, Flow, Rule, Scratch, Severity,
};
pub use tree::{Node, NodeId, NodeValue, Parser, Span, SyntaxTree, TreeBuilder};

use rayon::prelude::*;

/// Run analysis over one tree: dispatch plus collection.
pub fn analyze(
    tree: &SyntaxTree,
    registry: &Registry,
    config: &RuleConfig,
) -> anyhow::Result<Vec<Diagnostic>> {
    let raw = Dispatcher::new(registry).run(tree)?;
    Ok(collect::collect(raw, config))
}

/// Like [`analyze`], with cooperative cancellation between node visits.
pub fn analyze_with_cancel(
    tree: &SyntaxTree,
    registry: &Registry,
    config: &RuleConfig,
    cancel: &CancelToken,
) -> anyhow::Result<Vec<Diagnostic>> {
    let raw = Dispatcher::new(registry).run_with_cancel(tree, cancel)?;
    Ok(collect::collect(raw, config))
}

/// Analyze many trees in parallel at file granularity.
///
/// The immutable registry is shared across workers; nothing else is.
/// Results come back in input order, one diagnostic list per tree.
pub fn analyze_all(
    trees: &[SyntaxTree],
    registry: &Registry,
    config: &RuleConfig,
) -> anyhow::Result<Vec<Vec<Diagnostic>>> {
    trees
        .par_iter()
        .map(|tree| analyze(tree, registry, config))
        .collect()
}

/// Full pipeline for one source: analyze and apply safe corrections until
/// the text is clean or the iteration cap is reached.
pub fn analyze_and_correct(
    source: &str,
    parser: &dyn Parser,
    registry: &Registry,
    config: &RuleConfig,
) -> anyhow::Result<CorrectionResult> {
    Ok(Corrector::new(parser).run(source, registry, config)?)
}
