//! Correction engine: turns diagnostics' proposed fixes into corrected
//! source text, safely.
//!
//! A single pass moves through `Collecting -> ConflictChecking -> Applying
//! -> Reparsing` and ends `Accepted` or `RolledBack`. Overlapping edits
//! from different diagnostics are never merged by guesswork: both parties
//! are rejected and reported as unresolved conflicts. A pass whose output
//! no longer parses is rolled back wholesale, so correction can never
//! produce unparsable text. [`Corrector::run`] iterates passes, re-running
//! analysis in between, until a pass applies nothing or the iteration cap
//! is reached.

use crate::collect::collect;
use crate::config::RuleConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ParseFailure, Result};
use crate::registry::Registry;
use crate::rule::{Applicability, Diagnostic, Edit};
use crate::tree::Parser;

/// Default cap on correction iterations within [`Corrector::run`].
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Outcome of one correction pass over a fixed text.
#[derive(Debug)]
pub enum PassOutcome {
    /// The corrected text re-parsed; `applied` may be empty when no
    /// applicable fixes existed.
    Accepted {
        text: String,
        applied: Vec<Diagnostic>,
        conflicts: Vec<Diagnostic>,
    },
    /// The corrected text no longer parsed; the pass was discarded.
    RolledBack {
        failure: ParseFailure,
        conflicts: Vec<Diagnostic>,
    },
}

/// Result of a full correction run.
#[derive(Debug)]
pub struct CorrectionResult {
    /// Final text; equals the input when nothing was applied.
    pub corrected_text: String,
    /// Diagnostics whose fixes were applied, across all iterations.
    pub applied: Vec<Diagnostic>,
    /// Diagnostics whose fixes were rejected in the last executed pass
    /// (overlapping or invalid edits).
    pub unresolved_conflicts: Vec<Diagnostic>,
    /// Diagnostics still present in the final text.
    pub diagnostics: Vec<Diagnostic>,
    /// Number of passes that changed the text.
    pub iterations: usize,
    /// Whether the final pass was rolled back due to a re-parse failure.
    pub rolled_back: bool,
}

/// Applies safe fixes from diagnostics, validating every edit and
/// re-parsing the result through the caller's [`Parser`].
pub struct Corrector<'p> {
    parser: &'p dyn Parser,
    include_unsafe: bool,
    max_iterations: usize,
}

impl<'p> Corrector<'p> {
    pub fn new(parser: &'p dyn Parser) -> Self {
        Self {
            parser,
            include_unsafe: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Also apply fixes marked [`Applicability::Unsafe`].
    pub fn include_unsafe(mut self, include: bool) -> Self {
        self.include_unsafe = include;
        self
    }

    /// Cap the number of text-changing passes in [`run`](Self::run).
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Execute one correction pass over `text`.
    pub fn apply_pass(&self, text: &str, diagnostics: &[Diagnostic]) -> PassOutcome {
        // Collecting: fixable diagnostics with validated edits.
        let mut conflicts = Vec::new();
        let mut candidates: Vec<(&Diagnostic, &[Edit])> = Vec::new();
        for diagnostic in diagnostics {
            let Some(fix) = &diagnostic.fix else { continue };
            if fix.edits.is_empty() {
                continue;
            }
            if fix.applicability == Applicability::Unsafe && !self.include_unsafe {
                continue;
            }
            if let Some(problem) = validate_edits(diagnostic, text) {
                log::warn!(
                    "rejecting fix from '{}' at {}:{}: {problem}",
                    diagnostic.rule_id,
                    diagnostic.line,
                    diagnostic.column
                );
                conflicts.push(diagnostic.clone());
                continue;
            }
            candidates.push((diagnostic, fix.edits.as_slice()));
        }

        // ConflictChecking: any overlap rejects both parties; a
        // diagnostic whose own edits overlap conflicts with itself.
        let mut rejected = vec![false; candidates.len()];
        for (i, (_, edits)) in candidates.iter().enumerate() {
            for (a, b) in pairs(edits.len()) {
                if edits[a].span.overlaps(edits[b].span) {
                    rejected[i] = true;
                }
            }
        }
        for (i, j) in pairs(candidates.len()) {
            let (_, left) = candidates[i];
            let (_, right) = candidates[j];
            let overlap = left
                .iter()
                .any(|a| right.iter().any(|b| a.span.overlaps(b.span)));
            if overlap {
                rejected[i] = true;
                rejected[j] = true;
            }
        }

        let mut applied = Vec::new();
        let mut edits = Vec::new();
        for (index, (candidate, candidate_edits)) in candidates.iter().enumerate() {
            if rejected[index] {
                conflicts.push((*candidate).clone());
            } else {
                applied.push((*candidate).clone());
                edits.extend(candidate_edits.iter().cloned());
            }
        }

        if applied.is_empty() {
            return PassOutcome::Accepted {
                text: text.to_string(),
                applied,
                conflicts,
            };
        }

        // Applying: single left-to-right pass; surviving edits are
        // disjoint, so stable order by start offset is enough.
        edits.sort_by_key(|e| (e.span.start, e.span.end));
        let mut corrected = String::with_capacity(text.len());
        let mut cursor = 0;
        for edit in &edits {
            corrected.push_str(&text[cursor..edit.span.start]);
            corrected.push_str(&edit.replacement);
            cursor = edit.span.end;
        }
        corrected.push_str(&text[cursor..]);

        // Reparsing: corrected output must still parse, or the whole
        // pass is discarded.
        match self.parser.parse(&corrected) {
            Ok(_) => PassOutcome::Accepted {
                text: corrected,
                applied,
                conflicts,
            },
            Err(failure) => PassOutcome::RolledBack { failure, conflicts },
        }
    }

    /// Iterated correction: analyze, apply a pass, re-analyze, until a
    /// pass applies nothing, rolls back, or the iteration cap is hit.
    ///
    /// Fixing one issue can expose or create another; the re-analysis
    /// between passes is what picks those up.
    pub fn run(
        &self,
        source: &str,
        registry: &Registry,
        config: &RuleConfig,
    ) -> Result<CorrectionResult> {
        let dispatcher = Dispatcher::new(registry);
        let analyze = |text: &str| -> Result<Vec<Diagnostic>> {
            let tree = self.parser.parse(text)?;
            let raw = dispatcher.run(&tree)?;
            Ok(collect(raw, config))
        };

        let mut text = source.to_string();
        let mut remaining = analyze(&text)?;
        let mut applied_total = Vec::new();
        let mut conflicts = Vec::new();
        let mut iterations = 0;
        let mut rolled_back = false;

        while iterations < self.max_iterations {
            match self.apply_pass(&text, &remaining) {
                PassOutcome::Accepted {
                    text: new_text,
                    applied,
                    conflicts: pass_conflicts,
                } => {
                    conflicts = pass_conflicts;
                    if applied.is_empty() {
                        break;
                    }
                    iterations += 1;
                    applied_total.extend(applied);
                    text = new_text;
                    remaining = analyze(&text)?;
                }
                PassOutcome::RolledBack {
                    failure,
                    conflicts: pass_conflicts,
                } => {
                    log::warn!("correction pass rolled back: {failure}");
                    conflicts = pass_conflicts;
                    rolled_back = true;
                    break;
                }
            }
        }

        Ok(CorrectionResult {
            corrected_text: text,
            applied: applied_total,
            unresolved_conflicts: conflicts,
            diagnostics: remaining,
            iterations,
            rolled_back,
        })
    }
}

fn pairs(len: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len).flat_map(move |i| (i + 1..len).map(move |j| (i, j)))
}

/// Validate a diagnostic's edits against the current text: offsets in
/// bounds, ranges ordered, and both ends on UTF-8 character boundaries.
fn validate_edits(diagnostic: &Diagnostic, text: &str) -> Option<String> {
    let edits = &diagnostic.fix.as_ref()?.edits;
    for edit in edits {
        let span = edit.span;
        if span.start > span.end {
            return Some(format!("inverted range {}..{}", span.start, span.end));
        }
        if span.end > text.len() {
            return Some(format!(
                "offset {} past end of text (len {})",
                span.end,
                text.len()
            ));
        }
        if !text.is_char_boundary(span.start) || !text.is_char_boundary(span.end) {
            return Some(format!(
                "range {}..{} not on a character boundary",
                span.start, span.end
            ));
        }
    }
    None
}
