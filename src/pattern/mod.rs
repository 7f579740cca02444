//! Structural pattern matching over syntax trees.
//!
//! Rules describe the node shapes they care about in a small pattern
//! language instead of hand-written tree walking:
//!
//! ```text
//! (assign $lhs $rhs)        assign node, both children captured
//! (call _ "puts" ...)       call whose second child is the literal "puts"
//! {(int 0) (float 0.0)}     either of two literal zeros
//! (send recv? $name:ident)  optional first child, constrained capture
//! ```
//!
//! Grammar:
//!
//! - `(kind elem*)` matches a node of `kind` whose children match the
//!   elements positionally and exhaustively
//! - a bare `kind` matches a node of that kind, children unchecked
//! - `_` matches any node
//! - `42`, `-1`, `3.14`, `"text"`, `true`, `false` match value-bearing
//!   leaves by value equality; as the sole element of a kind pattern they
//!   constrain the leaf's payload, so `(int 42)` matches the `int` leaf
//!   holding `42`
//! - `{a b c}` tries alternatives in order and commits to the first success
//! - `$name` captures any node; `$name:pattern` captures a constrained one
//! - inside a child list, `elem?` matches one child or none, `...` matches
//!   zero or more, and `$name:...` captures the matched run
//!
//! Compilation is pure and happens once (typically in a rule constructor);
//! the resulting [`Pattern`] is stateless and reusable across files.

mod parse;

use crate::error::Result;
use crate::tree::{Node, NodeValue};
use std::collections::HashMap;

/// Compiled pattern AST.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Pat {
    /// `_`
    Wildcard,
    /// `kind` or `(kind elem*)`; `children: None` leaves children unchecked.
    Kind {
        kind: String,
        children: Option<Vec<SeqElem>>,
    },
    /// A literal leaf constraint, compared by value.
    Literal(NodeValue),
    /// `{a b c}`
    Alt(Vec<Pat>),
    /// `$name` / `$name:pattern`; `offset` locates the `$` in the source.
    Capture {
        name: String,
        pat: Box<Pat>,
        offset: usize,
    },
}

/// One element of a child-sequence pattern.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SeqElem {
    One(Pat),
    /// `elem?`
    Optional(Pat),
    /// `...` / `$name:...`; `offset` locates the element in the source.
    Splat { name: Option<String>, offset: usize },
}

/// A compiled, reusable structural matcher.
#[derive(Debug, Clone)]
pub struct Pattern {
    pat: Pat,
    source: String,
}

impl Pattern {
    /// Compile pattern source. Fails with [`crate::Error::PatternSyntax`]
    /// on malformed input, including duplicate capture names.
    pub fn compile(source: &str) -> Result<Self> {
        let pat = parse::parse(source)?;
        Ok(Self {
            pat,
            source: source.to_string(),
        })
    }

    /// The original pattern source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match this pattern against a node. Returns the capture bindings on
    /// success, `None` on failure. Matching is read-only and never touches
    /// nodes outside the given subtree.
    pub fn matches<'t>(&self, node: Node<'t>) -> Option<Bindings<'t>> {
        let mut bindings = Bindings::default();
        if match_pat(&self.pat, node, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }
}

/// A captured subtree: a single node, or the run of nodes a named splat
/// consumed.
#[derive(Debug, Clone)]
pub enum Capture<'t> {
    Node(Node<'t>),
    Seq(Vec<Node<'t>>),
}

/// Captures produced by a successful match, keyed by capture name.
#[derive(Debug, Clone, Default)]
pub struct Bindings<'t> {
    map: HashMap<String, Capture<'t>>,
}

impl<'t> Bindings<'t> {
    pub fn get(&self, name: &str) -> Option<&Capture<'t>> {
        self.map.get(name)
    }

    /// The single node bound under `name`, if any.
    pub fn node(&self, name: &str) -> Option<Node<'t>> {
        match self.map.get(name) {
            Some(Capture::Node(node)) => Some(*node),
            _ => None,
        }
    }

    /// The node run bound under `name` by a named splat, if any.
    pub fn seq(&self, name: &str) -> Option<&[Node<'t>]> {
        match self.map.get(name) {
            Some(Capture::Seq(nodes)) => Some(nodes),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn insert(&mut self, name: &str, capture: Capture<'t>) {
        self.map.insert(name.to_string(), capture);
    }
}

fn match_pat<'t>(pat: &Pat, node: Node<'t>, bindings: &mut Bindings<'t>) -> bool {
    match pat {
        Pat::Wildcard => true,
        Pat::Literal(lit) => node.value() == Some(lit),
        Pat::Kind { kind, children } => {
            if node.kind() != kind {
                return false;
            }
            match children {
                None => true,
                Some(elems) => {
                    // A lone literal element against a value-bearing leaf
                    // constrains the payload: `(int 42)`, `(ident "f")`.
                    if node.child_count() == 0 {
                        if let [SeqElem::One(Pat::Literal(lit))] = elems.as_slice() {
                            return node.value() == Some(lit);
                        }
                    }
                    let kids: Vec<Node<'t>> = node.children().collect();
                    match_seq(elems, &kids, bindings)
                }
            }
        }
        Pat::Alt(alts) => {
            // First success wins; a failed alternative must not leak its
            // partial captures.
            for alt in alts {
                let mut trial = bindings.clone();
                if match_pat(alt, node, &mut trial) {
                    *bindings = trial;
                    return true;
                }
            }
            false
        }
        Pat::Capture { name, pat, .. } => {
            if match_pat(pat, node, bindings) {
                bindings.insert(name, Capture::Node(node));
                true
            } else {
                false
            }
        }
    }
}

fn match_seq<'t>(elems: &[SeqElem], children: &[Node<'t>], bindings: &mut Bindings<'t>) -> bool {
    let Some((first, rest)) = elems.split_first() else {
        return children.is_empty();
    };
    match first {
        SeqElem::One(pat) => {
            let Some((&head, tail)) = children.split_first() else {
                return false;
            };
            match_pat(pat, head, bindings) && match_seq(rest, tail, bindings)
        }
        SeqElem::Optional(pat) => {
            // Prefer consuming a child, fall back to consuming none.
            if let Some((&head, tail)) = children.split_first() {
                let mut trial = bindings.clone();
                if match_pat(pat, head, &mut trial) && match_seq(rest, tail, &mut trial) {
                    *bindings = trial;
                    return true;
                }
            }
            match_seq(rest, children, bindings)
        }
        SeqElem::Splat { name, .. } => {
            // Shortest match first; commit to the first arrangement that
            // lets the remaining elements succeed.
            for take in 0..=children.len() {
                let mut trial = bindings.clone();
                if match_seq(rest, &children[take..], &mut trial) {
                    if let Some(name) = name {
                        trial.insert(name, Capture::Seq(children[..take].to_vec()));
                    }
                    *bindings = trial;
                    return true;
                }
            }
            false
        }
    }
}
