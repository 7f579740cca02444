//! Syntax tree data model shared by the engine and its caller.
//!
//! The engine never parses anything itself: the caller hands it an
//! already-built [`SyntaxTree`] (via [`TreeBuilder`]) and, when correction
//! is requested, a [`Parser`] the engine uses to re-validate corrected text.
//! Trees are immutable once built; rules only ever hold read-only [`Node`]
//! handles into them.

use crate::error::{Error, ParseFailure, Result};
use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` into a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two spans share at least one byte.
    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Literal payload attached to leaf nodes. Compared by value, so two
/// distinct `int` nodes holding `42` are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

/// Index of a node inside its owning [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct NodeData {
    kind: String,
    span: Span,
    value: Option<NodeValue>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// An immutable, arena-backed syntax tree plus the source text it covers.
#[derive(Debug)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    root: NodeId,
    source: String,
    line_starts: Vec<usize>,
}

impl SyntaxTree {
    /// The root node.
    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: self.root,
        }
    }

    /// The source text this tree was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve a [`NodeId`] back into a handle.
    ///
    /// # Panics
    ///
    /// Panics if the id comes from a different tree and is out of range.
    pub fn node(&self, id: NodeId) -> Node<'_> {
        assert!(id.index() < self.nodes.len(), "node id out of range");
        Node { tree: self, id }
    }

    /// Convert a byte offset into a 1-indexed (line, column) pair.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&s| s <= offset);
        let col = offset - self.line_starts[line - 1] + 1;
        (line, col)
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// A read-only handle to one node of a [`SyntaxTree`].
///
/// Cheap to copy; all navigation goes through the owning tree.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    /// The node's kind tag, e.g. `"assign"` or `"call"`.
    pub fn kind(&self) -> &'t str {
        &self.tree.data(self.id).kind
    }

    pub fn span(&self) -> Span {
        self.tree.data(self.id).span
    }

    /// Literal payload, if this is a value-bearing leaf.
    pub fn value(&self) -> Option<&'t NodeValue> {
        self.tree.data(self.id).value.as_ref()
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.tree.data(self.id).parent.map(|id| Node {
            tree: self.tree,
            id,
        })
    }

    pub fn child_count(&self) -> usize {
        self.tree.data(self.id).children.len()
    }

    pub fn child(&self, index: usize) -> Option<Node<'t>> {
        self.tree
            .data(self.id)
            .children
            .get(index)
            .map(|&id| Node {
                tree: self.tree,
                id,
            })
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = Node<'t>> + '_ {
        let tree = self.tree;
        self.tree
            .data(self.id)
            .children
            .iter()
            .map(move |&id| Node { tree, id })
    }

    /// The source text covered by this node's span.
    pub fn text(&self) -> &'t str {
        let span = self.span();
        &self.tree.source[span.start..span.end]
    }

    /// 1-indexed (line, column) of the span start.
    pub fn line_col(&self) -> (usize, usize) {
        self.tree.line_col(self.span().start)
    }

    /// Pre-order iterator over this node and all of its descendants.
    pub fn preorder(&self) -> Preorder<'t> {
        Preorder {
            tree: self.tree,
            stack: vec![self.id],
        }
    }

    /// Structural equality: same kind, same value, structurally equal
    /// children. Spans are ignored, so `x` on line 1 equals `x` on line 9.
    pub fn structural_eq(&self, other: Node<'_>) -> bool {
        let a = self.tree.data(self.id);
        let b = other.tree.data(other.id);
        a.kind == b.kind
            && a.value == b.value
            && a.children.len() == b.children.len()
            && self
                .children()
                .zip(other.children())
                .all(|(x, y)| x.structural_eq(y))
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.tree.data(self.id);
        f.debug_struct("Node")
            .field("kind", &data.kind)
            .field("span", &data.span)
            .field("value", &data.value)
            .field("children", &data.children.len())
            .finish()
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

/// Pre-order (parent before children) traversal over a subtree.
pub struct Preorder<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Preorder<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let data = self.tree.data(id);
        self.stack.extend(data.children.iter().rev());
        Some(Node {
            tree: self.tree,
            id,
        })
    }
}

/// Builds a [`SyntaxTree`] bottom-up: children are created before the node
/// that owns them, which makes cycles unrepresentable.
#[derive(Default)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf node with no literal payload.
    pub fn leaf(&mut self, kind: &str, span: Span) -> NodeId {
        self.push(kind, span, None, Vec::new())
    }

    /// Add a value-bearing leaf, e.g. an identifier or number token.
    pub fn leaf_value(&mut self, kind: &str, span: Span, value: NodeValue) -> NodeId {
        self.push(kind, span, Some(value), Vec::new())
    }

    /// Add an interior node owning previously created children.
    pub fn node(&mut self, kind: &str, span: Span, children: Vec<NodeId>) -> NodeId {
        self.push(kind, span, None, children)
    }

    fn push(
        &mut self,
        kind: &str,
        span: Span,
        value: Option<NodeValue>,
        children: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind: kind.to_string(),
            span,
            value,
            children,
            parent: None,
        });
        id
    }

    /// Finish the tree, wiring parent links and validating invariants:
    /// every child exists, has exactly one parent, and its span lies fully
    /// within its parent's span.
    pub fn finish(mut self, root: NodeId, source: impl Into<String>) -> Result<SyntaxTree> {
        let source = source.into();
        if root.index() >= self.nodes.len() {
            return Err(Error::malformed_tree("root id out of range"));
        }

        for index in 0..self.nodes.len() {
            let parent_id = NodeId(index as u32);
            let parent_span = self.nodes[index].span;
            if parent_span.start > parent_span.end {
                return Err(Error::malformed_tree(format!(
                    "inverted span {}..{} on node {}",
                    parent_span.start, parent_span.end, index
                )));
            }
            let children = self.nodes[index].children.clone();
            for child in children {
                if child.index() >= self.nodes.len() {
                    return Err(Error::malformed_tree(format!(
                        "node {} references missing child {}",
                        index,
                        child.index()
                    )));
                }
                if child == parent_id {
                    return Err(Error::malformed_tree(format!(
                        "node {} is its own child",
                        index
                    )));
                }
                let data = &mut self.nodes[child.index()];
                if data.parent.is_some() {
                    return Err(Error::malformed_tree(format!(
                        "node {} has two parents",
                        child.index()
                    )));
                }
                if !parent_span.contains(data.span) {
                    return Err(Error::malformed_tree(format!(
                        "child span {}..{} escapes parent span {}..{}",
                        data.span.start, data.span.end, parent_span.start, parent_span.end
                    )));
                }
                data.parent = Some(parent_id);
            }
        }

        if self.nodes[root.index()].parent.is_some() {
            return Err(Error::malformed_tree("root node has a parent"));
        }

        let line_starts = compute_line_starts(&source);
        Ok(SyntaxTree {
            nodes: self.nodes,
            root,
            source,
            line_starts,
        })
    }
}

/// External tree provider. The correction engine uses it to confirm that
/// corrected text still parses before accepting a pass.
pub trait Parser: Send + Sync {
    fn parse(&self, source: &str) -> std::result::Result<SyntaxTree, ParseFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_tree() -> SyntaxTree {
        // Models `x = x` as (assign (ident x) (ident x)).
        let mut b = TreeBuilder::new();
        let lhs = b.leaf_value("ident", Span::new(0, 1), NodeValue::Str("x".into()));
        let rhs = b.leaf_value("ident", Span::new(4, 5), NodeValue::Str("x".into()));
        let assign = b.node("assign", Span::new(0, 5), vec![lhs, rhs]);
        b.finish(assign, "x = x").unwrap()
    }

    #[test]
    fn test_navigation_and_text() {
        let tree = sample_tree();
        let root = tree.root();
        assert_eq!(root.kind(), "assign");
        assert_eq!(root.child_count(), 2);
        assert_eq!(root.text(), "x = x");

        let lhs = root.child(0).unwrap();
        assert_eq!(lhs.text(), "x");
        assert_eq!(lhs.parent().unwrap(), root);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_structural_eq_ignores_spans() {
        let tree = sample_tree();
        let root = tree.root();
        let lhs = root.child(0).unwrap();
        let rhs = root.child(1).unwrap();
        assert!(lhs.structural_eq(rhs));
        assert!(!lhs.structural_eq(root));
    }

    #[test]
    fn test_preorder_visits_parent_first() {
        let tree = sample_tree();
        let kinds: Vec<&str> = tree.root().preorder().map(|n| n.kind()).collect();
        assert_eq!(kinds, vec!["assign", "ident", "ident"]);
    }

    #[test]
    fn test_line_col() {
        let mut b = TreeBuilder::new();
        let root = b.leaf("file", Span::new(0, 10));
        let tree = b.finish(root, "ab\ncd\nef\n!").unwrap();
        assert_eq!(tree.line_col(0), (1, 1));
        assert_eq!(tree.line_col(3), (2, 1));
        assert_eq!(tree.line_col(7), (3, 2));
    }

    #[test]
    fn test_containment_violation_rejected() {
        let mut b = TreeBuilder::new();
        let child = b.leaf("ident", Span::new(4, 9));
        let parent = b.node("assign", Span::new(0, 5), vec![child]);
        let err = b.finish(parent, "x = yyyy!").unwrap_err();
        assert!(matches!(err, Error::MalformedTree { .. }));
    }

    #[test]
    fn test_double_parent_rejected() {
        let mut b = TreeBuilder::new();
        let child = b.leaf("ident", Span::new(0, 1));
        let p1 = b.node("a", Span::new(0, 1), vec![child]);
        let root = b.node("b", Span::new(0, 1), vec![p1, child]);
        let err = b.finish(root, "x").unwrap_err();
        assert!(matches!(err, Error::MalformedTree { .. }));
    }

    #[test]
    fn test_span_overlap_semantics() {
        assert!(Span::new(0, 5).overlaps(Span::new(4, 8)));
        assert!(!Span::new(0, 5).overlaps(Span::new(5, 8)));
        assert!(Span::new(0, 5).contains(Span::new(2, 5)));
        assert!(!Span::new(0, 5).contains(Span::new(2, 6)));
    }
}
