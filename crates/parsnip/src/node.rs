//! Parse tree nodes.
//!
//! A parse yields a tree of [`Node`]s. Nodes are immutable after
//! construction: the packrat cache reuses matched subtrees, so a single node
//! may appear at several places in one tree. `Node` is a cheap handle
//! (reference-counted internally); cloning shares the underlying data.

use std::fmt;
use std::rc::Rc;

use regex_automata::util::captures::Captures;

/// A node in a parse tree.
///
/// Carries the name of the expression that produced it (empty for anonymous
/// sub-expressions), a reference to the entire input, the half-open byte span
/// it matched, and its child nodes in match order.
#[derive(Clone)]
pub struct Node<'a> {
    data: Rc<NodeData<'a>>,
}

struct NodeData<'a> {
    rule_name: &'a str,
    full_text: &'a str,
    start: usize,
    end: usize,
    children: Vec<Node<'a>>,
    /// Capture groups, present only on nodes produced by a regex expression.
    captures: Option<Captures>,
}

impl<'a> Node<'a> {
    pub fn new(
        rule_name: &'a str,
        full_text: &'a str,
        start: usize,
        end: usize,
        children: Vec<Node<'a>>,
    ) -> Self {
        debug_assert!(start <= end && end <= full_text.len());
        Self {
            data: Rc::new(NodeData {
                rule_name,
                full_text,
                start,
                end,
                children,
                captures: None,
            }),
        }
    }

    /// A leaf node with no children.
    pub fn leaf(rule_name: &'a str, full_text: &'a str, start: usize, end: usize) -> Self {
        Self::new(rule_name, full_text, start, end, Vec::new())
    }

    /// A node produced by a regex match, carrying its capture groups.
    pub fn with_captures(
        rule_name: &'a str,
        full_text: &'a str,
        start: usize,
        end: usize,
        captures: Captures,
    ) -> Self {
        Self {
            data: Rc::new(NodeData {
                rule_name,
                full_text,
                start,
                end,
                children: Vec::new(),
                captures: Some(captures),
            }),
        }
    }

    /// Name of the rule that produced this node; empty for anonymous
    /// sub-expressions.
    pub fn rule_name(&self) -> &'a str {
        self.data.rule_name
    }

    pub fn is_anonymous(&self) -> bool {
        self.data.rule_name.is_empty()
    }

    /// The entire input the parse ran over.
    pub fn full_text(&self) -> &'a str {
        self.data.full_text
    }

    pub fn start(&self) -> usize {
        self.data.start
    }

    pub fn end(&self) -> usize {
        self.data.end
    }

    /// The text this node matched.
    pub fn text(&self) -> &'a str {
        &self.data.full_text[self.data.start..self.data.end]
    }

    pub fn children(&self) -> &[Node<'a>] {
        &self.data.children
    }

    /// Capture groups, for nodes produced by a regex expression.
    pub fn captures(&self) -> Option<&Captures> {
        self.data.captures.as_ref()
    }

    /// Whether `self` and `other` are the same node (not merely equal).
    pub fn same_node(&self, other: &Node<'a>) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Render the subtree, one node per line, two-space indent per level.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.pretty_into(None, 0, &mut out);
        out
    }

    /// Like [`pretty`](Node::pretty), but appends an error marker to the line
    /// of `marker` (identified by node identity, not value equality).
    pub fn pretty_with_marker(&self, marker: &Node<'a>) -> String {
        let mut out = String::new();
        self.pretty_into(Some(marker), 0, &mut out);
        out
    }

    fn pretty_into(&self, marker: Option<&Node<'a>>, depth: usize, out: &mut String) {
        use std::fmt::Write;

        for _ in 0..depth {
            out.push_str("  ");
        }
        let name = if self.is_anonymous() { "Node" } else { self.rule_name() };
        write!(out, "{} {:?}", name, self.text()).expect("String write never fails");
        if marker.is_some_and(|m| self.same_node(m)) {
            out.push_str("  <-- error here");
        }
        out.push('\n');
        for child in self.children() {
            child.pretty_into(marker, depth + 1, out);
        }
    }
}

/// Deep by-value comparison over name, input, span, and children. Capture
/// groups are ignored, like the rest of the match internals.
impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.data, &other.data) {
            return true;
        }
        self.data.rule_name == other.data.rule_name
            && self.data.full_text == other.data.full_text
            && self.data.start == other.data.start
            && self.data.end == other.data.end
            && self.data.children == other.data.children
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("rule_name", &self.data.rule_name)
            .field("span", &(self.data.start..self.data.end))
            .field("text", &self.text())
            .field("children", &self.data.children)
            .finish()
    }
}
