//! Caret and range positions inside a document tree.

use crate::node::{Node, NodeKey};
use crate::tree::DocumentTree;
use serde::Serialize;

/// A position in the tree.
///
/// For text nodes `offset` counts chars into the payload; for elements it is
/// a child index, so `Point { key: paragraph, offset: 2 }` sits between the
/// second and third child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    /// Node the offset is relative to.
    pub key: NodeKey,
    /// Char offset (text) or child index (element).
    pub offset: usize,
}

impl Point {
    /// Creates a point.
    pub fn new(key: NodeKey, offset: usize) -> Self {
        Self { key, offset }
    }

    /// Start of `key`.
    pub fn start_of(key: NodeKey) -> Self {
        Self::new(key, 0)
    }

    /// End of `key`: past the last char or the last child. Elements resolve
    /// to the end of their last text descendant when they have one.
    pub fn end_of(tree: &DocumentTree, key: NodeKey) -> Self {
        match tree.get(key) {
            Some(Node::Text(text)) => Self::new(key, text.len()),
            Some(node) if node.is_element() => {
                let last_text = tree
                    .descendants(key)
                    .into_iter()
                    .rev()
                    .find(|k| matches!(tree.get(*k), Some(Node::Text(_))));
                match last_text {
                    Some(text) if tree.next_sibling(text).is_none() => Self::end_of(tree, text),
                    _ => Self::new(key, tree.children(key).len()),
                }
            }
            _ => Self::new(key, 0),
        }
    }

    /// The position right after `key` among its siblings.
    pub fn after(tree: &DocumentTree, key: NodeKey) -> Option<Self> {
        let parent = tree.parent(key)?;
        let index = tree.child_index(key)?;
        match tree.next_sibling(key).and_then(|next| tree.get(next).map(|n| (next, n))) {
            Some((next, Node::Text(_))) => Some(Self::start_of(next)),
            _ => Some(Self::new(parent, index + 1)),
        }
    }

    /// Whether the point addresses a live, attached node within bounds.
    pub fn is_valid_in(&self, tree: &DocumentTree) -> bool {
        if !tree.is_attached(self.key) {
            return false;
        }
        match tree.get(self.key) {
            Some(Node::Text(text)) => self.offset <= text.len(),
            Some(_) => self.offset <= tree.children(self.key).len(),
            None => false,
        }
    }
}

/// Anchor/focus pair. Anchor is where the selection started, focus where
/// the caret currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Fixed end.
    pub anchor: Point,
    /// Moving end, the caret.
    pub focus: Point,
}

impl Selection {
    /// A selection between two points.
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    /// A collapsed selection (a caret) at `point`.
    pub fn caret(point: Point) -> Self {
        Self::new(point, point)
    }

    /// Caret at `offset` in `key`.
    pub fn at(key: NodeKey, offset: usize) -> Self {
        Self::caret(Point::new(key, offset))
    }

    /// Whether anchor and focus coincide.
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// The caret when collapsed.
    pub fn collapsed_point(&self) -> Option<Point> {
        self.is_collapsed().then_some(self.focus)
    }

    /// Whether both ends are valid in `tree`.
    pub fn is_valid_in(&self, tree: &DocumentTree) -> bool {
        self.anchor.is_valid_in(tree) && self.focus.is_valid_in(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_element_prefers_trailing_text() {
        let mut tree = DocumentTree::new();
        tree.begin_mutation();
        let paragraph = tree.create(Node::Paragraph).unwrap();
        let text = tree.create(Node::text("abc")).unwrap();
        tree.append_child(tree.root(), paragraph).unwrap();
        tree.append_child(paragraph, text).unwrap();
        assert_eq!(Point::end_of(&tree, paragraph), Point::new(text, 3));

        let math = tree.create(Node::math("x", true).unwrap()).unwrap();
        tree.append_child(paragraph, math).unwrap();
        assert_eq!(Point::end_of(&tree, paragraph), Point::new(paragraph, 2));
        assert_eq!(Point::after(&tree, text), Some(Point::new(paragraph, 1)));
    }

    #[test]
    fn collapsed_and_validity() {
        let mut tree = DocumentTree::new();
        tree.begin_mutation();
        let text = tree.create(Node::text("ab")).unwrap();
        let caret = Selection::at(text, 1);
        assert!(caret.is_collapsed());
        // Detached nodes are not valid selection targets.
        assert!(!caret.is_valid_in(&tree));

        let paragraph = tree.create(Node::Paragraph).unwrap();
        tree.append_child(tree.root(), paragraph).unwrap();
        tree.append_child(paragraph, text).unwrap();
        assert!(caret.is_valid_in(&tree));
        assert!(!Selection::at(text, 3).is_valid_in(&tree));
        let range = Selection::new(Point::new(text, 0), Point::new(text, 2));
        assert_eq!(range.collapsed_point(), None);
    }
}
