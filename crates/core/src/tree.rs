//! Arena-backed document tree.
//!
//! Nodes live in a key-addressed arena; each slot records its parent and its
//! ordered children. The tree is frozen unless it is the working copy of an
//! update, so every structural operation first checks that it runs inside a
//! mutation boundary and fails with [`EditorError::IllegalMutationContext`]
//! otherwise, leaving the tree untouched.

use crate::error::EditorError;
use crate::node::{MathNode, Node, NodeKey, TextFormat};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Stand-in character for a math node when it counts as a single unit.
pub const MATH_UNIT_CHAR: char = '\u{FFFC}';

/// How math nodes contribute to [`DocumentTree::text_content_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathText {
    /// The delimited Markdown form, `$eq$` or `$$eq$$`.
    #[default]
    Markdown,
    /// One [`MATH_UNIT_CHAR`] per formula regardless of its length.
    Unit,
}

/// Key-free structural copy of a subtree, used for equality checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    /// The node payload.
    pub node: Node,
    /// Snapshots of the children in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone)]
struct NodeSlot {
    node: Node,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

impl NodeSlot {
    fn detached(node: Node) -> Self {
        Self {
            node,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A rooted, ordered tree of [`Node`]s.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: HashMap<NodeKey, NodeSlot>,
    root: NodeKey,
    writable: bool,
    dirty: bool,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// An empty, frozen document holding only the root.
    pub fn new() -> Self {
        let root = NodeKey::next();
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeSlot::detached(Node::Root));
        Self {
            nodes,
            root,
            writable: false,
            dirty: false,
        }
    }

    pub(crate) fn begin_mutation(&mut self) {
        self.writable = true;
        self.dirty = false;
    }

    /// Freezes the tree again, dropping nodes that never got attached.
    /// Returns whether anything changed during the mutation.
    pub(crate) fn end_mutation(&mut self) -> bool {
        self.collect_garbage();
        self.writable = false;
        std::mem::take(&mut self.dirty)
    }

    /// Whether the tree currently accepts mutations.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn ensure_writable(&self) -> Result<(), EditorError> {
        if self.writable {
            Ok(())
        } else {
            Err(EditorError::IllegalMutationContext)
        }
    }

    fn slot(&self, key: NodeKey) -> Result<&NodeSlot, EditorError> {
        self.nodes.get(&key).ok_or(EditorError::StaleReference(key))
    }

    fn slot_mut(&mut self, key: NodeKey) -> Result<&mut NodeSlot, EditorError> {
        self.nodes
            .get_mut(&key)
            .ok_or(EditorError::StaleReference(key))
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    /// Key of the root node.
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Node payload for `key`.
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key).map(|slot| &slot.node)
    }

    /// Alias of [`DocumentTree::get`] reading as `tree.node(key)`.
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.get(key)
    }

    /// Whether `key` names a live node (attached or not).
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root is never removed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parent of `key`.
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key).and_then(|slot| slot.parent)
    }

    /// Ordered children of `key`; empty for leaves and unknown keys.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// Position of `key` among its siblings.
    pub fn child_index(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|k| *k == key)
    }

    /// Sibling immediately before `key`.
    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.child_index(key)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Sibling immediately after `key`.
    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.child_index(key)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Whether `key` is reachable from the root.
    pub fn is_attached(&self, key: NodeKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == self.root {
                return true;
            }
            current = self.parent(k);
        }
        false
    }

    /// Whether `ancestor` is a strict ancestor of `key`.
    pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = self.parent(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.parent(k);
        }
        false
    }

    /// Descendants of `key` in document order, `key` excluded.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.children(key).iter().rev().copied().collect();
        while let Some(k) = stack.pop() {
            out.push(k);
            stack.extend(self.children(k).iter().rev().copied());
        }
        out
    }

    /// Nearest ancestor-or-self that holds inline content (paragraph,
    /// heading, quote, list item or code block).
    pub fn text_block_of(&self, key: NodeKey) -> Option<NodeKey> {
        let mut current = Some(key);
        while let Some(k) = current {
            match self.get(k) {
                Some(node) if node.is_text_block() || matches!(node, Node::Code { .. }) => {
                    return Some(k);
                }
                Some(Node::Root) | None => return None,
                Some(_) => current = self.parent(k),
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Creation and structural mutation
    // ------------------------------------------------------------------

    /// Creates a detached node. It must be attached before the update ends
    /// or it is discarded.
    pub fn create(&mut self, node: Node) -> Result<NodeKey, EditorError> {
        self.ensure_writable()?;
        if matches!(node, Node::Root) {
            return Err(EditorError::structure("a document has exactly one root"));
        }
        let key = NodeKey::next();
        self.nodes.insert(key, NodeSlot::detached(node));
        self.dirty = true;
        Ok(key)
    }

    /// Appends `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), EditorError> {
        let len = self.children(parent).len();
        self.insert_child_at(parent, len, child)
    }

    /// Inserts `child` at `index` among the children of `parent`.
    pub fn insert_child_at(
        &mut self,
        parent: NodeKey,
        index: usize,
        child: NodeKey,
    ) -> Result<(), EditorError> {
        self.ensure_writable()?;
        if !self.slot(parent)?.node.is_element() {
            return Err(EditorError::structure(format!(
                "node {} cannot have children",
                parent
            )));
        }
        self.slot(child)?;
        if child == self.root {
            return Err(EditorError::structure("the root cannot be moved"));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(EditorError::structure(format!(
                "node {} cannot become its own descendant",
                child
            )));
        }

        let mut index = index;
        if self.parent(child) == Some(parent)
            && let Some(old) = self.child_index(child)
            && old < index
        {
            index -= 1;
        }
        self.detach(child);

        let slot = self.slot_mut(parent)?;
        let index = index.min(slot.children.len());
        slot.children.insert(index, child);
        self.slot_mut(child)?.parent = Some(parent);
        self.dirty = true;
        Ok(())
    }

    /// Inserts `node` immediately before `target`.
    pub fn insert_before(&mut self, target: NodeKey, node: NodeKey) -> Result<(), EditorError> {
        self.ensure_writable()?;
        let parent = self.parent_for_sibling_insert(target, node)?;
        let index = self.child_index(target).unwrap_or(0);
        self.insert_child_at(parent, index, node)
    }

    /// Inserts `node` immediately after `target`.
    pub fn insert_after(&mut self, target: NodeKey, node: NodeKey) -> Result<(), EditorError> {
        self.ensure_writable()?;
        let parent = self.parent_for_sibling_insert(target, node)?;
        let index = self.child_index(target).map(|i| i + 1).unwrap_or(0);
        self.insert_child_at(parent, index, node)
    }

    fn parent_for_sibling_insert(
        &self,
        target: NodeKey,
        node: NodeKey,
    ) -> Result<NodeKey, EditorError> {
        self.slot(target)?;
        self.slot(node)?;
        if target == node {
            return Err(EditorError::structure("a node cannot be its own sibling"));
        }
        self.parent(target)
            .ok_or_else(|| EditorError::structure(format!("node {} has no parent", target)))
    }

    /// Puts `new` where `old` was and discards `old` with its subtree.
    pub fn replace(&mut self, old: NodeKey, new: NodeKey) -> Result<(), EditorError> {
        self.ensure_writable()?;
        self.slot(old)?;
        self.slot(new)?;
        if old == new {
            return Ok(());
        }
        if self.is_ancestor(new, old) {
            return Err(EditorError::structure(format!(
                "node {} cannot replace its own descendant {}",
                new, old
            )));
        }
        self.insert_before(old, new)?;
        self.remove(old)
    }

    /// Removes `key` and its subtree; their keys are retired.
    pub fn remove(&mut self, key: NodeKey) -> Result<(), EditorError> {
        self.ensure_writable()?;
        self.slot(key)?;
        if key == self.root {
            return Err(EditorError::structure("the root cannot be removed"));
        }
        self.detach(key);
        let mut doomed = self.descendants(key);
        doomed.push(key);
        for k in doomed {
            self.nodes.remove(&k);
        }
        self.dirty = true;
        Ok(())
    }

    /// Wraps `key` in a new element created from `wrapper`, which takes
    /// `key`'s place. Returns the wrapper's key.
    pub fn wrap_in_element(&mut self, key: NodeKey, wrapper: Node) -> Result<NodeKey, EditorError> {
        self.ensure_writable()?;
        if !wrapper.is_element() {
            return Err(EditorError::structure(format!(
                "{} nodes cannot wrap other nodes",
                wrapper.type_name()
            )));
        }
        self.slot(key)?;
        if self.parent(key).is_none() {
            return Err(EditorError::structure(format!("node {} has no parent", key)));
        }
        let wrapper = self.create(wrapper)?;
        self.insert_before(key, wrapper)?;
        self.append_child(wrapper, key)?;
        Ok(wrapper)
    }

    /// Removes every child of `key`.
    pub fn clear_children(&mut self, key: NodeKey) -> Result<(), EditorError> {
        self.ensure_writable()?;
        let children = self.slot(key)?.children.clone();
        for child in children {
            self.remove(child)?;
        }
        Ok(())
    }

    /// Replaces the payload of a text node.
    pub fn set_text(&mut self, key: NodeKey, text: impl Into<String>) -> Result<(), EditorError> {
        self.ensure_writable()?;
        match &mut self.slot_mut(key)?.node {
            Node::Text(node) => node.text = text.into(),
            other => {
                return Err(EditorError::structure(format!(
                    "cannot set text on a {} node",
                    other.type_name()
                )));
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Replaces the format bits of a text node.
    pub fn set_format(&mut self, key: NodeKey, format: TextFormat) -> Result<(), EditorError> {
        self.ensure_writable()?;
        match &mut self.slot_mut(key)?.node {
            Node::Text(node) => node.format = format,
            other => {
                return Err(EditorError::structure(format!(
                    "cannot format a {} node",
                    other.type_name()
                )));
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Flips `format` on a text node.
    pub fn toggle_format(&mut self, key: NodeKey, format: TextFormat) -> Result<(), EditorError> {
        let current = self
            .get(key)
            .and_then(Node::as_text)
            .map(|text| text.format)
            .ok_or_else(|| EditorError::structure(format!("node {} is not a text node", key)))?;
        self.set_format(key, current.toggled(format))
    }

    /// Changes the equation of a math node, keeping its display mode.
    pub fn set_equation(&mut self, key: NodeKey, equation: &str) -> Result<(), EditorError> {
        let inline = self.math_of(key)?.is_inline();
        self.set_math(key, MathNode::new(equation, inline)?)
    }

    /// Switches a math node between inline and block display.
    pub fn set_inline(&mut self, key: NodeKey, inline: bool) -> Result<(), EditorError> {
        let equation = self.math_of(key)?.equation().to_string();
        self.set_math(key, MathNode::new(equation, inline)?)
    }

    fn math_of(&self, key: NodeKey) -> Result<&MathNode, EditorError> {
        self.slot(key)?
            .node
            .as_math()
            .ok_or_else(|| EditorError::structure(format!("node {} is not a math node", key)))
    }

    /// Replaces the payload of a math node.
    pub fn set_math(&mut self, key: NodeKey, math: MathNode) -> Result<(), EditorError> {
        self.ensure_writable()?;
        match &mut self.slot_mut(key)?.node {
            Node::Math(node) => *node = math,
            other => {
                return Err(EditorError::structure(format!(
                    "{} node is not a math node",
                    other.type_name()
                )));
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn detach(&mut self, key: NodeKey) {
        let Some(parent) = self.nodes.get_mut(&key).and_then(|slot| slot.parent.take()) else {
            return;
        };
        if let Some(slot) = self.nodes.get_mut(&parent) {
            slot.children.retain(|k| *k != key);
        }
        self.dirty = true;
    }

    fn collect_garbage(&mut self) {
        let mut reachable = HashSet::with_capacity(self.nodes.len());
        reachable.insert(self.root);
        reachable.extend(self.descendants(self.root));
        if reachable.len() != self.nodes.len() {
            self.nodes.retain(|key, _| reachable.contains(key));
        }
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    /// Text of the subtree under `key`, math in its Markdown form.
    pub fn text_content(&self, key: NodeKey) -> String {
        self.text_content_with(key, MathText::Markdown)
    }

    /// Text of the subtree under `key`. Block children of the root are
    /// separated by a blank line, list entries by a newline.
    pub fn text_content_with(&self, key: NodeKey, mode: MathText) -> String {
        let mut out = String::new();
        self.push_text(key, mode, &mut out);
        out
    }

    fn push_text(&self, key: NodeKey, mode: MathText, out: &mut String) {
        let Some(node) = self.get(key) else {
            return;
        };
        match node {
            Node::Text(text) => out.push_str(&text.text),
            Node::Math(math) => match mode {
                MathText::Markdown => out.push_str(&math.markdown()),
                MathText::Unit => out.push(MATH_UNIT_CHAR),
            },
            Node::Root
            | Node::Paragraph
            | Node::Heading { .. }
            | Node::Quote
            | Node::Code { .. }
            | Node::List { .. }
            | Node::ListItem
            | Node::Link { .. } => {
                for (i, child) in self.children(key).iter().enumerate() {
                    if i > 0 {
                        out.push_str(self.separator(node, *child));
                    }
                    self.push_text(*child, mode, out);
                }
            }
        }
    }

    fn separator(&self, parent: &Node, child: NodeKey) -> &'static str {
        match (parent, self.get(child)) {
            (Node::Root, _) => "\n\n",
            (Node::List { .. }, _) => "\n",
            (Node::ListItem, Some(Node::List { .. })) => "\n",
            _ => "",
        }
    }

    /// Characters of every text node plus one per math node, whatever the
    /// equation length.
    pub fn character_count(&self) -> usize {
        self.descendants(self.root)
            .into_iter()
            .filter_map(|key| self.get(key))
            .map(|node| match node {
                Node::Text(text) => text.len(),
                Node::Math(_) => 1,
                _ => 0,
            })
            .sum()
    }

    /// Structural copy of the subtree under `key`.
    pub fn snapshot(&self, key: NodeKey) -> Option<NodeSnapshot> {
        let node = self.get(key)?.clone();
        let children = self
            .children(key)
            .iter()
            .filter_map(|child| self.snapshot(*child))
            .collect();
        Some(NodeSnapshot { node, children })
    }

    /// Structural copy of the whole document.
    pub fn document_snapshot(&self) -> NodeSnapshot {
        self.snapshot(self.root).unwrap_or(NodeSnapshot {
            node: Node::Root,
            children: Vec::new(),
        })
    }

    /// Indented one-line-per-node rendering, for debugging and tests.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(self.root, 0, &mut out);
        out.truncate(out.trim_end().len());
        out
    }

    fn write_outline(&self, key: NodeKey, depth: usize, out: &mut String) {
        let Some(node) = self.get(key) else {
            return;
        };
        out.push_str(&"  ".repeat(depth));
        let line = match node {
            Node::Root => "root".to_string(),
            Node::Paragraph => "paragraph".to_string(),
            Node::Heading { level } => format!("heading {}", level),
            Node::Quote => "quote".to_string(),
            Node::Code { language: Some(lang) } => format!("code {:?}", lang),
            Node::Code { language: None } => "code".to_string(),
            Node::List { ordered: true, start } => format!("list ordered start={}", start),
            Node::List { ordered: false, .. } => "list bullet".to_string(),
            Node::ListItem => "listitem".to_string(),
            Node::Link { url } => format!("link {:?}", url),
            Node::Text(text) if text.format.is_plain() => format!("text {:?}", text.text),
            Node::Text(text) => format!("text [{}] {:?}", text.format.names().join(", "), text.text),
            Node::Math(math) if math.is_inline() => format!("math inline {:?}", math.equation()),
            Node::Math(math) => format!("math block {:?}", math.equation()),
        };
        out.push_str(&line);
        out.push('\n');
        for child in self.children(key) {
            self.write_outline(*child, depth + 1, out);
        }
    }
}
