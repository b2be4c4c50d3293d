//! Editing commands and their built-in behaviour.
//!
//! Commands are first offered to registered handlers (see
//! [`Editor::register_command`](crate::Editor::register_command)); when none
//! claims one, [`apply_default`] performs the stock edit inside an update.

use crate::editor::{Editor, UpdateScope};
use crate::error::EditorError;
use crate::math;
use crate::node::{MathNode, Node, NodeKey, TextFormat, TextNode};
use crate::selection::{Point, Selection};
use crate::tree::DocumentTree;

/// A user intent routed through [`Editor::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    /// Type text at the caret, replacing any selected text.
    InsertText(String),
    /// Enter: split the current block.
    InsertParagraph,
    /// Backspace.
    DeleteBackward,
    /// Toggle a format on the selected text.
    FormatText(TextFormat),
    /// Remove every format from the selected text.
    ClearFormatting,
    /// Toggle the current block between quote and paragraph.
    SetBlockQuote,
    /// Insert a new formula at the caret.
    InsertMath {
        /// Delimiter-free LaTeX.
        equation: String,
        /// Inline or block display.
        inline: bool,
    },
    /// Turn a formula back into editable source text.
    EditMathAsText {
        /// Formula to demote.
        key: NodeKey,
    },
    /// Replace the payload of an existing formula.
    UpdateMath {
        /// Formula to change.
        key: NodeKey,
        /// New equation.
        equation: String,
        /// New display mode.
        inline: bool,
    },
    /// Step back in history.
    Undo,
    /// Step forward in history.
    Redo,
}

/// Stock behaviour for `command`.
pub(crate) fn apply_default(editor: &Editor, command: &EditorCommand) -> Result<bool, EditorError> {
    match command {
        EditorCommand::InsertText(text) => editor.update(|scope| insert_text(scope, text)),
        EditorCommand::InsertParagraph => editor.update(|scope| insert_paragraph(scope)),
        EditorCommand::DeleteBackward => editor.update(|scope| delete_backward(scope)),
        EditorCommand::FormatText(format) => {
            editor.update(|scope| format_selection(scope, Some(*format)))
        }
        EditorCommand::ClearFormatting => editor.update(|scope| format_selection(scope, None)),
        EditorCommand::SetBlockQuote => editor.update(|scope| toggle_block_quote(scope)),
        EditorCommand::InsertMath { equation, inline } => {
            editor.update(|scope| insert_math(scope, equation, *inline))
        }
        EditorCommand::EditMathAsText { key } => math::demote(editor, *key),
        EditorCommand::UpdateMath {
            key,
            equation,
            inline,
        } => editor.update(|scope| update_math(scope, *key, equation, *inline)),
        EditorCommand::Undo => editor.undo(),
        EditorCommand::Redo => editor.redo(),
    }
}

// ----------------------------------------------------------------------
// Shared helpers
// ----------------------------------------------------------------------

/// Byte index of the `chars`-th char of `text`, clamped to its length.
pub(crate) fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

pub(crate) fn text_payload(tree: &DocumentTree, key: NodeKey) -> Result<TextNode, EditorError> {
    match tree.get(key) {
        Some(Node::Text(text)) => Ok(text.clone()),
        Some(other) => Err(EditorError::structure(format!(
            "expected a text node, found {}",
            other.type_name()
        ))),
        None => Err(EditorError::StaleReference(key)),
    }
}

/// Splits a text node at a char offset. The right half becomes a new
/// sibling with the same format and its key is returned.
pub(crate) fn split_text(
    tree: &mut DocumentTree,
    key: NodeKey,
    offset: usize,
) -> Result<NodeKey, EditorError> {
    let node = text_payload(tree, key)?;
    let (left, right) = node.text.split_at(byte_offset(&node.text, offset));
    let right = tree.create(Node::formatted_text(right, node.format))?;
    tree.set_text(key, left)?;
    tree.insert_after(key, right)?;
    Ok(right)
}

/// The ancestor-or-self of `key` that is a direct child of the root.
pub(crate) fn top_level_block(tree: &DocumentTree, key: NodeKey) -> Option<NodeKey> {
    let root = tree.root();
    let mut current = key;
    loop {
        let parent = tree.parent(current)?;
        if parent == root {
            return Some(current);
        }
        current = parent;
    }
}

/// Whether an element holds nothing but empty text.
pub(crate) fn is_blank(tree: &DocumentTree, key: NodeKey) -> bool {
    tree.children(key)
        .iter()
        .all(|child| matches!(tree.get(*child), Some(Node::Text(text)) if text.is_empty()))
}

/// Moves every child of `from` from `index` on to the end of `to`.
fn move_children(
    tree: &mut DocumentTree,
    from: NodeKey,
    index: usize,
    to: NodeKey,
) -> Result<(), EditorError> {
    let moved: Vec<NodeKey> = tree.children(from).iter().skip(index).copied().collect();
    for child in moved {
        tree.append_child(to, child)?;
    }
    Ok(())
}

/// Replaces `block` by a fresh element of type `node`, keeping its children.
pub(crate) fn retype_block(
    tree: &mut DocumentTree,
    block: NodeKey,
    node: Node,
) -> Result<NodeKey, EditorError> {
    let fresh = tree.create(node)?;
    tree.insert_after(block, fresh)?;
    move_children(tree, block, 0, fresh)?;
    tree.remove(block)?;
    Ok(fresh)
}

/// Maps `point` onto a text node, creating an empty text node (or an empty
/// paragraph at the root) when the position sits between non-text children.
pub(crate) fn resolve_text_point(
    tree: &mut DocumentTree,
    point: Point,
) -> Result<Point, EditorError> {
    let node = tree
        .get(point.key)
        .cloned()
        .ok_or(EditorError::StaleReference(point.key))?;
    let children = tree.children(point.key).to_vec();
    let index = point.offset.min(children.len());
    match node {
        Node::Text(text) => Ok(Point::new(point.key, point.offset.min(text.len()))),
        Node::Math(_) => {
            let after = Point::after(tree, point.key)
                .ok_or_else(|| EditorError::structure("math node is detached"))?;
            resolve_text_point(tree, after)
        }
        Node::Root | Node::List { .. } => {
            let editable = |key: NodeKey| {
                tree.get(key)
                    .is_some_and(|node| !matches!(node, Node::Math(math) if !math.is_inline()))
            };
            let previous = index
                .checked_sub(1)
                .and_then(|i| children.get(i).copied())
                .filter(|key| editable(*key));
            let next = children.get(index).copied().filter(|key| editable(*key));
            if let Some(previous) = previous {
                let end = Point::end_of(tree, previous);
                return resolve_text_point(tree, end);
            }
            if let Some(next) = next {
                return resolve_text_point(tree, Point::start_of(next));
            }
            let block = tree.create(match node {
                Node::List { .. } => Node::ListItem,
                _ => Node::Paragraph,
            })?;
            tree.insert_child_at(point.key, index, block)?;
            resolve_text_point(tree, Point::start_of(block))
        }
        Node::Paragraph
        | Node::Heading { .. }
        | Node::Quote
        | Node::Code { .. }
        | Node::ListItem
        | Node::Link { .. } => {
            if index > 0
                && let Some(previous) = children.get(index - 1)
                && let Some(Node::Text(text)) = tree.get(*previous)
            {
                return Ok(Point::new(*previous, text.len()));
            }
            if let Some(next) = children.get(index)
                && matches!(tree.get(*next), Some(Node::Text(_)))
            {
                return Ok(Point::start_of(*next));
            }
            let text = tree.create(Node::text(""))?;
            tree.insert_child_at(point.key, index, text)?;
            Ok(Point::start_of(text))
        }
    }
}

/// The caret as a text point; without a selection the caret goes to the
/// end of the document.
pub(crate) fn caret_text_point(scope: &mut UpdateScope<'_>) -> Result<Point, EditorError> {
    let point = match scope.selection() {
        Some(selection) => selection.focus,
        None => Point::end_of(scope.tree(), scope.tree().root()),
    };
    resolve_text_point(scope.tree_mut(), point)
}

/// Index among `block`'s children where the right half of a split at
/// `point` begins. Splits the caret's text node when needed; links are kept
/// whole.
fn split_index(tree: &mut DocumentTree, block: NodeKey, point: Point) -> Result<usize, EditorError> {
    let mut top = point.key;
    while let Some(parent) = tree.parent(top)
        && parent != block
    {
        top = parent;
    }
    let index = tree
        .child_index(top)
        .ok_or_else(|| EditorError::structure("caret is outside its block"))?;
    if top != point.key {
        let first_text = tree
            .descendants(top)
            .into_iter()
            .find(|key| matches!(tree.get(*key), Some(Node::Text(_))));
        let at_start = point.offset == 0 && first_text == Some(point.key);
        return Ok(if at_start { index } else { index + 1 });
    }
    let len = text_payload(tree, point.key)?.len();
    if point.offset == 0 {
        Ok(index)
    } else if point.offset >= len {
        Ok(index + 1)
    } else {
        split_text(tree, point.key, point.offset)?;
        Ok(index + 1)
    }
}

/// Deletes the selected text when the selection spans one text node;
/// otherwise collapses the selection onto its focus.
fn collapse_selection(scope: &mut UpdateScope<'_>) -> Result<(), EditorError> {
    let Some(selection) = scope.selection() else {
        return Ok(());
    };
    if selection.is_collapsed() {
        return Ok(());
    }
    let (anchor, focus) = (selection.anchor, selection.focus);
    if anchor.key != focus.key || !matches!(scope.tree().get(anchor.key), Some(Node::Text(_))) {
        log::debug!("collapsing a multi-node selection onto its focus");
        scope.select(focus);
        return Ok(());
    }
    let start = anchor.offset.min(focus.offset);
    let end = anchor.offset.max(focus.offset);
    let text = text_payload(scope.tree(), anchor.key)?.text;
    let mut next = String::with_capacity(text.len());
    next.push_str(&text[..byte_offset(&text, start)]);
    next.push_str(&text[byte_offset(&text, end)..]);
    scope.tree_mut().set_text(anchor.key, next)?;
    scope.select(Point::new(anchor.key, start));
    Ok(())
}

// ----------------------------------------------------------------------
// Default command behaviour
// ----------------------------------------------------------------------

pub(crate) fn insert_text(scope: &mut UpdateScope<'_>, text: &str) -> Result<bool, EditorError> {
    if text.is_empty() {
        return Ok(false);
    }
    collapse_selection(scope)?;
    let point = caret_text_point(scope)?;
    let mut content = text_payload(scope.tree(), point.key)?.text;
    content.insert_str(byte_offset(&content, point.offset), text);
    scope.tree_mut().set_text(point.key, content)?;
    scope.select(Point::new(point.key, point.offset + text.chars().count()));
    Ok(true)
}

fn insert_paragraph(scope: &mut UpdateScope<'_>) -> Result<bool, EditorError> {
    collapse_selection(scope)?;
    let point = caret_text_point(scope)?;
    let block = scope
        .tree()
        .text_block_of(point.key)
        .ok_or_else(|| EditorError::structure("caret is outside any block"))?;
    let fresh = match scope.tree().get(block) {
        Some(Node::Code { .. }) => None,
        Some(Node::ListItem) => Some(Node::ListItem),
        _ => Some(Node::Paragraph),
    };
    let Some(fresh) = fresh else {
        return insert_text(scope, "\n");
    };

    let tree = scope.tree_mut();
    let index = split_index(tree, block, point)?;
    let fresh = tree.create(fresh)?;
    tree.insert_after(block, fresh)?;
    move_children(tree, block, index, fresh)?;
    let caret = resolve_text_point(tree, Point::start_of(fresh))?;
    scope.select(caret);
    Ok(true)
}

/// The inline node just before the caret within its block.
fn previous_inline(tree: &DocumentTree, point: Point) -> Option<NodeKey> {
    match tree.get(point.key)? {
        Node::Text(_) => tree.previous_sibling(point.key).or_else(|| {
            let parent = tree.parent(point.key)?;
            match tree.get(parent)? {
                Node::Link { .. } => tree.previous_sibling(parent),
                _ => None,
            }
        }),
        _ => point
            .offset
            .checked_sub(1)
            .and_then(|index| tree.children(point.key).get(index).copied()),
    }
}

fn delete_backward(scope: &mut UpdateScope<'_>) -> Result<bool, EditorError> {
    let Some(selection) = scope.selection() else {
        return Ok(false);
    };
    if !selection.is_collapsed() {
        collapse_selection(scope)?;
        return Ok(true);
    }
    let point = selection.focus;
    let tree = scope.tree_mut();

    if let Some(Node::Text(text)) = tree.get(point.key)
        && point.offset > 0
    {
        let mut content = text.text.clone();
        let start = byte_offset(&content, point.offset - 1);
        let end = byte_offset(&content, point.offset);
        content.replace_range(start..end, "");
        tree.set_text(point.key, content)?;
        scope.select(Point::new(point.key, point.offset - 1));
        return Ok(true);
    }

    match previous_inline(tree, point) {
        Some(previous) => {
            match tree.get(previous) {
                Some(Node::Text(text)) if !text.is_empty() => {
                    let len = text.len();
                    let mut content = text.text.clone();
                    content.replace_range(byte_offset(&content, len - 1).., "");
                    tree.set_text(previous, content)?;
                    scope.select(Point::new(previous, len - 1));
                }
                _ => {
                    tree.remove(previous)?;
                    if !matches!(tree.get(point.key), Some(Node::Text(_))) {
                        scope.select(Point::new(point.key, point.offset.saturating_sub(1)));
                    }
                }
            }
            Ok(true)
        }
        None => merge_with_previous_block(scope, point),
    }
}

fn merge_with_previous_block(scope: &mut UpdateScope<'_>, point: Point) -> Result<bool, EditorError> {
    let tree = scope.tree_mut();
    let Some(block) = tree.text_block_of(point.key) else {
        return Ok(false);
    };
    let previous = tree.previous_sibling(block);
    let previous_node = previous.and_then(|key| tree.get(key).cloned());
    let block_node = tree.get(block).cloned();
    match (previous_node, block_node) {
        (_, Some(Node::Code { .. })) => Ok(false),
        (None, Some(Node::Heading { .. } | Node::Quote)) => {
            let paragraph = retype_block(tree, block, Node::Paragraph)?;
            if point.key == block {
                scope.select(Point::new(paragraph, point.offset));
            }
            Ok(true)
        }
        (None, _) => Ok(false),
        (Some(Node::Math(_)), _) => {
            if let Some(previous) = previous {
                tree.remove(previous)?;
            }
            Ok(true)
        }
        (Some(node), _) if node.is_text_block() => {
            let Some(previous) = previous else {
                return Ok(false);
            };
            let caret = Point::end_of(tree, previous);
            move_children(tree, block, 0, previous)?;
            tree.remove(block)?;
            scope.select(caret);
            Ok(true)
        }
        (Some(_), _) => {
            if !is_blank(tree, block) {
                return Ok(false);
            }
            let Some(previous) = previous else {
                return Ok(false);
            };
            tree.remove(block)?;
            let caret = Point::end_of(tree, previous);
            scope.select(caret);
            Ok(true)
        }
    }
}

/// Text nodes covered by the selection, in document order.
fn selected_text_nodes(scope: &mut UpdateScope<'_>) -> Result<Vec<NodeKey>, EditorError> {
    let Some(selection) = scope.selection() else {
        return Ok(Vec::new());
    };
    let (anchor, focus) = (selection.anchor, selection.focus);
    let tree = scope.tree_mut();

    if selection.is_collapsed() {
        return Ok(match tree.get(focus.key) {
            Some(Node::Text(_)) => vec![focus.key],
            _ => Vec::new(),
        });
    }

    if anchor.key == focus.key && matches!(tree.get(anchor.key), Some(Node::Text(_))) {
        let start = anchor.offset.min(focus.offset);
        let end = anchor.offset.max(focus.offset);
        let len = text_payload(tree, anchor.key)?.len();
        let mut middle = anchor.key;
        if end < len {
            split_text(tree, anchor.key, end)?;
        }
        if start > 0 {
            middle = split_text(tree, anchor.key, start)?;
        }
        scope.set_selection(Some(Selection::new(
            Point::start_of(middle),
            Point::new(middle, end - start),
        )));
        return Ok(vec![middle]);
    }

    let order = tree.descendants(tree.root());
    let position = |key: NodeKey| order.iter().position(|k| *k == key);
    let (Some(a), Some(b)) = (position(anchor.key), position(focus.key)) else {
        return Ok(Vec::new());
    };
    let (from, to) = (a.min(b), a.max(b));
    Ok(order[from..=to]
        .iter()
        .copied()
        .filter(|key| matches!(tree.get(*key), Some(Node::Text(_))))
        .collect())
}

fn format_selection(
    scope: &mut UpdateScope<'_>,
    format: Option<TextFormat>,
) -> Result<bool, EditorError> {
    let targets = selected_text_nodes(scope)?;
    let Some(first) = targets.first() else {
        return Ok(false);
    };
    let tree = scope.tree_mut();
    let next = |current: TextFormat, enable: bool| match format {
        None => TextFormat::PLAIN,
        Some(bit) if enable => current.with(bit),
        Some(bit) => current.without(bit),
    };
    // The first node decides whether the toggle switches on or off.
    let enable = match format {
        Some(bit) => !text_payload(tree, *first)?.format.contains(bit),
        None => false,
    };
    for key in &targets {
        let current = text_payload(tree, *key)?.format;
        tree.set_format(*key, next(current, enable))?;
    }
    Ok(true)
}

fn toggle_block_quote(scope: &mut UpdateScope<'_>) -> Result<bool, EditorError> {
    let Some(selection) = scope.selection() else {
        return Ok(false);
    };
    let tree = scope.tree_mut();
    let Some(block) = tree.text_block_of(selection.focus.key) else {
        return Ok(false);
    };
    let replacement = match tree.get(block) {
        Some(Node::Quote) => Node::Paragraph,
        Some(Node::Paragraph | Node::Heading { .. }) => Node::Quote,
        _ => return Ok(false),
    };
    let fresh = retype_block(tree, block, replacement)?;
    let remap = |point: Point| {
        if point.key == block {
            Point::new(fresh, point.offset)
        } else {
            point
        }
    };
    scope.set_selection(Some(Selection::new(
        remap(selection.anchor),
        remap(selection.focus),
    )));
    Ok(true)
}

fn insert_math(scope: &mut UpdateScope<'_>, equation: &str, inline: bool) -> Result<bool, EditorError> {
    let payload = MathNode::new(equation, inline)?;
    collapse_selection(scope)?;
    let point = caret_text_point(scope)?;
    let tree = scope.tree_mut();
    let math = tree.create(Node::Math(payload))?;

    if inline {
        let len = text_payload(tree, point.key)?.len();
        if point.offset == 0 {
            tree.insert_before(point.key, math)?;
        } else {
            if point.offset < len {
                split_text(tree, point.key, point.offset)?;
            }
            tree.insert_after(point.key, math)?;
        }
        if tree.parent(math) == Some(tree.root()) {
            tree.wrap_in_element(math, Node::Paragraph)?;
        }
        let caret = Point::after(tree, math)
            .ok_or_else(|| EditorError::structure("math node is detached"))?;
        let caret = resolve_text_point(tree, caret)?;
        scope.select(caret);
        return Ok(true);
    }

    let block = tree
        .text_block_of(point.key)
        .ok_or_else(|| EditorError::structure("caret is outside any block"))?;
    let top = top_level_block(tree, block)
        .ok_or_else(|| EditorError::structure("caret block is detached"))?;
    let after = tree.create(Node::Paragraph)?;
    tree.insert_after(top, after)?;
    if top == block && matches!(tree.get(block), Some(Node::Paragraph)) {
        let index = split_index(tree, block, point)?;
        move_children(tree, block, index, after)?;
    }
    tree.insert_before(after, math)?;
    if top == block && is_blank(tree, block) {
        tree.remove(block)?;
    }
    let caret = resolve_text_point(tree, Point::start_of(after))?;
    scope.select(caret);
    Ok(true)
}

fn update_math(
    scope: &mut UpdateScope<'_>,
    key: NodeKey,
    equation: &str,
    inline: bool,
) -> Result<bool, EditorError> {
    let tree = scope.tree_mut();
    if !matches!(tree.get(key), Some(Node::Math(_))) {
        log::warn!("update math: node {} is not a math node", key);
        return Ok(false);
    }
    tree.set_math(key, MathNode::new(equation, inline)?)?;
    let at_root = tree.parent(key) == Some(tree.root());
    if inline && at_root {
        tree.wrap_in_element(key, Node::Paragraph)?;
    } else if !inline && !at_root {
        math::hoist_block_math(tree, key)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(editor: &Editor, input: &str) {
        for ch in input.chars() {
            let command = if ch == '\n' {
                EditorCommand::InsertParagraph
            } else {
                EditorCommand::InsertText(ch.to_string())
            };
            editor.dispatch(command).unwrap();
        }
    }

    fn outline(editor: &Editor) -> String {
        editor.read(|state| state.tree().outline())
    }

    #[test]
    fn typing_into_empty_document_creates_paragraph() {
        let editor = Editor::default();
        typed(&editor, "hi");
        assert_eq!(outline(&editor), "root\n  paragraph\n    text \"hi\"");
    }

    #[test]
    fn enter_splits_paragraph_at_caret() {
        let editor = Editor::default();
        typed(&editor, "abcd");
        editor
            .update(|scope| {
                let focus = scope.selection().unwrap().focus;
                scope.select(Point::new(focus.key, 2));
                Ok(())
            })
            .unwrap();
        typed(&editor, "\n");
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"ab\"\n  paragraph\n    text \"cd\""
        );
    }

    #[test]
    fn backspace_merges_blocks() {
        let editor = Editor::default();
        typed(&editor, "ab\ncd");
        editor
            .update(|scope| {
                let focus = scope.selection().unwrap().focus;
                scope.select(Point::new(focus.key, 0));
                Ok(())
            })
            .unwrap();
        editor.dispatch(EditorCommand::DeleteBackward).unwrap();
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"ab\"\n    text \"cd\""
        );
        editor.dispatch(EditorCommand::DeleteBackward).unwrap();
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"a\"\n    text \"cd\""
        );
    }

    #[test]
    fn format_toggles_selected_range() {
        let editor = Editor::default();
        typed(&editor, "hello world");
        editor
            .update(|scope| {
                let key = scope.selection().unwrap().focus.key;
                scope.set_selection(Some(Selection::new(Point::new(key, 6), Point::new(key, 11))));
                Ok(())
            })
            .unwrap();
        editor
            .dispatch(EditorCommand::FormatText(TextFormat::BOLD))
            .unwrap();
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"hello \"\n    text [bold] \"world\""
        );
        editor.dispatch(EditorCommand::ClearFormatting).unwrap();
        assert!(!outline(&editor).contains("[bold]"));
    }

    #[test]
    fn quote_toggle_round_trips() {
        let editor = Editor::default();
        typed(&editor, "cite");
        editor.dispatch(EditorCommand::SetBlockQuote).unwrap();
        assert_eq!(outline(&editor), "root\n  quote\n    text \"cite\"");
        editor.dispatch(EditorCommand::SetBlockQuote).unwrap();
        assert_eq!(outline(&editor), "root\n  paragraph\n    text \"cite\"");
    }

    #[test]
    fn insert_inline_math_splits_text() {
        let editor = Editor::default();
        typed(&editor, "ab");
        editor
            .update(|scope| {
                let key = scope.selection().unwrap().focus.key;
                scope.select(Point::new(key, 1));
                Ok(())
            })
            .unwrap();
        editor
            .dispatch(EditorCommand::InsertMath {
                equation: "x".into(),
                inline: true,
            })
            .unwrap();
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"a\"\n    math inline \"x\"\n    text \"b\""
        );
    }

    #[test]
    fn insert_block_math_sits_at_root() {
        let editor = Editor::default();
        typed(&editor, "before");
        editor
            .dispatch(EditorCommand::InsertMath {
                equation: "E=mc^2".into(),
                inline: false,
            })
            .unwrap();
        typed(&editor, "after");
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"before\"\n  math block \"E=mc^2\"\n  paragraph\n    text \"after\""
        );
    }

    #[test]
    fn update_math_switches_display() {
        let editor = Editor::default();
        editor
            .dispatch(EditorCommand::InsertMath {
                equation: "x".into(),
                inline: false,
            })
            .unwrap();
        let key = editor.read(|state| {
            let tree = state.tree();
            tree.descendants(tree.root())
                .into_iter()
                .find(|k| matches!(tree.get(*k), Some(Node::Math(_))))
                .unwrap()
        });
        editor
            .dispatch(EditorCommand::UpdateMath {
                key,
                equation: "y".into(),
                inline: true,
            })
            .unwrap();
        assert!(outline(&editor).contains("  paragraph\n    math inline \"y\""));
        assert!(
            editor
                .dispatch(EditorCommand::UpdateMath {
                    key,
                    equation: "bad$".into(),
                    inline: true,
                })
                .is_err()
        );
    }
}
