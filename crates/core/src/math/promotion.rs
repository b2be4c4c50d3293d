//! Live promotion of typed delimiters into math nodes.
//!
//! Two triggers:
//!
//! * inline: after every committed edit, the text before a collapsed caret is
//!   checked for a just-closed `$eq$` (optionally followed by one whitespace
//!   char). The span is cut out of its text node and replaced by an inline
//!   math node.
//! * block: typing a `$` right after a `$` on an otherwise empty paragraph
//!   closes a `$$` fence. Preceding paragraphs are walked back to the one
//!   opening with `$$`; all of them collapse into one block math node followed
//!   by an empty paragraph holding the caret.
//!
//! The engine's own rewrites are tagged [`UpdateTag::Promotion`] and an
//! in-flight flag keeps the listener from reacting to them.

use super::{MATH_SPAN, hoist_block_math};
use crate::commands::{EditorCommand, byte_offset, text_payload};
use crate::editor::{CommandPriority, Editor, EditorState, Subscription, UpdateEvent, UpdateScope, UpdateTag};
use crate::error::EditorError;
use crate::node::{MathNode, Node, NodeKey, TextFormat};
use crate::selection::Point;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::Cell;
use std::rc::Rc;

static INLINE_TRIGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([^$\n]+?)\$(\s?)$").expect("valid inline trigger pattern"));

/// Live math promotion attached to one editor. Dropping it detaches the
/// listener and the `$` command handler.
#[derive(Debug)]
pub struct MathPlugin {
    _listener: Subscription,
    _command: Subscription,
}

impl MathPlugin {
    /// Attaches promotion to `editor`.
    pub fn register(editor: &Editor) -> Self {
        let engine = Rc::new(PromotionEngine::default());

        let listening = Rc::clone(&engine);
        let listener = editor.register_update_listener(move |editor, event| {
            listening.on_update(editor, event);
        });

        let commanding = Rc::clone(&engine);
        let command = editor.register_command(CommandPriority::High, move |editor, command| {
            match command {
                EditorCommand::InsertText(text) if text == "$" => commanding.on_dollar(editor),
                _ => Ok(false),
            }
        });

        Self {
            _listener: listener,
            _command: command,
        }
    }

    /// Detaches promotion.
    pub fn dispose(self) {
        drop(self);
    }
}

#[derive(Debug, Default)]
struct PromotionEngine {
    in_flight: Cell<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InlineCandidate {
    key: NodeKey,
    /// Char offset of the opening `$`.
    start: usize,
    /// Char offset just past the closing `$`.
    end: usize,
    caret: usize,
    equation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockCandidate {
    closing: NodeKey,
    /// Walked paragraphs, nearest first; the last one holds the opening `$$`.
    walked: Vec<NodeKey>,
    equation: String,
}

impl PromotionEngine {
    fn on_update(&self, editor: &Editor, event: &UpdateEvent) {
        if self.in_flight.get() || !event.dirty {
            return;
        }
        let skipped = [
            UpdateTag::Historic,
            UpdateTag::Promotion,
            UpdateTag::Load,
            UpdateTag::Demotion,
        ];
        if skipped.iter().any(|tag| event.has_tag(*tag)) {
            return;
        }
        let Some(candidate) = inline_candidate(&event.state) else {
            return;
        };

        log::debug!(
            "promoting inline math {:?} in node {}",
            candidate.equation,
            candidate.key
        );
        self.in_flight.set(true);
        let result = editor.update_with_tags(&[UpdateTag::Promotion], |scope| {
            promote_inline(scope, &candidate)
        });
        self.in_flight.set(false);
        if let Err(err) = result {
            log::error!("inline math promotion failed: {}", err);
        }
    }

    fn on_dollar(&self, editor: &Editor) -> Result<bool, EditorError> {
        if self.in_flight.get() {
            return Ok(false);
        }
        let Some(candidate) = editor.read(block_candidate) else {
            return Ok(false);
        };

        log::debug!(
            "promoting block math spanning {} paragraphs",
            candidate.walked.len() + 1
        );
        self.in_flight.set(true);
        let result = editor.update_with_tags(&[UpdateTag::Promotion], |scope| {
            promote_block(scope, &candidate)
        });
        self.in_flight.set(false);
        match result {
            Ok(()) => Ok(true),
            Err(err) => {
                // Let the `$` through as plain text.
                log::error!("block math promotion failed: {}", err);
                Ok(false)
            }
        }
    }
}

/// Whether the caret's text may be rewritten at all.
fn editable_text(state: &EditorState) -> Option<(Point, NodeKey, &str)> {
    let caret = state.selection()?.collapsed_point()?;
    let tree = state.tree();
    let text = tree.get(caret.key)?.as_text()?;
    if text.format.contains(TextFormat::CODE) {
        return None;
    }
    let block = tree.text_block_of(caret.key)?;
    if matches!(tree.get(block), Some(Node::Code { .. })) {
        return None;
    }
    Some((caret, block, text.text.as_str()))
}

fn inline_candidate(state: &EditorState) -> Option<InlineCandidate> {
    let (caret, _, text) = editable_text(state)?;
    let before = &text[..byte_offset(text, caret.offset)];
    let captures = INLINE_TRIGGER.captures(before)?;
    let whole = captures.get(0)?;
    if whole.end() != before.len() {
        return None;
    }
    // `$$x$` is a block fence in progress, not an inline span.
    if before[..whole.start()].ends_with('$') {
        return None;
    }
    let equation = captures.get(1)?.as_str();
    if equation.trim().is_empty() {
        return None;
    }
    let trailing = captures.get(2).map_or(0, |m| m.as_str().chars().count());
    Some(InlineCandidate {
        key: caret.key,
        start: before[..whole.start()].chars().count(),
        end: caret.offset - trailing,
        caret: caret.offset,
        equation: equation.to_string(),
    })
}

fn promote_inline(
    scope: &mut UpdateScope<'_>,
    candidate: &InlineCandidate,
) -> Result<(), EditorError> {
    let tree = scope.tree_mut();
    let node = text_payload(tree, candidate.key)?;
    let before = &node.text[..byte_offset(&node.text, candidate.start)];
    let after = &node.text[byte_offset(&node.text, candidate.end)..];

    let math = tree.create(Node::math(candidate.equation.as_str(), true)?)?;
    if before.is_empty() {
        tree.replace(candidate.key, math)?;
    } else {
        tree.set_text(candidate.key, before)?;
        tree.insert_after(candidate.key, math)?;
    }

    let caret = if after.is_empty() {
        Point::after(tree, math).ok_or_else(|| EditorError::structure("math node is detached"))?
    } else {
        let rest = tree.create(Node::formatted_text(after, node.format))?;
        tree.insert_after(math, rest)?;
        Point::new(rest, candidate.caret - candidate.end)
    };
    scope.select(caret);
    Ok(())
}

fn block_candidate(state: &EditorState) -> Option<BlockCandidate> {
    let (caret, block, text) = editable_text(state)?;
    let tree = state.tree();
    if !matches!(tree.get(block), Some(Node::Paragraph)) || tree.parent(block) != Some(tree.root())
    {
        return None;
    }
    if caret.offset == 0 || text.chars().nth(caret.offset - 1) != Some('$') {
        return None;
    }
    // With the incoming `$` the line reads exactly `$$`.
    if tree.text_content(block).trim() != "$" {
        return None;
    }

    let mut fragments = Vec::new();
    let mut walked = Vec::new();
    let mut cursor = tree.previous_sibling(block);
    loop {
        let key = cursor?;
        if !matches!(tree.get(key), Some(Node::Paragraph)) {
            return None;
        }
        walked.push(key);
        let content = tree.text_content(key);
        if let Some(rest) = content.trim().strip_prefix("$$") {
            fragments.push(rest.to_string());
            break;
        }
        fragments.push(content);
        cursor = tree.previous_sibling(key);
    }

    fragments.reverse();
    let equation = fragments.join("\n").trim().to_string();
    if equation.is_empty() {
        log::debug!("empty $$ fence left as text");
        return None;
    }
    if let Err(err) = MathNode::new(equation.as_str(), false) {
        log::debug!("$$ fence left as text: {}", err);
        return None;
    }
    Some(BlockCandidate {
        closing: block,
        walked,
        equation,
    })
}

fn promote_block(scope: &mut UpdateScope<'_>, candidate: &BlockCandidate) -> Result<(), EditorError> {
    let tree = scope.tree_mut();
    let opener = *candidate
        .walked
        .last()
        .ok_or_else(|| EditorError::structure("block fence without opener"))?;
    let math = tree.create(Node::math(candidate.equation.as_str(), false)?)?;
    tree.insert_before(opener, math)?;
    for key in &candidate.walked {
        tree.remove(*key)?;
    }
    tree.remove(candidate.closing)?;

    let paragraph = tree.create(Node::Paragraph)?;
    tree.insert_after(math, paragraph)?;
    scope.select(Point::start_of(paragraph));
    Ok(())
}

/// Re-reads a text node as Markdown source, replacing every delimited span
/// in it with a math node. The code format is dropped, so this undoes
/// [`demote`](super::demote). Returns whether any span was promoted.
pub fn promote_text_node(editor: &Editor, key: NodeKey) -> Result<bool, EditorError> {
    editor.update_with_tags(&[UpdateTag::Promotion], |scope| {
        let tree = scope.tree_mut();
        let Some(Node::Text(node)) = tree.get(key).cloned() else {
            log::warn!("promote: node {} is not a text node, ignoring", key);
            return Ok(false);
        };
        let format = node.format.without(TextFormat::CODE);

        let mut pieces = Vec::new();
        let mut last = 0;
        for captures in MATH_SPAN.captures_iter(&node.text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let math = match (captures.get(1), captures.get(2)) {
                (Some(block), _) => MathNode::new(block.as_str(), false),
                (None, Some(inline)) => MathNode::new(inline.as_str(), true),
                (None, None) => continue,
            };
            let Ok(math) = math else {
                continue;
            };
            if whole.start() > last {
                pieces.push(Node::formatted_text(&node.text[last..whole.start()], format));
            }
            pieces.push(Node::Math(math));
            last = whole.end();
        }
        if pieces.is_empty() {
            return Ok(false);
        }
        if last < node.text.len() {
            pieces.push(Node::formatted_text(&node.text[last..], format));
        }

        let mut previous = key;
        let mut blocks = Vec::new();
        for piece in pieces {
            let is_block = matches!(&piece, Node::Math(math) if !math.is_inline());
            let created = tree.create(piece)?;
            tree.insert_after(previous, created)?;
            if is_block {
                blocks.push(created);
            }
            previous = created;
        }
        tree.remove(key)?;
        for block in blocks {
            hoist_block_math(tree, block)?;
        }
        let caret = Point::after(tree, previous);
        scope.set_selection(caret.map(crate::selection::Selection::caret));
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> (Editor, MathPlugin) {
        let editor = Editor::default();
        let plugin = MathPlugin::register(&editor);
        (editor, plugin)
    }

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
    fn closing_dollar_promotes_inline_math() {
        let (editor, _plugin) = editor();
        typed(&editor, "area $\\pi r^2$");
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"area \"\n    math inline \"\\\\pi r^2\""
        );
        typed(&editor, " m");
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"area \"\n    math inline \"\\\\pi r^2\"\n    text \" m\""
        );
    }

    #[test]
    fn opener_line_is_trimmed_before_joining() {
        let (editor, _plugin) = editor();
        typed(&editor, "$$ a  \nb\n$$");
        assert_eq!(
            outline(&editor),
            "root\n  math block \"a\\nb\"\n  paragraph"
        );
    }

    #[test]
    fn equation_is_kept_verbatim() {
        let (editor, _plugin) = editor();
        typed(&editor, "$ a + b $");
        assert_eq!(outline(&editor), "root\n  paragraph\n    math inline \" a + b \"");
    }

    #[test]
    fn caret_elsewhere_does_not_promote() {
        let (editor, _plugin) = editor();
        typed(&editor, "x");
        let key = editor.read(|state| state.selection().unwrap().focus.key);
        editor
            .update(|scope| {
                scope.tree_mut().set_text(key, "$a$ tail")?;
                scope.select(Point::new(key, 8));
                Ok(())
            })
            .unwrap();
        assert_eq!(outline(&editor), "root\n  paragraph\n    text \"$a$ tail\"");
    }

    #[test]
    fn code_text_is_left_alone() {
        let (editor, _plugin) = editor();
        typed(&editor, "$a");
        editor
            .dispatch(EditorCommand::FormatText(TextFormat::CODE))
            .unwrap();
        typed(&editor, "$");
        assert_eq!(outline(&editor), "root\n  paragraph\n    text [code] \"$a$\"");
    }

    #[test]
    fn fence_collapses_paragraphs() {
        let (editor, _plugin) = editor();
        typed(&editor, "intro\n$$ \\int_0^1\nx\\,dx\n$$");
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"intro\"\n  math block \"\\\\int_0^1\\nx\\\\,dx\"\n  paragraph"
        );
        typed(&editor, "next");
        assert!(outline(&editor).ends_with("  paragraph\n    text \"next\""));
    }

    #[test]
    fn fence_without_opener_stays_literal() {
        let (editor, _plugin) = editor();
        typed(&editor, "plain\n$$");
        assert_eq!(
            outline(&editor),
            "root\n  paragraph\n    text \"plain\"\n  paragraph\n    text \"$$\""
        );
    }

    #[test]
    fn undo_does_not_repromote() {
        let (editor, _plugin) = editor();
        typed(&editor, "$x$");
        assert!(outline(&editor).contains("math inline"));
        editor.dispatch(EditorCommand::Undo).unwrap();
        assert_eq!(outline(&editor), "root\n  paragraph\n    text \"$x$\"");
    }

    #[test]
    fn demoted_text_promotes_back() {
        let (editor, _plugin) = editor();
        typed(&editor, "$$\ny=mx+b\n$$");
        let math = editor.read(|state| {
            let tree = state.tree();
            tree.children(tree.root())[0]
        });
        super::super::demote(&editor, math).unwrap();
        let text = editor.read(|state| state.selection().unwrap().focus.key);

        assert!(promote_text_node(&editor, text).unwrap());
        let snapshot = editor.read(|state| state.tree().document_snapshot());
        assert_eq!(snapshot.children[0].node, Node::math("y=mx+b", false).unwrap());
    }
}
