use crate::editor::{Editor, UpdateScope, UpdateTag};
use crate::error::EditorError;
use crate::node::{Node, NodeKey, TextFormat};
use crate::selection::Point;

/// Replaces the math node `key` with its delimited source (`$eq$` or
/// `$$eq$$`) as code-formatted text and puts the caret at its end.
///
/// A block formula becomes a paragraph holding that text; an inline one is
/// swapped in place so the surrounding sentence stays intact. Keys that no
/// longer name a math node are ignored. Returns whether anything changed.
pub fn demote(editor: &Editor, key: NodeKey) -> Result<bool, EditorError> {
    editor.update_with_tags(&[UpdateTag::Demotion], |scope| demote_in(scope, key))
}

fn demote_in(scope: &mut UpdateScope<'_>, key: NodeKey) -> Result<bool, EditorError> {
    let tree = scope.tree_mut();
    let Some(math) = tree.get(key).and_then(Node::as_math).cloned() else {
        log::warn!("demote: node {} is not a math node, ignoring", key);
        return Ok(false);
    };

    let source = math.markdown();
    let caret = source.chars().count();
    let text = tree.create(Node::formatted_text(source, TextFormat::CODE))?;
    let at_root = tree.parent(key) == Some(tree.root());
    if math.is_inline() && !at_root {
        tree.replace(key, text)?;
    } else {
        let paragraph = tree.create(Node::Paragraph)?;
        tree.append_child(paragraph, text)?;
        tree.replace(key, paragraph)?;
    }
    log::debug!("demoted math node {} to text {}", key, text);
    scope.select(Point::new(text, caret));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::EditorCommand;

    fn math_key(editor: &Editor) -> Option<NodeKey> {
        editor.read(|state| {
            let tree = state.tree();
            tree.descendants(tree.root())
                .into_iter()
                .find(|key| matches!(tree.get(*key), Some(Node::Math(_))))
        })
    }

    #[test]
    fn block_math_becomes_code_paragraph() {
        let editor = Editor::default();
        editor
            .dispatch(EditorCommand::InsertMath {
                equation: "E=mc^2".into(),
                inline: false,
            })
            .unwrap();
        let key = math_key(&editor).unwrap();

        assert!(demote(&editor, key).unwrap());

        let outline = editor.read(|state| state.tree().outline());
        assert!(outline.starts_with("root\n  paragraph\n    text [code] \"$$E=mc^2$$\""));
        let caret = editor.read(|state| state.selection()).unwrap();
        assert_eq!(caret.focus.offset, 10);
    }

    #[test]
    fn stale_key_is_a_noop() {
        let editor = Editor::default();
        editor
            .dispatch(EditorCommand::InsertMath {
                equation: "x".into(),
                inline: true,
            })
            .unwrap();
        let key = math_key(&editor).unwrap();
        assert!(demote(&editor, key).unwrap());
        let before = editor.read(|state| state.tree().document_snapshot());

        assert!(!demote(&editor, key).unwrap());
        assert_eq!(editor.read(|state| state.tree().document_snapshot()), before);
    }
}
