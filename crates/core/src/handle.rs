//! The editor handle a host application holds.

use crate::codec::MarkdownCodec;
use crate::commands::EditorCommand;
use crate::config::EditorConfig;
use crate::editor::{Editor, Subscription, UpdateEvent, UpdateTag};
use crate::error::{EditorError, ParseDiagnostics};
use crate::guard::{ClassificationRequest, ContentClassifier, ContentGuard, GuardStatus, Verdict};
use crate::math::{MathPlugin, demote};
use crate::node::{MathNode, Node, NodeKey, TextFormat};
use crate::render::{HtmlMathRenderer, render_html};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use web_time::Instant;

/// Counters shown under the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorStats {
    /// Text characters plus one per formula; absent when disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_count: Option<usize>,
    /// Math nodes in the document.
    pub math_count: usize,
    /// Top-level blocks.
    pub block_count: usize,
}

/// A Markdown download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// Suggested file name.
    pub file_name: String,
    /// Media type of `bytes`.
    pub mime_type: &'static str,
    /// UTF-8 Markdown.
    pub bytes: Vec<u8>,
}

/// One editor instance with its codec, math plugin and content guard.
///
/// Unlike a process-wide handle, each `MarkdownEditor` owns its document;
/// hosts create as many as they need and drop them on teardown.
pub struct MarkdownEditor {
    config: EditorConfig,
    editor: Editor,
    codec: MarkdownCodec,
    guard: Option<Rc<RefCell<ContentGuard>>>,
    _math: Option<MathPlugin>,
    _guard_listener: Option<Subscription>,
}

impl std::fmt::Debug for MarkdownEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownEditor")
            .field("config", &self.config)
            .field("editor", &self.editor)
            .finish_non_exhaustive()
    }
}

impl Default for MarkdownEditor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl MarkdownEditor {
    /// Builds an empty editor for `config`.
    pub fn new(config: EditorConfig) -> Self {
        let editor = Editor::new(config.effective_history_limit());
        let codec = if config.math {
            MarkdownCodec::with_defaults()
        } else {
            MarkdownCodec::without_math()
        };
        let math = config.math.then(|| MathPlugin::register(&editor));

        let (guard, guard_listener) = if config.content_guard {
            let guard = Rc::new(RefCell::new(ContentGuard::new(config.debounce())));
            let watching = Rc::clone(&guard);
            let listener = editor.register_update_listener(move |_, event| {
                if event.dirty {
                    let text = event.state.tree().text_content(event.state.tree().root());
                    watching.borrow_mut().on_text_changed(text, Instant::now());
                }
            });
            (Some(guard), Some(listener))
        } else {
            (None, None)
        };

        Self {
            config,
            editor,
            codec,
            guard,
            _math: math,
            _guard_listener: guard_listener,
        }
    }

    /// Options the editor was built with.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The underlying editor, for custom commands and listeners.
    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Codec used for load and export.
    pub fn codec(&self) -> &MarkdownCodec {
        &self.codec
    }

    // ------------------------------------------------------------------
    // Markdown
    // ------------------------------------------------------------------

    /// Replaces the document with `markdown`.
    ///
    /// If import fails halfway, what was built so far is kept and the error
    /// is returned.
    pub fn load_markdown(&self, markdown: &str) -> Result<ParseDiagnostics, EditorError> {
        let mut diagnostics = ParseDiagnostics::new();
        let outcome = self
            .editor
            .update_with_tags(&[UpdateTag::Load], |scope| {
                scope.set_selection(None);
                let tree = scope.tree_mut();
                let root = tree.root();
                tree.clear_children(root)?;
                Ok(self.codec.import_into(tree, root, markdown, &mut diagnostics))
            })?;
        if let Err(err) = outcome {
            log::error!("load_markdown: keeping partially imported document: {}", err);
            return Err(err);
        }
        Ok(diagnostics)
    }

    /// The document as Markdown.
    pub fn to_markdown(&self) -> Result<String, EditorError> {
        self.editor.read(|state| self.codec.serialize(state.tree()))
    }

    /// The document as Markdown, or an empty string when it cannot be
    /// serialized.
    pub fn get_markdown(&self) -> String {
        self.to_markdown().unwrap_or_else(|err| {
            log::error!("markdown export failed: {}", err);
            String::new()
        })
    }

    /// Plain text of the document, formulas in their `$` form.
    pub fn current_content(&self) -> String {
        self.editor
            .read(|state| state.tree().text_content(state.tree().root()))
    }

    /// Current counters.
    pub fn stats(&self) -> EditorStats {
        self.editor.read(|state| {
            let tree = state.tree();
            EditorStats {
                character_count: self.config.character_count.then(|| tree.character_count()),
                math_count: tree
                    .descendants(tree.root())
                    .into_iter()
                    .filter(|key| matches!(tree.get(*key), Some(Node::Math(_))))
                    .count(),
                block_count: tree.children(tree.root()).len(),
            }
        })
    }

    /// The document as a Markdown download; `None` when export is disabled.
    pub fn export_file(&self) -> Option<ExportedFile> {
        if !self.config.markdown_export {
            return None;
        }
        Some(ExportedFile {
            file_name: self.config.export_file_name.clone(),
            mime_type: "text/markdown",
            bytes: self.get_markdown().into_bytes(),
        })
    }

    /// HTML preview with the default math renderer.
    pub fn preview_html(&self) -> String {
        self.editor
            .read(|state| render_html(state.tree(), &HtmlMathRenderer))
    }

    /// Indented debug rendering of the tree.
    pub fn outline(&self) -> String {
        self.editor.read(|state| state.tree().outline())
    }

    /// Math nodes in document order.
    pub fn math_nodes(&self) -> Vec<(NodeKey, MathNode)> {
        self.editor.read(|state| {
            let tree = state.tree();
            tree.descendants(tree.root())
                .into_iter()
                .filter_map(|key| tree.get(key).and_then(Node::as_math).map(|m| (key, m.clone())))
                .collect()
        })
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Runs `command` unless the config disables the feature behind it.
    pub fn dispatch(&self, command: EditorCommand) -> Result<bool, EditorError> {
        if !self.allows(&command) {
            log::debug!("command {:?} disabled by config", command);
            return Ok(false);
        }
        self.editor.dispatch(command)
    }

    /// Inserts `text` at the caret in one step.
    pub fn insert_text(&self, text: &str) -> Result<bool, EditorError> {
        self.dispatch(EditorCommand::InsertText(text.to_string()))
    }

    /// Replays `input` one keystroke at a time, `\n` as Enter, so live
    /// promotion sees what a typist would produce.
    pub fn type_text(&self, input: &str) -> Result<(), EditorError> {
        for c in input.chars() {
            let command = match c {
                '\n' => EditorCommand::InsertParagraph,
                '\r' => continue,
                _ => EditorCommand::InsertText(c.to_string()),
            };
            self.dispatch(command)?;
        }
        Ok(())
    }

    /// Turns the math node `key` back into its source text.
    pub fn demote(&self, key: NodeKey) -> Result<bool, EditorError> {
        demote(&self.editor, key)
    }

    /// Registers `listener` for every commit.
    pub fn subscribe(&self, listener: impl Fn(&UpdateEvent) + 'static) -> Subscription {
        self.editor
            .register_update_listener(move |_, event| listener(event))
    }

    fn allows(&self, command: &EditorCommand) -> bool {
        let config = &self.config;
        match command {
            EditorCommand::FormatText(format) => [
                (TextFormat::BOLD, config.bold),
                (TextFormat::ITALIC, config.italic),
                (TextFormat::UNDERLINE, config.underline),
                (TextFormat::STRIKETHROUGH, config.strikethrough),
                (TextFormat::CODE, config.code),
            ]
            .into_iter()
            .all(|(bit, enabled)| enabled || !format.contains(bit)),
            EditorCommand::SetBlockQuote => config.quote,
            EditorCommand::InsertMath { .. }
            | EditorCommand::EditMathAsText { .. }
            | EditorCommand::UpdateMath { .. } => config.math,
            EditorCommand::Undo | EditorCommand::Redo => config.undo,
            EditorCommand::InsertText(_)
            | EditorCommand::InsertParagraph
            | EditorCommand::DeleteBackward
            | EditorCommand::ClearFormatting => true,
        }
    }

    // ------------------------------------------------------------------
    // Content guard
    // ------------------------------------------------------------------

    /// Guard status; `None` when the guard is disabled.
    pub fn guard_status(&self) -> Option<GuardStatus> {
        self.guard.as_ref().map(|guard| guard.borrow().status().clone())
    }

    /// The classification request due at `now`, if any.
    pub fn poll_guard(&self, now: Instant) -> Option<ClassificationRequest> {
        self.guard.as_ref()?.borrow_mut().poll(now)
    }

    /// Hands back the outcome of request `seq`. Returns false when it was
    /// stale or the guard is disabled.
    pub fn deliver_verdict(&self, seq: u64, result: Result<Verdict, EditorError>) -> bool {
        self.guard
            .as_ref()
            .is_some_and(|guard| guard.borrow_mut().deliver(seq, result))
    }

    /// Runs a due request through `classifier` synchronously.
    pub fn run_guard(&self, now: Instant, classifier: &dyn ContentClassifier) -> bool {
        self.guard
            .as_ref()
            .is_some_and(|guard| guard.borrow_mut().run_pending(now, classifier))
    }

    /// When the pending classification becomes due.
    pub fn guard_deadline(&self) -> Option<Instant> {
        self.guard.as_ref()?.borrow().deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::KeywordClassifier;
    use std::time::Duration;

    #[test]
    fn load_and_export() {
        let handle = MarkdownEditor::default();
        let diagnostics = handle.load_markdown("# Notes\n\nEnergy: $E=mc^2$").unwrap();
        assert!(!diagnostics.has_warnings());
        assert_eq!(handle.get_markdown(), "# Notes\n\nEnergy: $E=mc^2$");
        assert_eq!(handle.current_content(), "Notes\n\nEnergy: $E=mc^2$");

        let file = handle.export_file().unwrap();
        assert_eq!(file.file_name, "document.md");
        assert_eq!(file.bytes, b"# Notes\n\nEnergy: $E=mc^2$".to_vec());
    }

    #[test]
    fn load_replaces_document_and_is_undoable() {
        let handle = MarkdownEditor::default();
        handle.load_markdown("first").unwrap();
        handle.load_markdown("second").unwrap();
        assert_eq!(handle.get_markdown(), "second");
        assert!(handle.dispatch(EditorCommand::Undo).unwrap());
        assert_eq!(handle.get_markdown(), "first");
    }

    #[test]
    fn stats_count_formula_as_one() {
        let handle = MarkdownEditor::default();
        handle.load_markdown("ab $\\frac{1}{2}$").unwrap();
        let stats = handle.stats();
        assert_eq!(stats.character_count, Some(4));
        assert_eq!(stats.math_count, 1);
        assert_eq!(stats.block_count, 1);
    }

    #[test]
    fn disabled_features() {
        let handle = MarkdownEditor::new(EditorConfig {
            bold: false,
            markdown_export: false,
            character_count: false,
            content_guard: false,
            ..EditorConfig::default()
        });
        handle.load_markdown("text").unwrap();
        assert!(!handle.dispatch(EditorCommand::FormatText(TextFormat::BOLD)).unwrap());
        assert_eq!(handle.export_file(), None);
        assert_eq!(handle.stats().character_count, None);
        assert_eq!(handle.guard_status(), None);
    }

    #[test]
    fn typing_promotes_math() {
        let handle = MarkdownEditor::default();
        handle.type_text("so $x^2$ ").unwrap();
        assert_eq!(handle.math_nodes().len(), 1);
        assert_eq!(handle.get_markdown(), "so $x^2$ ");
    }

    #[test]
    fn without_math_dollars_stay_text() {
        let handle = MarkdownEditor::new(EditorConfig {
            math: false,
            ..EditorConfig::default()
        });
        handle.type_text("so $x$ ").unwrap();
        assert!(handle.math_nodes().is_empty());
        assert_eq!(handle.get_markdown(), "so \\$x\\$ ");
    }

    #[test]
    fn edits_feed_the_guard() {
        let handle = MarkdownEditor::new(EditorConfig {
            debounce_ms: 0,
            ..EditorConfig::default()
        });
        handle.load_markdown("CLICK HERE NOW!!! LIMITED TIME OFFER!!!").unwrap();
        assert_eq!(handle.guard_status(), Some(GuardStatus::Analyzing));

        let later = Instant::now() + Duration::from_millis(1);
        assert!(handle.run_guard(later, &KeywordClassifier::default()));
        assert_eq!(
            handle.guard_status(),
            Some(GuardStatus::Warning(vec![crate::guard::Category::Spam]))
        );
    }

    #[test]
    fn subscription_sees_commits_until_dropped() {
        let handle = MarkdownEditor::default();
        let seen = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&seen);
        let subscription = handle.subscribe(move |_| *counter.borrow_mut() += 1);

        handle.insert_text("a").unwrap();
        subscription.dispose();
        handle.insert_text("b").unwrap();
        assert_eq!(*seen.borrow(), 1);
    }
}
