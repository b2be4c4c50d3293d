#![deny(missing_docs)]
//! Mathmark core: a rich-text document tree with a Markdown codec and live
//! `$`/`$$` math promotion.

/// Fenced code block detection.
pub mod code_fence;
/// Markdown import and export.
pub mod codec;
/// Editing commands.
pub mod commands;
/// Editor options.
pub mod config;
/// Mutation boundary, listeners and command dispatch.
pub mod editor;
/// Core error and diagnostic types.
pub mod error;
/// Debounced content classification.
pub mod guard;
/// The host-facing editor handle.
pub mod handle;
/// Bounded undo/redo stacks.
pub mod history;
/// Math promotion and demotion.
pub mod math;
/// Node types.
pub mod node;
/// HTML preview and the math renderer interface.
pub mod render;
/// Carets and ranges.
pub mod selection;
/// The document tree.
pub mod tree;

pub use codec::{MarkdownCodec, Transformer};
pub use commands::EditorCommand;
pub use config::EditorConfig;
pub use editor::{
    CommandPriority, DEFAULT_HISTORY_LIMIT, Editor, EditorState, Subscription, UpdateEvent,
    UpdateScope, UpdateTag,
};
pub use error::{EditorError, ParseDiagnostics, ParseWarning, SourceLocation};
pub use guard::{
    Category, ClassificationRequest, ContentClassifier, ContentGuard, Debouncer, GuardStatus,
    KeywordClassifier, Status, Verdict,
};
pub use handle::{EditorStats, ExportedFile, MarkdownEditor};
pub use math::{MathPlugin, demote, promote_text_node};
pub use node::{MathNode, Node, NodeKey, TextFormat, TextNode};
pub use render::{HtmlMathRenderer, MathRenderer, RenderedMath, render_html};
pub use selection::{Point, Selection};
pub use tree::{DocumentTree, MATH_UNIT_CHAR, MathText, NodeSnapshot};
