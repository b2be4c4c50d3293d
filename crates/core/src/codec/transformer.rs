//! Transformer traits and the contexts they run in.

use super::MarkdownCodec;
use super::escape::{mask_escapes, unmask_raw};
use crate::error::{EditorError, ParseDiagnostics, ParseWarning};
use crate::node::{Node, NodeKey, TextFormat};
use crate::tree::DocumentTree;
use regex::{Captures, Regex};
use std::fmt;

/// One import/export rule of a [`MarkdownCodec`]. Order in the codec's list
/// is resolution order.
pub enum Transformer {
    /// Whole-line constructs such as headings and lists.
    Block(Box<dyn BlockTransformer>),
    /// Symmetric delimiter pairs toggling a text format.
    TextFormat(TextFormatTransformer),
    /// Patterns inside text that become their own nodes (links, math).
    TextMatch(Box<dyn TextMatchTransformer>),
}

impl Transformer {
    /// Name for logs and debugging.
    pub fn name(&self) -> &str {
        match self {
            Transformer::Block(block) => block.name(),
            Transformer::TextFormat(format) => format.tag(),
            Transformer::TextMatch(matcher) => matcher.name(),
        }
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformer::Block(_) => write!(f, "Block({})", self.name()),
            Transformer::TextFormat(_) => write!(f, "TextFormat({})", self.name()),
            Transformer::TextMatch(_) => write!(f, "TextMatch({})", self.name()),
        }
    }
}

/// A block-level construct read from and written to whole lines.
pub trait BlockTransformer {
    /// Name for logs and debugging.
    fn name(&self) -> &'static str;

    /// Markdown for `node`, or `None` when this transformer does not own it.
    fn export(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>>;

    /// Whether `line` opens a block of this kind.
    fn starts_block(&self, line: &str) -> bool;

    /// Consumes the lines of one block and appends its nodes to
    /// [`ImportContext::parent`]. Called only when [`starts_block`] accepted
    /// the current line.
    ///
    /// [`starts_block`]: BlockTransformer::starts_block
    fn import(&self, lines: &mut LineCursor<'_>, ctx: &mut ImportContext<'_>)
    -> Result<(), EditorError>;
}

/// A pattern found inside inline text that produces dedicated nodes.
pub trait TextMatchTransformer {
    /// Name for logs and debugging.
    fn name(&self) -> &'static str;

    /// Pattern scanned over (escape-masked) inline text.
    fn pattern(&self) -> &Regex;

    /// Appends nodes for one match. `Ok(false)` keeps the span as literal
    /// text.
    fn import(&self, captures: &Captures<'_>, ctx: &mut InlineContext<'_>)
    -> Result<bool, EditorError>;

    /// Markdown for `node`, or `None` when this transformer does not own it.
    fn export(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>>;
}

/// Delimiter pair such as `**` for bold.
#[derive(Debug, Clone)]
pub struct TextFormatTransformer {
    format: TextFormat,
    tag: &'static str,
    pattern: Regex,
}

impl TextFormatTransformer {
    /// The enclosed content is the first capture group that participates in
    /// a match of `pattern`.
    pub fn new(format: TextFormat, tag: &'static str, pattern: Regex) -> Self {
        Self {
            format,
            tag,
            pattern,
        }
    }

    /// Format applied to the enclosed text.
    pub fn format(&self) -> TextFormat {
        self.format
    }

    /// Delimiter written on export.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Import pattern.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Enclosed content of one match.
    pub fn content<'t>(&self, captures: &Captures<'t>) -> Option<&'t str> {
        captures
            .iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str())
    }
}

/// Line-by-line view over the source being imported.
#[derive(Debug)]
pub struct LineCursor<'a> {
    lines: Vec<&'a str>,
    position: usize,
}

impl<'a> LineCursor<'a> {
    /// Cursor over the `\n`-separated lines of `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.split('\n').collect(),
            position: 0,
        }
    }

    /// The current line without consuming it.
    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.position).copied()
    }

    /// Consumes and returns the current line.
    pub fn advance(&mut self) -> Option<&'a str> {
        let line = self.peek()?;
        self.position += 1;
        Some(line)
    }

    /// 1-based number of the current line.
    pub fn line_number(&self) -> usize {
        self.position + 1
    }

    /// Whether every line was consumed.
    pub fn is_done(&self) -> bool {
        self.position >= self.lines.len()
    }

    /// Lines not consumed yet, the current one first.
    pub fn remaining(&self) -> &[&'a str] {
        self.lines.get(self.position..).unwrap_or(&[])
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }
}

/// What a block transformer may touch while importing.
pub struct ImportContext<'a> {
    pub(crate) codec: &'a MarkdownCodec,
    pub(crate) tree: &'a mut DocumentTree,
    pub(crate) parent: NodeKey,
    pub(crate) diagnostics: &'a mut ParseDiagnostics,
}

impl ImportContext<'_> {
    /// Element receiving top-level blocks.
    pub fn parent(&self) -> NodeKey {
        self.parent
    }

    /// The tree under construction.
    pub fn tree(&mut self) -> &mut DocumentTree {
        self.tree
    }

    /// Creates `node` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeKey, node: Node) -> Result<NodeKey, EditorError> {
        let key = self.tree.create(node)?;
        self.tree.append_child(parent, key)?;
        Ok(key)
    }

    /// Parses raw inline Markdown into children of `parent`.
    pub fn import_inline(
        &mut self,
        parent: NodeKey,
        source: &str,
        line: usize,
    ) -> Result<(), EditorError> {
        self.codec.import_inline(
            self.tree,
            parent,
            &mask_escapes(source),
            TextFormat::PLAIN,
            line,
            self.diagnostics,
        )
    }

    /// Records a non-fatal problem.
    pub fn warn(&mut self, warning: ParseWarning) {
        self.diagnostics.add_warning(warning);
    }
}

/// What a text-match transformer may touch while importing one match.
pub struct InlineContext<'a> {
    pub(crate) codec: &'a MarkdownCodec,
    pub(crate) tree: &'a mut DocumentTree,
    pub(crate) parent: NodeKey,
    pub(crate) format: TextFormat,
    pub(crate) line: usize,
    pub(crate) diagnostics: &'a mut ParseDiagnostics,
}

impl InlineContext<'_> {
    /// Formats active around the match.
    pub fn format(&self) -> TextFormat {
        self.format
    }

    /// Source line of the enclosing block.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Creates `node` as the next inline child.
    pub fn append(&mut self, node: Node) -> Result<NodeKey, EditorError> {
        let key = self.tree.create(node)?;
        self.tree.append_child(self.parent, key)?;
        Ok(key)
    }

    /// Parses a captured (still masked) span into children of `parent`,
    /// keeping the surrounding formats.
    pub fn import_inline(&mut self, parent: NodeKey, masked: &str) -> Result<(), EditorError> {
        self.codec.import_inline(
            self.tree,
            parent,
            masked,
            self.format,
            self.line,
            self.diagnostics,
        )
    }

    /// A captured span with its escapes restored verbatim, for content where
    /// backslashes are not interpreted.
    pub fn raw(&self, masked: &str) -> String {
        unmask_raw(masked)
    }

    /// Records a non-fatal problem.
    pub fn warn(&mut self, warning: ParseWarning) {
        self.diagnostics.add_warning(warning);
    }
}

/// Read access for exporting transformers.
pub struct ExportContext<'a> {
    pub(crate) codec: &'a MarkdownCodec,
    pub(crate) tree: &'a DocumentTree,
}

impl ExportContext<'_> {
    /// The tree being exported.
    pub fn tree(&self) -> &DocumentTree {
        self.tree
    }

    /// Inline Markdown for all children of `key`.
    pub fn export_inline(&self, key: NodeKey) -> Result<String, EditorError> {
        self.codec.export_inline(self.tree, self.tree.children(key))
    }

    /// Inline Markdown for the given sibling nodes.
    pub fn export_nodes(&self, keys: &[NodeKey]) -> Result<String, EditorError> {
        self.codec.export_inline(self.tree, keys)
    }
}
