//! Bidirectional Markdown codec.
//!
//! A [`MarkdownCodec`] is an ordered list of [`Transformer`]s. Export walks
//! the root's blocks and asks each block transformer in turn; the first one
//! that claims the node writes it. Import walks the source line by line,
//! handing each line to the first block transformer that recognizes it and
//! falling back to paragraphs. Inline text is scanned with every format and
//! text-match pattern, the earliest match winning and ties going to the
//! transformer listed first.

mod builtin;
mod escape;
mod transformer;

pub use builtin::{
    CodeTransformer, HeadingTransformer, LinkTransformer, ListTransformer, MathTransformer,
    QuoteTransformer, default_transformers, math_transformer,
};
pub use transformer::{
    BlockTransformer, ExportContext, ImportContext, InlineContext, LineCursor,
    TextFormatTransformer, TextMatchTransformer, Transformer,
};

use crate::commands::is_blank;
use crate::error::{EditorError, ParseDiagnostics};
use crate::math::hoist_block_math;
use crate::node::{Node, NodeKey, TextFormat, TextNode};
use crate::tree::DocumentTree;
use escape::{escape_line_starts, escape_text, mask_escapes, unmask, unmask_raw};
use regex::{Captures, Match};
use std::fmt;

/// Converts document trees to Markdown and back.
pub struct MarkdownCodec {
    transformers: Vec<Transformer>,
}

impl Default for MarkdownCodec {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for MarkdownCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkdownCodec")
            .field("transformers", &self.transformers)
            .finish()
    }
}

/// The best inline match found so far.
enum Candidate<'c, 't> {
    Format(&'c TextFormatTransformer, Captures<'t>),
    Text(&'c dyn TextMatchTransformer, Captures<'t>),
}

impl<'t> Candidate<'_, 't> {
    fn span(&self) -> Option<Match<'t>> {
        match self {
            Candidate::Format(_, captures) | Candidate::Text(_, captures) => captures.get(0),
        }
    }
}

fn crosses(outer: Match<'_>, spans: &[(usize, usize)]) -> bool {
    spans.iter().any(|&(start, end)| {
        (outer.start() < start && start < outer.end() && outer.end() < end)
            || (start < outer.start() && outer.start() < end && end < outer.end())
    })
}

impl MarkdownCodec {
    /// Codec over an explicit transformer list.
    pub fn new(transformers: Vec<Transformer>) -> Self {
        Self { transformers }
    }

    /// Built-in transformers followed by the math transformer.
    pub fn with_defaults() -> Self {
        let mut transformers = default_transformers();
        transformers.push(math_transformer());
        Self::new(transformers)
    }

    /// Built-in transformers only; math nodes cannot be exported and `$`
    /// spans import as text.
    pub fn without_math() -> Self {
        Self::new(default_transformers())
    }

    /// Appends a transformer after the existing ones.
    pub fn push(&mut self, transformer: Transformer) {
        self.transformers.push(transformer);
    }

    /// Transformers in resolution order.
    pub fn transformers(&self) -> &[Transformer] {
        &self.transformers
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Markdown for the whole document. Blank paragraphs are skipped and
    /// blocks are separated by one empty line.
    pub fn serialize(&self, tree: &DocumentTree) -> Result<String, EditorError> {
        let ctx = ExportContext { codec: self, tree };
        let mut blocks = Vec::new();
        for &key in tree.children(tree.root()) {
            let node = tree.get(key).ok_or(EditorError::StaleReference(key))?;
            if matches!(node, Node::Paragraph) {
                if is_blank(tree, key) {
                    continue;
                }
                let content = self.export_inline(tree, tree.children(key))?;
                blocks.push(escape_line_starts(&content));
                continue;
            }
            blocks.push(self.export_block(node, key, &ctx)?);
        }
        Ok(blocks.join("\n\n"))
    }

    fn export_block(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Result<String, EditorError> {
        for transformer in &self.transformers {
            if let Transformer::Block(block) = transformer
                && let Some(result) = block.export(node, key, ctx)
            {
                return result;
            }
        }
        // Math and stray inline nodes at the root export as their own line.
        if node.is_inline() || matches!(node, Node::Math(_)) {
            return self.export_inline(ctx.tree, &[key]);
        }
        Err(EditorError::serialization(format!(
            "no transformer exports {} nodes",
            node.type_name()
        )))
    }

    pub(crate) fn export_inline(
        &self,
        tree: &DocumentTree,
        keys: &[NodeKey],
    ) -> Result<String, EditorError> {
        let ctx = ExportContext { codec: self, tree };
        let mut out = String::new();
        // Adjacent runs with the same format are written as one span.
        let mut pending: Option<TextNode> = None;
        for &key in keys {
            let node = tree.get(key).ok_or(EditorError::StaleReference(key))?;
            if let Node::Text(text) = node {
                match pending.as_mut() {
                    Some(run) if run.format == text.format => run.text.push_str(&text.text),
                    _ => {
                        if let Some(run) = pending.replace(text.clone()) {
                            out.push_str(&self.export_text(&run));
                        }
                    }
                }
                continue;
            }
            if let Some(run) = pending.take() {
                out.push_str(&self.export_text(&run));
            }
            out.push_str(&self.export_match(node, key, &ctx)?);
        }
        if let Some(run) = pending {
            out.push_str(&self.export_text(&run));
        }
        Ok(out)
    }

    fn export_match(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Result<String, EditorError> {
        for transformer in &self.transformers {
            if let Transformer::TextMatch(matcher) = transformer
                && let Some(result) = matcher.export(node, key, ctx)
            {
                return result;
            }
        }
        Err(EditorError::serialization(format!(
            "no transformer exports inline {} nodes",
            node.type_name()
        )))
    }

    /// Text with its format delimiters. Code goes innermost, the first
    /// listed format outermost. Formats without a transformer are dropped.
    fn export_text(&self, text: &TextNode) -> String {
        if text.text.is_empty() {
            return String::new();
        }
        let mut tags: Vec<(TextFormat, &str)> = Vec::new();
        for transformer in &self.transformers {
            if let Transformer::TextFormat(format) = transformer
                && text.format.contains(format.format())
                && !tags.iter().any(|(seen, _)| *seen == format.format())
            {
                tags.push((format.format(), format.tag()));
            }
        }

        let code = tags
            .iter()
            .position(|(format, _)| *format == TextFormat::CODE)
            .map(|index| tags.remove(index));
        let mut out = match code {
            Some((_, tag)) => {
                let raw = &text.text;
                if raw.contains('`') || raw.ends_with('\\') || raw.starts_with(' ') {
                    format!("{tag}{tag} {raw} {tag}{tag}")
                } else {
                    format!("{tag}{raw}{tag}")
                }
            }
            None => escape_text(&text.text),
        };
        for (_, tag) in tags.iter().rev() {
            out = format!("{tag}{out}{tag}");
        }
        out
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Builds a fresh document from Markdown.
    pub fn parse(&self, source: &str) -> Result<DocumentTree, EditorError> {
        self.parse_with_diagnostics(source).map(|(tree, _)| tree)
    }

    /// Builds a fresh document and reports non-fatal problems.
    pub fn parse_with_diagnostics(
        &self,
        source: &str,
    ) -> Result<(DocumentTree, ParseDiagnostics), EditorError> {
        let mut tree = DocumentTree::new();
        let mut diagnostics = ParseDiagnostics::new();
        tree.begin_mutation();
        let root = tree.root();
        let result = self.import_into(&mut tree, root, source, &mut diagnostics);
        tree.end_mutation();
        result.map(|()| (tree, diagnostics))
    }

    /// Appends the blocks of `source` to `parent` of a writable tree.
    pub fn import_into(
        &self,
        tree: &mut DocumentTree,
        parent: NodeKey,
        source: &str,
        diagnostics: &mut ParseDiagnostics,
    ) -> Result<(), EditorError> {
        if !tree.is_writable() {
            return Err(EditorError::IllegalMutationContext);
        }
        let source = source.replace("\r\n", "\n");
        let mut lines = LineCursor::new(&source);

        while let Some(line) = lines.peek() {
            if line.trim().is_empty() {
                lines.advance();
                continue;
            }
            let before = lines.position();
            if let Some(block) = self.block_for(line) {
                let mut ctx = ImportContext {
                    codec: self,
                    tree: &mut *tree,
                    parent,
                    diagnostics: &mut *diagnostics,
                };
                block.import(&mut lines, &mut ctx)?;
                if lines.position() != before {
                    continue;
                }
                log::warn!(
                    "{} transformer consumed nothing at line {}, reading it as a paragraph",
                    block.name(),
                    lines.line_number()
                );
            }
            self.import_paragraph(&mut lines, tree, parent, diagnostics)?;
        }

        if parent == tree.root() {
            let hoisted: Vec<NodeKey> = tree
                .children(parent)
                .iter()
                .filter(|key| matches!(tree.get(**key), Some(Node::Paragraph)))
                .flat_map(|key| tree.children(*key).iter().copied())
                .filter(|key| matches!(tree.get(*key), Some(Node::Math(math)) if !math.is_inline()))
                .collect();
            for key in hoisted {
                hoist_block_math(tree, key)?;
            }
        }
        Ok(())
    }

    fn block_for(&self, line: &str) -> Option<&dyn BlockTransformer> {
        self.transformers.iter().find_map(|transformer| match transformer {
            Transformer::Block(block) if block.starts_block(line) => Some(block.as_ref()),
            _ => None,
        })
    }

    /// Consumes lines up to a blank line or the start of another block.
    /// An open `$$` keeps the paragraph going when a later line closes it.
    fn import_paragraph(
        &self,
        lines: &mut LineCursor<'_>,
        tree: &mut DocumentTree,
        parent: NodeKey,
        diagnostics: &mut ParseDiagnostics,
    ) -> Result<(), EditorError> {
        let number = lines.line_number();
        let mut collected = Vec::new();
        let mut fences = 0;
        while let Some(line) = lines.peek() {
            let open_math = fences % 2 == 1
                && lines
                    .remaining()
                    .iter()
                    .any(|rest| mask_escapes(rest).contains("$$"));
            let ends = line.trim().is_empty() || self.block_for(line).is_some();
            if !collected.is_empty() && ends && !open_math {
                break;
            }
            fences += mask_escapes(line).matches("$$").count();
            collected.push(line);
            lines.advance();
        }

        let paragraph = tree.create(Node::Paragraph)?;
        tree.append_child(parent, paragraph)?;
        let masked = mask_escapes(&collected.join("\n"));
        self.import_inline(
            tree,
            paragraph,
            &masked,
            TextFormat::PLAIN,
            number,
            diagnostics,
        )
    }

    /// Parses escape-masked inline text into children of `parent`.
    pub(crate) fn import_inline(
        &self,
        tree: &mut DocumentTree,
        parent: NodeKey,
        masked: &str,
        format: TextFormat,
        line: usize,
        diagnostics: &mut ParseDiagnostics,
    ) -> Result<(), EditorError> {
        let mut rest = masked;
        while !rest.is_empty() {
            let Some(candidate) = self.earliest_match(rest) else {
                push_text(tree, parent, &unmask(rest), format)?;
                break;
            };
            let Some(span) = candidate.span().filter(|span| !span.is_empty()) else {
                push_text(tree, parent, &unmask(rest), format)?;
                break;
            };
            push_text(tree, parent, &unmask(&rest[..span.start()]), format)?;

            let consumed = match &candidate {
                Candidate::Format(transformer, captures) => {
                    let content = transformer.content(captures).unwrap_or("");
                    let inner = format.with(transformer.format());
                    if transformer.format() == TextFormat::CODE {
                        push_text(tree, parent, &unmask_raw(content), inner)?;
                    } else {
                        self.import_inline(tree, parent, content, inner, line, diagnostics)?;
                    }
                    true
                }
                Candidate::Text(matcher, captures) => {
                    let mut ctx = InlineContext {
                        codec: self,
                        tree: &mut *tree,
                        parent,
                        format,
                        line,
                        diagnostics: &mut *diagnostics,
                    };
                    matcher.import(captures, &mut ctx)?
                }
            };

            if consumed {
                rest = &rest[span.end()..];
            } else {
                // Rejected spans stay literal one char at a time so a later
                // delimiter can still open a match.
                let step = span.as_str().chars().next().map_or(1, char::len_utf8);
                push_text(tree, parent, &unmask(&rest[span.start()..span.start() + step]), format)?;
                rest = &rest[span.start() + step..];
            }
        }
        merge_adjacent_text(tree, parent)
    }

    fn earliest_match<'c, 't>(&'c self, text: &'t str) -> Option<Candidate<'c, 't>> {
        let spans: Vec<(usize, usize)> = self
            .transformers
            .iter()
            .filter_map(|transformer| match transformer {
                Transformer::TextMatch(matcher) => Some(matcher.pattern()),
                _ => None,
            })
            .flat_map(|pattern| pattern.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();

        let mut best: Option<Candidate<'c, 't>> = None;
        for transformer in &self.transformers {
            let candidate = match transformer {
                Transformer::Block(_) => None,
                Transformer::TextFormat(format) => {
                    let literal = format.format() == TextFormat::CODE;
                    format
                        .pattern()
                        .captures_iter(text)
                        .find(|captures| {
                            literal || captures.get(0).is_some_and(|m| !crosses(m, &spans))
                        })
                        .map(|captures| Candidate::Format(format, captures))
                }
                Transformer::TextMatch(matcher) => matcher
                    .pattern()
                    .captures(text)
                    .map(|captures| Candidate::Text(matcher.as_ref(), captures)),
            };
            let Some(candidate) = candidate else {
                continue;
            };
            let start = candidate.span().map_or(usize::MAX, |m| m.start());
            let better = best
                .as_ref()
                .and_then(Candidate::span)
                .is_none_or(|current| start < current.start());
            if better {
                best = Some(candidate);
            }
        }
        best
    }
}

fn push_text(
    tree: &mut DocumentTree,
    parent: NodeKey,
    text: &str,
    format: TextFormat,
) -> Result<(), EditorError> {
    if text.is_empty() {
        return Ok(());
    }
    let key = tree.create(Node::formatted_text(text, format))?;
    tree.append_child(parent, key)
}

/// Joins neighbouring text children that share a format, as rejected spans
/// are pushed in pieces.
fn merge_adjacent_text(tree: &mut DocumentTree, parent: NodeKey) -> Result<(), EditorError> {
    let children = tree.children(parent).to_vec();
    let mut previous: Option<(NodeKey, TextNode)> = None;
    for key in children {
        let current = tree.get(key).and_then(Node::as_text).cloned();
        match (previous.take(), current) {
            (Some((into, mut left)), Some(right)) if left.format == right.format => {
                left.text.push_str(&right.text);
                tree.set_text(into, left.text.clone())?;
                tree.remove(key)?;
                previous = Some((into, left));
            }
            (_, Some(right)) => previous = Some((key, right)),
            (_, None) => {}
        }
    }
    Ok(())
}
