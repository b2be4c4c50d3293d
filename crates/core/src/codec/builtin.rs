//! The built-in transformer set: headings, quotes, lists, fenced code,
//! emphasis, links and the math extension.

use super::escape::unmask;
use super::transformer::{
    BlockTransformer, ExportContext, ImportContext, InlineContext, LineCursor,
    TextFormatTransformer, TextMatchTransformer, Transformer,
};
use crate::code_fence::{FencePhase, FenceState, advance_fence_state, fence_for, parse_opening_fence};
use crate::error::{EditorError, ParseWarning, SourceLocation};
use crate::math::MATH_SPAN;
use crate::node::{Node, NodeKey, TextFormat};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t]*$").expect("valid heading pattern")
});
static QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}> ?(.*)$").expect("valid quote pattern"));
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([ \t]*)([-*+]|\d{1,9}[.)])[ \t]+(.*)$").expect("valid list item pattern")
});
static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid link pattern")
});

// Double backticks carry content that itself holds a backtick.
static CODE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"``[ ]?(.+?)[ ]?``|`([^`]+)`").expect("valid code span pattern")
});
static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold pattern"));
static STRIKETHROUGH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~(.+?)~~").expect("valid strikethrough pattern"));
static ITALIC_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(.+?)_").expect("valid italic pattern"));
static ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(.+?)\*").expect("valid italic pattern"));

/// Built-ins in resolution order, without math.
pub fn default_transformers() -> Vec<Transformer> {
    vec![
        Transformer::Block(Box::new(HeadingTransformer)),
        Transformer::Block(Box::new(QuoteTransformer)),
        Transformer::Block(Box::new(CodeTransformer)),
        Transformer::Block(Box::new(ListTransformer)),
        Transformer::TextFormat(TextFormatTransformer::new(
            TextFormat::CODE,
            "`",
            Regex::clone(&CODE_SPAN),
        )),
        Transformer::TextFormat(TextFormatTransformer::new(
            TextFormat::BOLD,
            "**",
            Regex::clone(&BOLD),
        )),
        Transformer::TextFormat(TextFormatTransformer::new(
            TextFormat::STRIKETHROUGH,
            "~~",
            Regex::clone(&STRIKETHROUGH),
        )),
        Transformer::TextFormat(TextFormatTransformer::new(
            TextFormat::ITALIC,
            "_",
            Regex::clone(&ITALIC_UNDERSCORE),
        )),
        Transformer::TextFormat(TextFormatTransformer::new(
            TextFormat::ITALIC,
            "*",
            Regex::clone(&ITALIC_STAR),
        )),
        Transformer::TextMatch(Box::new(LinkTransformer)),
    ]
}

/// The `$`/`$$` math transformer. Goes last so no built-in claims a
/// dollar-delimited span first.
pub fn math_transformer() -> Transformer {
    Transformer::TextMatch(Box::new(MathTransformer))
}

// ----------------------------------------------------------------------
// Blocks
// ----------------------------------------------------------------------

/// ATX headings (`# Title`).
#[derive(Debug, Clone, Copy)]
pub struct HeadingTransformer;

impl BlockTransformer for HeadingTransformer {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn export(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>> {
        let Node::Heading { level } = node else {
            return None;
        };
        let hashes = "#".repeat(usize::from((*level).clamp(1, 6)));
        Some(ctx.export_inline(key).map(|content| {
            let content = content.replace('\n', " ");
            if content.is_empty() {
                hashes
            } else {
                format!("{} {}", hashes, content)
            }
        }))
    }

    fn starts_block(&self, line: &str) -> bool {
        HEADING.is_match(line)
    }

    fn import(
        &self,
        lines: &mut LineCursor<'_>,
        ctx: &mut ImportContext<'_>,
    ) -> Result<(), EditorError> {
        let number = lines.line_number();
        let Some(line) = lines.advance() else {
            return Ok(());
        };
        let Some(captures) = HEADING.captures(line) else {
            return Ok(());
        };
        let level = captures.get(1).map_or(1, |m| m.len()) as u8;
        let content = captures.get(2).map_or("", |m| m.as_str());
        let heading = ctx.append(ctx.parent(), Node::Heading { level })?;
        ctx.import_inline(heading, content, number)
    }
}

/// Block quotes; consecutive `>` lines form one quote.
#[derive(Debug, Clone, Copy)]
pub struct QuoteTransformer;

impl BlockTransformer for QuoteTransformer {
    fn name(&self) -> &'static str {
        "quote"
    }

    fn export(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>> {
        if !matches!(node, Node::Quote) {
            return None;
        }
        Some(ctx.export_inline(key).map(|content| {
            content
                .split('\n')
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {}", line)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        }))
    }

    fn starts_block(&self, line: &str) -> bool {
        QUOTE.is_match(line)
    }

    fn import(
        &self,
        lines: &mut LineCursor<'_>,
        ctx: &mut ImportContext<'_>,
    ) -> Result<(), EditorError> {
        let number = lines.line_number();
        let mut content = Vec::new();
        while let Some(line) = lines.peek()
            && let Some(captures) = QUOTE.captures(line)
        {
            content.push(captures.get(1).map_or("", |m| m.as_str()));
            lines.advance();
        }
        let quote = ctx.append(ctx.parent(), Node::Quote)?;
        ctx.import_inline(quote, &content.join("\n"), number)
    }
}

/// Fenced code blocks. Content is kept verbatim as one text child.
#[derive(Debug, Clone, Copy)]
pub struct CodeTransformer;

impl BlockTransformer for CodeTransformer {
    fn name(&self) -> &'static str {
        "code"
    }

    fn export(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>> {
        let Node::Code { language } = node else {
            return None;
        };
        let content = ctx.tree().text_content(key);
        let fence = fence_for(&content);
        let info = language.as_deref().unwrap_or("");
        Some(Ok(if content.is_empty() {
            format!("{fence}{info}\n{fence}")
        } else {
            format!("{fence}{info}\n{content}\n{fence}")
        }))
    }

    fn starts_block(&self, line: &str) -> bool {
        parse_opening_fence(line).is_some()
    }

    fn import(
        &self,
        lines: &mut LineCursor<'_>,
        ctx: &mut ImportContext<'_>,
    ) -> Result<(), EditorError> {
        let number = lines.line_number();
        let Some(opener) = lines.advance() else {
            return Ok(());
        };
        let Some((marker, _, info)) = parse_opening_fence(opener) else {
            return Ok(());
        };
        let indent = opener.len() - opener.trim_start_matches(' ').len();
        let mut state: FenceState = advance_fence_state(opener, FenceState::default()).next_state;

        let mut body = Vec::new();
        let mut closed = false;
        while let Some(line) = lines.advance() {
            state = advance_fence_state(line, state).next_state;
            if state.phase == FencePhase::Outside {
                closed = true;
                break;
            }
            body.push(strip_indent(line, indent));
        }
        if !closed {
            ctx.warn(ParseWarning::UnclosedCodeFence {
                location: SourceLocation::new(number, indent + 1),
                marker,
            });
        }

        let language = (!info.is_empty()).then_some(info);
        let code = ctx.append(ctx.parent(), Node::Code { language })?;
        let content = body.join("\n");
        if !content.is_empty() {
            ctx.append(code, Node::text(content))?;
        }
        Ok(())
    }
}

/// Removes up to `indent` leading spaces.
fn strip_indent(line: &str, indent: usize) -> &str {
    let spaces = line.len() - line.trim_start_matches(' ').len();
    &line[spaces.min(indent)..]
}

/// Bullet and ordered lists; deeper indentation nests a list in the
/// preceding item.
#[derive(Debug, Clone, Copy)]
pub struct ListTransformer;

struct ListLevel {
    indent: usize,
    list: NodeKey,
    ordered: bool,
    last_item: Option<NodeKey>,
}

struct ListLine<'a> {
    indent: usize,
    ordered: bool,
    start: u32,
    content: &'a str,
}

fn list_line(line: &str) -> Option<ListLine<'_>> {
    let captures = LIST_ITEM.captures(line)?;
    let indent = captures.get(1).map_or(0, |m| {
        m.as_str()
            .chars()
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum()
    });
    let marker = captures.get(2)?.as_str();
    let digits = marker.trim_end_matches(['.', ')']);
    let ordered = digits.len() != marker.len();
    Some(ListLine {
        indent,
        ordered,
        start: if ordered { digits.parse().unwrap_or(1) } else { 1 },
        content: captures.get(3).map_or("", |m| m.as_str()),
    })
}

impl ListTransformer {
    fn export_list(
        &self,
        key: NodeKey,
        start: u32,
        ordered: bool,
        depth: usize,
        ctx: &ExportContext<'_>,
        out: &mut Vec<String>,
    ) -> Result<(), EditorError> {
        let tree = ctx.tree();
        let indent = "    ".repeat(depth);
        for (index, item) in tree.children(key).iter().enumerate() {
            let marker = if ordered {
                format!("{}.", start as usize + index)
            } else {
                "-".to_string()
            };
            let (nested, inline): (Vec<NodeKey>, Vec<NodeKey>) = tree
                .children(*item)
                .iter()
                .partition(|child| matches!(tree.get(**child), Some(Node::List { .. })));
            let content = ctx.export_nodes(&inline)?.replace('\n', " ");
            out.push(format!("{}{} {}", indent, marker, content));
            for list in nested {
                if let Some(Node::List { ordered, start }) = tree.get(list) {
                    self.export_list(list, *start, *ordered, depth + 1, ctx, out)?;
                }
            }
        }
        Ok(())
    }
}

impl BlockTransformer for ListTransformer {
    fn name(&self) -> &'static str {
        "list"
    }

    fn export(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>> {
        let Node::List { ordered, start } = node else {
            return None;
        };
        let mut out = Vec::new();
        Some(
            self.export_list(key, *start, *ordered, 0, ctx, &mut out)
                .map(|()| out.join("\n")),
        )
    }

    fn starts_block(&self, line: &str) -> bool {
        LIST_ITEM.is_match(line)
    }

    fn import(
        &self,
        lines: &mut LineCursor<'_>,
        ctx: &mut ImportContext<'_>,
    ) -> Result<(), EditorError> {
        let mut levels: Vec<ListLevel> = Vec::new();
        while let Some(line) = lines.peek()
            && let Some(item) = list_line(line)
        {
            while levels.len() > 1 && levels.last().is_some_and(|top| top.indent > item.indent) {
                levels.pop();
            }

            match levels.last() {
                None => {
                    let list = ctx.append(
                        ctx.parent(),
                        Node::List {
                            ordered: item.ordered,
                            start: item.start,
                        },
                    )?;
                    levels.push(ListLevel {
                        indent: item.indent,
                        list,
                        ordered: item.ordered,
                        last_item: None,
                    });
                }
                Some(top) if item.indent > top.indent && top.last_item.is_some() => {
                    let host = top.last_item.unwrap_or(top.list);
                    let list = ctx.append(
                        host,
                        Node::List {
                            ordered: item.ordered,
                            start: item.start,
                        },
                    )?;
                    levels.push(ListLevel {
                        indent: item.indent,
                        list,
                        ordered: item.ordered,
                        last_item: None,
                    });
                }
                // A marker of the other kind ends a top-level list.
                Some(top) if top.ordered != item.ordered && levels.len() == 1 => break,
                Some(top) if top.ordered != item.ordered => {
                    levels.pop();
                    let host = levels
                        .last()
                        .and_then(|parent| parent.last_item)
                        .ok_or_else(|| EditorError::structure("nested list without a host item"))?;
                    let list = ctx.append(
                        host,
                        Node::List {
                            ordered: item.ordered,
                            start: item.start,
                        },
                    )?;
                    levels.push(ListLevel {
                        indent: item.indent,
                        list,
                        ordered: item.ordered,
                        last_item: None,
                    });
                }
                Some(_) => {}
            }

            let number = lines.line_number();
            lines.advance();
            let Some(level) = levels.last_mut() else {
                break;
            };
            let entry = ctx.append(level.list, Node::ListItem)?;
            level.last_item = Some(entry);
            ctx.import_inline(entry, item.content, number)?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Text matches
// ----------------------------------------------------------------------

/// `[label](url)` links.
#[derive(Debug, Clone, Copy)]
pub struct LinkTransformer;

fn encode_url(url: &str) -> String {
    url.replace(' ', "%20").replace(')', "%29")
}

impl TextMatchTransformer for LinkTransformer {
    fn name(&self) -> &'static str {
        "link"
    }

    fn pattern(&self) -> &Regex {
        &LINK
    }

    fn import(
        &self,
        captures: &Captures<'_>,
        ctx: &mut InlineContext<'_>,
    ) -> Result<bool, EditorError> {
        let (Some(label), Some(url)) = (captures.get(1), captures.get(2)) else {
            return Ok(false);
        };
        let link = ctx.append(Node::Link {
            url: unmask(url.as_str()),
        })?;
        ctx.import_inline(link, label.as_str())?;
        Ok(true)
    }

    fn export(
        &self,
        node: &Node,
        key: NodeKey,
        ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>> {
        let Node::Link { url } = node else {
            return None;
        };
        Some(
            ctx.export_inline(key)
                .map(|label| format!("[{}]({})", label, encode_url(url))),
        )
    }
}

/// `$inline$` and `$$block$$` formulas.
#[derive(Debug, Clone, Copy)]
pub struct MathTransformer;

impl TextMatchTransformer for MathTransformer {
    fn name(&self) -> &'static str {
        "math"
    }

    fn pattern(&self) -> &Regex {
        &MATH_SPAN
    }

    fn import(
        &self,
        captures: &Captures<'_>,
        ctx: &mut InlineContext<'_>,
    ) -> Result<bool, EditorError> {
        let (equation, inline) = match (captures.get(1), captures.get(2)) {
            (Some(block), _) => (block.as_str(), false),
            (None, Some(inline)) => (inline.as_str(), true),
            (None, None) => return Ok(false),
        };
        let raw = ctx.raw(equation);
        // Block fences usually sit on their own lines; the padding is not
        // part of the formula. Inline spans stay verbatim.
        let equation = if inline { raw.as_str() } else { raw.trim() };
        if equation.trim().is_empty() {
            return Ok(false);
        }
        match Node::math(equation, inline) {
            Ok(node) => {
                ctx.append(node)?;
                Ok(true)
            }
            Err(err) => {
                let line = ctx.line();
                ctx.warn(ParseWarning::RejectedMath {
                    location: SourceLocation::new(line, 1),
                    message: err.to_string(),
                });
                Ok(false)
            }
        }
    }

    fn export(
        &self,
        node: &Node,
        _key: NodeKey,
        _ctx: &ExportContext<'_>,
    ) -> Option<Result<String, EditorError>> {
        node.as_math().map(|math| Ok(math.markdown()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_pattern() {
        assert!(HEADING.is_match("## Title"));
        assert!(HEADING.is_match("###"));
        assert!(!HEADING.is_match("#hashtag"));
        assert!(!HEADING.is_match("####### seven"));
    }

    #[test]
    fn list_line_markers() {
        let item = list_line("  3. third").unwrap();
        assert!(item.ordered);
        assert_eq!(item.start, 3);
        assert_eq!(item.indent, 2);
        assert_eq!(item.content, "third");

        let item = list_line("- bullet").unwrap();
        assert!(!item.ordered);
        assert!(list_line("*emphasis*").is_none());
    }

    #[test]
    fn strip_indent_stops_at_content() {
        assert_eq!(strip_indent("    code", 2), "  code");
        assert_eq!(strip_indent(" x", 3), "x");
    }

    #[test]
    fn url_encoding_keeps_link_parseable() {
        assert_eq!(encode_url("a b)c"), "a%20b%29c");
    }
}
