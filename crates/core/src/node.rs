//! Node variants stored in the document tree.
//!
//! Every node is one variant of the closed [`Node`] enum. Element variants own
//! children (through the tree), leaf variants own their payload directly.

use crate::error::EditorError;
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a node.
///
/// A key survives structural changes to other nodes and is retired when its
/// node is removed; it is never handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeKey(u64);

impl NodeKey {
    pub(crate) fn next() -> Self {
        NodeKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value of the key.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(NodeKey)
    }
}

/// Independent inline format bits of a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct TextFormat(u8);

impl TextFormat {
    /// No formatting.
    pub const PLAIN: TextFormat = TextFormat(0);
    /// Bold text.
    pub const BOLD: TextFormat = TextFormat(1);
    /// Italic text.
    pub const ITALIC: TextFormat = TextFormat(1 << 1);
    /// Struck-through text.
    pub const STRIKETHROUGH: TextFormat = TextFormat(1 << 2);
    /// Underlined text.
    pub const UNDERLINE: TextFormat = TextFormat(1 << 3);
    /// Inline code; also marks literal text the math engine must not touch.
    pub const CODE: TextFormat = TextFormat(1 << 4);
    /// Subscript text.
    pub const SUBSCRIPT: TextFormat = TextFormat(1 << 5);
    /// Superscript text.
    pub const SUPERSCRIPT: TextFormat = TextFormat(1 << 6);

    const NAMES: [(TextFormat, &'static str); 7] = [
        (TextFormat::BOLD, "bold"),
        (TextFormat::ITALIC, "italic"),
        (TextFormat::STRIKETHROUGH, "strikethrough"),
        (TextFormat::UNDERLINE, "underline"),
        (TextFormat::CODE, "code"),
        (TextFormat::SUBSCRIPT, "subscript"),
        (TextFormat::SUPERSCRIPT, "superscript"),
    ];

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: TextFormat) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub const fn is_plain(self) -> bool {
        self.0 == 0
    }

    /// Copy with the bits of `other` set.
    pub const fn with(self, other: TextFormat) -> TextFormat {
        TextFormat(self.0 | other.0)
    }

    /// Copy with the bits of `other` cleared.
    pub const fn without(self, other: TextFormat) -> TextFormat {
        TextFormat(self.0 & !other.0)
    }

    /// Copy with the bits of `other` flipped.
    pub const fn toggled(self, other: TextFormat) -> TextFormat {
        TextFormat(self.0 ^ other.0)
    }

    /// Names of the active bits, in a fixed order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Parses a single format name such as `"bold"`.
    pub fn from_name(name: &str) -> Option<TextFormat> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(bit, _)| *bit)
    }
}

impl BitOr for TextFormat {
    type Output = TextFormat;

    fn bitor(self, rhs: TextFormat) -> TextFormat {
        self.with(rhs)
    }
}

/// Text payload plus its format bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextNode {
    /// The text itself.
    pub text: String,
    /// Active inline formats.
    pub format: TextFormat,
}

impl TextNode {
    /// Unformatted text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::PLAIN,
        }
    }

    /// Text with the given format bits.
    pub fn formatted(text: impl Into<String>, format: TextFormat) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A typeset formula. The equation never carries its `$` delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MathNode {
    equation: String,
    inline: bool,
}

impl MathNode {
    /// Builds a math node, rejecting equations that contain `$`.
    ///
    /// Delimiters are only added at the serialization boundary, and a literal
    /// `$` inside the equation would make the exported form ambiguous.
    pub fn new(equation: impl Into<String>, inline: bool) -> Result<Self, EditorError> {
        let equation = equation.into();
        if equation.contains('$') {
            return Err(EditorError::InvalidEquation(format!(
                "equation {:?} contains a `$` delimiter",
                equation
            )));
        }
        Ok(Self { equation, inline })
    }

    /// The delimiter-free LaTeX source.
    pub fn equation(&self) -> &str {
        &self.equation
    }

    /// Whether the formula flows inside a paragraph.
    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// The delimited Markdown form (`$eq$` or `$$eq$$`).
    pub fn markdown(&self) -> String {
        if self.inline {
            format!("${}$", self.equation)
        } else {
            format!("$${}$$", self.equation)
        }
    }
}

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// The single document root.
    Root,
    /// A paragraph of inline content.
    Paragraph,
    /// A heading of level 1-6.
    Heading {
        /// Heading depth.
        level: u8,
    },
    /// A block quote of inline content.
    Quote,
    /// A fenced code block holding one literal text child.
    Code {
        /// Info string of the fence.
        language: Option<String>,
    },
    /// An ordered or bullet list of list items.
    List {
        /// Numbered list when true.
        ordered: bool,
        /// First number of an ordered list.
        start: u32,
    },
    /// One list entry: inline content optionally followed by nested lists.
    ListItem,
    /// A hyperlink wrapping inline content.
    Link {
        /// Link target.
        url: String,
    },
    /// A run of text.
    Text(TextNode),
    /// A math formula.
    Math(MathNode),
}

impl Node {
    /// Plain text node.
    pub fn text(text: impl Into<String>) -> Node {
        Node::Text(TextNode::plain(text))
    }

    /// Formatted text node.
    pub fn formatted_text(text: impl Into<String>, format: TextFormat) -> Node {
        Node::Text(TextNode::formatted(text, format))
    }

    /// Math node; see [`MathNode::new`].
    pub fn math(equation: impl Into<String>, inline: bool) -> Result<Node, EditorError> {
        MathNode::new(equation, inline).map(Node::Math)
    }

    /// Short lowercase name of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Root => "root",
            Node::Paragraph => "paragraph",
            Node::Heading { .. } => "heading",
            Node::Quote => "quote",
            Node::Code { .. } => "code",
            Node::List { .. } => "list",
            Node::ListItem => "listitem",
            Node::Link { .. } => "link",
            Node::Text(_) => "text",
            Node::Math(_) => "math",
        }
    }

    /// Whether the variant owns children.
    pub fn is_element(&self) -> bool {
        match self {
            Node::Root
            | Node::Paragraph
            | Node::Heading { .. }
            | Node::Quote
            | Node::Code { .. }
            | Node::List { .. }
            | Node::ListItem
            | Node::Link { .. } => true,
            Node::Text(_) | Node::Math(_) => false,
        }
    }

    /// Whether the node lives inside block content rather than beside blocks.
    pub fn is_inline(&self) -> bool {
        match self {
            Node::Text(_) | Node::Link { .. } => true,
            Node::Math(math) => math.is_inline(),
            Node::Root
            | Node::Paragraph
            | Node::Heading { .. }
            | Node::Quote
            | Node::Code { .. }
            | Node::List { .. }
            | Node::ListItem => false,
        }
    }

    /// Whether Enter inside this element splits it, producing a sibling block.
    pub fn is_text_block(&self) -> bool {
        matches!(
            self,
            Node::Paragraph | Node::Heading { .. } | Node::Quote | Node::ListItem
        )
    }

    /// Text payload when this is a text node.
    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Math payload when this is a math node.
    pub fn as_math(&self) -> Option<&MathNode> {
        match self {
            Node::Math(math) => Some(math),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        let a = NodeKey::next();
        let b = NodeKey::next();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<NodeKey>().unwrap(), a);
    }

    #[test]
    fn format_bits_are_independent() {
        let format = TextFormat::BOLD | TextFormat::SUPERSCRIPT;
        assert!(format.contains(TextFormat::BOLD));
        assert!(!format.contains(TextFormat::ITALIC));
        assert_eq!(format.names(), vec!["bold", "superscript"]);
        assert_eq!(format.toggled(TextFormat::BOLD), TextFormat::SUPERSCRIPT);
        assert!(format.without(format).is_plain());
        assert_eq!(TextFormat::from_name("Italic"), Some(TextFormat::ITALIC));
    }

    #[test]
    fn math_rejects_dollar() {
        assert!(matches!(
            MathNode::new("a$b", true),
            Err(EditorError::InvalidEquation(_))
        ));
        let block = MathNode::new("x^2", false).unwrap();
        assert_eq!(block.markdown(), "$$x^2$$");
        assert_eq!(MathNode::new("y", true).unwrap().markdown(), "$y$");
    }

    #[test]
    fn inline_classification() {
        assert!(Node::text("a").is_inline());
        assert!(Node::math("x", true).unwrap().is_inline());
        assert!(!Node::math("x", false).unwrap().is_inline());
        assert!(!Node::Paragraph.is_inline());
        assert!(Node::Paragraph.is_element());
        assert!(!Node::text("a").is_element());
    }
}
