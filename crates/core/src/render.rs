//! HTML preview of a document.
//!
//! Typesetting math is left to the host: [`MathRenderer`] turns one equation
//! into markup, and [`HtmlMathRenderer`] is the default that wraps the
//! escaped TeX in an element a client-side typesetter can pick up.

use crate::node::{Node, NodeKey, TextFormat};
use crate::tree::DocumentTree;
use html_escape::{encode_double_quoted_attribute, encode_text};

/// Markup for one formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMath {
    /// HTML fragment.
    pub html: String,
    /// Set when the equation could not be rendered and `html` is an error
    /// indicator instead.
    pub is_error: bool,
}

/// Renders equations for previews.
pub trait MathRenderer {
    /// Markup for `equation`, inline or display style.
    fn render(&self, equation: &str, inline: bool) -> RenderedMath;
}

/// Escaped TeX in `span.math-inline` / `div.math-block`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMathRenderer;

impl MathRenderer for HtmlMathRenderer {
    fn render(&self, equation: &str, inline: bool) -> RenderedMath {
        let (tag, class) = if inline {
            ("span", "math-inline")
        } else {
            ("div", "math-block")
        };
        if let Err(reason) = check_equation(equation) {
            log::debug!("math render failed for {:?}: {}", equation, reason);
            return RenderedMath {
                html: format!(
                    "<{tag} class=\"{class} math-error\" title=\"{}\">{}</{tag}>",
                    encode_double_quoted_attribute(reason),
                    encode_text(equation)
                ),
                is_error: true,
            };
        }
        RenderedMath {
            html: format!("<{tag} class=\"{class}\">{}</{tag}>", encode_text(equation)),
            is_error: false,
        }
    }
}

/// Cheap sanity checks a typesetter would also fail on.
fn check_equation(equation: &str) -> Result<(), &'static str> {
    if equation.trim().is_empty() {
        return Err("empty equation");
    }
    let mut depth: i32 = 0;
    let mut chars = equation.chars();
    while let Some(c) = chars.next() {
        match c {
            // `\{` and `\}` are literal braces.
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced braces");
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err("unbalanced braces")
    }
}

/// HTML for the whole document.
pub fn render_html(tree: &DocumentTree, renderer: &dyn MathRenderer) -> String {
    let mut out = String::new();
    for (index, child) in tree.children(tree.root()).iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        render_node(tree, *child, renderer, &mut out);
    }
    out
}

fn render_children(
    tree: &DocumentTree,
    key: NodeKey,
    renderer: &dyn MathRenderer,
    out: &mut String,
) {
    for child in tree.children(key) {
        render_node(tree, *child, renderer, out);
    }
}

fn render_node(tree: &DocumentTree, key: NodeKey, renderer: &dyn MathRenderer, out: &mut String) {
    let Some(node) = tree.get(key) else {
        return;
    };
    match node {
        Node::Root => render_children(tree, key, renderer, out),
        Node::Paragraph => wrap(tree, key, renderer, out, "p"),
        Node::Heading { level } => {
            let tag = format!("h{}", (*level).clamp(1, 6));
            wrap(tree, key, renderer, out, &tag);
        }
        Node::Quote => wrap(tree, key, renderer, out, "blockquote"),
        Node::Code { language } => {
            out.push_str("<pre><code");
            if let Some(language) = language {
                out.push_str(" class=\"language-");
                out.push_str(&encode_double_quoted_attribute(language));
                out.push('"');
            }
            out.push('>');
            out.push_str(&encode_text(&tree.text_content(key)));
            out.push_str("</code></pre>");
        }
        Node::List { ordered, start } => {
            if !*ordered {
                out.push_str("<ul>");
            } else if *start == 1 {
                out.push_str("<ol>");
            } else {
                out.push_str(&format!("<ol start=\"{}\">", start));
            }
            render_children(tree, key, renderer, out);
            out.push_str(if *ordered { "</ol>" } else { "</ul>" });
        }
        Node::ListItem => wrap(tree, key, renderer, out, "li"),
        Node::Link { url } => {
            out.push_str("<a href=\"");
            out.push_str(&encode_double_quoted_attribute(url));
            out.push_str("\">");
            render_children(tree, key, renderer, out);
            out.push_str("</a>");
        }
        Node::Text(text) => {
            let tags: Vec<&str> = [
                (TextFormat::BOLD, "strong"),
                (TextFormat::ITALIC, "em"),
                (TextFormat::STRIKETHROUGH, "s"),
                (TextFormat::UNDERLINE, "u"),
                (TextFormat::SUBSCRIPT, "sub"),
                (TextFormat::SUPERSCRIPT, "sup"),
                (TextFormat::CODE, "code"),
            ]
            .into_iter()
            .filter(|(format, _)| text.format.contains(*format))
            .map(|(_, tag)| tag)
            .collect();
            for tag in &tags {
                out.push_str(&format!("<{}>", tag));
            }
            out.push_str(&encode_text(&text.text));
            for tag in tags.iter().rev() {
                out.push_str(&format!("</{}>", tag));
            }
        }
        Node::Math(math) => {
            out.push_str(&renderer.render(math.equation(), math.is_inline()).html);
        }
    }
}

fn wrap(
    tree: &DocumentTree,
    key: NodeKey,
    renderer: &dyn MathRenderer,
    out: &mut String,
    tag: &str,
) {
    out.push_str(&format!("<{}>", tag));
    render_children(tree, key, renderer, out);
    out.push_str(&format!("</{}>", tag));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MarkdownCodec;

    #[test]
    fn escapes_tex() {
        let rendered = HtmlMathRenderer.render("a<b", true);
        assert!(!rendered.is_error);
        assert_eq!(rendered.html, "<span class=\"math-inline\">a&lt;b</span>");
    }

    #[test]
    fn flags_broken_equations() {
        assert!(HtmlMathRenderer.render("  ", false).is_error);
        assert!(HtmlMathRenderer.render("\\frac{1}{2", false).is_error);
        assert!(HtmlMathRenderer.render("}{", true).is_error);
        assert!(!HtmlMathRenderer.render("\\{x\\}", true).is_error);
    }

    #[test]
    fn renders_document() {
        let tree = MarkdownCodec::default()
            .parse("## Area\n\nA **circle**: $\\pi r^2$\n\n$$E=mc^2$$\n\n3. x")
            .unwrap();
        assert_eq!(
            render_html(&tree, &HtmlMathRenderer),
            "<h2>Area</h2>\n<p>A <strong>circle</strong>: <span class=\"math-inline\">\\pi r^2</span></p>\n<div class=\"math-block\">E=mc^2</div>\n<ol start=\"3\"><li>x</li></ol>"
        );
    }
}
