//! Markdown import/export of whole documents.

use insta::assert_snapshot;
use mathmark_core::{DocumentTree, MarkdownCodec, Node, NodeKey};

fn parse(source: &str) -> DocumentTree {
    MarkdownCodec::default()
        .parse(source)
        .expect("markdown should import")
}

fn math_of(tree: &DocumentTree) -> Vec<(String, bool)> {
    tree.descendants(tree.root())
        .into_iter()
        .filter_map(|key: NodeKey| tree.get(key).and_then(Node::as_math))
        .map(|math| (math.equation().to_string(), math.is_inline()))
        .collect()
}

#[test]
fn pythagorean_theorem_round_trips() {
    let source = "Pythagorean theorem: $a^2+b^2=c^2$ holds.";
    let tree = parse(source);

    let paragraph = tree.children(tree.root())[0];
    let children: Vec<&Node> = tree
        .children(paragraph)
        .iter()
        .filter_map(|key| tree.get(*key))
        .collect();
    assert_eq!(children.len(), 3);
    assert_eq!(
        children[0].as_text().map(|t| t.text.as_str()),
        Some("Pythagorean theorem: ")
    );
    let math = children[1].as_math().expect("middle child is math");
    assert_eq!(math.equation(), "a^2+b^2=c^2");
    assert!(math.is_inline());
    assert_eq!(children[2].as_text().map(|t| t.text.as_str()), Some(" holds."));

    assert_eq!(MarkdownCodec::default().serialize(&tree).unwrap(), source);
}

#[test]
fn mixed_document_outline() {
    let tree = parse(
        "# Calculus\n\n\
         The **integral** of $x$ is:\n\n\
         $$\\int x\\,dx = \\frac{x^2}{2}$$\n\n\
         > Remember the _constant_.\n\n\
         1. differentiate\n\
         2. integrate\n    - by parts",
    );
    assert_snapshot!(tree.outline(), @r#"
    root
      heading 1
        text "Calculus"
      paragraph
        text "The "
        text [bold] "integral"
        text " of "
        math inline "x"
        text " is:"
      math block "\\int x\\,dx = \\frac{x^2}{2}"
      quote
        text "Remember the "
        text [italic] "constant"
        text "."
      list ordered start=1
        listitem
          text "differentiate"
        listitem
          text "integrate"
          list bullet
            listitem
              text "by parts"
    "#);
}

#[test]
fn export_normalizes_formatting() {
    let codec = MarkdownCodec::default();
    let tree = parse("*soft*  and snake\\_case\n\n\n\n+ item\n* item two\n\n~~~\nraw ``` fence\n~~~");
    assert_snapshot!(codec.serialize(&tree).unwrap(), @r#"
    _soft_  and snake\_case

    - item
    - item two

    ````
    raw ``` fence
    ````
    "#);
}

#[test]
fn math_survives_every_container() {
    let source = "# Area $\\pi r^2$\n\n> quoted $$E=mc^2$$\n\n- item $x_1$\n\n[link $y$](https://example.com)\n\n$$a\n\nb$$";
    let codec = MarkdownCodec::default();
    let tree = parse(source);
    let exported = codec.serialize(&tree).unwrap();
    let back = codec.parse(&exported).unwrap();

    assert_eq!(math_of(&back), math_of(&tree));
    assert_eq!(
        math_of(&tree),
        vec![
            ("\\pi r^2".to_string(), true),
            ("E=mc^2".to_string(), false),
            ("x_1".to_string(), true),
            ("y".to_string(), true),
            ("a\n\nb".to_string(), false),
        ]
    );
    assert_eq!(back.document_snapshot(), tree.document_snapshot());
}

#[test]
fn dollar_signs_in_prose_are_not_math() {
    let codec = MarkdownCodec::default();
    let tree = parse("price \\$5, ok");
    assert!(math_of(&tree).is_empty());
    assert_eq!(codec.serialize(&tree).unwrap(), "price \\$5, ok");
}

#[test]
fn rejected_math_is_reported_and_kept_as_text() {
    let (tree, diagnostics) = MarkdownCodec::default()
        .parse_with_diagnostics("cost $a\\$b$ here")
        .unwrap();
    assert!(math_of(&tree).is_empty());
    assert_eq!(diagnostics.count(), 1);
    assert_snapshot!(tree.outline(), @r#"
    root
      paragraph
        text "cost $a$b$ here"
    "#);
}

#[test]
fn crlf_input_is_normalized() {
    let tree = parse("line one\r\nline two\r\n\r\n## Next");
    assert_snapshot!(tree.outline(), @r#"
    root
      paragraph
        text "line one\nline two"
      heading 2
        text "Next"
    "#);
}

/// markdown-rs, configured for `$` math, serves as an independent reader of
/// the exported Markdown.
mod oracle {
    use super::*;
    use markdown::mdast;

    fn options() -> markdown::ParseOptions {
        let constructs = markdown::Constructs {
            math_flow: true,
            math_text: true,
            ..Default::default()
        };
        markdown::ParseOptions {
            constructs,
            math_text_single_dollar: true,
            ..Default::default()
        }
    }

    fn collect(node: &mdast::Node, out: &mut Vec<(String, bool)>) {
        match node {
            mdast::Node::InlineMath(math) => out.push((math.value.clone(), true)),
            mdast::Node::Math(math) => out.push((math.value.clone(), false)),
            _ => {}
        }
        if let Some(children) = node.children() {
            for child in children {
                collect(child, out);
            }
        }
    }

    #[test]
    fn exported_math_reads_back_identically() {
        let source = "Energy $E=mc^2$ and mass $m$.\n\n$$\\sum_i x_i = 1$$\n\n- list $k$";
        let codec = MarkdownCodec::default();
        let exported = codec.serialize(&parse(source)).unwrap();

        let ast = markdown::to_mdast(&exported, &options()).expect("oracle parses export");
        let mut found = Vec::new();
        collect(&ast, &mut found);

        // `$$x$$` on one line reads as math text in CommonMark math, so only
        // the equations are compared, not the display flag.
        let equations: Vec<String> = found.into_iter().map(|(value, _)| value).collect();
        assert_eq!(equations, vec!["E=mc^2", "m", "\\sum_i x_i = 1", "k"]);
    }

    #[test]
    fn escaped_dollars_are_plain_text_to_the_oracle() {
        let codec = MarkdownCodec::default();
        let exported = codec.serialize(&parse("cost \\$5 and \\$7")).unwrap();
        let ast = markdown::to_mdast(&exported, &options()).expect("oracle parses export");
        let mut found = Vec::new();
        collect(&ast, &mut found);
        assert!(found.is_empty());
    }
}
