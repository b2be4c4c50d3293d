//! Live editing through the editor handle: promotion, demotion, history and
//! the content guard.

use insta::assert_snapshot;
use mathmark_core::{
    Category, ContentClassifier, EditorCommand, EditorConfig, EditorError, GuardStatus,
    KeywordClassifier, MarkdownEditor, Node, NodeKey, Status, TextFormat, UpdateTag, Verdict,
    promote_text_node,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use web_time::Instant;

fn code_text(handle: &MarkdownEditor) -> Option<NodeKey> {
    handle.editor().read(|state| {
        let tree = state.tree();
        tree.descendants(tree.root()).into_iter().find(|key| {
            tree.get(*key)
                .and_then(Node::as_text)
                .is_some_and(|text| text.format.contains(TextFormat::CODE))
        })
    })
}

#[test]
fn typed_inline_math_is_promoted() {
    let handle = MarkdownEditor::default();
    handle.type_text("The value $x+1$ grows").unwrap();
    assert_snapshot!(handle.outline(), @r#"
    root
      paragraph
        text "The value "
        math inline "x+1"
        text " grows"
    "#);
    assert_eq!(handle.get_markdown(), "The value $x+1$ grows");
}

#[test]
fn typed_block_fence_collapses_into_block_math() {
    let handle = MarkdownEditor::default();
    handle.type_text("$$\n\\int_0^1 x\\,dx\n$$").unwrap();
    assert_snapshot!(handle.outline(), @r#"
    root
      math block "\\int_0^1 x\\,dx"
      paragraph
    "#);
    assert_eq!(handle.get_markdown(), "$$\\int_0^1 x\\,dx$$");

    // Typing continues below the formula.
    handle.type_text("after").unwrap();
    assert_eq!(handle.get_markdown(), "$$\\int_0^1 x\\,dx$$\n\nafter");
}

#[test]
fn promotion_is_a_single_undo_step_after_the_keystroke() {
    let handle = MarkdownEditor::default();
    handle.type_text("$y$").unwrap();
    assert_eq!(handle.math_nodes().len(), 1);

    handle.dispatch(EditorCommand::Undo).unwrap();
    assert!(handle.math_nodes().is_empty());
    assert_eq!(handle.current_content(), "$y$");
}

#[test]
fn formula_counts_as_one_character() {
    let handle = MarkdownEditor::default();
    let equation = "a".repeat(50);
    handle.load_markdown(&format!("${}$", equation)).unwrap();
    assert_eq!(handle.math_nodes()[0].1.equation().chars().count(), 50);
    assert_eq!(handle.stats().character_count, Some(1));
}

#[test]
fn demote_then_promote_restores_the_formula() {
    let handle = MarkdownEditor::default();
    handle.load_markdown("a $x^2$ b").unwrap();
    let (key, _) = handle.math_nodes()[0].clone();

    assert!(handle.demote(key).unwrap());
    assert!(handle.math_nodes().is_empty());
    assert_eq!(handle.get_markdown(), "a `$x^2$` b");

    let code = code_text(&handle).expect("demoted text");
    assert!(promote_text_node(handle.editor(), code).unwrap());
    assert_eq!(handle.get_markdown(), "a $x^2$ b");
}

#[test]
fn demote_with_a_stale_key_changes_nothing() {
    let handle = MarkdownEditor::default();
    handle.load_markdown("$$z$$").unwrap();
    let (key, _) = handle.math_nodes()[0].clone();
    assert!(handle.demote(key).unwrap());
    let before = handle.get_markdown();

    assert!(!handle.demote(key).unwrap());
    assert_eq!(handle.get_markdown(), before);
    assert_eq!(before, "`$$z$$`");
}

#[test]
fn edit_formula_through_commands() {
    let handle = MarkdownEditor::default();
    handle.load_markdown("see $a$").unwrap();
    let (key, _) = handle.math_nodes()[0].clone();

    handle
        .dispatch(EditorCommand::UpdateMath {
            key,
            equation: "a+b".into(),
            inline: true,
        })
        .unwrap();
    assert_eq!(handle.get_markdown(), "see $a+b$");

    let err = handle
        .dispatch(EditorCommand::UpdateMath {
            key,
            equation: "a$b".into(),
            inline: true,
        })
        .unwrap_err();
    assert!(matches!(err, EditorError::InvalidEquation(_)));
    assert_eq!(handle.get_markdown(), "see $a+b$");
}

#[test]
fn committed_trees_are_read_only() {
    let handle = MarkdownEditor::default();
    handle.load_markdown("text").unwrap();
    let state = handle.editor().state();
    let mut copy = state.tree().clone();

    assert_eq!(
        copy.create(Node::Paragraph),
        Err(EditorError::IllegalMutationContext)
    );
    let root = copy.root();
    assert_eq!(copy.remove(root), Err(EditorError::IllegalMutationContext));
    assert_eq!(copy.document_snapshot(), state.tree().document_snapshot());
}

#[test]
fn updates_cannot_nest() {
    let handle = MarkdownEditor::default();
    let editor = handle.editor().clone();
    let result = handle.editor().update(|_| editor.update(|_| Ok(())));
    assert_eq!(result, Err(EditorError::NestedUpdate));
}

#[test]
fn listeners_see_load_and_promotion_tags() {
    let handle = MarkdownEditor::default();
    let tags = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&tags);
    let _subscription = handle.subscribe(move |event| {
        sink.borrow_mut().push(event.tags.iter().copied().collect::<Vec<_>>());
    });

    handle.load_markdown("x").unwrap();
    handle.type_text(" $k$").unwrap();

    let tags = tags.borrow();
    assert_eq!(tags[0], vec![UpdateTag::Load]);
    assert_eq!(tags.last(), Some(&vec![UpdateTag::Promotion]));
    let promotions = tags
        .iter()
        .filter(|event| event.as_slice() == [UpdateTag::Promotion])
        .count();
    assert_eq!(promotions, 1);
}

#[test]
fn last_event_reflects_the_promoted_document() {
    let handle = MarkdownEditor::default();
    let counts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&counts);
    let _subscription = handle.subscribe(move |event| {
        sink.borrow_mut().push(event.state.tree().character_count());
    });

    handle.type_text("$abc$").unwrap();

    assert_eq!(*counts.borrow(), vec![1, 2, 3, 4, 5, 1]);
    assert_eq!(counts.borrow().last().copied(), handle.stats().character_count);
}

#[test]
fn spam_contract() {
    let verdict = KeywordClassifier::default()
        .classify("CLICK HERE NOW!!! LIMITED TIME OFFER!!!")
        .unwrap();
    assert_eq!(verdict.status, Status::Unsafe);
    assert!(verdict.categories.contains(&Category::Spam));
    assert_snapshot!(
        serde_json::to_string(&verdict).unwrap(),
        @r#"{"status":"unsafe","categories":["Spam"]}"#
    );
}

#[test]
fn rapid_edits_trigger_one_classification_with_final_text() {
    struct Counting {
        seen: RefCell<Vec<String>>,
    }
    impl ContentClassifier for Counting {
        fn classify(&self, text: &str) -> Result<Verdict, EditorError> {
            self.seen.borrow_mut().push(text.to_string());
            Ok(Verdict::safe())
        }
    }

    let handle = MarkdownEditor::new(EditorConfig {
        debounce_ms: 1500,
        ..EditorConfig::default()
    });
    let classifier = Counting {
        seen: RefCell::new(Vec::new()),
    };

    handle.insert_text("first").unwrap();
    handle.insert_text(" second").unwrap();
    let deadline = handle.guard_deadline().expect("classification pending");

    assert!(!handle.run_guard(deadline - Duration::from_millis(1), &classifier));
    assert!(handle.run_guard(deadline, &classifier));
    assert!(!handle.run_guard(deadline + Duration::from_secs(5), &classifier));

    assert_eq!(*classifier.seen.borrow(), vec!["first second".to_string()]);
    assert_eq!(handle.guard_status(), Some(GuardStatus::Safe));
}

#[test]
fn late_verdict_for_older_text_is_ignored() {
    let handle = MarkdownEditor::new(EditorConfig {
        debounce_ms: 0,
        ..EditorConfig::default()
    });
    handle.insert_text("buy now").unwrap();
    let now = Instant::now() + Duration::from_millis(1);
    let request = handle.poll_guard(now).expect("request due");

    handle.insert_text(" please").unwrap();
    let unsafe_verdict = Verdict::from_categories(vec![Category::Spam]);
    assert!(!handle.deliver_verdict(request.seq, Ok(unsafe_verdict)));
    assert_eq!(handle.guard_status(), Some(GuardStatus::Analyzing));
}
