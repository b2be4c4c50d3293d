use mathmark_wasm::MarkdownEditor;
use serde::Deserialize;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Stats {
    character_count: Option<usize>,
    math_count: usize,
    block_count: usize,
}

#[derive(Deserialize, Debug)]
struct MathEntry {
    key: String,
    equation: String,
    inline: bool,
}

#[derive(Deserialize, Debug)]
struct GuardState {
    state: String,
    categories: Vec<String>,
}

fn config(json: &str) -> JsValue {
    js_sys::JSON::parse(json).expect("valid JSON")
}

#[wasm_bindgen_test]
fn load_and_export_markdown() {
    let editor = MarkdownEditor::new(JsValue::UNDEFINED);
    let warnings = editor
        .load_markdown("# Area\n\nA circle: $\\pi r^2$")
        .expect("load should succeed");
    assert_eq!(warnings, 0);
    assert_eq!(editor.get_markdown(), "# Area\n\nA circle: $\\pi r^2$");

    let stats: Stats = serde_wasm_bindgen::from_value(editor.get_stats().unwrap()).unwrap();
    assert_eq!(stats.character_count, Some(15));
    assert_eq!(stats.math_count, 1);
    assert_eq!(stats.block_count, 2);
}

#[wasm_bindgen_test]
fn typing_promotes_and_demote_reverts() {
    let editor = MarkdownEditor::new(JsValue::NULL);
    editor.type_text("so $x^2$").unwrap();

    let nodes: Vec<MathEntry> = serde_wasm_bindgen::from_value(editor.math_nodes().unwrap()).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].equation, "x^2");
    assert!(nodes[0].inline);

    assert!(editor.demote(&nodes[0].key).unwrap());
    assert_eq!(editor.get_markdown(), "so `$x^2$`");
    assert!(!editor.demote(&nodes[0].key).unwrap());
    assert!(editor.demote("not a key").is_err());
}

#[wasm_bindgen_test]
fn config_object_disables_features() {
    let editor = MarkdownEditor::new(config(
        r#"{"markdownExport": false, "characterCount": false, "contentGuard": false}"#,
    ));
    editor.load_markdown("text").unwrap();
    assert!(editor.export_file().unwrap().is_undefined());

    let stats: Stats = serde_wasm_bindgen::from_value(editor.get_stats().unwrap()).unwrap();
    assert_eq!(stats.character_count, None);

    let guard: GuardState = serde_wasm_bindgen::from_value(editor.guard_status().unwrap()).unwrap();
    assert_eq!(guard.state, "disabled");
}

#[wasm_bindgen_test]
fn malformed_config_uses_defaults() {
    let editor = MarkdownEditor::new(config(r#"{"debounceMs": "soon"}"#));
    editor.insert_math("E=mc^2", false).unwrap();
    assert_eq!(editor.get_markdown(), "$$E=mc^2$$");
}

#[wasm_bindgen_test]
fn pending_classification_reports_delay() {
    let editor = MarkdownEditor::new(config(r#"{"debounceMs": 0}"#));
    editor.insert_text("CLICK HERE NOW").unwrap();
    assert!(editor.guard_delay_ms().is_some());
}

#[wasm_bindgen_test]
fn stale_and_malformed_verdicts() {
    let editor = MarkdownEditor::new(JsValue::UNDEFINED);
    editor.insert_text("hello").unwrap();
    let guard: GuardState = serde_wasm_bindgen::from_value(editor.guard_status().unwrap()).unwrap();
    assert_eq!(guard.state, "analyzing");
    assert!(guard.categories.is_empty());

    assert!(!editor.deliver_verdict(0, r#"{"status":"unsafe","categories":["Spam"]}"#));
    assert!(!editor.fail_verdict(0, "offline"));

    // A malformed answer for the current request fails open.
    assert!(editor.deliver_verdict(1, "not json"));
    let guard: GuardState = serde_wasm_bindgen::from_value(editor.guard_status().unwrap()).unwrap();
    assert_eq!(guard.state, "safe");
}
