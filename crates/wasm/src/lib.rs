use mathmark_core::{
    EditorCommand, EditorConfig, GuardStatus, MarkdownEditor as CoreEditor, NodeKey, Subscription,
    UpdateEvent, Verdict,
};
use serde::Serialize;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_time::Instant;

// ============================================================================
// Config
// ============================================================================

/// Reads an `EditorConfig` from a plain JS object. `undefined`, `null` and
/// objects that do not deserialize all yield the defaults.
fn parse_config(config: JsValue) -> EditorConfig {
    if config.is_undefined() || config.is_null() {
        return EditorConfig::default();
    }
    serde_wasm_bindgen::from_value(config).unwrap_or_else(|err| {
        log::warn!("invalid editor config, using defaults: {}", err);
        EditorConfig::default()
    })
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

fn parse_key(key: &str) -> Result<NodeKey, JsError> {
    key.parse()
        .map_err(|e| JsError::new(&format!("Invalid node key {:?}: {}", key, e)))
}

// ============================================================================
// Result Types
// ============================================================================

/// A Markdown download as handed to JavaScript.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFileJs {
    /// Suggested file name.
    pub file_name: String,
    /// Always `text/markdown`.
    pub mime_type: String,
    /// The Markdown text.
    pub content: String,
}

/// A math node in document order.
#[derive(Debug, Clone, Serialize)]
pub struct MathEntry {
    /// Node key, as a string to survive the trip through JS numbers.
    pub key: String,
    /// Delimiter-free LaTeX.
    pub equation: String,
    /// Inline or block display.
    pub inline: bool,
}

/// Payload passed to `subscribe` callbacks.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// Whether the document changed (false for caret moves).
    pub dirty: bool,
    /// Lower-case update tags, e.g. `promotion` or `load`.
    pub tags: Vec<String>,
    /// Plain text of the new document.
    pub content: String,
}

impl ChangeEvent {
    fn from_update(event: &UpdateEvent) -> Self {
        let tree = event.state.tree();
        Self {
            dirty: event.dirty,
            tags: event
                .tags
                .iter()
                .map(|tag| format!("{:?}", tag).to_lowercase())
                .collect(),
            content: tree.text_content(tree.root()),
        }
    }
}

/// A classification the page should run.
#[derive(Debug, Clone, Serialize)]
pub struct GuardRequest {
    /// Sequence number to pass back to `deliverVerdict`.
    pub seq: u64,
    /// Text to classify.
    pub text: String,
}

/// Guard state for the status indicator.
#[derive(Debug, Clone, Serialize)]
pub struct GuardState {
    /// `safe`, `warning`, `analyzing` or `disabled`.
    pub state: &'static str,
    /// Category identifiers when `state` is `warning`.
    pub categories: Vec<String>,
}

impl GuardState {
    fn from_status(status: Option<GuardStatus>) -> Self {
        let (state, categories) = match status {
            None => ("disabled", Vec::new()),
            Some(GuardStatus::Safe) => ("safe", Vec::new()),
            Some(GuardStatus::Analyzing) => ("analyzing", Vec::new()),
            Some(GuardStatus::Warning(categories)) => (
                "warning",
                categories.iter().map(|c| c.to_string()).collect(),
            ),
        };
        Self { state, categories }
    }
}

// ============================================================================
// Editor Handle
// ============================================================================

/// One editor instance. Pages create one per editable region and call
/// `free()` on teardown.
#[wasm_bindgen]
pub struct MarkdownEditor {
    inner: CoreEditor,
}

/// Returned by `subscribe`; stops notifications on `dispose()`.
#[wasm_bindgen]
pub struct EditorSubscription {
    inner: Option<Subscription>,
}

#[wasm_bindgen]
impl EditorSubscription {
    /// Stops notifications. Calling it twice is harmless.
    pub fn dispose(&mut self) {
        if let Some(subscription) = self.inner.take() {
            subscription.dispose();
        }
    }
}

#[wasm_bindgen]
impl MarkdownEditor {
    /// Creates an editor from an optional config object, e.g.
    /// `new MarkdownEditor({ math: true, debounceMs: 800 })`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> MarkdownEditor {
        MarkdownEditor {
            inner: CoreEditor::new(parse_config(config)),
        }
    }

    /// Replaces the document. Returns the number of import warnings.
    #[wasm_bindgen(js_name = loadMarkdown)]
    pub fn load_markdown(&self, markdown: &str) -> Result<u32, JsError> {
        let diagnostics = self
            .inner
            .load_markdown(markdown)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(diagnostics.count() as u32)
    }

    /// The document as Markdown; empty when it cannot be serialized.
    #[wasm_bindgen(js_name = getMarkdown)]
    pub fn get_markdown(&self) -> String {
        self.inner.get_markdown()
    }

    /// Plain text, formulas in their `$` form.
    #[wasm_bindgen(js_name = getCurrentContent)]
    pub fn get_current_content(&self) -> String {
        self.inner.current_content()
    }

    /// `{ characterCount?, mathCount, blockCount }`.
    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsError> {
        to_js(&self.inner.stats())
    }

    /// `{ fileName, mimeType, content }`, or `undefined` when export is
    /// disabled.
    #[wasm_bindgen(js_name = exportFile)]
    pub fn export_file(&self) -> Result<JsValue, JsError> {
        let Some(file) = self.inner.export_file() else {
            return Ok(JsValue::UNDEFINED);
        };
        to_js(&ExportedFileJs {
            file_name: file.file_name,
            mime_type: file.mime_type.to_string(),
            content: String::from_utf8_lossy(&file.bytes).into_owned(),
        })
    }

    /// HTML preview of the document.
    #[wasm_bindgen(js_name = previewHtml)]
    pub fn preview_html(&self) -> String {
        self.inner.preview_html()
    }

    /// Inserts text at the caret in one step.
    #[wasm_bindgen(js_name = insertText)]
    pub fn insert_text(&self, text: &str) -> Result<bool, JsError> {
        self.inner
            .insert_text(text)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Replays keystrokes one by one, `\n` as Enter.
    #[wasm_bindgen(js_name = typeText)]
    pub fn type_text(&self, input: &str) -> Result<(), JsError> {
        self.inner
            .type_text(input)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Inserts a formula at the caret.
    #[wasm_bindgen(js_name = insertMath)]
    pub fn insert_math(&self, equation: &str, inline: bool) -> Result<bool, JsError> {
        self.inner
            .dispatch(EditorCommand::InsertMath {
                equation: equation.to_string(),
                inline,
            })
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Changes an existing formula.
    #[wasm_bindgen(js_name = updateMath)]
    pub fn update_math(&self, key: &str, equation: &str, inline: bool) -> Result<bool, JsError> {
        self.inner
            .dispatch(EditorCommand::UpdateMath {
                key: parse_key(key)?,
                equation: equation.to_string(),
                inline,
            })
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Turns a formula back into editable text. Unknown keys return false.
    pub fn demote(&self, key: &str) -> Result<bool, JsError> {
        self.inner
            .demote(parse_key(key)?)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Steps back in history.
    pub fn undo(&self) -> Result<bool, JsError> {
        self.inner
            .dispatch(EditorCommand::Undo)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Steps forward in history.
    pub fn redo(&self) -> Result<bool, JsError> {
        self.inner
            .dispatch(EditorCommand::Redo)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// `[{ key, equation, inline }]` in document order.
    #[wasm_bindgen(js_name = mathNodes)]
    pub fn math_nodes(&self) -> Result<JsValue, JsError> {
        let entries: Vec<MathEntry> = self
            .inner
            .math_nodes()
            .into_iter()
            .map(|(key, math)| MathEntry {
                key: key.to_string(),
                equation: math.equation().to_string(),
                inline: math.is_inline(),
            })
            .collect();
        to_js(&entries)
    }

    /// Calls `callback(event)` after every commit until the returned
    /// subscription is disposed.
    pub fn subscribe(&self, callback: js_sys::Function) -> EditorSubscription {
        let subscription = self.inner.subscribe(move |event| {
            let payload = match serde_wasm_bindgen::to_value(&ChangeEvent::from_update(event)) {
                Ok(payload) => payload,
                Err(err) => {
                    log::error!("change event not serializable: {}", err);
                    return;
                }
            };
            if let Err(err) = callback.call1(&JsValue::NULL, &payload) {
                log::error!("subscriber threw: {:?}", err);
            }
        });
        EditorSubscription {
            inner: Some(subscription),
        }
    }

    // ------------------------------------------------------------------
    // Content guard
    // ------------------------------------------------------------------

    /// `{ state, categories }` for the status indicator.
    #[wasm_bindgen(js_name = guardStatus)]
    pub fn guard_status(&self) -> Result<JsValue, JsError> {
        to_js(&GuardState::from_status(self.inner.guard_status()))
    }

    /// `{ seq, text }` when a classification is due, else `undefined`.
    #[wasm_bindgen(js_name = pollGuard)]
    pub fn poll_guard(&self) -> Result<JsValue, JsError> {
        match self.inner.poll_guard(Instant::now()) {
            Some(request) => to_js(&GuardRequest {
                seq: request.seq,
                text: request.text,
            }),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Milliseconds until the pending classification is due, or
    /// `undefined` when nothing is pending.
    #[wasm_bindgen(js_name = guardDelayMs)]
    pub fn guard_delay_ms(&self) -> Option<f64> {
        self.inner.guard_deadline().map(|deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_secs_f64()
                * 1000.0
        })
    }

    /// Hands back the classifier's JSON answer for request `seq`. A
    /// malformed answer counts as an unavailable classifier. Returns false
    /// when a newer request superseded `seq`.
    #[wasm_bindgen(js_name = deliverVerdict)]
    pub fn deliver_verdict(&self, seq: u64, verdict_json: &str) -> bool {
        self.inner
            .deliver_verdict(seq, Verdict::from_json(verdict_json))
    }

    /// Reports that request `seq` could not be classified.
    #[wasm_bindgen(js_name = failVerdict)]
    pub fn fail_verdict(&self, seq: u64, message: &str) -> bool {
        self.inner.deliver_verdict(
            seq,
            Err(mathmark_core::EditorError::CollaboratorUnavailable(
                message.to_string(),
            )),
        )
    }
}
