use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Editor options. Every field has a default, so a partial or empty JSON
/// object is valid; camelCase keys are accepted for JavaScript hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// `$` promotion and math commands.
    pub math: bool,
    /// Bold formatting command.
    pub bold: bool,
    /// Italic formatting command.
    pub italic: bool,
    /// Underline formatting command.
    pub underline: bool,
    /// Strikethrough formatting command.
    pub strikethrough: bool,
    /// Block quote command.
    pub quote: bool,
    /// Inline code formatting command.
    pub code: bool,
    /// Undo/redo history.
    pub undo: bool,
    /// Character count in [`stats`](crate::MarkdownEditor::stats).
    #[serde(alias = "characterCount")]
    pub character_count: bool,
    /// Debounced content classification.
    #[serde(alias = "contentGuard")]
    pub content_guard: bool,
    /// Markdown file export.
    #[serde(alias = "markdownExport")]
    pub markdown_export: bool,
    /// Quiet period before text is classified.
    #[serde(alias = "debounceMs")]
    pub debounce_ms: u64,
    /// Undo steps kept; 0 keeps none.
    #[serde(alias = "historyLimit")]
    pub history_limit: usize,
    /// Suggested name of exported files.
    #[serde(alias = "exportFileName")]
    pub export_file_name: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            math: true,
            bold: true,
            italic: true,
            underline: true,
            strikethrough: true,
            quote: true,
            code: true,
            undo: true,
            character_count: true,
            content_guard: true,
            markdown_export: true,
            debounce_ms: 1500,
            history_limit: 100,
            export_file_name: "document.md".to_string(),
        }
    }
}

impl EditorConfig {
    /// Parses JSON, falling back to the defaults when it is malformed.
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_else(|err| {
            log::warn!("invalid editor config, using defaults: {}", err);
            Self::default()
        })
    }

    /// Debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// History depth actually used: none when undo is disabled.
    pub fn effective_history_limit(&self) -> usize {
        if self.undo { self.history_limit } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{"math": false, "debounceMs": 250}"#);
        assert!(!config.math);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.export_file_name, "document.md");
    }

    #[test]
    fn snake_case_keys_work_too() {
        let config = EditorConfig::from_json(r#"{"export_file_name": "notes.md"}"#);
        assert_eq!(config.export_file_name, "notes.md");
    }

    #[test]
    fn malformed_json_falls_back() {
        assert_eq!(EditorConfig::from_json("{not json"), EditorConfig::default());
        assert_eq!(
            EditorConfig::from_json(r#"{"historyLimit": "lots"}"#),
            EditorConfig::default()
        );
    }

    #[test]
    fn disabled_undo_keeps_no_history() {
        let config = EditorConfig {
            undo: false,
            ..EditorConfig::default()
        };
        assert_eq!(config.effective_history_limit(), 0);
    }
}
