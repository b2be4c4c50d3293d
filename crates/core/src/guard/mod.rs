//! Content guard: debounced classification of the document text.
//!
//! The guard never calls a classifier on its own. A host feeds text changes
//! into [`ContentGuard::on_text_changed`], asks [`ContentGuard::poll`] for a
//! request once the debounce window has closed, runs the request against
//! whatever collaborator it has (a network call, or a [`ContentClassifier`]
//! through [`ContentGuard::run_pending`]) and hands the outcome back with
//! [`ContentGuard::deliver`]. Outcomes for superseded requests are dropped.

mod debounce;

pub use debounce::Debouncer;

use crate::error::EditorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use web_time::Instant;

/// Harm categories a classifier may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Hate speech.
    #[serde(rename = "Hate speech")]
    HateSpeech,
    /// Violence.
    #[serde(rename = "Violence")]
    Violence,
    /// Sexual content.
    #[serde(rename = "Sexual content")]
    SexualContent,
    /// Spam and deceptive advertising.
    #[serde(rename = "Spam")]
    Spam,
    /// Harassment and bullying.
    #[serde(rename = "Harassment and bullying")]
    Harassment,
    /// Self-harm or suicide encouragement.
    #[serde(rename = "Self-harm or suicide encouragement")]
    SelfHarm,
    /// Illegal activities.
    #[serde(rename = "Illegal activities")]
    IllegalActivities,
    /// Misinformation / fake news.
    #[serde(rename = "Misinformation / fake news")]
    Misinformation,
    /// Terrorism-related content.
    #[serde(rename = "Terrorism-related content")]
    Terrorism,
    /// Hate symbols and extremist content.
    #[serde(rename = "Hate symbols and extremist content")]
    Extremism,
}

impl Category {
    /// Every category, in wire order.
    pub const ALL: [Category; 10] = [
        Category::HateSpeech,
        Category::Violence,
        Category::SexualContent,
        Category::Spam,
        Category::Harassment,
        Category::SelfHarm,
        Category::IllegalActivities,
        Category::Misinformation,
        Category::Terrorism,
        Category::Extremism,
    ];

    /// Identifier used on the wire.
    pub fn label(self) -> &'static str {
        match self {
            Category::HateSpeech => "Hate speech",
            Category::Violence => "Violence",
            Category::SexualContent => "Sexual content",
            Category::Spam => "Spam",
            Category::Harassment => "Harassment and bullying",
            Category::SelfHarm => "Self-harm or suicide encouragement",
            Category::IllegalActivities => "Illegal activities",
            Category::Misinformation => "Misinformation / fake news",
            Category::Terrorism => "Terrorism-related content",
            Category::Extremism => "Hate symbols and extremist content",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `safe` or `unsafe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing applies.
    Safe,
    /// At least one category applies.
    Unsafe,
}

/// A classification result, in the collaborator's JSON shape:
/// `{"status": "unsafe", "categories": ["Spam"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Overall outcome.
    pub status: Status,
    /// Applicable categories; empty when safe.
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Verdict {
    /// The safe verdict.
    pub fn safe() -> Self {
        Self {
            status: Status::Safe,
            categories: Vec::new(),
        }
    }

    /// Unsafe when `categories` is non-empty, safe otherwise.
    pub fn from_categories(mut categories: Vec<Category>) -> Self {
        categories.sort();
        categories.dedup();
        if categories.is_empty() {
            Self::safe()
        } else {
            Self {
                status: Status::Unsafe,
                categories,
            }
        }
    }

    /// Whether the status is `safe`.
    pub fn is_safe(&self) -> bool {
        self.status == Status::Safe
    }

    /// Parses the collaborator's JSON response.
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        serde_json::from_str(json).map_err(|err| {
            EditorError::CollaboratorUnavailable(format!("malformed verdict: {}", err))
        })
    }
}

/// Something that can classify text.
pub trait ContentClassifier {
    /// Classifies `text`. Errors mean the collaborator could not answer.
    fn classify(&self, text: &str) -> Result<Verdict, EditorError>;
}

/// Deterministic keyword matcher standing in for a real classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(Category, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new().with_keywords(
            Category::Spam,
            [
                "click here",
                "limited time offer",
                "buy now",
                "act now",
                "free money",
                "you have won",
            ],
        )
    }
}

impl KeywordClassifier {
    /// A classifier without rules; everything is safe.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Flags `category` when any of `keywords` occurs, case-insensitively.
    pub fn with_keywords<I, S>(mut self, category: Category, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords = keywords
            .into_iter()
            .map(|keyword| keyword.into().to_lowercase())
            .collect();
        self.rules.push((category, keywords));
        self
    }
}

impl ContentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Verdict, EditorError> {
        let haystack = text.to_lowercase();
        let categories = self
            .rules
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|keyword| haystack.contains(keyword)))
            .map(|(category, _)| *category)
            .collect();
        Ok(Verdict::from_categories(categories))
    }
}

/// What the host shows next to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardStatus {
    /// The latest classified text is safe.
    Safe,
    /// The latest classified text hit these categories.
    Warning(Vec<Category>),
    /// A classification is scheduled or running.
    Analyzing,
}

/// A classification the host should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    /// Sequence number to hand back with the result.
    pub seq: u64,
    /// Text to classify.
    pub text: String,
}

/// Debounced classification state for one editor.
#[derive(Debug)]
pub struct ContentGuard {
    debouncer: Debouncer<String>,
    status: GuardStatus,
    verdict: Option<Verdict>,
}

impl ContentGuard {
    /// Guard with the given debounce window.
    pub fn new(window: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(window),
            status: GuardStatus::Safe,
            verdict: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> &GuardStatus {
        &self.status
    }

    /// Last verdict applied, if any.
    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    /// When the pending text becomes due for classification.
    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Records new document text and restarts the window.
    pub fn on_text_changed(&mut self, text: impl Into<String>, now: Instant) -> u64 {
        let seq = self.debouncer.schedule(text.into(), now);
        self.status = GuardStatus::Analyzing;
        log::debug!(
            "guard: classification {} scheduled in {:?}",
            seq,
            self.debouncer.window()
        );
        seq
    }

    /// The request to run once the window has closed. Blank text is settled
    /// as safe right here and yields no request.
    pub fn poll(&mut self, now: Instant) -> Option<ClassificationRequest> {
        let (seq, text) = self.debouncer.poll(now)?;
        if text.trim().is_empty() {
            log::debug!("guard: classification {} skipped for blank text", seq);
            self.apply(Verdict::safe());
            return None;
        }
        log::debug!("guard: classification {} due", seq);
        Some(ClassificationRequest { seq, text })
    }

    /// Applies the outcome of request `seq`. Returns false when a newer
    /// request superseded it and the outcome was dropped.
    ///
    /// A failed collaborator counts as safe so editing is never blocked.
    pub fn deliver(&mut self, seq: u64, result: Result<Verdict, EditorError>) -> bool {
        if !self.debouncer.is_latest(seq) {
            log::warn!("guard: dropping stale classification {}", seq);
            return false;
        }
        match result {
            Ok(verdict) => self.apply(verdict),
            Err(err) => {
                log::error!("guard: classifier unavailable, assuming safe: {}", err);
                self.apply(Verdict::safe());
            }
        }
        true
    }

    /// Polls and, when a request is due, runs it through `classifier`
    /// synchronously.
    pub fn run_pending(&mut self, now: Instant, classifier: &dyn ContentClassifier) -> bool {
        let Some(request) = self.poll(now) else {
            return false;
        };
        let result = classifier.classify(&request.text);
        self.deliver(request.seq, result)
    }

    fn apply(&mut self, verdict: Verdict) {
        self.status = if verdict.is_safe() {
            GuardStatus::Safe
        } else {
            GuardStatus::Warning(verdict.categories.clone())
        };
        self.verdict = Some(verdict);
    }
}
