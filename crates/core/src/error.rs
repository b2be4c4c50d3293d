use crate::node::NodeKey;
use thiserror::Error;

/// Source location information for import diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised by the document model, the codec and the collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// A mutation was attempted on a tree outside of an update scope.
    #[error("Illegal mutation context: trees can only be mutated inside an update")]
    IllegalMutationContext,
    /// An update was opened while another update closure was still running.
    #[error("Nested update: an update is already in progress")]
    NestedUpdate,
    /// An operation addressed a node key that no longer exists.
    #[error("Stale reference: node {0} does not exist")]
    StaleReference(NodeKey),
    /// A structural precondition was violated (cycles, root removal, leaf parents).
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
    /// A math equation cannot be stored as given.
    #[error("Invalid equation: {0}")]
    InvalidEquation(String),
    /// Markdown export or import failed.
    #[error("Serialization failure: {message}")]
    SerializationFailure {
        /// Error message
        message: String,
    },
    /// The content classification collaborator failed or timed out.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}

impl EditorError {
    /// Create a serialization failure with a message
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationFailure {
            message: message.into(),
        }
    }

    /// Create a structural error with a message
    pub fn structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }
}

/// Non-fatal warnings collected while importing Markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// Code fence opened but never closed
    UnclosedCodeFence {
        /// Source location where the fence started
        location: SourceLocation,
        /// Fence marker character (backtick or tilde)
        marker: char,
    },
    /// A `$`-delimited span that could not become a math node
    RejectedMath {
        /// Source location of the block containing the span
        location: SourceLocation,
        /// Why the span stayed literal text
        message: String,
    },
}

impl ParseWarning {
    /// Get the location of this warning
    pub fn location(&self) -> &SourceLocation {
        match self {
            ParseWarning::UnclosedCodeFence { location, .. } => location,
            ParseWarning::RejectedMath { location, .. } => location,
        }
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::UnclosedCodeFence { location, marker } => {
                write!(f, "Unclosed code fence ({}): {}", marker, location)
            }
            ParseWarning::RejectedMath { location, message } => {
                write!(f, "{}: {}", location, message)
            }
        }
    }
}

/// Collection of import diagnostics
#[derive(Debug, Clone, Default)]
pub struct ParseDiagnostics {
    /// List of non-fatal warnings
    pub warnings: Vec<ParseWarning>,
}

impl ParseDiagnostics {
    /// Create a new empty diagnostics collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning to the diagnostics collection
    pub fn add_warning(&mut self, warning: ParseWarning) {
        log::warn!("markdown import: {}", warning);
        self.warnings.push(warning);
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Get total count of all diagnostics
    pub fn count(&self) -> usize {
        self.warnings.len()
    }
}
