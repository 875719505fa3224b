//! Parse and validation errors collected while reading a document.

use crate::span::Span;

/// A message attached to a source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// An error found in a document.
///
/// The first label is the primary location; later labels add context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// One of the [`codes`].
    pub code: &'static str,
    pub title: String,
    pub labels: Vec<Label>,
}

impl Diagnostic {
    pub fn new(code: &'static str, title: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            title: title.into(),
            labels: vec![Label {
                span,
                message: message.into(),
            }],
        }
    }

    pub fn primary_span(&self) -> Option<Span> {
        self.labels.first().map(|label| label.span)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.labels.first() {
            Some(label) if !label.message.is_empty() && label.message != self.title => {
                write!(f, "{}: {}", self.title, label.message)
            }
            _ => f.write_str(&self.title),
        }
    }
}

/// Errors in report order.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error with one label.
    pub fn error(&mut self, code: &'static str, title: impl Into<String>, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(code, title, span, message));
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Diagnostic codes.
pub mod codes {
    pub const UNEXPECTED_TOKEN: &str = "E0001";
    pub const UNEXPECTED_EOF: &str = "E0002";
    pub const INVALID_SYNTAX: &str = "E0003";
    pub const INVALID_STRING: &str = "E0004";
    /// A definition of the wrong family, such as an operation in schema text.
    pub const UNEXPECTED_DEFINITION: &str = "E0014";
    /// Nesting beyond what the parser descends into.
    pub const DEPTH_LIMIT: &str = "E0030";
}
