use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

/// A problem noticed while building the tree, with its source location.
///
/// Content-level problems never abort a parse; they are collected on the
/// [`Document`](crate::document::Document) as warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Range<usize>,
    pub severity: Severity,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn warning(message: impl Into<String>, span: Range<usize>) -> Self {
        ParseError {
            message: message.into(),
            span,
            severity: Severity::Warning,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        Diagnostic::new(self.severity)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}
