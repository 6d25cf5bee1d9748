use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

/// What went wrong. The first two abort the parse; the rest are collected
/// next to a best-effort tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnbalancedBraces,
    AmbiguousHierarchy,
    UnclassifiedHeader,
    DanglingBranch,
    UnresolvedNameOnUpdate,
    ImmutableReassignment,
    DuplicateDeclaration,
    UnknownType,
    TypeMismatch,
    InvalidCompoundAssignment,
    UnrecognizedStatement,
}

impl ErrorKind {
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::UnbalancedBraces | ErrorKind::AmbiguousHierarchy)
    }

    /// Stable name used in configuration and test fixtures.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::UnbalancedBraces => "unbalanced-braces",
            ErrorKind::AmbiguousHierarchy => "ambiguous-hierarchy",
            ErrorKind::UnclassifiedHeader => "unclassified-header",
            ErrorKind::DanglingBranch => "dangling-branch",
            ErrorKind::UnresolvedNameOnUpdate => "unresolved-name",
            ErrorKind::ImmutableReassignment => "immutable-reassignment",
            ErrorKind::DuplicateDeclaration => "duplicate-declaration",
            ErrorKind::UnknownType => "unknown-type",
            ErrorKind::TypeMismatch => "type-mismatch",
            ErrorKind::InvalidCompoundAssignment => "invalid-compound-assignment",
            ErrorKind::UnrecognizedStatement => "unrecognized-statement",
        }
    }

    pub fn from_code(code: &str) -> Option<ErrorKind> {
        ErrorKind::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::UnbalancedBraces,
        ErrorKind::AmbiguousHierarchy,
        ErrorKind::UnclassifiedHeader,
        ErrorKind::DanglingBranch,
        ErrorKind::UnresolvedNameOnUpdate,
        ErrorKind::ImmutableReassignment,
        ErrorKind::DuplicateDeclaration,
        ErrorKind::UnknownType,
        ErrorKind::TypeMismatch,
        ErrorKind::InvalidCompoundAssignment,
        ErrorKind::UnrecognizedStatement,
    ];
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parse errors with source location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Range<usize>,
    /// 0-based line of `span.start`.
    pub line: usize,
    pub file_id: usize,
    pub severity: Severity,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn error(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Range<usize>,
        line: usize,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            span,
            line,
            file_id,
            severity: Severity::Error,
            notes: Vec::new(),
        }
    }

    pub fn warning(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Range<usize>,
        line: usize,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            span,
            line,
            file_id,
            severity: Severity::Warning,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(self.severity)
            .with_code(self.kind.code())
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.message)
    }
}

impl std::error::Error for ParseError {}
