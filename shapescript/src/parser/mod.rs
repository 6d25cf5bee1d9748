pub mod error;
pub mod expression;
mod classify;
mod extract;
mod hierarchy;
mod scan;
mod statement;

use std::ops::Range;

use log::{debug, warn};

pub use error::{ErrorKind, ParseError};

use crate::Program;
use crate::block::BlockTree;
use crate::line::{self, Line};

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source into a classified block tree with per-block scopes.
    ///
    /// Unbalanced braces or an unplaceable block abort with a single error.
    /// Everything else is reported in [`Program::diagnostics`].
    pub fn parse(&self) -> Result<Program, ParseError> {
        let mut state = ParseState::new(&self.source, self.file_id);
        debug!("indexed {} lines", state.lines.len());

        let mut tree = BlockTree::new(&self.source);
        let extraction = extract::extract_blocks(&state, &mut tree)?;
        debug!("extracted {} provisional blocks", extraction.blocks.len());

        hierarchy::build_hierarchy(&mut state, &mut tree, &extraction)?;
        classify::classify_blocks(&mut state, &mut tree);
        statement::parse_statements(&mut state, &mut tree);

        Ok(state.finish(tree))
    }
}

/// Shared state threaded through the parse phases.
pub(crate) struct ParseState<'a> {
    pub source: &'a str,
    pub file_id: usize,
    pub lines: Vec<Line>,
    pub diagnostics: Vec<ParseError>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            lines: line::index_lines(source),
            diagnostics: Vec::new(),
        }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        line::line_at(&self.lines, offset)
    }

    /// Record a recoverable problem.
    pub fn warn(&mut self, kind: ErrorKind, message: impl Into<String>, span: Range<usize>) {
        let line = self.line_of(span.start);
        self.diagnostics
            .push(ParseError::warning(kind, message, span, line, self.file_id));
    }

    pub fn push(&mut self, diagnostic: ParseError) {
        self.diagnostics.push(diagnostic);
    }

    /// Build a parse-ending error.
    pub fn fatal(&self, kind: ErrorKind, message: impl Into<String>, span: Range<usize>) -> ParseError {
        let line = self.line_of(span.start);
        ParseError::error(kind, message, span, line, self.file_id)
    }

    fn finish(mut self, tree: BlockTree) -> Program {
        self.diagnostics
            .sort_by_key(|d| (d.span.start, d.span.end));
        for diagnostic in &self.diagnostics {
            warn!("[{}] {}", diagnostic.kind, diagnostic);
        }
        Program {
            tree,
            lines: self.lines,
            diagnostics: self.diagnostics,
            source_id: self.file_id,
        }
    }
}
