pub mod block;
pub mod line;
pub mod parser;
pub mod variable;

use crate::block::BlockTree;
use crate::line::Line;
use crate::parser::ParseError;

/// A parsed shapescript source file.
#[derive(Debug, Clone)]
pub struct Program {
    /// The block hierarchy. The root is the `Main` block spanning the whole source.
    pub tree: BlockTree,
    /// The source split into lines, each pointing back at its innermost block.
    pub lines: Vec<Line>,
    /// Recoverable problems found while parsing, in source order.
    pub diagnostics: Vec<ParseError>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Program {
    pub fn has_warnings(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
