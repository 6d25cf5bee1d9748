pub mod header;
mod tree;

use std::fmt;
use std::ops::Range;

pub use tree::BlockTree;

use crate::block::header::{ForClause, FunctionSignature};
use crate::variable::Scope;

/// Handle of a block inside its [`BlockTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

/// The control construct a block belongs to, decided from its header.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// The implicit root spanning the whole source.
    Main,
    If { condition: String },
    Elif { condition: String },
    Else,
    For(ForClause),
    While { condition: String },
    FunctionDecl(FunctionSignature),
    /// A bare `{ }` scope, or a block whose header was not understood.
    Generic,
}

impl BlockKind {
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::Main => "Main",
            BlockKind::If { .. } => "If",
            BlockKind::Elif { .. } => "Elif",
            BlockKind::Else => "Else",
            BlockKind::For(_) => "For",
            BlockKind::While { .. } => "While",
            BlockKind::FunctionDecl(_) => "FunctionDecl",
            BlockKind::Generic => "Generic",
        }
    }

    /// The condition expression for `if`, `elif` and `while`.
    pub fn condition(&self) -> Option<&str> {
        match self {
            BlockKind::If { condition }
            | BlockKind::Elif { condition }
            | BlockKind::While { condition } => Some(condition),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::If { condition } => write!(f, "If ({})", condition),
            BlockKind::Elif { condition } => write!(f, "Elif ({})", condition),
            BlockKind::While { condition } => write!(f, "While ({})", condition),
            BlockKind::For(clause) => write!(f, "For {}", clause),
            BlockKind::FunctionDecl(sig) => write!(f, "FunctionDecl {}", sig),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// A standalone call statement such as `circle(10, 20)`. Not resolved here.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<String>,
    pub span: Range<usize>,
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(", "))
    }
}

/// A `{ … }` region of source with its place in the hierarchy.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    /// Byte span including both braces. The root spans the whole source.
    pub span: Range<usize>,
    /// Byte span between the braces.
    pub body: Range<usize>,
    /// Byte span of the header text before the opening brace; empty when
    /// there is none.
    pub header_span: Range<usize>,
    /// The literal body text.
    pub text: String,
    /// Indices of the lines `span` touches.
    pub lines: Range<usize>,
    pub parent: Option<BlockId>,
    /// Directly nested blocks in source order.
    pub children: Vec<BlockId>,
    /// Variables declared in this block.
    pub scope: Scope,
    /// Call statements made directly in this block.
    pub calls: Vec<FunctionCall>,
    /// Set when the header was present but matched no known construct.
    pub flagged: bool,
}

impl Block {
    pub(crate) fn provisional(id: BlockId, source: &str, span: Range<usize>) -> Self {
        let body = span.start + 1..span.end - 1;
        Block {
            id,
            kind: BlockKind::Generic,
            text: source[body.clone()].to_string(),
            header_span: span.start..span.start,
            body,
            span,
            lines: 0..0,
            parent: None,
            children: Vec::new(),
            scope: Scope::new(),
            calls: Vec::new(),
            flagged: false,
        }
    }

    pub(crate) fn root(id: BlockId, source: &str) -> Self {
        Block {
            id,
            kind: BlockKind::Main,
            span: 0..source.len(),
            body: 0..source.len(),
            header_span: 0..0,
            text: source.to_string(),
            lines: 0..0,
            parent: None,
            children: Vec::new(),
            scope: Scope::new(),
            calls: Vec::new(),
            flagged: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The header text, e.g. `if (x > 1)`, or `""` when absent.
    pub fn header<'s>(&self, source: &'s str) -> &'s str {
        &source[self.header_span.clone()]
    }

    /// Whether `other` lies strictly inside this block.
    pub fn contains_span(&self, other: &Range<usize>) -> bool {
        self.span.start <= other.start
            && other.end <= self.span.end
            && self.span != *other
    }

    /// Range owned by this block within its parent: header through closing brace.
    pub(crate) fn claimed_range(&self) -> Range<usize> {
        self.header_span.start.min(self.span.start)..self.span.end
    }
}
