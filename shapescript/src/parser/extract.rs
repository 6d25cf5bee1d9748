use log::trace;

use crate::block::{BlockId, BlockTree};
use crate::parser::ParseState;
use crate::parser::error::{ErrorKind, ParseError};
use crate::parser::scan::QuoteTracker;

/// A structural brace (one outside string literals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Brace {
    pub offset: usize,
    pub open: bool,
}

/// Output of the extraction scan.
#[derive(Debug)]
pub(crate) struct Extraction {
    /// Provisional blocks in discovery order: each block is found when its
    /// closing brace is reached, so inner blocks precede their containers.
    pub blocks: Vec<BlockId>,
    /// Every structural brace in source order.
    pub braces: Vec<Brace>,
}

impl Extraction {
    /// Position in `braces` of the brace at `offset`.
    pub fn brace_index(&self, offset: usize) -> Option<usize> {
        self.braces.binary_search_by_key(&offset, |b| b.offset).ok()
    }
}

/// Scan the source once, matching every `{` with its `}`.
///
/// Each matched pair becomes a provisional block with no parent. Braces
/// inside quoted strings are skipped.
pub(crate) fn extract_blocks(
    state: &ParseState<'_>,
    tree: &mut BlockTree,
) -> Result<Extraction, ParseError> {
    let source = state.source;
    let mut open_stack: Vec<usize> = Vec::new();
    let mut blocks = Vec::new();
    let mut braces = Vec::new();
    let mut quotes = QuoteTracker::new();

    for (i, &b) in source.as_bytes().iter().enumerate() {
        if quotes.consume(b) {
            continue;
        }

        match b {
            b'{' => {
                if open_stack.is_empty() {
                    trace!("top-level region opens at {}", i);
                }
                open_stack.push(i);
                braces.push(Brace { offset: i, open: true });
            }
            b'}' => {
                let Some(open) = open_stack.pop() else {
                    return Err(state.fatal(
                        ErrorKind::UnbalancedBraces,
                        "closing brace has no matching opening brace",
                        i..i + 1,
                    ));
                };
                braces.push(Brace { offset: i, open: false });
                let id = tree.push_provisional(source, open..i + 1);
                trace!("block {:?} at {}..{} (depth {})", id, open, i + 1, open_stack.len());
                blocks.push(id);
            }
            _ => {}
        }
    }

    if let Some(&open) = open_stack.last() {
        let mut err = state.fatal(
            ErrorKind::UnbalancedBraces,
            "opening brace is never closed",
            open..open + 1,
        );
        if open_stack.len() > 1 {
            err = err.with_note(format!("{} braces are left open in total", open_stack.len()));
        }
        return Err(err);
    }

    Ok(Extraction { blocks, braces })
}
