use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use log::{debug, trace};

use crate::block::{BlockId, BlockTree};
use crate::line;
use crate::parser::ParseState;
use crate::parser::error::{ErrorKind, ParseError};
use crate::parser::extract::Extraction;

/// Turn the flat set of provisional blocks into a single rooted tree.
///
/// Works bottom-up in rounds. Each round takes the unparented blocks that
/// no longer hold any unparented block, finds the span that immediately
/// contains them, and hangs them under the block with exactly that span,
/// creating it when it was never extracted. Blocks with no enclosing brace
/// pair are absorbed by the root. Containment is a strict partial order, so
/// every round settles at least one block and the number of rounds follows
/// the nesting depth.
pub(crate) fn build_hierarchy(
    state: &mut ParseState<'_>,
    tree: &mut BlockTree,
    extraction: &Extraction,
) -> Result<(), ParseError> {
    let mut by_span: HashMap<(usize, usize), BlockId> = extraction
        .blocks
        .iter()
        .map(|id| {
            let span = &tree.get(*id).span;
            ((span.start, span.end), *id)
        })
        .collect();
    let mut unparented: BTreeSet<BlockId> = extraction.blocks.iter().copied().collect();
    let mut round = 0;

    while !unparented.is_empty() {
        round += 1;
        let frontier = frontier(tree, &unparented);
        debug!(
            "hierarchy round {}: {} unparented, {} on the frontier",
            round,
            unparented.len(),
            frontier.len()
        );

        // Group the frontier into sibling runs keyed by their containing span.
        let mut runs: BTreeMap<Option<(usize, usize)>, Vec<BlockId>> = BTreeMap::new();
        for id in frontier {
            let container = containing_span(state, tree, extraction, id)?;
            runs.entry(container.map(|r| (r.start, r.end)))
                .or_default()
                .push(id);
        }

        for (container, run) in runs {
            let parent = match container {
                None => {
                    trace!("absorbing {} orphan block(s) into the root", run.len());
                    tree.root()
                }
                Some(key) => match by_span.get(&key) {
                    Some(existing) => *existing,
                    None => {
                        let id = tree.push_provisional(state.source, key.0..key.1);
                        trace!("constructed container {:?} at {}..{}", id, key.0, key.1);
                        by_span.insert(key, id);
                        unparented.insert(id);
                        id
                    }
                },
            };

            for child in run {
                trace!("{:?} -> parent {:?}", child, parent);
                tree.attach(parent, child);
                unparented.remove(&child);
            }
        }
    }

    debug!("hierarchy settled after {} round(s)", round);
    finalize(state, tree);
    Ok(())
}

/// Unparented blocks that contain no other unparented block.
fn frontier(tree: &BlockTree, unparented: &BTreeSet<BlockId>) -> Vec<BlockId> {
    let mut frontier: Vec<BlockId> = unparented
        .iter()
        .copied()
        .filter(|id| {
            let outer = tree.get(*id);
            !unparented
                .iter()
                .any(|other| other != id && outer.contains_span(&tree.get(*other).span))
        })
        .collect();
    frontier.sort_by_key(|id| tree.get(*id).span.start);
    frontier
}

/// The nearest brace pair enclosing block `id`, found by walking the brace
/// list outward from the block's own braces. `None` when the block sits at
/// the top level.
fn containing_span(
    state: &ParseState<'_>,
    tree: &BlockTree,
    extraction: &Extraction,
    id: BlockId,
) -> Result<Option<Range<usize>>, ParseError> {
    let span = &tree.get(id).span;
    let (Some(open_idx), Some(close_idx)) = (
        extraction.brace_index(span.start),
        extraction.brace_index(span.end - 1),
    ) else {
        return Err(ambiguous(state, tree, id, "block braces were not recorded by the scan"));
    };
    let braces = &extraction.braces;

    let mut depth = 0usize;
    let mut open = None;
    for brace in braces[..open_idx].iter().rev() {
        if brace.open {
            if depth == 0 {
                open = Some(brace.offset);
                break;
            }
            depth -= 1;
        } else {
            depth += 1;
        }
    }

    depth = 0;
    let mut close = None;
    for brace in &braces[close_idx + 1..] {
        if brace.open {
            depth += 1;
        } else {
            if depth == 0 {
                close = Some(brace.offset);
                break;
            }
            depth -= 1;
        }
    }

    match (open, close) {
        (Some(open), Some(close)) => Ok(Some(open..close + 1)),
        (None, None) => Ok(None),
        _ => Err(ambiguous(state, tree, id, "enclosing braces are only half present")),
    }
}

fn ambiguous(state: &ParseState<'_>, tree: &BlockTree, id: BlockId, reason: &str) -> ParseError {
    let span = tree.get(id).span.clone();
    let snippet: String = state.source[span.clone()].chars().take(40).collect();
    state
        .fatal(
            ErrorKind::AmbiguousHierarchy,
            format!("cannot place block in the hierarchy: {}", reason),
            span,
        )
        .with_note(format!("block starts with `{}`", snippet))
}

/// Sort children into source order and fill in line ranges and owners.
fn finalize(state: &mut ParseState<'_>, tree: &mut BlockTree) {
    let starts: Vec<usize> = tree.blocks().iter().map(|b| b.span.start).collect();
    for block in tree.blocks_mut() {
        block.children.sort_by_key(|c| starts[c.0]);
        block.lines = line::lines_in(&state.lines, &block.span);
    }

    for line in &mut state.lines {
        line.block = Some(match line.first_content_offset() {
            Some(offset) => tree.block_at(offset),
            None => tree.block_at(line.span.start),
        });
    }
}
