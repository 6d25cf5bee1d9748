use std::ops::Range;

use log::trace;

use crate::block::BlockId;

/// One newline-delimited line of source.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// 0-based line number.
    pub index: usize,
    /// Byte span in source, excluding the terminating newline.
    pub span: Range<usize>,
    pub text: String,
    /// Innermost block whose body holds the line's first non-blank byte.
    /// Filled in once the hierarchy is known.
    pub block: Option<BlockId>,
}

impl Line {
    /// 1-based line number, as shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Offset of the first non-whitespace byte, if any.
    pub fn first_content_offset(&self) -> Option<usize> {
        let lead = self.text.len() - self.text.trim_start().len();
        if self.is_blank() {
            None
        } else {
            Some(self.span.start + lead)
        }
    }
}

/// Split `source` into lines covering it end to end.
///
/// Newlines are separators and belong to no line. Empty input yields a
/// single empty line.
pub fn index_lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (index, text) in source.split('\n').enumerate() {
        let end = start + text.len();
        trace!("line {}: {:?} at {}..{}", index, text, start, end);
        lines.push(Line {
            index,
            span: start..end,
            text: text.to_string(),
            block: None,
        });
        start = end + 1;
    }

    lines
}

/// Index of the line containing byte `offset`.
///
/// Offsets that land on a newline belong to the line it terminates; offsets
/// past the end clamp to the last line.
pub fn line_at(lines: &[Line], offset: usize) -> usize {
    let idx = lines.partition_point(|line| line.span.start <= offset);
    idx.saturating_sub(1)
}

/// Range of line indices that `span` touches.
pub fn lines_in(lines: &[Line], span: &Range<usize>) -> Range<usize> {
    if lines.is_empty() {
        return 0..0;
    }
    let first = line_at(lines, span.start);
    let last = line_at(lines, span.end.saturating_sub(1).max(span.start));
    first..last + 1
}
