use std::ops::Range;
use std::sync::OnceLock;

use log::trace;
use regex::Regex;

use crate::block::header::{ForClause, FunctionSignature, Parameter};
use crate::block::{BlockId, BlockKind, BlockTree};
use crate::parser::ParseState;
use crate::parser::error::ErrorKind;
use crate::parser::scan::mask_strings;
use crate::variable::{TypeName, split_type_args};

/// Assign every non-root block its kind from the header before its `{`,
/// or from a header line directly above a brace that opens its own line.
pub(crate) fn classify_blocks(state: &mut ParseState<'_>, tree: &mut BlockTree) {
    let ids: Vec<BlockId> = tree
        .iter()
        .filter(|b| !b.is_root())
        .map(|b| b.id)
        .collect();

    for id in ids {
        let open = tree.get(id).span.start;
        let floor = tree
            .parent(id)
            .map(|p| tree.get(p).body.start)
            .unwrap_or(0);
        let mut header_span = find_header(state.source, floor, open);
        if header_span.is_empty()
            && let Some(above) = header_above(state.source, floor, open)
        {
            header_span = above;
        }
        let header = state.source[header_span.clone()].to_string();

        let kind = match classify_header(&header) {
            Some(Classified::Kind(kind)) => kind,
            Some(Classified::Function(sig, bad_return)) => {
                if let Some(ret) = bad_return {
                    state.warn(
                        ErrorKind::UnknownType,
                        format!("unknown return type `{}` for function `{}`", ret, sig.name),
                        header_span.clone(),
                    );
                }
                BlockKind::FunctionDecl(sig)
            }
            None => {
                state.warn(
                    ErrorKind::UnclassifiedHeader,
                    format!("`{}` is not a recognised block header; treating the block as a plain scope", header),
                    header_span.clone(),
                );
                tree.get_mut(id).flagged = true;
                BlockKind::Generic
            }
        };
        trace!("{:?} `{}` -> {}", id, header, kind.label());

        let block = tree.get_mut(id);
        block.header_span = header_span;
        block.kind = kind;
    }

    check_branches(state, tree);
}

/// `elif` and `else` must directly follow an `if` or `elif` sibling.
fn check_branches(state: &mut ParseState<'_>, tree: &BlockTree) {
    for block in tree.iter() {
        let mut previous: Option<&BlockKind> = None;
        for child in tree.children(block.id) {
            let dangling = matches!(child.kind, BlockKind::Elif { .. } | BlockKind::Else)
                && !matches!(previous, Some(BlockKind::If { .. } | BlockKind::Elif { .. }));
            if dangling {
                state.warn(
                    ErrorKind::DanglingBranch,
                    format!(
                        "`{}` block does not follow an `if` or `elif` block",
                        child.kind.label().to_lowercase()
                    ),
                    child.header_span.clone(),
                );
            }
            previous = Some(&child.kind);
        }
    }
}

/// Locate the header on the same line as the brace at `open`: scan back to
/// a `{`, `}`, `;` outside parentheses, or the line start. The returned span
/// is trimmed, and empty (at `open`) when there is no header text.
fn find_header(source: &str, floor: usize, open: usize) -> Range<usize> {
    let line_start = source[floor..open]
        .rfind('\n')
        .map_or(floor, |i| floor + i + 1);
    let masked = mask_strings(&source[line_start..open]);
    let mut start = masked.len();
    let mut parens = 0usize;

    while start > 0 {
        match masked[start - 1] {
            b')' => parens += 1,
            b'(' => {
                if parens == 0 {
                    break;
                }
                parens -= 1;
            }
            b'{' | b'}' | b';' if parens == 0 => break,
            _ => {}
        }
        start -= 1;
    }

    let start = line_start + start;
    let raw = &source[start..open];
    let lead = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        open..open
    } else {
        let from = start + lead;
        from..from + trimmed.len()
    }
}

/// Header for a brace that opens its own line: the end of the previous
/// non-blank line, when that text is a block header (`if (x)`, `else`,
/// `function f()` ...). Ordinary statements such as `x = 1` are left to the
/// parent.
fn header_above(source: &str, floor: usize, open: usize) -> Option<Range<usize>> {
    let line_start = source[..open].rfind('\n').map(|i| i + 1)?;
    if line_start <= floor || !source[line_start..open].trim().is_empty() {
        return None;
    }
    let before = &source[floor..line_start];
    let end = floor + before.trim_end().len();
    if end == floor {
        return None;
    }
    let span = find_header(source, floor, end);
    match classify_header(&source[span.clone()]) {
        Some(_) if !span.is_empty() => Some(span),
        _ => None,
    }
}

enum Classified {
    Kind(BlockKind),
    /// Function signature, plus the return type text when it was not a known type.
    Function(FunctionSignature, Option<String>),
}

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^function\s+([A-Za-z_]\w*)\s*\((.*)\)(?:\s*:\s*(\S.*))?$").unwrap()
    })
}

fn conditional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(if|elif|while)\s*\((.*)\)$").unwrap())
}

fn counted_for_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^for\s*\(([^;]*);([^;]*);([^;]*)\)$").unwrap())
}

fn each_for_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^for\s*\(\s*([A-Za-z_]\w*)\s+in\s+(.+?)\s*\)$").unwrap())
}

/// Match a trimmed header against the block grammars in priority order:
/// function declaration, conditionals, loops. `None` means the header is
/// non-empty and matched nothing.
fn classify_header(header: &str) -> Option<Classified> {
    let header = header.trim();
    if header.is_empty() {
        return Some(Classified::Kind(BlockKind::Generic));
    }

    if let Some(caps) = function_re().captures(header) {
        let name = caps[1].to_string();
        let parameters = split_type_args(&caps[2])
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(parse_parameter)
            .collect();
        let (return_type, bad_return) = match caps.get(3) {
            Some(m) => match TypeName::parse(m.as_str()) {
                Some(ty) => (Some(ty), None),
                None => (None, Some(m.as_str().trim().to_string())),
            },
            None => (None, None),
        };
        let sig = FunctionSignature {
            name,
            parameters,
            return_type,
        };
        return Some(Classified::Function(sig, bad_return));
    }

    if header == "else" {
        return Some(Classified::Kind(BlockKind::Else));
    }

    if let Some(caps) = conditional_re().captures(header) {
        let condition = caps[2].trim().to_string();
        let kind = match &caps[1] {
            "if" => BlockKind::If { condition },
            "elif" => BlockKind::Elif { condition },
            _ => BlockKind::While { condition },
        };
        return Some(Classified::Kind(kind));
    }

    if let Some(caps) = counted_for_re().captures(header) {
        return Some(Classified::Kind(BlockKind::For(ForClause::Counted {
            init: caps[1].trim().to_string(),
            condition: caps[2].trim().to_string(),
            step: caps[3].trim().to_string(),
        })));
    }

    if let Some(caps) = each_for_re().captures(header) {
        return Some(Classified::Kind(BlockKind::For(ForClause::Each {
            item: caps[1].to_string(),
            collection: caps[2].to_string(),
        })));
    }

    None
}

fn parse_parameter(text: &str) -> Parameter {
    match text.split_once(':') {
        Some((name, ty)) => Parameter {
            name: name.trim().to_string(),
            ty: Some(ty.trim().to_string()),
        },
        None => Parameter {
            name: text.trim().to_string(),
            ty: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(header: &str) -> Option<BlockKind> {
        match classify_header(header)? {
            Classified::Kind(kind) => Some(kind),
            Classified::Function(sig, _) => Some(BlockKind::FunctionDecl(sig)),
        }
    }

    #[test]
    fn classifies_control_headers() {
        assert_eq!(
            kind_of("if (x > 1)"),
            Some(BlockKind::If {
                condition: "x > 1".into()
            })
        );
        assert_eq!(
            kind_of("elif(y)"),
            Some(BlockKind::Elif {
                condition: "y".into()
            })
        );
        assert_eq!(kind_of("else"), Some(BlockKind::Else));
        assert_eq!(
            kind_of("while (running)"),
            Some(BlockKind::While {
                condition: "running".into()
            })
        );
        assert_eq!(kind_of(""), Some(BlockKind::Generic));
        assert_eq!(kind_of("repeat 3"), None);
    }

    #[test]
    fn classifies_both_for_forms() {
        assert_eq!(
            kind_of("for (i = 0; i < 3; i += 1)"),
            Some(BlockKind::For(ForClause::Counted {
                init: "i = 0".into(),
                condition: "i < 3".into(),
                step: "i += 1".into(),
            }))
        );
        assert_eq!(
            kind_of("for (shape in shapes)"),
            Some(BlockKind::For(ForClause::Each {
                item: "shape".into(),
                collection: "shapes".into(),
            }))
        );
    }

    #[test]
    fn classifies_function_declarations() {
        let Some(Classified::Function(sig, bad)) =
            classify_header("function area(w : Integer, h) : Double")
        else {
            panic!("expected a function");
        };
        assert_eq!(sig.name, "area");
        assert_eq!(sig.parameters.len(), 2);
        assert_eq!(sig.parameters[0].ty.as_deref(), Some("Integer"));
        assert_eq!(sig.parameters[1].ty, None);
        assert_eq!(sig.return_type, Some(TypeName::Double));
        assert!(bad.is_none());

        let Some(Classified::Function(sig, bad)) = classify_header("function draw() : Shape")
        else {
            panic!("expected a function");
        };
        assert!(sig.parameters.is_empty());
        assert_eq!(bad.as_deref(), Some("Shape"));
    }

    #[test]
    fn header_scan_stops_at_structure() {
        let src = "x = 1\n} else {";
        let open = src.rfind('{').unwrap();
        assert_eq!(&src[find_header(src, 0, open)], "else");

        let src = "for (i = 0; i < 3; i += 1) {";
        let open = src.rfind('{').unwrap();
        assert_eq!(&src[find_header(src, 0, open)], "for (i = 0; i < 3; i += 1)");

        let src = "a = 1\n{";
        let span = find_header(src, 0, 6);
        assert!(span.is_empty());
        assert_eq!(span.start, 6);
    }
}
