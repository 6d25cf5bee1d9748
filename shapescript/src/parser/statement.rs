use std::ops::Range;
use std::sync::OnceLock;

use log::trace;
use regex::Regex;

use crate::block::{BlockId, BlockTree, FunctionCall};
use crate::parser::ParseState;
use crate::parser::error::{ErrorKind, ParseError};
use crate::parser::expression::{self, Expr};
use crate::parser::scan::QuoteTracker;
use crate::variable::{Binding, TypeName, Value, VarKind, Variable};

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(var|val)\s+([a-z]\w*)\s*:\s*([A-Za-z]\w*(?:\s*<[^=]*>)?)\s*=\s*(.+)$")
            .unwrap()
    })
}

fn update_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_]\w*)\s*(\+=|-=|=)\s*(.+)$").unwrap())
}

/// Walk the tree in source order and fill every block's scope and calls.
///
/// A block's own statements are the text of its body outside its children
/// (header through closing brace). Each child is visited at its position,
/// so it only sees declarations that precede it.
pub(crate) fn parse_statements(state: &mut ParseState<'_>, tree: &mut BlockTree) {
    let root = tree.root();
    walk(state, tree, root);
}

fn walk(state: &mut ParseState<'_>, tree: &mut BlockTree, id: BlockId) {
    let block = tree.get(id);
    let body = block.body.clone();
    let children: Vec<(BlockId, Range<usize>)> = tree
        .children(id)
        .map(|c| (c.id, c.claimed_range()))
        .collect();

    let mut cursor = body.start;
    for (child, claimed) in children {
        parse_segment(state, tree, id, cursor..claimed.start);
        walk(state, tree, child);
        cursor = claimed.end;
    }
    parse_segment(state, tree, id, cursor..body.end);
}

/// Split a run of owned text into statements at newlines and at `;`
/// outside quotes and brackets.
fn parse_segment(state: &mut ParseState<'_>, tree: &mut BlockTree, id: BlockId, segment: Range<usize>) {
    if segment.is_empty() {
        return;
    }
    let source = state.source;
    let bytes = source.as_bytes();
    let mut start = segment.start;
    let mut depth = 0usize;
    let mut quotes = QuoteTracker::new();

    for i in segment.clone() {
        let b = bytes[i];
        if quotes.consume(b) {
            continue;
        }
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'\n' => {
                statement(state, tree, id, start..i);
                start = i + 1;
                depth = 0;
            }
            b';' if depth == 0 => {
                statement(state, tree, id, start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    statement(state, tree, id, start..segment.end);
}

fn statement(state: &mut ParseState<'_>, tree: &mut BlockTree, id: BlockId, raw: Range<usize>) {
    let source = state.source;
    let text = &source[raw.clone()];
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = text.len() - text.trim_start().len();
    let span = raw.start + lead..raw.start + lead + trimmed.len();
    trace!("{:?} statement `{}`", id, trimmed);

    if let Some(caps) = declaration_re().captures(trimmed) {
        declare(
            state,
            tree,
            id,
            Declaration {
                mutable: &caps[1] == "var",
                name: &caps[2],
                ty: &caps[3],
                init: &caps[4],
            },
            span,
        );
        return;
    }

    if let Some(caps) = update_re().captures(trimmed) {
        // `x == y` is a comparison, not an assignment.
        if !(&caps[2] == "=" && caps[3].starts_with('=')) {
            update(state, tree, id, &caps[1], &caps[2], &caps[3], span);
            return;
        }
    }

    if let Some((name, args)) = expression::parse_call(trimmed) {
        tree.get_mut(id).calls.push(FunctionCall { name, args, span });
        return;
    }

    state.warn(
        ErrorKind::UnrecognizedStatement,
        format!("unrecognised statement `{}`", trimmed),
        span,
    );
}

struct Declaration<'t> {
    mutable: bool,
    name: &'t str,
    ty: &'t str,
    init: &'t str,
}

fn declare(
    state: &mut ParseState<'_>,
    tree: &mut BlockTree,
    id: BlockId,
    decl: Declaration<'_>,
    span: Range<usize>,
) {
    let Some(ty) = TypeName::parse(decl.ty) else {
        state.warn(
            ErrorKind::UnknownType,
            format!("unknown type `{}` for `{}`", decl.ty.trim(), decl.name),
            span,
        );
        return;
    };

    let binding = match initial_binding(&ty, decl.name, decl.init) {
        Ok(binding) => binding,
        Err((kind, message)) => {
            state.warn(kind, message, span);
            return;
        }
    };

    let variable = Variable {
        name: decl.name.to_string(),
        mutable: decl.mutable,
        ty,
        binding,
        span: span.clone(),
    };

    if let Err(rejected) = tree.get_mut(id).scope.declare(variable) {
        let first_line = tree
            .get(id)
            .scope
            .get(&rejected.name)
            .map(|first| state.line_of(first.span.start) + 1);
        let mut diagnostic = ParseError::warning(
            ErrorKind::DuplicateDeclaration,
            format!("`{}` is already declared in this block", rejected.name),
            span.clone(),
            state.line_of(span.start),
            state.file_id,
        );
        if let Some(line) = first_line {
            diagnostic = diagnostic.with_note(format!("the declaration on line {} is kept", line));
        }
        state.push(diagnostic);
    }
}

type StatementError = (ErrorKind, String);

fn initial_binding(ty: &TypeName, name: &str, init: &str) -> Result<Binding, StatementError> {
    match expression::classify(init) {
        None if expression::is_oversized_integer(init) => Err(oversized(name, init)),
        None => Err((
            ErrorKind::UnrecognizedStatement,
            format!("cannot read the value `{}` assigned to `{}`", init.trim(), name),
        )),
        Some(Expr::Null) => Ok(Binding::Null),
        Some(Expr::Call { name: callee, args }) => {
            Ok(Binding::Deferred(format!("{}({})", callee, args.join(", "))))
        }
        Some(Expr::Literal(value)) => {
            if ty.accepts(&value) {
                Ok(Binding::Value(ty.coerce(value)))
            } else {
                Err(mismatch(name, ty, &value))
            }
        }
    }
}

fn mismatch(name: &str, ty: &TypeName, value: &Value) -> StatementError {
    (
        ErrorKind::TypeMismatch,
        format!("`{}` is {} but was given {} `{}`", name, ty, article(value.type_name()), value),
    )
}

fn oversized(name: &str, literal: &str) -> StatementError {
    (
        ErrorKind::TypeMismatch,
        format!("`{}` does not fit in an Integer (assigned to `{}`)", literal.trim(), name),
    )
}

fn article(type_name: &str) -> String {
    match type_name.chars().next() {
        Some('A' | 'E' | 'I' | 'O' | 'U') => format!("an {}", type_name),
        _ => format!("a {}", type_name),
    }
}

fn update(
    state: &mut ParseState<'_>,
    tree: &mut BlockTree,
    id: BlockId,
    name: &str,
    op: &str,
    rhs: &str,
    span: Range<usize>,
) {
    let Some((_, variable)) = tree.lookup(id, name) else {
        state.warn(
            ErrorKind::UnresolvedNameOnUpdate,
            format!("`{}` is not declared in this block or any enclosing block", name),
            span,
        );
        return;
    };

    if !variable.mutable {
        let declared = state.line_of(variable.span.start) + 1;
        let diagnostic = ParseError::warning(
            ErrorKind::ImmutableReassignment,
            format!("`{}` was declared with `val` and cannot be reassigned", name),
            span.clone(),
            state.line_of(span.start),
            state.file_id,
        )
        .with_note(format!("`{}` is declared on line {}", name, declared));
        state.push(diagnostic);
        return;
    }

    let ty = variable.ty.clone();
    let current = variable.binding.clone();

    let result = match op {
        "=" => initial_binding(&ty, name, rhs),
        _ => compound(&ty, name, current, op, rhs),
    };

    match result {
        Ok(binding) => {
            if let Some(variable) = tree.lookup_mut(id, name) {
                trace!("{} {} {} -> {}", name, op, rhs.trim(), binding);
                variable.binding = binding;
            }
        }
        Err((kind, message)) => state.warn(kind, message, span),
    }
}

/// `+=` / `-=`: arithmetic on numbers, append / remove on arrays.
fn compound(
    ty: &TypeName,
    name: &str,
    current: Binding,
    op: &str,
    rhs: &str,
) -> Result<Binding, StatementError> {
    let adding = op == "+=";
    if !matches!(ty.kind(), VarKind::Integer | VarKind::Double | VarKind::Array) {
        return Err((
            ErrorKind::InvalidCompoundAssignment,
            format!("`{}` needs a numeric or array variable, but `{}` is {}", op, name, ty),
        ));
    }

    let operand = match expression::classify(rhs) {
        None if expression::is_oversized_integer(rhs) => return Err(oversized(name, rhs)),
        None => {
            return Err((
                ErrorKind::UnrecognizedStatement,
                format!("cannot read the value `{}` applied to `{}`", rhs.trim(), name),
            ));
        }
        Some(Expr::Null) => {
            return Err((
                ErrorKind::TypeMismatch,
                format!("cannot apply `{}` with null to `{}`", op, name),
            ));
        }
        Some(Expr::Call { name: callee, args }) => {
            let symbol = if adding { '+' } else { '-' };
            return Ok(Binding::Deferred(format!(
                "{} {} {}({})",
                current,
                symbol,
                callee,
                args.join(", ")
            )));
        }
        Some(Expr::Literal(value)) => value,
    };

    let current = match current {
        Binding::Value(value) => value,
        Binding::Null => {
            return Err((
                ErrorKind::TypeMismatch,
                format!("`{}` is null; `{}` needs a value", name, op),
            ));
        }
        Binding::Deferred(expr) => {
            let symbol = if adding { '+' } else { '-' };
            return Ok(Binding::Deferred(format!("{} {} {}", expr, symbol, operand)));
        }
    };

    match (ty, current) {
        (TypeName::Integer, Value::Integer(a)) => {
            let Value::Integer(b) = operand else {
                return Err(mismatch(name, ty, &operand));
            };
            let result = if adding { a.checked_add(b) } else { a.checked_sub(b) };
            result.map(|n| Binding::Value(Value::Integer(n))).ok_or_else(|| {
                (
                    ErrorKind::TypeMismatch,
                    format!("`{} {} {}` overflows an Integer", name, op, b),
                )
            })
        }
        (TypeName::Double, Value::Double(a)) => {
            let b = match operand {
                Value::Double(b) => b,
                Value::Integer(b) => b as f64,
                other => return Err(mismatch(name, ty, &other)),
            };
            let n = if adding { a + b } else { a - b };
            Ok(Binding::Value(Value::Double(n)))
        }
        (TypeName::Array(elem), Value::Array(mut items)) => {
            if adding {
                let appended = match operand {
                    Value::Array(more) if ty.accepts(&Value::Array(more.clone())) => Ok(more),
                    other => Err(other),
                };
                match appended {
                    Ok(more) => items.extend(more.into_iter().map(|v| elem.coerce(v))),
                    Err(operand) if elem.accepts(&operand) => items.push(elem.coerce(operand)),
                    Err(operand) => return Err(mismatch(name, elem, &operand)),
                }
            } else {
                if !elem.accepts(&operand) {
                    return Err(mismatch(name, elem, &operand));
                }
                let target = elem.coerce(operand);
                if let Some(pos) = items.iter().position(|v| *v == target) {
                    items.remove(pos);
                }
            }
            Ok(Binding::Value(Value::Array(items)))
        }
        (ty, current) => Err(mismatch(name, ty, &current)),
    }
}
