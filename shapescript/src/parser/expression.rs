use std::sync::OnceLock;

use regex::Regex;

use crate::parser::scan::QuoteTracker;
use crate::variable::Value;

/// A right-hand side, classified once into the forms the language knows.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Call { name: String, args: Vec<String> },
    Null,
}

/// Words that open block headers or declarations and never name a function.
const KEYWORDS: &[&str] = &["if", "elif", "else", "for", "while", "function", "var", "val"];

fn string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')$"#).unwrap())
}

fn double_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+\.\d+$").unwrap())
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+$").unwrap())
}

fn call_head_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_]\w*)\s*\(").unwrap())
}

/// Classify an expression. First match wins: string, double, integer,
/// function call, `null`, boolean, collection.
pub fn classify(text: &str) -> Option<Expr> {
    let text = text.trim();

    if let Some(value) = scalar(text) {
        return Some(Expr::Literal(value));
    }
    if let Some((name, args)) = parse_call(text) {
        return Some(Expr::Call { name, args });
    }
    if text == "null" {
        return Some(Expr::Null);
    }
    if let Some(value) = boolean(text) {
        return Some(Expr::Literal(value));
    }
    collection(text).map(Expr::Literal)
}

/// A literal usable inside a collection: everything but calls and `null`.
pub fn literal(text: &str) -> Option<Value> {
    let text = text.trim();
    scalar(text)
        .or_else(|| boolean(text))
        .or_else(|| collection(text))
}

fn scalar(text: &str) -> Option<Value> {
    if let Some(caps) = string_re().captures(text) {
        let inner = caps.get(1).or_else(|| caps.get(2))?;
        return Some(Value::String(unescape(inner.as_str())));
    }
    if double_re().is_match(text) {
        return text.parse().ok().map(Value::Double);
    }
    if integer_re().is_match(text) {
        return text.parse().ok().map(Value::Integer);
    }
    None
}

/// An integer literal too large for an `Integer`.
pub fn is_oversized_integer(text: &str) -> bool {
    let text = text.trim();
    integer_re().is_match(text) && text.parse::<i64>().is_err()
}

/// Resolve backslash escapes in string literal text: `\n` and `\t` become
/// control characters, any other escaped character stands for itself.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn boolean(text: &str) -> Option<Value> {
    match text {
        "true" | "True" => Some(Value::Boolean(true)),
        "false" | "False" => Some(Value::Boolean(false)),
        _ => None,
    }
}

/// `[a, b, c]` is an array, `[k: v, …]` a map, `[]` an empty array.
fn collection(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    if matching_close(text, 0, b'[', b']')? != text.len() - 1 {
        return None;
    }
    if inner.trim().is_empty() {
        return Some(Value::Array(Vec::new()));
    }

    let elements = split_top_level(inner, b',');
    let pairs: Vec<Option<(&str, &str)>> = elements
        .iter()
        .map(|e| {
            let parts = split_top_level(e, b':');
            match parts.as_slice() {
                [key, value] => Some((*key, *value)),
                _ => None,
            }
        })
        .collect();

    if pairs.iter().all(Option::is_some) {
        let entries = pairs
            .into_iter()
            .flatten()
            .map(|(k, v)| Some((literal(k)?, literal(v)?)))
            .collect::<Option<Vec<_>>>()?;
        Some(Value::Map(entries))
    } else if pairs.iter().all(Option::is_none) {
        let items = elements
            .iter()
            .map(|e| literal(e))
            .collect::<Option<Vec<_>>>()?;
        Some(Value::Array(items))
    } else {
        None
    }
}

/// Parse `name(args)` where the parenthesis opened after the name closes
/// at the very end of `text`.
pub fn parse_call(text: &str) -> Option<(String, Vec<String>)> {
    let text = text.trim();
    let caps = call_head_re().captures(text)?;
    let name = &caps[1];
    if KEYWORDS.contains(&name) {
        return None;
    }
    let open = caps.get(0)?.end() - 1;
    if matching_close(text, open, b'(', b')')? != text.len() - 1 {
        return None;
    }
    let args = split_top_level(&text[open + 1..text.len() - 1], b',')
        .into_iter()
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    Some((name.to_string(), args))
}

/// Offset of the bracket closing the one at `open`, skipping quoted text.
fn matching_close(text: &str, open: usize, left: u8, right: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut quotes = QuoteTracker::new();
    for (i, b) in text.bytes().enumerate().skip(open) {
        if quotes.consume(b) {
            continue;
        }
        match b {
            _ if b == left => depth += 1,
            _ if b == right => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on the ASCII byte `sep` where it is outside quotes, parentheses
/// and brackets.
/// Pieces are trimmed; the input always yields at least one piece.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quotes = QuoteTracker::new();
    let mut start = 0;

    for (i, b) in text.bytes().enumerate() {
        if quotes.consume(b) {
            continue;
        }
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            _ if b == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_forms_in_priority_order() {
        assert_eq!(classify("\"hi\""), Some(Expr::Literal(Value::String("hi".into()))));
        assert_eq!(classify("'hi'"), Some(Expr::Literal(Value::String("hi".into()))));
        assert_eq!(classify("2.5"), Some(Expr::Literal(Value::Double(2.5))));
        assert_eq!(classify("-7"), Some(Expr::Literal(Value::Integer(-7))));
        assert_eq!(classify("null"), Some(Expr::Null));
        assert_eq!(classify("True"), Some(Expr::Literal(Value::Boolean(true))));
        assert_eq!(classify("false"), Some(Expr::Literal(Value::Boolean(false))));
        assert_eq!(classify("x + 1"), None);
        assert_eq!(classify("\"a\" + \"b\""), None);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            classify(r#""say \"hi\"""#),
            Some(Expr::Literal(Value::String("say \"hi\"".into())))
        );
        assert_eq!(
            classify(r"'it\'s\ttab'"),
            Some(Expr::Literal(Value::String("it's\ttab".into())))
        );
        assert_eq!(classify(r#""open \""#), None);
        assert_eq!(
            parse_call(r#"label("a \") b", 2)"#),
            Some(("label".into(), vec![r#""a \") b""#.into(), "2".into()]))
        );
    }

    #[test]
    fn oversized_integers_are_recognised() {
        assert!(is_oversized_integer("99999999999999999999"));
        assert!(is_oversized_integer(" -99999999999999999999 "));
        assert!(!is_oversized_integer("9223372036854775807"));
        assert!(!is_oversized_integer("1.5"));
        assert_eq!(classify("99999999999999999999"), None);
    }

    #[test]
    fn calls_need_balanced_trailing_parens() {
        assert_eq!(
            classify("max(1, min(2, 3))"),
            Some(Expr::Call {
                name: "max".into(),
                args: vec!["1".into(), "min(2, 3)".into()]
            })
        );
        assert_eq!(parse_call("f(1) + g(2)"), None);
        assert_eq!(parse_call("if (x)"), None);
        assert_eq!(parse_call("clear()"), Some(("clear".into(), vec![])));
    }

    #[test]
    fn collections() {
        assert_eq!(
            classify("[1, 2, 3]"),
            Some(Expr::Literal(Value::Array(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3)
            ])))
        );
        assert_eq!(
            classify("[\"a\": 1, \"b\": 2]"),
            Some(Expr::Literal(Value::Map(vec![
                (Value::String("a".into()), Value::Integer(1)),
                (Value::String("b".into()), Value::Integer(2)),
            ])))
        );
        assert_eq!(
            classify("[[1], []]"),
            Some(Expr::Literal(Value::Array(vec![
                Value::Array(vec![Value::Integer(1)]),
                Value::Array(vec![]),
            ])))
        );
        assert_eq!(classify("[]"), Some(Expr::Literal(Value::Array(vec![]))));
        assert_eq!(classify("[1, \"a\": 2]"), None);
        assert_eq!(classify("[1] + [2]"), None);
        assert_eq!(classify("[f(1)]"), None);
    }

    #[test]
    fn splits_outside_nesting() {
        assert_eq!(split_top_level("a, (b, c), \"d, e\"", b','), vec!["a", "(b, c)", "\"d, e\""]);
        assert_eq!(split_top_level("", b','), vec![""]);
    }
}
