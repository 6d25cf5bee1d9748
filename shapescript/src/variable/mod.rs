pub mod scope;

use std::fmt;
use std::ops::Range;

pub use scope::Scope;

/// The six variable kinds a scope keeps apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarKind {
    String,
    Integer,
    Double,
    Boolean,
    Array,
    Map,
}

impl VarKind {
    pub const ALL: [VarKind; 6] = [
        VarKind::String,
        VarKind::Integer,
        VarKind::Double,
        VarKind::Boolean,
        VarKind::Array,
        VarKind::Map,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VarKind::String => "String",
            VarKind::Integer => "Integer",
            VarKind::Double => "Double",
            VarKind::Boolean => "Boolean",
            VarKind::Array => "Array",
            VarKind::Map => "Map",
        }
    }
}

/// A declared type, e.g. `Integer` or `Map<String, Array<Double>>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    String,
    Integer,
    Double,
    Boolean,
    Array(Box<TypeName>),
    Map(Box<TypeName>, Box<TypeName>),
}

impl TypeName {
    pub fn kind(&self) -> VarKind {
        match self {
            TypeName::String => VarKind::String,
            TypeName::Integer => VarKind::Integer,
            TypeName::Double => VarKind::Double,
            TypeName::Boolean => VarKind::Boolean,
            TypeName::Array(_) => VarKind::Array,
            TypeName::Map(..) => VarKind::Map,
        }
    }

    /// Parse a type annotation. Returns `None` for unknown names or
    /// malformed generic arguments.
    pub fn parse(text: &str) -> Option<TypeName> {
        let text = text.trim();
        let (base, args) = match text.find('<') {
            Some(open) => {
                let inner = text[open + 1..].strip_suffix('>')?;
                (text[..open].trim(), Some(inner))
            }
            None => (text, None),
        };

        match (base, args) {
            ("String", None) => Some(TypeName::String),
            ("Integer", None) => Some(TypeName::Integer),
            ("Double", None) => Some(TypeName::Double),
            ("Boolean", None) => Some(TypeName::Boolean),
            ("Array", Some(inner)) => {
                let elem = TypeName::parse(inner)?;
                Some(TypeName::Array(Box::new(elem)))
            }
            ("Map", Some(inner)) => {
                let parts = split_type_args(inner);
                if parts.len() != 2 {
                    return None;
                }
                let key = TypeName::parse(parts[0])?;
                let value = TypeName::parse(parts[1])?;
                Some(TypeName::Map(Box::new(key), Box::new(value)))
            }
            _ => None,
        }
    }

    /// Whether `value` is acceptable for a variable of this type.
    /// Integers widen into doubles.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeName::String, Value::String(_)) => true,
            (TypeName::Integer, Value::Integer(_)) => true,
            (TypeName::Double, Value::Double(_) | Value::Integer(_)) => true,
            (TypeName::Boolean, Value::Boolean(_)) => true,
            (TypeName::Array(elem), Value::Array(items)) => items.iter().all(|v| elem.accepts(v)),
            (TypeName::Map(k, v), Value::Map(entries)) => entries
                .iter()
                .all(|(key, value)| k.accepts(key) && v.accepts(value)),
            // `[]` parses as an empty array but is also the empty map.
            (TypeName::Map(..), Value::Array(items)) => items.is_empty(),
            _ => false,
        }
    }

    /// Bring an accepted value into this type's representation.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (TypeName::Double, Value::Integer(n)) => Value::Double(n as f64),
            (TypeName::Array(elem), Value::Array(items)) => {
                Value::Array(items.into_iter().map(|v| elem.coerce(v)).collect())
            }
            (TypeName::Map(..), Value::Array(_)) => Value::Map(Vec::new()),
            (TypeName::Map(k, v), Value::Map(entries)) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (k.coerce(key), v.coerce(value)))
                    .collect(),
            ),
            (_, value) => value,
        }
    }
}

/// Split on commas outside angle brackets: `String, Array<Integer>`.
pub(crate) fn split_type_args(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Array(elem) => write!(f, "Array<{}>", elem),
            TypeName::Map(k, v) => write!(f, "Map<{}, {}>", k, v),
            other => write!(f, "{}", other.kind().name()),
        }
    }
}

/// A literal value known at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Array(Vec<Value>),
    /// Entries in literal order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Integer(_) => "Integer",
            Value::Double(_) => "Double",
            Value::Boolean(_) => "Boolean",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Value::Integer(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_finite() && *n == n.floor() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "[")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// What a variable currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Value),
    Null,
    /// Depends on a function call; kept as source text for an evaluator.
    Deferred(String),
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => write!(f, "{}", v),
            Binding::Null => write!(f, "null"),
            Binding::Deferred(expr) => write!(f, "<{}>", expr),
        }
    }
}

/// A typed binding declared with `var` or `val`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// `var` declarations are mutable, `val` ones are not.
    pub mutable: bool,
    pub ty: TypeName,
    pub binding: Binding,
    /// Span of the declaring statement.
    pub span: Range<usize>,
}

impl Variable {
    pub fn kind(&self) -> VarKind {
        self.ty.kind()
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.binding {
            Binding::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.mutable { "var" } else { "val" };
        write!(f, "{} {} : {} = {}", keyword, self.name, self.ty, self.binding)
    }
}
