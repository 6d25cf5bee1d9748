use std::fmt;

use crate::variable::TypeName;

/// The two loop forms a `for` header can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ForClause {
    /// `for (init; condition; step)`
    Counted {
        init: String,
        condition: String,
        step: String,
    },
    /// `for (item in collection)`
    Each { item: String, collection: String },
}

/// A parameter in a function declaration: `size` or `size : Integer`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Missing when the parameter carries no annotation; kept as written
    /// when the annotation is not a known type.
    pub ty: Option<String>,
}

/// `function name(params) : ReturnType`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeName>,
}

impl fmt::Display for ForClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForClause::Counted {
                init,
                condition,
                step,
            } => write!(f, "({}; {}; {})", init, condition, step),
            ForClause::Each { item, collection } => write!(f, "({} in {})", item, collection),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "{} : {}", self.name, ty),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;
        if let Some(ret) = &self.return_type {
            write!(f, " : {}", ret)?;
        }
        Ok(())
    }
}
