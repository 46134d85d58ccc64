// Abstract Syntax Tree definitions

use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A literal or variable reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Text(String),
    /// Kept as written so integers stay integers in the plist.
    Number(String),
    Variable(String),
}

impl Value {
    /// Text form used where a literal must be rendered as a string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Number(s) => Some(s),
            Value::Variable(_) => None,
        }
    }
}

/// Statements carry the 1-indexed line they start on in the expanded source.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Define {
        key: String,
        value: String,
        line: usize,
    },
    Assignment {
        name: String,
        value: Value,
        line: usize,
    },
    Call {
        action: String,
        args: Vec<Value>,
        line: usize,
    },
    Menu {
        prompt: Value,
        items: Vec<MenuItem>,
        line: usize,
    },
}

impl Statement {
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Statement::Define { line, .. }
            | Statement::Assignment { line, .. }
            | Statement::Call { line, .. }
            | Statement::Menu { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub label: Value,
    pub body: Vec<Statement>,
    pub line: usize,
}

/// Lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Variable,
    String,
    Number,
    DefineValue,
}

/// One entry of the token stream shown in debug output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}
