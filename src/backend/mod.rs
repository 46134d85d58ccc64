//! Compiler backend: expanded source text in, plist document out.
//!
//! The driver only depends on the [`Backend`] trait. [`CherriBackend`] is the
//! implementation shipped with the binary.

pub mod ast;
mod codegen;
mod parser;
pub mod plist;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ParseError;
use crate::source::LineCursor;

pub use ast::{Token, TokenKind, Value};
pub use parser::{CherriParser, Rule, parse_program};

/// The serialized plist produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact(String);

impl CompiledArtifact {
    #[must_use]
    pub fn new(document: String) -> Self {
        Self(document)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// A menu construct as seen in debug output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Menu {
    pub prompt: Value,
    pub items: Vec<String>,
    pub line: usize,
}

/// Everything a backend produces for one source.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    /// Declared variables with references resolved to the value they copy.
    pub variables: BTreeMap<String, Value>,
    pub menus: Vec<Menu>,
    pub artifact: CompiledArtifact,
}

/// Turns fully expanded source into a [`Compilation`].
///
/// Implementations move `cursor` to the statement they are checking so the
/// line in a [`ParseError`] and the cursor agree.
pub trait Backend {
    /// # Errors
    ///
    /// Returns a `ParseError` for syntax errors and semantic errors alike.
    fn compile(
        &self,
        source: &str,
        cursor: &LineCursor,
        filename: &str,
    ) -> Result<Compilation, ParseError>;
}

/// Backend for the Cherri language subset described by `grammar.pest`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CherriBackend;

impl Backend for CherriBackend {
    fn compile(
        &self,
        source: &str,
        cursor: &LineCursor,
        filename: &str,
    ) -> Result<Compilation, ParseError> {
        let (program, tokens) = parse_program(source)
            .map_err(|e| ParseError::from_pest(&e, source, cursor, Some(filename)))?;
        tracing::debug!(
            statements = program.statements.len(),
            tokens = tokens.len(),
            "parsed"
        );

        let output = codegen::Generator::new(source, cursor, filename).generate(&program)?;

        Ok(Compilation {
            tokens,
            variables: output.variables,
            menus: output.menus,
            artifact: CompiledArtifact::new(output.document.to_document()),
        })
    }
}
