//! Error types for the compiler pipeline.
//!
//! Every stage returns a [`CompileError`]; the CLI is the only place that turns
//! one into a printed diagnostic and an exit code.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::backend::Rule;
use crate::source::{LineCursor, SOURCE_EXTENSION};

/// Every way a build can fail. All variants are fatal.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Usage(String),

    #[error("File at path '{}' does not exist!", path.display())]
    FileNotFound { path: PathBuf },

    #[error("File '{}' is not a .{SOURCE_EXTENSION} file!", path.display())]
    InvalidExtension { path: PathBuf },

    #[error("{file}:{line}: No path inside of include")]
    MissingIncludePath { file: String, line: usize },

    #[error("{file}:{line}: File '{}' has already been included.", path.display())]
    DuplicateInclude {
        path: PathBuf,
        file: String,
        line: usize,
    },

    #[error("Includes are still unresolved after {max} expansion passes")]
    IncludeDepthExceeded { max: usize },

    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] Box<ParseError>),

    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to sign Shortcut, plist may be invalid! ({reason})")]
    SigningTool {
        reason: String,
        /// Whatever the tool printed before failing.
        output: Option<String>,
    },
}

impl CompileError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_)
            | Self::FileNotFound { .. }
            | Self::InvalidExtension { .. }
            | Self::MissingIncludePath { .. }
            | Self::DuplicateInclude { .. }
            | Self::IncludeDepthExceeded { .. }
            | Self::Read { .. }
            | Self::Parse(_)
            | Self::Write { .. }
            | Self::SigningTool { .. } => 1,
        }
    }
}

impl From<ParseError> for CompileError {
    fn from(error: ParseError) -> Self {
        Self::Parse(Box::new(error))
    }
}

/// A structured, user-friendly parser error.
///
/// Produced either from a raw `pest` failure or from a semantic check that
/// uses the shared line cursor to locate the offending statement.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message (no raw rule names).
    pub message: String,
    /// Line number (1-indexed) in the expanded source.
    pub line: usize,
    /// Column number (1-indexed) where the error begins.
    pub col: usize,
    /// End column for span errors (used to size the underline caret).
    pub col_end: Option<usize>,
    /// The full text of the offending source line.
    pub source_line: Option<String>,
    /// Optional source file name shown in the error header.
    pub filename: Option<String>,
    /// Optional suggestion to help the user fix the error.
    pub hint: Option<String>,
}

impl ParseError {
    /// Build a `ParseError` from a pest error, enriching it with source context.
    ///
    /// The cursor is moved to the failing line so later stages see the same
    /// position the diagnostic reports.
    pub fn from_pest(
        error: &pest::error::Error<Rule>,
        source: &str,
        cursor: &LineCursor,
        filename: Option<&str>,
    ) -> Self {
        let (line, col, col_end) = match error.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c, None),
            pest::error::LineColLocation::Span((sl, sc), (el, ec)) => {
                let end = if sl == el { Some(ec) } else { None };
                (sl, sc, end)
            }
        };
        cursor.set(line.saturating_sub(1));

        let (message, hint) = match &error.variant {
            pest::error::ErrorVariant::ParsingError { positives, .. } => {
                (friendly_message(positives), friendly_hint(positives))
            }
            pest::error::ErrorVariant::CustomError { message } => (message.clone(), None),
        };

        ParseError {
            message,
            line,
            col,
            col_end,
            source_line: source_line(source, line),
            filename: filename.map(str::to_string),
            hint,
        }
    }

    /// Build an error for the statement the cursor currently points at.
    pub fn at_cursor(
        message: impl Into<String>,
        source: &str,
        cursor: &LineCursor,
        filename: Option<&str>,
    ) -> Self {
        let line = cursor.line_number();
        let source_line = source_line(source, line);
        let col = source_line
            .as_deref()
            .map_or(1, |l| l.len() - l.trim_start().len() + 1);
        ParseError {
            message: message.into(),
            line,
            col,
            col_end: source_line.as_deref().map(|l| l.trim_end().len() + 1),
            source_line,
            filename: filename.map(str::to_string),
            hint: None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn source_line(source: &str, line: usize) -> Option<String> {
    source
        .split('\n')
        .nth(line.saturating_sub(1))
        .map(str::to_string)
}

/// Return a short, user-facing label for a grammar rule, or `None` to omit it.
fn rule_label(rule: Rule) -> Option<&'static str> {
    match rule {
        Rule::identifier => Some("identifier"),
        Rule::variable => Some("variable (e.g. `@name`)"),
        Rule::string => Some("quoted string"),
        Rule::number => Some("number"),
        Rule::call => Some("action call"),
        Rule::assignment => Some("variable declaration"),
        Rule::define => Some("`#define`"),
        Rule::menu => Some("menu"),
        Rule::menu_item => Some("menu item (`item \"label\":`)"),
        Rule::arguments => Some("argument list"),
        _ => None,
    }
}

/// Compose a human-readable message from the expected rule set.
fn friendly_message(positives: &[Rule]) -> String {
    let named: Vec<&str> = positives.iter().copied().filter_map(rule_label).collect();

    match named.as_slice() {
        [] => "unexpected token".to_string(),
        [single] => format!("expected {single}"),
        [a, b] => format!("expected {a} or {b}"),
        many => match many.split_last() {
            Some((last, rest)) => format!("expected {} or {}", rest.join(", "), last),
            None => "unexpected token".to_string(),
        },
    }
}

fn friendly_hint(positives: &[Rule]) -> Option<String> {
    let has = |r: Rule| positives.contains(&r);

    if has(Rule::menu_item) {
        return Some(
            "Menus hold `item \"label\":` entries, each followed by its statements \
             on the next lines."
                .to_string(),
        );
    }
    if has(Rule::string) && has(Rule::number) {
        return Some(
            "Values are quoted strings, numbers, or previously declared `@variables`.".to_string(),
        );
    }
    None
}

/// Format the caret underline for an error at `col` with optional `col_end`.
fn underline(col: usize, col_end: Option<usize>) -> String {
    let start = col.saturating_sub(1);
    let len = col_end.map_or(1, |end| end.saturating_sub(col).max(1));
    format!("{}{}", " ".repeat(start), "^".repeat(len))
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        let location = match &self.filename {
            Some(name) => format!("{name}:{}:{}", self.line, self.col),
            None => format!("{}:{}", self.line, self.col),
        };
        write!(f, "  --> {location}")?;

        if let Some(ref src) = self.source_line {
            let num = self.line.to_string();
            let pad = " ".repeat(num.len());

            writeln!(f)?;
            writeln!(f, "   {pad} |")?;
            writeln!(f, "   {num} | {src}")?;
            write!(f, "   {pad} | {}", underline(self.col, self.col_end))?;
        }

        if let Some(ref hint) = self.hint {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "   = hint: {hint}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}
