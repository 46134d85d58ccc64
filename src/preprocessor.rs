//! `#include` expansion.
//!
//! Included files are spliced into the root source line for line, in as many
//! passes as it takes for the last directive to disappear. Each resolved path
//! may be spliced in only once, so a cycle surfaces as a duplicate include
//! instead of looping forever.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CompileError;
use crate::source::{self, SourceDocument};

pub const INCLUDE_MARKER: &str = "#include";

/// Default upper bound on expansion passes.
pub const DEFAULT_MAX_PASSES: usize = 64;

#[allow(clippy::expect_used)]
static QUOTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(.*?)""#).expect("include path regex is valid"));

/// Resolved paths that have already been spliced in, in inclusion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IncludeSet(Vec<PathBuf>);

impl IncludeSet {
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.0.iter().any(|p| p == path)
    }

    /// Returns `false` if the path was already present.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.contains(&path) {
            return false;
        }
        self.0.push(path);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }
}

/// Expands `#include` directives relative to the root file's directory.
#[derive(Debug)]
pub struct Preprocessor {
    root_dir: PathBuf,
    included: IncludeSet,
    max_passes: usize,
}

impl Preprocessor {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            included: IncludeSet::default(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    #[must_use]
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    #[must_use]
    pub fn included(&self) -> &IncludeSet {
        &self.included
    }

    pub fn into_included(self) -> IncludeSet {
        self.included
    }

    /// Expand every include in `doc` until none remain.
    ///
    /// # Errors
    ///
    /// Returns `MissingIncludePath`, `DuplicateInclude`, `IncludeDepthExceeded`,
    /// or any loader error for an included file.
    pub fn expand(&mut self, doc: &mut SourceDocument) -> Result<(), CompileError> {
        let mut passes = 0;
        while doc.text.contains(INCLUDE_MARKER) {
            if passes == self.max_passes {
                return Err(CompileError::IncludeDepthExceeded {
                    max: self.max_passes,
                });
            }
            passes += 1;
            tracing::debug!(pass = passes, "expanding includes");
            self.expand_pass(doc)?;
        }
        Ok(())
    }

    fn expand_pass(&mut self, doc: &mut SourceDocument) -> Result<(), CompileError> {
        doc.lines = doc.text.split('\n').map(str::to_string).collect();

        for index in 0..doc.lines.len() {
            doc.cursor.set(index);
            if !doc.lines[index].contains(INCLUDE_MARKER) {
                continue;
            }

            let include_path = include_path(&doc.lines[index]).ok_or_else(|| {
                CompileError::MissingIncludePath {
                    file: doc.filename.clone(),
                    line: doc.cursor.line_number(),
                }
            })?;
            let resolved = self.resolve(include_path);

            if self.included.contains(&resolved) {
                return Err(CompileError::DuplicateInclude {
                    path: resolved,
                    file: doc.filename.clone(),
                    line: doc.cursor.line_number(),
                });
            }
            source::validate(&resolved)?;

            doc.lines[index] = source::read(&resolved)?;
            tracing::debug!(path = %resolved.display(), line = index + 1, "included");
            self.included.insert(resolved);
        }

        doc.text = doc.lines.join("\n");
        doc.cursor.reset();
        Ok(())
    }

    /// Paths containing `..` are taken verbatim; anything else is relative to
    /// the root file's directory.
    fn resolve(&self, include_path: &str) -> PathBuf {
        if include_path.contains("..") {
            PathBuf::from(include_path)
        } else {
            self.root_dir.join(include_path)
        }
    }
}

/// First double-quoted, non-empty substring on the line.
fn include_path(line: &str) -> Option<&str> {
    QUOTED_PATH
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|path| !path.is_empty())
}
