//! Source file validation and loading.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CompileError;

/// Extension every source file, root or included, must carry.
pub const SOURCE_EXTENSION: &str = "cherri";

/// Index into the current line sequence, shared by the preprocessor and the
/// backend so diagnostics can be attributed to a line.
///
/// There is exactly one cursor per build; stages borrow it rather than copy it.
#[derive(Debug, Default)]
pub struct LineCursor(Cell<usize>);

impl LineCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-based line index.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.get()
    }

    pub fn set(&self, index: usize) {
        self.0.set(index);
    }

    pub fn reset(&self) {
        self.0.set(0);
    }

    /// One-based line number, as shown to users.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.get() + 1
    }
}

/// The root source file and everything derived from it.
///
/// `text` and `lines` are rewritten in place while includes are expanded.
#[derive(Debug)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// File name without its path, e.g. `main.cherri`.
    pub filename: String,
    /// First dot-delimited segment of the file name.
    pub basename: String,
    /// Directory used to resolve include paths.
    pub relative_path: PathBuf,
    pub text: String,
    pub lines: Vec<String>,
    pub cursor: LineCursor,
}

/// Check that `path` exists and has the `.cherri` extension.
///
/// # Errors
///
/// Returns `FileNotFound` or `InvalidExtension`; nothing is read.
pub fn validate(path: &Path) -> Result<(), CompileError> {
    if !path.exists() {
        return Err(CompileError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let name = file_name(path);
    let extension = name.rsplit('.').next().unwrap_or_default();
    if extension != SOURCE_EXTENSION {
        return Err(CompileError::InvalidExtension {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Read a file fully into memory.
///
/// # Errors
///
/// Returns `Read` if the file cannot be read as UTF-8 text.
pub fn read(path: &Path) -> Result<String, CompileError> {
    fs::read_to_string(path).map_err(|source| CompileError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate and read the root source file.
///
/// # Errors
///
/// Returns the validation errors of [`validate`] or a `Read` error.
pub fn load(path: &Path) -> Result<SourceDocument, CompileError> {
    validate(path)?;
    let text = read(path)?;

    let filename = file_name(path);
    // "my.script.cherri" becomes "my"
    let basename = filename.split('.').next().unwrap_or_default().to_string();
    let relative_path = path.parent().map(Path::to_path_buf).unwrap_or_default();

    tracing::debug!(path = %path.display(), %basename, "loaded source");

    Ok(SourceDocument {
        path: path.to_path_buf(),
        filename,
        basename,
        relative_path,
        lines: text.split('\n').map(str::to_string).collect(),
        text,
        cursor: LineCursor::new(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
