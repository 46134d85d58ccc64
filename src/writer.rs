//! Writes compiled artifacts to disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::CompiledArtifact;
use crate::error::CompileError;

/// File locations derived from a source basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `<basename>.plist`, written only in debug builds.
    pub plist: PathBuf,
    /// `<basename>_unsigned.shortcut`, always written.
    pub unsigned: PathBuf,
    /// `<basename>.shortcut`, the signed package unless `--output` overrides it.
    pub signed: PathBuf,
}

impl ArtifactPaths {
    pub fn new(out_dir: &Path, basename: &str) -> Self {
        Self {
            plist: out_dir.join(format!("{basename}.plist")),
            unsigned: out_dir.join(format!("{basename}_unsigned.shortcut")),
            signed: out_dir.join(format!("{basename}.shortcut")),
        }
    }
}

/// Write the debug plist (if requested) and the unsigned package.
///
/// # Errors
///
/// Returns `Write` for the first file that cannot be written.
pub fn write_artifacts(
    artifact: &CompiledArtifact,
    paths: &ArtifactPaths,
    debug: bool,
) -> Result<(), CompileError> {
    if debug {
        write_file(&paths.plist, artifact.as_bytes())?;
        tracing::debug!(path = %paths.plist.display(), "wrote plist");
    }
    write_file(&paths.unsigned, artifact.as_bytes())?;
    tracing::debug!(path = %paths.unsigned.display(), "wrote unsigned shortcut");
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), CompileError> {
    fs::write(path, contents).map_err(|source| CompileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    restrict_permissions(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CompileError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
        CompileError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CompileError> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact() -> CompiledArtifact {
        CompiledArtifact::new("<plist/>".to_string())
    }

    #[test]
    fn test_paths_from_basename() {
        let paths = ArtifactPaths::new(Path::new(""), "greet");
        assert_eq!(paths.plist, PathBuf::from("greet.plist"));
        assert_eq!(paths.unsigned, PathBuf::from("greet_unsigned.shortcut"));
        assert_eq!(paths.signed, PathBuf::from("greet.shortcut"));
    }

    #[test]
    fn test_release_build_writes_only_unsigned() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "greet");
        write_artifacts(&artifact(), &paths, false).unwrap();
        assert!(!paths.plist.exists());
        assert_eq!(fs::read_to_string(&paths.unsigned).unwrap(), "<plist/>");
    }

    #[test]
    fn test_debug_build_also_writes_plist() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "greet");
        write_artifacts(&artifact(), &paths, true).unwrap();
        assert_eq!(fs::read_to_string(&paths.plist).unwrap(), "<plist/>");
        assert!(paths.unsigned.exists());
    }

    #[test]
    fn test_unwritable_location_is_write_error() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(&dir.path().join("missing/dir"), "greet");
        let err = write_artifacts(&artifact(), &paths, false).unwrap_err();
        assert!(matches!(err, CompileError::Write { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_artifacts_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "greet");
        write_artifacts(&artifact(), &paths, false).unwrap();
        let mode = fs::metadata(&paths.unsigned).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
