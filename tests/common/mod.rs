//! Common test helpers shared across integration tests

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)] // Not all helpers are used by every test file

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Path of the compiled `cherri` binary
pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cherri"))
}

/// Helper to create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Helper to write a source file (or any file) inside `dir`
pub fn write_source(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Write an executable shell script standing in for `shortcuts`.
///
/// Every invocation appends its arguments to `calls.log` in `dir`.
#[cfg(unix)]
pub fn create_stub_signer(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("calls.log");
    let script = format!(
        "#!/bin/sh\n\
         echo \"$@\" >> '{log}'\n\
         if [ {exit_code} -ne 0 ]; then\n\
           echo 'Error: invalid shortcut file'\n\
           exit {exit_code}\n\
         fi\n\
         out=''\n\
         while [ $# -gt 0 ]; do\n\
           if [ \"$1\" = '-o' ]; then out=\"$2\"; fi\n\
           if [ \"$1\" = '-i' ]; then in=\"$2\"; fi\n\
           shift\n\
         done\n\
         cp \"$in\" \"$out\"\n",
        log = log.display(),
    );
    let path = dir.join("stub-shortcuts");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Lines recorded by the stub signer, empty if it never ran
pub fn signer_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Package version for testing --version flag
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Helper to create a Command with an isolated environment
/// Clears signing and logging overrides inherited from the developer's shell
pub fn test_command(binary: &Path) -> Command {
    let mut cmd = Command::new(binary);
    cmd.env_remove("CHERRI_SIGNING_TOOL");
    cmd.env_remove("CHERRI_SIGN_TIMEOUT");
    cmd.env_remove("RUST_LOG");
    cmd
}
