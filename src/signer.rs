//! Package signing through an external tool.
//!
//! [`SigningOrchestrator`] owns the `Unsigned → Signing → {Signed, Failed}`
//! transitions and the cleanup rules; the tool itself sits behind [`Signer`].

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{BuildConfig, SignerSettings, SigningMode};
use crate::error::CompileError;
use crate::writer::ArtifactPaths;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long to keep reading output once the tool has exited. Processes it
/// left behind may hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// One signing call. Only exists while the signer runs.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub mode: SigningMode,
}

/// Why a signing call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignFailure {
    pub reason: String,
    /// Captured tool output, if it printed anything.
    pub output: Option<String>,
}

impl SignFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            output: None,
        }
    }
}

/// Something that can turn an unsigned package into a signed one.
pub trait Signer {
    /// # Errors
    ///
    /// Returns a `SignFailure` if the package could not be signed.
    fn sign(&self, request: &SigningRequest<'_>) -> Result<(), SignFailure>;
}

/// Runs `<program> sign -i <input> -o <output> -m <mode>`.
#[derive(Debug, Clone)]
pub struct ShortcutsSigner {
    settings: SignerSettings,
}

impl ShortcutsSigner {
    #[must_use]
    pub fn new(settings: SignerSettings) -> Self {
        Self { settings }
    }
}

impl Signer for ShortcutsSigner {
    fn sign(&self, request: &SigningRequest<'_>) -> Result<(), SignFailure> {
        let program = which::which(&self.settings.program).map_err(|e| {
            SignFailure::new(format!(
                "signing tool `{}` not found: {e}",
                self.settings.program
            ))
        })?;
        tracing::debug!(program = %program.display(), mode = request.mode.as_str(), "invoking signer");

        let mut child = Command::new(&program)
            .arg("sign")
            .arg("-i")
            .arg(request.input)
            .arg("-o")
            .arg(request.output)
            .arg("-m")
            .arg(request.mode.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SignFailure::new(format!("failed to run `{}`: {e}", program.display())))?;

        let (tx, rx) = mpsc::channel();
        drain(Stream::Stdout, child.stdout.take(), &tx);
        drain(Stream::Stderr, child.stderr.take(), &tx);
        drop(tx);
        let status = wait_with_timeout(&mut child, self.settings.timeout);
        let output = captured_output(&rx, Instant::now() + DRAIN_GRACE);

        match status {
            Ok(Some(status)) if status.success() => Ok(()),
            Ok(Some(status)) => Err(SignFailure {
                reason: format!("`{}` exited with {status}", self.settings.program),
                output,
            }),
            Ok(None) => Err(SignFailure {
                reason: format!(
                    "`{}` did not finish within {}s",
                    self.settings.program,
                    self.settings.timeout.as_secs()
                ),
                output,
            }),
            Err(e) => Err(SignFailure {
                reason: format!("failed waiting for `{}`: {e}", self.settings.program),
                output,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn index(self) -> usize {
        match self {
            Stream::Stdout => 0,
            Stream::Stderr => 1,
        }
    }
}

type Chunk = (Stream, Vec<u8>);

/// Forward everything read from `pipe` to `tx` in chunks.
///
/// The thread is detached: it ends at EOF, on a read error, or once the
/// receiver is gone.
fn drain<R: Read + Send + 'static>(stream: Stream, pipe: Option<R>, tx: &Sender<Chunk>) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let tx = tx.clone();
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::debug!(?stream, "failed reading signing tool output: {e}");
                    break;
                }
            }
        }
    });
}

/// `Ok(None)` means the child was killed after `timeout`.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Collect drained output until both pipes close or `deadline` passes.
fn captured_output(rx: &Receiver<Chunk>, deadline: Instant) -> Option<String> {
    let mut buffers: [Vec<u8>; 2] = [Vec::new(), Vec::new()];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((stream, chunk)) => buffers[stream.index()].extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("signing tool output still open, keeping what was read");
                break;
            }
        }
    }

    let text: Vec<String> = buffers
        .iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join("\n"))
    }
}

/// Signing lifecycle of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    Signing,
    Signed,
    Failed,
}

/// Drives the signer and applies the cleanup rules for each outcome.
#[derive(Debug)]
pub struct SigningOrchestrator<'a, S: Signer + ?Sized> {
    signer: &'a S,
    state: SigningState,
}

impl<'a, S: Signer + ?Sized> SigningOrchestrator<'a, S> {
    pub fn new(signer: &'a S) -> Self {
        Self {
            signer,
            state: SigningState::Unsigned,
        }
    }

    #[must_use]
    pub fn state(&self) -> SigningState {
        self.state
    }

    /// Sign the unsigned package and return the path of the package left for
    /// the user.
    ///
    /// With `config.unsigned` the signer is never called and the unsigned
    /// package is returned as is. A failed signing keeps the unsigned package
    /// on disk; a successful one deletes it.
    ///
    /// # Errors
    ///
    /// Returns `SigningTool` if signing fails, or `Write` if the unsigned
    /// package cannot be removed afterwards.
    pub fn run(
        &mut self,
        config: &BuildConfig,
        paths: &ArtifactPaths,
    ) -> Result<PathBuf, CompileError> {
        if config.unsigned {
            tracing::debug!("unsigned build, skipping signer");
            return Ok(paths.unsigned.clone());
        }

        let output = config.output.clone().unwrap_or_else(|| paths.signed.clone());
        self.transition(SigningState::Signing);
        let result = self.signer.sign(&SigningRequest {
            input: &paths.unsigned,
            output: &output,
            mode: config.signing_mode,
        });

        if let Err(failure) = result {
            self.transition(SigningState::Failed);
            return Err(CompileError::SigningTool {
                reason: failure.reason,
                output: failure.output,
            });
        }

        self.transition(SigningState::Signed);
        fs::remove_file(&paths.unsigned).map_err(|source| CompileError::Write {
            path: paths.unsigned.clone(),
            source,
        })?;
        Ok(output)
    }

    fn transition(&mut self, next: SigningState) {
        tracing::debug!(from = ?self.state, to = ?next, "signing state");
        self.state = next;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records requests; writes the output file on success.
    struct FakeSigner {
        fail: bool,
        calls: RefCell<Vec<(PathBuf, PathBuf, SigningMode)>>,
    }

    impl FakeSigner {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Signer for FakeSigner {
        fn sign(&self, request: &SigningRequest<'_>) -> Result<(), SignFailure> {
            self.calls.borrow_mut().push((
                request.input.to_path_buf(),
                request.output.to_path_buf(),
                request.mode,
            ));
            if self.fail {
                return Err(SignFailure {
                    reason: "exit status: 1".into(),
                    output: Some("invalid plist".into()),
                });
            }
            fs::copy(request.input, request.output).unwrap();
            Ok(())
        }
    }

    fn setup() -> (TempDir, ArtifactPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "app");
        fs::write(&paths.unsigned, "<plist/>").unwrap();
        (dir, paths)
    }

    #[test]
    fn test_successful_signing_removes_unsigned() {
        let (_dir, paths) = setup();
        let signer = FakeSigner::new(false);
        let mut orchestrator = SigningOrchestrator::new(&signer);

        let package = orchestrator.run(&BuildConfig::default(), &paths).unwrap();

        assert_eq!(package, paths.signed);
        assert_eq!(orchestrator.state(), SigningState::Signed);
        assert!(paths.signed.exists());
        assert!(!paths.unsigned.exists());
        let calls = signer.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, paths.unsigned);
        assert_eq!(calls[0].2, SigningMode::PeopleWhoKnowMe);
    }

    #[test]
    fn test_failed_signing_keeps_unsigned() {
        let (_dir, paths) = setup();
        let signer = FakeSigner::new(true);
        let mut orchestrator = SigningOrchestrator::new(&signer);

        let err = orchestrator.run(&BuildConfig::default(), &paths).unwrap_err();

        assert_eq!(orchestrator.state(), SigningState::Failed);
        assert!(paths.unsigned.exists());
        assert!(!paths.signed.exists());
        match err {
            CompileError::SigningTool { output, .. } => {
                assert_eq!(output.as_deref(), Some("invalid plist"));
            }
            other => panic!("expected SigningTool, got {other:?}"),
        }
    }

    #[test]
    fn test_unsigned_mode_never_calls_signer() {
        let (_dir, paths) = setup();
        let signer = FakeSigner::new(false);
        let mut orchestrator = SigningOrchestrator::new(&signer);
        let config = BuildConfig {
            unsigned: true,
            ..BuildConfig::default()
        };

        let package = orchestrator.run(&config, &paths).unwrap();

        assert_eq!(package, paths.unsigned);
        assert_eq!(orchestrator.state(), SigningState::Unsigned);
        assert!(signer.calls.borrow().is_empty());
        assert!(paths.unsigned.exists());
        assert!(!paths.signed.exists());
    }

    #[test]
    fn test_explicit_output_and_share_mode() {
        let (dir, paths) = setup();
        let signer = FakeSigner::new(false);
        let target = dir.path().join("Shared Shortcut.shortcut");
        let config = BuildConfig {
            output: Some(target.clone()),
            signing_mode: SigningMode::Anyone,
            ..BuildConfig::default()
        };

        let package = SigningOrchestrator::new(&signer).run(&config, &paths).unwrap();

        assert_eq!(package, target);
        assert!(target.exists());
        assert!(!paths.signed.exists());
        assert_eq!(signer.calls.borrow()[0].2, SigningMode::Anyone);
    }

    #[test]
    fn test_missing_unsigned_after_signing_is_fatal() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "app");
        struct NoopSigner;
        impl Signer for NoopSigner {
            fn sign(&self, _: &SigningRequest<'_>) -> Result<(), SignFailure> {
                Ok(())
            }
        }

        let err = SigningOrchestrator::new(&NoopSigner)
            .run(&BuildConfig::default(), &paths)
            .unwrap_err();
        assert!(matches!(err, CompileError::Write { .. }));
    }

    /// Yields one chunk, then fails.
    struct BrokenPipe {
        sent: bool,
    }

    impl Read for BrokenPipe {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.sent {
                return Err(std::io::Error::other("pipe broke"));
            }
            self.sent = true;
            let chunk = b"Error: partial";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn test_read_error_keeps_partial_output() {
        let (tx, rx) = mpsc::channel();
        drain(Stream::Stderr, Some(BrokenPipe { sent: false }), &tx);
        drop(tx);

        let output = captured_output(&rx, Instant::now() + Duration::from_secs(5));
        assert_eq!(output.as_deref(), Some("Error: partial"));
    }

    #[test]
    fn test_no_pipes_means_no_output() {
        let (tx, rx) = mpsc::channel::<Chunk>();
        drain::<BrokenPipe>(Stream::Stdout, None, &tx);
        drop(tx);
        assert_eq!(captured_output(&rx, Instant::now() + DRAIN_GRACE), None);
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let signer = ShortcutsSigner::new(SignerSettings {
            program: "cherri-no-such-signing-tool".into(),
            timeout: Duration::from_secs(1),
        });
        let failure = signer
            .sign(&SigningRequest {
                input: Path::new("in.shortcut"),
                output: Path::new("out.shortcut"),
                mode: SigningMode::Anyone,
            })
            .unwrap_err();
        assert!(failure.reason.contains("not found"), "{}", failure.reason);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-shortcuts");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn sign_with(program: &Path, timeout: Duration, dir: &Path) -> Result<(), SignFailure> {
            let signer = ShortcutsSigner::new(SignerSettings {
                program: program.display().to_string(),
                timeout,
            });
            signer.sign(&SigningRequest {
                input: &dir.join("in.shortcut"),
                output: &dir.join("out.shortcut"),
                mode: SigningMode::PeopleWhoKnowMe,
            })
        }

        #[test]
        fn test_tool_receives_sign_arguments() {
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("args.txt");
            let tool = script(dir.path(), &format!("echo \"$@\" > '{}'", log.display()));

            sign_with(&tool, Duration::from_secs(10), dir.path()).unwrap();

            let args = fs::read_to_string(&log).unwrap();
            assert!(args.starts_with("sign -i "), "{args}");
            assert!(args.contains("in.shortcut -o "), "{args}");
            assert!(args.trim_end().ends_with("-m people-who-know-me"), "{args}");
        }

        #[test]
        fn test_nonzero_exit_captures_output() {
            let dir = TempDir::new().unwrap();
            let tool = script(dir.path(), "echo 'Error: bad plist'; exit 3");

            let failure = sign_with(&tool, Duration::from_secs(10), dir.path()).unwrap_err();

            assert!(failure.reason.contains("exited with"), "{}", failure.reason);
            assert_eq!(failure.output.as_deref(), Some("Error: bad plist"));
        }

        #[test]
        fn test_hung_tool_is_killed() {
            let dir = TempDir::new().unwrap();
            let tool = script(dir.path(), "exec sleep 30");

            let started = Instant::now();
            let failure = sign_with(&tool, Duration::from_secs(1), dir.path()).unwrap_err();

            assert!(failure.reason.contains("did not finish"), "{}", failure.reason);
            assert!(started.elapsed() < Duration::from_secs(20));
        }

        #[test]
        fn test_timeout_not_held_up_by_tool_children() {
            let dir = TempDir::new().unwrap();
            // No `exec`: the shell is killed but `sleep` keeps the pipes open.
            let tool = script(dir.path(), "echo 'signing...'\nsleep 30");

            let started = Instant::now();
            let failure = sign_with(&tool, Duration::from_secs(1), dir.path()).unwrap_err();

            assert!(failure.reason.contains("did not finish"), "{}", failure.reason);
            assert_eq!(failure.output.as_deref(), Some("signing..."));
            assert!(started.elapsed() < Duration::from_secs(10), "{:?}", started.elapsed());
        }

        #[test]
        fn test_background_child_does_not_delay_success() {
            let dir = TempDir::new().unwrap();
            let tool = script(dir.path(), "sleep 30 &\nexit 0");

            let started = Instant::now();
            sign_with(&tool, Duration::from_secs(10), dir.path()).unwrap();

            assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
        }
    }
}
