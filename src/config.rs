//! Build configuration and environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use crate::preprocessor::DEFAULT_MAX_PASSES;

/// Program used to sign packages when `CHERRI_SIGNING_TOOL` is unset.
pub const DEFAULT_SIGNING_TOOL: &str = "shortcuts";

pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(120);

/// Who may run the signed shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningMode {
    Anyone,
    #[default]
    PeopleWhoKnowMe,
}

impl SigningMode {
    /// Map a `--share` value. Only `anyone` opens the shortcut up.
    #[must_use]
    pub fn from_share(value: &str) -> Self {
        if value == "anyone" {
            SigningMode::Anyone
        } else {
            SigningMode::PeopleWhoKnowMe
        }
    }

    /// Value passed to `shortcuts sign -m`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SigningMode::Anyone => "anyone",
            SigningMode::PeopleWhoKnowMe => "people-who-know-me",
        }
    }
}

/// Options for a single build, fixed once parsed from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub signing_mode: SigningMode,
    pub unsigned: bool,
    pub debug: bool,
    /// Overrides `<basename>.shortcut` as the signed package path.
    pub output: Option<PathBuf>,
    pub max_include_passes: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            signing_mode: SigningMode::default(),
            unsigned: false,
            debug: false,
            output: None,
            max_include_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// How the external signing tool is located and bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSettings {
    pub program: String,
    pub timeout: Duration,
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_SIGNING_TOOL.to_string(),
            timeout: DEFAULT_SIGN_TIMEOUT,
        }
    }
}

impl SignerSettings {
    /// Read `CHERRI_SIGNING_TOOL` and `CHERRI_SIGN_TIMEOUT` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`, falling back to defaults for
    /// missing, empty, or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let program = lookup("CHERRI_SIGNING_TOOL")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNING_TOOL.to_string());

        let timeout = lookup("CHERRI_SIGN_TIMEOUT")
            .and_then(|t| t.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_SIGN_TIMEOUT, Duration::from_secs);

        Self { program, timeout }
    }
}
