//! The build pipeline: load, preprocess, compile, write, sign.

use std::path::{Path, PathBuf};

use crate::backend::{Backend, Compilation};
use crate::config::BuildConfig;
use crate::error::CompileError;
use crate::preprocessor::{IncludeSet, Preprocessor};
use crate::signer::{Signer, SigningOrchestrator, SigningState};
use crate::source;
use crate::writer::{self, ArtifactPaths};

/// What a successful build left behind.
#[derive(Debug)]
pub struct BuildOutcome {
    pub basename: String,
    pub included: IncludeSet,
    pub compilation: Compilation,
    pub paths: ArtifactPaths,
    pub signing: SigningState,
    /// The package the user should pick up: signed, or unsigned in unsigned mode.
    pub package: PathBuf,
}

/// Runs every stage in order and stops at the first error.
pub struct Driver<'a> {
    config: &'a BuildConfig,
    backend: &'a dyn Backend,
    signer: &'a dyn Signer,
    out_dir: PathBuf,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a BuildConfig, backend: &'a dyn Backend, signer: &'a dyn Signer) -> Self {
        Self {
            config,
            backend,
            signer,
            out_dir: PathBuf::new(),
        }
    }

    /// Directory for the plist and unsigned package. Defaults to the current
    /// directory.
    #[must_use]
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Build `path`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage.
    pub fn build(&self, path: &Path) -> Result<BuildOutcome, CompileError> {
        let mut doc = source::load(path)?;

        let mut preprocessor =
            Preprocessor::new(&doc.relative_path).with_max_passes(self.config.max_include_passes);
        preprocessor.expand(&mut doc)?;
        let included = preprocessor.into_included();

        tracing::info!(file = %doc.filename, "parsing");
        let compilation = self
            .backend
            .compile(&doc.text, &doc.cursor, &doc.filename)?;

        let paths = ArtifactPaths::new(&self.out_dir, &doc.basename);
        writer::write_artifacts(&compilation.artifact, &paths, self.config.debug)?;

        let mut orchestrator = SigningOrchestrator::new(self.signer);
        let package = orchestrator.run(self.config, &paths)?;
        tracing::info!(package = %package.display(), "done");

        Ok(BuildOutcome {
            basename: doc.basename,
            included,
            compilation,
            paths,
            signing: orchestrator.state(),
            package,
        })
    }
}
