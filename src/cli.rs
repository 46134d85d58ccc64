//! CLI module containing the main entry point logic.
//!
//! This is the only place where errors become printed diagnostics and exit codes.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser as ClapParser};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::backend::{CherriBackend, Menu, Token, Value};
use crate::config::{BuildConfig, SignerSettings, SigningMode};
use crate::driver::{BuildOutcome, Driver};
use crate::error::CompileError;
use crate::preprocessor::DEFAULT_MAX_PASSES;
use crate::signer::ShortcutsSigner;

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI arguments for the cherri compiler.
#[derive(ClapParser, Debug)]
#[command(name = "cherri")]
#[command(version = PKG_VERSION)]
#[command(about = "Compile Cherri source files into Shortcuts", long_about = None)]
struct Cli {
    /// Cherri source file to compile
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Who can run the signed Shortcut: `anyone`, or any other value for
    /// people who know you
    #[arg(short, long, value_name = "MODE", default_value = "contacts", value_parser = parse_share)]
    share: SigningMode,

    /// Don't sign the compiled Shortcut. It will NOT run on iOS or macOS.
    #[arg(short, long)]
    unsigned: bool,

    /// Save the generated plist and print debug output
    #[arg(short, long)]
    debug: bool,

    /// Output path for the signed Shortcut (e.g. /path/to/file.shortcut)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Maximum number of include expansion passes
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_PASSES)]
    max_include_depth: usize,
}

fn parse_share(value: &str) -> Result<SigningMode, Infallible> {
    Ok(SigningMode::from_share(value))
}

impl Cli {
    fn build_config(&self) -> BuildConfig {
        BuildConfig {
            signing_mode: self.share,
            unsigned: self.unsigned,
            debug: self.debug,
            output: self.output.clone(),
            max_include_passes: self.max_include_depth,
        }
    }
}

/// Parse arguments, run the build, and return the process exit code.
pub fn run_cli() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version land here too and exit successfully.
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            return 0;
        }
        Err(e) => {
            let error = CompileError::Usage(e.render().to_string());
            report(&error);
            return error.exit_code();
        }
    };

    let Some(file) = cli.file.as_deref() else {
        let _ = Cli::command().print_help();
        return 0;
    };

    init_tracing(cli.debug);
    let config = cli.build_config();

    match build(file, &config) {
        Ok(()) => 0,
        Err(error) => {
            report(&error);
            error.exit_code()
        }
    }
}

fn build(file: &Path, config: &BuildConfig) -> Result<(), CompileError> {
    let signer = ShortcutsSigner::new(SignerSettings::from_env());
    let outcome = Driver::new(config, &CherriBackend, &signer).build(file)?;

    if config.debug {
        print_debug_dump(&outcome);
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print a failed build's diagnostic to stderr.
fn report(error: &CompileError) {
    eprintln!("{error}");
    if let CompileError::SigningTool {
        output: Some(output),
        ..
    } = error
    {
        eprintln!("shortcuts: {output}");
    }
}

#[derive(Serialize)]
struct DebugDump<'a> {
    included: Vec<String>,
    tokens: &'a [Token],
    variables: &'a BTreeMap<String, Value>,
    menus: &'a [Menu],
    package: String,
}

fn print_debug_dump(outcome: &BuildOutcome) {
    let dump = DebugDump {
        included: outcome
            .included
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        tokens: &outcome.compilation.tokens,
        variables: &outcome.compilation.variables,
        menus: &outcome.compilation.menus,
        package: outcome.package.display().to_string(),
    };
    match serde_json::to_string_pretty(&dump) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!("failed to serialize debug output: {e}"),
    }
}
